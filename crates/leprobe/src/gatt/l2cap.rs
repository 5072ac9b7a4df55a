//! GATT sessions over a Linux L2CAP socket on the fixed ATT channel

use crate::att::{ATT_CID, ATT_MAX_MTU};
use crate::config::WorkflowConfig;
use crate::gap::{BdAddr, Peer};
use crate::gatt::client::{GattClient, Step};
use crate::gatt::disconnect::{Disconnect, DisconnectReason};
use crate::gatt::session::{GattError, GattSession, SessionEvent, SessionProvider};
use crate::gatt::types::{GattCharacteristic, GattService};
use crate::hci::socket::AF_BLUETOOTH;
use log::{debug, info};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

const BTPROTO_L2CAP: i32 = 0;

// Address types understood by the L2CAP socket layer
const BDADDR_LE_PUBLIC: u8 = 0x01;
const BDADDR_LE_RANDOM: u8 = 0x02;

#[repr(C)]
struct SockaddrL2 {
    l2_family: libc::sa_family_t,
    l2_psm: u16,
    l2_bdaddr: [u8; 6],
    l2_cid: u16,
    l2_bdaddr_type: u8,
}

impl SockaddrL2 {
    fn new(address: BdAddr, cid: u16, address_type: u8) -> Self {
        Self {
            l2_family: AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: 0,
            l2_bdaddr: address.bytes,
            l2_cid: cid.to_le(),
            l2_bdaddr_type: address_type,
        }
    }

    fn local() -> Self {
        Self::new(BdAddr::ANY, ATT_CID, BDADDR_LE_PUBLIC)
    }

    fn remote(peer: &Peer) -> Self {
        let address_type = if peer.address_type.is_random() {
            BDADDR_LE_RANDOM
        } else {
            BDADDR_LE_PUBLIC
        };
        Self::new(peer.address, ATT_CID, address_type)
    }
}

/// Outcome of `select()` on a single descriptor
enum FdWait {
    Ready,
    TimedOut,
    Interrupted,
}

fn wait_fd(fd: RawFd, writable: bool, timeout: Option<Duration>) -> io::Result<FdWait> {
    let mut fds: libc::fd_set = unsafe { std::mem::zeroed() };
    unsafe {
        libc::FD_ZERO(&mut fds);
        libc::FD_SET(fd, &mut fds);
    }

    let mut tv = timeout.map(|t| libc::timeval {
        tv_sec: t.as_secs() as libc::time_t,
        tv_usec: t.subsec_micros() as libc::suseconds_t,
    });
    let tv_ptr = tv
        .as_mut()
        .map_or(std::ptr::null_mut(), |tv| tv as *mut libc::timeval);

    let (read_ptr, write_ptr) = if writable {
        (std::ptr::null_mut(), &mut fds as *mut libc::fd_set)
    } else {
        (&mut fds as *mut libc::fd_set, std::ptr::null_mut())
    };

    let result = unsafe { libc::select(fd + 1, read_ptr, write_ptr, std::ptr::null_mut(), tv_ptr) };
    if result < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(FdWait::Interrupted);
        }
        return Err(err);
    }

    if result > 0 && unsafe { libc::FD_ISSET(fd, &fds) } {
        Ok(FdWait::Ready)
    } else {
        Ok(FdWait::TimedOut)
    }
}

fn set_nonblocking(fd: RawFd, nonblocking: bool) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let flags = if nonblocking {
        flags | libc::O_NONBLOCK
    } else {
        flags & !libc::O_NONBLOCK
    };
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn socket_error(fd: RawFd) -> io::Result<()> {
    let mut err: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_ERROR,
            &mut err as *mut _ as *mut libc::c_void,
            &mut len,
        )
    };
    if result < 0 {
        return Err(io::Error::last_os_error());
    }
    if err != 0 {
        return Err(io::Error::from_raw_os_error(err));
    }
    Ok(())
}

/// Owned socket descriptor, closed on drop
#[derive(Debug)]
struct Fd(RawFd);

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

fn connect_socket(peer: &Peer, timeout: Option<Duration>) -> Result<Fd, GattError> {
    let raw = unsafe {
        libc::socket(
            AF_BLUETOOTH,
            libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
            BTPROTO_L2CAP,
        )
    };
    if raw < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let fd = Fd(raw);

    let local = SockaddrL2::local();
    let result = unsafe {
        libc::bind(
            fd.0,
            &local as *const _ as *const libc::sockaddr,
            std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
        )
    };
    if result < 0 {
        return Err(io::Error::last_os_error().into());
    }

    if timeout.is_some() {
        set_nonblocking(fd.0, true)?;
    }

    let remote = SockaddrL2::remote(peer);
    let result = unsafe {
        libc::connect(
            fd.0,
            &remote as *const _ as *const libc::sockaddr,
            std::mem::size_of::<SockaddrL2>() as libc::socklen_t,
        )
    };

    if result < 0 {
        let err = io::Error::last_os_error();
        if timeout.is_none() || err.raw_os_error() != Some(libc::EINPROGRESS) {
            return Err(err.into());
        }

        match wait_fd(fd.0, true, timeout)? {
            FdWait::Ready => socket_error(fd.0)?,
            FdWait::TimedOut => return Err(GattError::ConnectTimeout),
            FdWait::Interrupted => return Err(io::Error::from(io::ErrorKind::Interrupted).into()),
        }
    }

    if timeout.is_some() {
        set_nonblocking(fd.0, false)?;
    }
    Ok(fd)
}

/// A GATT session on a connected L2CAP socket
#[derive(Debug)]
pub struct L2capGattSession {
    fd: Option<Fd>,
    peer: Peer,
    client: GattClient,
    /// Termination waiting to be reported by the pump
    ending: Option<Disconnect>,
    trace_pdus: bool,
}

impl L2capGattSession {
    fn new(fd: Fd, peer: Peer, trace_pdus: bool) -> Self {
        Self {
            fd: Some(fd),
            peer,
            client: GattClient::new(),
            ending: None,
            trace_pdus,
        }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    fn raw_fd(&self) -> Result<RawFd, GattError> {
        if self.ending.is_some() {
            return Err(GattError::NotConnected);
        }
        self.fd.as_ref().map(|fd| fd.0).ok_or(GattError::NotConnected)
    }

    fn send(&mut self, pdu: &[u8]) {
        let Ok(fd) = self.raw_fd() else {
            return;
        };
        if self.trace_pdus {
            debug!("ATT > {}", hex::encode(pdu));
        }
        let written = unsafe { libc::write(fd, pdu.as_ptr() as *const libc::c_void, pdu.len()) };
        if written < 0 {
            let err = io::Error::last_os_error();
            self.end(Disconnect::from_io(DisconnectReason::WriteError, &err));
        }
    }

    /// Stop the link and remember why; the pump reports it once
    fn end(&mut self, disconnect: Disconnect) {
        if let Some(fd) = &self.fd {
            unsafe {
                libc::shutdown(fd.0, libc::SHUT_RDWR);
            }
        }
        if self.ending.is_none() {
            self.ending = Some(disconnect);
        }
    }

    fn apply(&mut self, step: Step) -> Option<SessionEvent> {
        if let Some(pdu) = step.send {
            self.send(&pdu);
        }
        match step.event {
            Some(SessionEvent::Disconnected(disconnect)) => {
                self.end(disconnect);
                self.take_ending()
            }
            other => other,
        }
    }

    fn take_ending(&mut self) -> Option<SessionEvent> {
        let disconnect = self.ending.take()?;
        info!("Disconnected from {}: {}", self.peer, disconnect);
        self.fd = None;
        Some(SessionEvent::Disconnected(disconnect))
    }
}

impl GattSession for L2capGattSession {
    fn start_standard_discovery(&mut self) -> Result<(), GattError> {
        self.raw_fd()?;
        let pdu = self.client.start_discovery()?;
        self.send(&pdu);
        Ok(())
    }

    fn read_request(&mut self, characteristic: &GattCharacteristic) -> Result<(), GattError> {
        self.raw_fd()?;
        let pdu = self.client.start_read(characteristic)?;
        self.send(&pdu);
        Ok(())
    }

    fn close(&mut self) -> Result<(), GattError> {
        if self.fd.is_none() {
            return Err(GattError::NotConnected);
        }
        self.end(Disconnect::new(DisconnectReason::ConnectionClosed));
        Ok(())
    }

    fn read_and_process_next(
        &mut self,
        timeout: Option<Duration>,
    ) -> Result<Option<SessionEvent>, GattError> {
        if self.ending.is_some() {
            return Ok(self.take_ending());
        }
        let fd = self.raw_fd()?;

        match wait_fd(fd, false, timeout)? {
            FdWait::Ready => {}
            FdWait::TimedOut | FdWait::Interrupted => return Ok(None),
        }

        let mut buffer = [0u8; ATT_MAX_MTU as usize];
        let received =
            unsafe { libc::read(fd, buffer.as_mut_ptr() as *mut libc::c_void, buffer.len()) };

        if received < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            self.end(Disconnect::from_io(DisconnectReason::ReadError, &err));
            return Ok(self.take_ending());
        }
        if received == 0 {
            self.end(Disconnect::new(DisconnectReason::ConnectionClosed));
            return Ok(self.take_ending());
        }

        let pdu = &buffer[..received as usize];
        if self.trace_pdus {
            debug!("ATT < {}", hex::encode(pdu));
        }
        let step = self.client.handle_pdu(pdu);
        let event = self.apply(step);
        if event.is_none() && self.ending.is_some() {
            return Ok(self.take_ending());
        }
        Ok(event)
    }

    fn services(&self) -> &[GattService] {
        self.client.services()
    }
}

impl AsRawFd for L2capGattSession {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_ref().map_or(-1, |fd| fd.0)
    }
}

/// Opens [`L2capGattSession`]s
#[derive(Debug, Clone, Default)]
pub struct L2capSessionProvider {
    trace_pdus: bool,
}

impl L2capSessionProvider {
    pub fn new(config: &WorkflowConfig) -> Self {
        Self {
            trace_pdus: config.trace_pdus,
        }
    }
}

impl SessionProvider for L2capSessionProvider {
    type Session = L2capGattSession;

    fn connect_blocking(
        &mut self,
        peer: &Peer,
        timeout: Option<Duration>,
    ) -> Result<L2capGattSession, GattError> {
        debug!("Connecting to {} over LE", peer);
        let fd = connect_socket(peer, timeout)?;
        info!("Connected to {}", peer);
        Ok(L2capGattSession::new(fd, *peer, self.trace_pdus))
    }
}
