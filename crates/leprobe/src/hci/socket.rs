//! HCI Socket implementation for Bluetooth communication
//!
//! This module provides a wrapper around the raw HCI socket interface,
//! allowing for communication with Bluetooth controllers.

use crate::error::HciError;
use crate::hci::constants::*;
use crate::hci::packet::{HciCommand, HciEvent};
use log::{debug, trace};
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

// Bluetooth socket constants
pub(crate) const AF_BLUETOOTH: i32 = 31;
const BTPROTO_HCI: i32 = 1;
const HCI_CHANNEL_RAW: u16 = 0;
const SOL_HCI: i32 = 0;
const HCI_FILTER: i32 = 2;

/// Outcome of waiting for the socket to become readable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// At least one packet can be read without blocking
    Ready,
    /// The timeout expired with nothing to read
    TimedOut,
    /// A signal arrived during the wait
    Interrupted,
}

/// Represents an HCI socket
#[derive(Debug)]
pub struct HciSocket {
    fd: RawFd,
}

#[repr(C)]
struct SockaddrHci {
    hci_family: libc::sa_family_t,
    hci_dev: u16,
    hci_channel: u16,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
struct HciFilter {
    type_mask: u32,
    event_mask: [u32; 2],
    opcode: u16,
}

impl HciFilter {
    fn set_ptype(&mut self, ptype: u8) {
        self.type_mask |= 1 << (ptype & 31);
    }

    fn set_event(&mut self, event: u8) {
        self.event_mask[(event >> 5) as usize] |= 1 << (event & 31);
    }
}

impl HciSocket {
    /// Opens a raw HCI socket bound to the given device (0 for `hci0`)
    pub fn open(dev_id: u16) -> Result<Self, HciError> {
        let fd = unsafe { libc::socket(AF_BLUETOOTH, libc::SOCK_RAW | libc::SOCK_CLOEXEC, BTPROTO_HCI) };

        if fd < 0 {
            return Err(HciError::SocketError(std::io::Error::last_os_error()));
        }

        let addr = SockaddrHci {
            hci_family: AF_BLUETOOTH as libc::sa_family_t,
            hci_dev: dev_id,
            hci_channel: HCI_CHANNEL_RAW,
        };

        let result = unsafe {
            libc::bind(
                fd,
                &addr as *const _ as *const libc::sockaddr,
                std::mem::size_of::<SockaddrHci>() as libc::socklen_t,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(HciError::BindError(err));
        }

        debug!("Opened HCI socket on hci{}", dev_id);
        Ok(HciSocket { fd })
    }

    /// Restrict delivery to the events the scanner consumes
    pub fn set_event_filter(&self, events: &[u8]) -> Result<(), HciError> {
        let mut filter = HciFilter::default();
        filter.set_ptype(HCI_EVENT_PKT);
        for &event in events {
            filter.set_event(event);
        }

        let result = unsafe {
            libc::setsockopt(
                self.fd,
                SOL_HCI,
                HCI_FILTER,
                &filter as *const _ as *const libc::c_void,
                std::mem::size_of::<HciFilter>() as libc::socklen_t,
            )
        };

        if result < 0 {
            return Err(HciError::SockOptError(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    /// Wait until the socket is readable or the timeout expires
    pub fn wait_readable(&self, timeout: Duration) -> Result<Readiness, HciError> {
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(self.fd, &mut read_fds);
        }

        let mut timeout_val = libc::timeval {
            tv_sec: timeout.as_secs() as libc::time_t,
            tv_usec: timeout.subsec_micros() as libc::suseconds_t,
        };

        let result = unsafe {
            libc::select(
                self.fd + 1,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                &mut timeout_val,
            )
        };

        if result < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(Readiness::Interrupted);
            }
            return Err(HciError::ReceiveError(err));
        }

        if result > 0 && unsafe { libc::FD_ISSET(self.fd, &read_fds) } {
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::TimedOut)
        }
    }

    /// Read one HCI event from the socket, blocking until it arrives
    pub fn read_event(&self) -> Result<HciEvent, HciError> {
        let mut buffer = [0u8; HCI_MAX_EVENT_SIZE];

        let bytes_read = unsafe {
            libc::read(
                self.fd,
                buffer.as_mut_ptr() as *mut libc::c_void,
                buffer.len(),
            )
        };

        if bytes_read < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Err(HciError::Interrupted);
            }
            return Err(HciError::ReceiveError(err));
        }

        let bytes_read = bytes_read as usize;
        if bytes_read < 3 || buffer[0] != HCI_EVENT_PKT {
            return Err(HciError::InvalidPacketFormat);
        }

        let event = HciEvent::parse(&buffer[1..bytes_read]).ok_or(HciError::InvalidPacketFormat)?;
        trace!("HCI event 0x{:02x}: {}", event.event_code, hex::encode(&event.parameters));
        Ok(event)
    }

    /// Read an HCI event, giving up once the timeout expires
    pub fn read_event_timeout(&self, timeout: Duration) -> Result<HciEvent, HciError> {
        match self.wait_readable(timeout)? {
            Readiness::Ready => self.read_event(),
            Readiness::TimedOut => Err(HciError::Timeout),
            Readiness::Interrupted => Err(HciError::Interrupted),
        }
    }

    /// Sends an HCI command to the controller
    pub fn send_command(&self, command: &HciCommand) -> Result<(), HciError> {
        let packet = command.to_packet();
        trace!("HCI command: {}", hex::encode(&packet));
        match unsafe {
            libc::write(
                self.fd,
                packet.as_ptr() as *const libc::c_void,
                packet.len(),
            )
        } {
            -1 => Err(HciError::SendError(std::io::Error::last_os_error())),
            _ => Ok(()),
        }
    }

    /// Sends a command and waits for its Command Complete event.
    ///
    /// Unrelated events read while waiting (advertising reports from an
    /// earlier scan, for instance) are discarded.
    pub fn send_command_sync(
        &self,
        command: &HciCommand,
        timeout: Duration,
    ) -> Result<HciEvent, HciError> {
        self.send_command(command)?;

        let opcode = command.opcode();
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HciError::Timeout);
            }

            let event = self.read_event_timeout(remaining)?;
            if event.command_opcode() != Some(opcode) {
                continue;
            }

            let status = event.get_status();
            if status != 0 {
                return Err(HciError::CommandFailed { opcode, status });
            }
            if event.event_code == EVT_CMD_COMPLETE {
                return Ok(event);
            }
        }
    }
}

impl AsRawFd for HciSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for HciSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}
