//! SIGINT handling
//!
//! The handler is installed without `SA_RESTART` so a blocking `select()` in
//! the scan loop returns with `EINTR` as soon as the signal arrives.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

pub static INTERRUPTED: AtomicBool = AtomicBool::new(false);

const MESSAGE: &[u8] = b"\nInterrupted!\n";

extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            MESSAGE.as_ptr() as *const libc::c_void,
            MESSAGE.len(),
        );
    }
}

/// Install the SIGINT handler and return the flag it sets
pub fn install() -> io::Result<&'static AtomicBool> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);

        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(&INTERRUPTED)
}
