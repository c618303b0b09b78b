//! Readiness probe via `WSAPoll`.

#![allow(unsafe_code)]

use std::os::windows::io::RawSocket;

use windows_sys::Win32::Networking::WinSock::{WSAPoll, POLLRDNORM, WSAPOLLFD};

pub(super) fn poll_readable(socket: RawSocket) -> bool {
    let mut pollfd = WSAPOLLFD {
        fd: socket as usize,
        events: POLLRDNORM as i16,
        revents: 0,
    };

    // SAFETY: pollfd points to one valid, initialized descriptor record for
    // the duration of the call, and the count matches.
    let ready = unsafe { WSAPoll(&mut pollfd, 1, 0) };

    ready > 0 && pollfd.revents as u16 & POLLRDNORM as u16 != 0
}
