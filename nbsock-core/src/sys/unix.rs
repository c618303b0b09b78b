//! Readiness probe via `poll(2)`.

#![allow(unsafe_code)]

use std::os::unix::io::RawFd;

pub(super) fn poll_readable(fd: RawFd) -> bool {
    let mut pollfd = libc::pollfd { fd, events: libc::POLLIN, revents: 0 };

    // SAFETY: pollfd points to one valid, initialized descriptor record for
    // the duration of the call, and nfds matches.
    let ready = unsafe { libc::poll(&mut pollfd, 1, 0) };

    ready > 0 && pollfd.revents & libc::POLLIN != 0
}
