//! SCM_RIGHTS ancillary-data helpers for passing one file descriptor
//! alongside a fixed-size message on a Unix stream socket.
//!
//! Mirrors `recv_with_fd`/`send_with_fd` in the reference
//! `wlblurd/src/ipc_protocol.c`, built on `nix` rather than raw libc calls —
//! the idiomatic substitute the corpus reaches for when a crate covers a
//! concern the teacher's own code doesn't touch directly.

use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::sys::socket::{recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags};
use nix::sys::uio::IoSlice;

/// Receives exactly `buf.len()` bytes into `buf`, along with at most one
/// passed file descriptor.
///
/// Returns the number of bytes actually read (may be less than `buf.len()`
/// on a short read or EOF) and the received descriptor, if any.
pub fn recv_with_fd(sock: RawFd, buf: &mut [u8]) -> Result<(usize, Option<OwnedFd>), Errno> {
    let mut iov = [std::io::IoSliceMut::new(buf)];
    let mut cmsg_space = nix::cmsg_space!(RawFd);

    let msg = recvmsg::<()>(sock, &mut iov, Some(&mut cmsg_space), MsgFlags::empty())?;

    let mut received_fd: Option<OwnedFd> = None;
    for cmsg in msg.cmsgs()? {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&raw) = fds.first() {
                // SAFETY: the kernel just handed us ownership of this descriptor.
                received_fd = Some(unsafe { OwnedFd::from_raw_fd(raw) });
            }
            for extra in fds.iter().skip(1) {
                log::warn!("recv_with_fd: dropping unexpected extra fd {extra}");
                let _ = nix::unistd::close(*extra);
            }
        }
    }

    Ok((msg.bytes, received_fd))
}

/// Sends `buf` in full, optionally attaching `fd` as ancillary `SCM_RIGHTS`
/// data.
pub fn send_with_fd(sock: RawFd, buf: &[u8], fd: Option<RawFd>) -> Result<usize, Errno> {
    let iov = [IoSlice::new(buf)];
    match fd {
        Some(fd) => {
            let fds = [fd];
            let cmsg = [ControlMessage::ScmRights(&fds)];
            sendmsg::<()>(sock, &iov, &cmsg, MsgFlags::empty(), None)
        }
        None => sendmsg::<()>(sock, &iov, &[], MsgFlags::empty(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
    use nix::unistd::pipe;
    use std::os::fd::AsRawFd;

    #[test]
    fn message_without_fd_roundtrips() {
        let (a, b) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .unwrap();

        let payload = b"hello wlblur";
        send_with_fd(a.as_raw_fd(), payload, None).unwrap();

        let mut buf = [0u8; 32];
        let (n, fd) = recv_with_fd(b.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], payload);
        assert!(fd.is_none());
    }

    #[test]
    fn message_with_fd_carries_a_working_descriptor() {
        let (a, b) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::empty(),
        )
        .unwrap();

        let (read_end, write_end) = pipe().unwrap();
        let payload = b"fd inbound";
        send_with_fd(a.as_raw_fd(), payload, Some(read_end.as_raw_fd())).unwrap();
        // The sender keeps its own copy of read_end; it closes when dropped.
        drop(read_end);

        let mut buf = [0u8; 32];
        let (n, fd) = recv_with_fd(b.as_raw_fd(), &mut buf).unwrap();
        assert_eq!(&buf[..n], payload);
        assert!(fd.is_some());
        drop(fd);
        drop(write_end);
    }
}
