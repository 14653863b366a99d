//! Client connection table.
//!
//! Mirrors `struct client_connection` and `client_register`/
//! `client_unregister`/`client_lookup` in the reference `ipc_protocol.c`:
//! one entry per accepted socket, keyed by fd, with a monotonic client id
//! assigned at registration.

use std::collections::HashMap;
use std::os::fd::RawFd;

#[derive(Debug, Clone)]
pub struct ClientConnection {
    pub fd: RawFd,
    pub client_id: u32,
}

/// Tracks accepted connections by fd and hands out unique client ids.
#[derive(Debug, Default)]
pub struct ClientTable {
    by_fd: HashMap<RawFd, ClientConnection>,
    next_id: u32,
}

impl ClientTable {
    pub fn new() -> Self {
        ClientTable {
            by_fd: HashMap::new(),
            next_id: 1,
        }
    }

    /// Registers a newly accepted connection, returning its assigned
    /// client id. Ids start at 1 and increase monotonically, matching the
    /// reference's "0 means error" convention.
    pub fn register(&mut self, fd: RawFd) -> u32 {
        let client_id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        self.by_fd.insert(
            fd,
            ClientConnection {
                fd,
                client_id,
            },
        );
        client_id
    }

    /// Removes the connection for `fd`, returning its client id if it was
    /// registered.
    pub fn unregister(&mut self, fd: RawFd) -> Option<u32> {
        self.by_fd.remove(&fd).map(|c| c.client_id)
    }

    pub fn lookup(&self, fd: RawFd) -> Option<&ClientConnection> {
        self.by_fd.get(&fd)
    }

    pub fn len(&self) -> usize {
        self.by_fd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fd.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_increasing_ids() {
        let mut table = ClientTable::new();
        let a = table.register(10);
        let b = table.register(11);
        assert_eq!(a, 1);
        assert_eq!(b, 2);
    }

    #[test]
    fn lookup_finds_registered_fd() {
        let mut table = ClientTable::new();
        let id = table.register(5);
        assert_eq!(table.lookup(5).unwrap().client_id, id);
    }

    #[test]
    fn unregister_removes_entry_and_returns_its_id() {
        let mut table = ClientTable::new();
        let id = table.register(5);
        assert_eq!(table.unregister(5), Some(id));
        assert!(table.lookup(5).is_none());
        assert_eq!(table.unregister(5), None);
    }
}
