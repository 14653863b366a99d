//! Epoll-based connection multiplexer.
//!
//! Mirrors `run_event_loop`/`handle_new_connection` in the reference
//! `wlblurd/src/main.c`: one `epoll` instance, the listening socket and
//! every accepted client registered for `EPOLLIN`, a 1000ms wait timeout so
//! the loop can periodically poll [`crate::reload::pending`], and
//! `EINTR` tolerated as a transient wakeup rather than an error.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::PathBuf;

use bytemuck::Zeroable;
use nix::errno::Errno;
use nix::sys::epoll::{Epoll, EpollCreateFlags, EpollEvent, EpollFlags};

use wlblur_gpu::BlurEngine;
use wlblur_protocol::WireRequest;

use crate::client::ClientTable;
use crate::dispatch::Dispatcher;
use crate::node::NodeRegistry;

const MAX_EVENTS: usize = 32;
const WAIT_TIMEOUT_MS: u16 = 1000;
/// Hard cap on concurrently accepted clients; beyond it, `accept_connection`
/// refuses the new connection by dropping it immediately.
const MAX_CONNECTIONS: usize = 64;

/// Owns every piece of mutable daemon state the event loop touches across
/// iterations.
pub struct Server {
    listener: UnixListener,
    epoll: Epoll,
    connections: std::collections::HashMap<RawFd, UnixStream>,
    pub clients: ClientTable,
    pub nodes: NodeRegistry,
    config_path: Option<PathBuf>,
}

impl Server {
    pub fn bind(
        listener: UnixListener,
        max_nodes_per_client: u32,
        config_path: Option<PathBuf>,
    ) -> nix::Result<Self> {
        let epoll = Epoll::new(EpollCreateFlags::empty())?;
        epoll.add(
            &listener,
            EpollEvent::new(EpollFlags::EPOLLIN, listener.as_raw_fd() as u64),
        )?;
        Ok(Server {
            listener,
            epoll,
            connections: std::collections::HashMap::new(),
            clients: ClientTable::new(),
            nodes: NodeRegistry::new(max_nodes_per_client),
            config_path,
        })
    }

    /// Reloads configuration if [`crate::reload::pending`] was set since
    /// the last check (by the `SIGUSR1` handler), applying whatever of it
    /// the running daemon can hot-swap (currently: the per-client node
    /// quota). On load or validation failure the previous configuration —
    /// and thus the previous quota — is left untouched.
    fn poll_reload(&mut self) {
        if !crate::reload::pending() {
            return;
        }
        if let Some(new_config) = crate::reload::handle_config_reload(self.config_path.as_deref())
        {
            self.nodes.set_max_nodes_per_client(new_config.max_nodes_per_client);
        }
    }

    fn accept_connection(&mut self) {
        let (stream, _) = match self.listener.accept() {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("accept failed: {e}");
                return;
            }
        };

        if self.clients.len() >= MAX_CONNECTIONS {
            log::warn!(
                "rejecting connection: at capacity ({MAX_CONNECTIONS} concurrent clients)"
            );
            drop(stream);
            return;
        }

        let fd = stream.as_raw_fd();
        log::info!("new client connected: fd={fd}");

        if let Err(e) = self
            .epoll
            .add(&stream, EpollEvent::new(EpollFlags::EPOLLIN, fd as u64))
        {
            log::warn!("epoll_ctl(ADD) failed for fd={fd}: {e}");
            return;
        }

        self.clients.register(fd);
        self.connections.insert(fd, stream);
    }

    fn disconnect(&mut self, fd: RawFd) {
        log::info!("client fd={fd} disconnected");
        if let Some(stream) = self.connections.remove(&fd) {
            let _ = self.epoll.delete(&stream);
        }
        if let Some(client_id) = self.clients.unregister(fd) {
            let removed = self.nodes.destroy_client_nodes(client_id);
            if removed > 0 {
                log::info!("released {removed} node(s) owned by client {client_id}");
            }
        }
    }

    fn service_client(&mut self, fd: RawFd, engine: &mut BlurEngine) {
        let mut buf = vec![0u8; std::mem::size_of::<WireRequest>()];
        let raw_fd = match self.connections.get(&fd) {
            Some(stream) => stream.as_raw_fd(),
            None => return,
        };

        let (n, input_fd) = match wlblur_protocol::recv_with_fd(raw_fd, &mut buf) {
            Ok(pair) => pair,
            Err(e) => {
                log::warn!("recv_with_fd failed for fd={fd}: {e}");
                self.disconnect(fd);
                return;
            }
        };

        if n == 0 {
            self.disconnect(fd);
            return;
        }
        if n != buf.len() {
            log::warn!("invalid request size from fd={fd}: {n} (expected {})", buf.len());
            return;
        }

        let req: WireRequest = *bytemuck::from_bytes(&buf);

        let mut dispatcher = Dispatcher {
            nodes: &mut self.nodes,
            clients: &self.clients,
            engine,
        };
        let result = dispatcher.handle(fd, &req, input_fd);

        let response_bytes = bytemuck::bytes_of(&result.response);
        let output_raw: Option<RawFd> = result.output_fd.as_ref().map(AsRawFd::as_raw_fd);
        if let Err(e) = wlblur_protocol::send_with_fd(raw_fd, response_bytes, output_raw) {
            log::warn!("send_with_fd failed for fd={fd}: {e}");
        }
        drop(result.output_fd);
    }

    /// Runs the event loop until `running` is cleared (e.g. by a SIGTERM/
    /// SIGINT handler) or an unrecoverable `epoll_wait` error occurs.
    pub fn run(
        &mut self,
        engine: &mut BlurEngine,
        running: &std::sync::atomic::AtomicBool,
    ) -> nix::Result<()> {
        let mut events = [EpollEvent::empty(); MAX_EVENTS];
        log::info!("event loop started");

        while running.load(std::sync::atomic::Ordering::SeqCst) {
            let n = match self.epoll.wait(&mut events, WAIT_TIMEOUT_MS) {
                Ok(n) => n,
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    log::error!("epoll_wait failed: {e}");
                    return Err(e);
                }
            };

            let server_fd = self.listener.as_raw_fd();
            for event in &events[..n] {
                let fd = event.data() as RawFd;
                if fd == server_fd {
                    self.accept_connection();
                    continue;
                }

                let flags = event.events();
                if flags.contains(EpollFlags::EPOLLERR) || flags.contains(EpollFlags::EPOLLHUP) {
                    self.disconnect(fd);
                } else if flags.contains(EpollFlags::EPOLLIN) {
                    self.service_client(fd, engine);
                }
            }

            self.poll_reload();
        }

        log::info!("event loop stopped");
        Ok(())
    }
}

#[allow(dead_code)]
fn zeroed_request() -> WireRequest {
    WireRequest::zeroed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_buffer_size_matches_wire_request() {
        assert_eq!(std::mem::size_of::<WireRequest>() % 4, 0);
        let req = zeroed_request();
        let op = req.op;
        assert_eq!(op, 0);
    }

    #[test]
    fn accept_refuses_connections_past_the_concurrency_cap() {
        let dir = std::env::temp_dir().join(format!("wlblurd-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("cap.sock");
        let _ = std::fs::remove_file(&path);
        let listener = UnixListener::bind(&path).unwrap();
        let mut server = Server::bind(listener, 100, None).unwrap();

        // Hold every client connection open so the server's side never sees
        // a hangup while we exercise the cap.
        let mut peers = Vec::new();
        for _ in 0..MAX_CONNECTIONS + 5 {
            peers.push(UnixStream::connect(&path).unwrap());
            server.accept_connection();
        }

        assert_eq!(server.clients.len(), MAX_CONNECTIONS);
        let _ = std::fs::remove_file(&path);
    }
}
