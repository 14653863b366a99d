//! IPC wire protocol: fixed-layout request/response records plus the
//! SCM_RIGHTS send/recv primitives used to shuttle a DMA-BUF descriptor
//! alongside each one.

mod io;
mod wire;

pub use io::{recv_with_fd, send_with_fd};
pub use wire::{Opcode, Status, WireBlurParams, WireRequest, WireResponse, PROTOCOL_VERSION};
