//! GPU-facing half of wlblur: EGL context management, DMA-BUF import/export,
//! render-target pooling, shader compilation, the Dual Kawase algorithm, and
//! the blur service façade that ties them together.

pub mod context;
pub mod dmabuf;
pub mod error;
pub mod facade;
pub mod kawase;
pub mod pool;
pub mod shaders;

pub use context::EglContext;
pub use dmabuf::{BufferFd, DmabufAttribs};
pub use error::{Error, Result};
pub use facade::BlurEngine;
pub use kawase::KawaseRenderer;
pub use pool::RenderTargetPool;
