//! Error taxonomy for the blur engine.
//!
//! Variants mirror `enum wlblur_status` in the reference
//! `wlblurd/include/protocol.h`, expressed as a `thiserror` enum instead of
//! the C taxonomy's sentinel-return-plus-global-errno pattern.

use std::cell::Cell;

/// Failure modes the blur engine can report. Each maps to exactly one wire
/// status code via [`Error::status`].
#[derive(Debug, thiserror::Error, Clone)]
pub enum Error {
    #[error("blur node {0} not found")]
    InvalidNode(u32),

    #[error("invalid blur parameters: {0}")]
    InvalidParams(String),

    #[error("DMA-BUF import failed: {0}")]
    DmabufImportFailed(String),

    #[error("DMA-BUF export failed: {0}")]
    DmabufExportFailed(String),

    #[error("render failed: {0}")]
    RenderFailed(String),

    #[error("out of memory: {0}")]
    OutOfMemory(String),
}

impl Error {
    /// The wire status code this error corresponds to.
    pub fn status(&self) -> wlblur_protocol::Status {
        use wlblur_protocol::Status;
        match self {
            Error::InvalidNode(_) => Status::InvalidNode,
            Error::InvalidParams(_) => Status::InvalidParams,
            Error::DmabufImportFailed(_) => Status::DmabufImportFailed,
            Error::DmabufExportFailed(_) => Status::DmabufExportFailed,
            Error::RenderFailed(_) => Status::RenderFailed,
            Error::OutOfMemory(_) => Status::OutOfMemory,
        }
    }
}

thread_local! {
    /// Last error observed by this thread's engine calls, mirroring the
    /// reference's process-wide last-error slot (`wlblur_get_last_error`).
    /// The daemon is single-threaded in practice; this is a `thread_local`
    /// rather than a global `static` so the type signature documents the
    /// constraint instead of silently assuming it.
    static LAST_ERROR: Cell<Option<Error>> = const { Cell::new(None) };
}

/// Records `err` as the last error observed on this thread, then returns it
/// unchanged — call as `return Err(set_last_error(e));` at a fallible
/// boundary.
pub fn set_last_error(err: Error) -> Error {
    LAST_ERROR.with(|cell| cell.set(Some(err.clone())));
    err
}

/// Returns (and clears) the last recorded error, if any.
pub fn take_last_error() -> Option<Error> {
    LAST_ERROR.with(|cell| cell.take())
}

pub type Result<T> = std::result::Result<T, Error>;
