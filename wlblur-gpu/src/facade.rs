//! Blur service façade: the single entry point `wlblurd` calls per
//! `RENDER_BLUR` request.
//!
//! Mirrors the body of `handle_render_blur` in the reference
//! `wlblurd/src/ipc_protocol.c` minus IPC framing (that belongs to
//! `wlblur-protocol`/`wlblurd`): import, blur, export, delete the
//! intermediate input texture, record the last error on failure.

use glow::HasContext;
use wlblur_params::BlurParams;

use crate::context::EglContext;
use crate::dmabuf::{self, DmabufAttribs};
use crate::error::{set_last_error, Error, Result};
use crate::kawase::KawaseRenderer;

/// Owns the EGL context and the Kawase renderer built on top of it; the
/// single GPU-touching object the daemon keeps alive for its lifetime.
pub struct BlurEngine {
    ctx: EglContext,
    renderer: KawaseRenderer,
}

impl BlurEngine {
    pub fn create() -> Result<Self> {
        let ctx = EglContext::create()?;
        let renderer = KawaseRenderer::create(&ctx)?;
        Ok(BlurEngine { ctx, renderer })
    }

    /// Imports `input`, runs the configured blur, exports the result, and
    /// frees the imported input texture. On any failure the error is also
    /// stashed via [`crate::error::take_last_error`].
    pub fn apply_blur(&mut self, input: DmabufAttribs, params: &BlurParams) -> Result<DmabufAttribs> {
        self.run(input, params).map_err(|e| set_last_error(e))
    }

    fn run(&mut self, input: DmabufAttribs, params: &BlurParams) -> Result<DmabufAttribs> {
        let width = input.width;
        let height = input.height;

        let input_texture = dmabuf::import(&self.ctx, &input)?;

        let result_idx = match self.renderer.blur(&self.ctx, input_texture, width, height, params)
        {
            Ok(idx) => idx,
            Err(e) => {
                unsafe { self.ctx.gl.delete_texture(input_texture) };
                return Err(e);
            }
        };

        unsafe { self.ctx.gl.delete_texture(input_texture) };

        let result_texture = self.renderer.pool.get(result_idx).texture;
        let exported = dmabuf::export(&self.ctx, result_texture, width, height);
        self.renderer.pool.release(result_idx);

        exported
    }
}

#[cfg(test)]
mod tests {
    use crate::error::{set_last_error, take_last_error, Error};

    #[test]
    fn last_error_is_recorded_and_cleared_on_take() {
        assert!(take_last_error().is_none());
        set_last_error(Error::InvalidNode(7));
        let err = take_last_error();
        assert!(matches!(err, Some(Error::InvalidNode(7))));
        assert!(take_last_error().is_none());
    }
}
