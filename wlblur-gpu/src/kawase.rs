//! Dual Kawase blur: downsample pyramid, upsample pyramid, finish pass.
//!
//! Mirrors `wlblur_kawase_blur` in `libwlblur/src/blur_kawase.c` exactly:
//! per-pass radius is `params.radius + pass_index`, half-pixel vectors are
//! derived from the *target* render target's dimensions (not the source's),
//! and the finish pass is a separate shader invocation after the pyramid
//! collapses back to full resolution.

use glow::HasContext;
use wlblur_params::BlurParams;

use crate::context::EglContext;
use crate::error::{Error, Result};
use crate::pool::RenderTargetPool;
use crate::shaders::{
    ShaderProgram, DOWNSAMPLE_FRAGMENT_SHADER_SRC, FINISH_FRAGMENT_SHADER_SRC,
    UPSAMPLE_FRAGMENT_SHADER_SRC, VERTEX_SHADER_SRC,
};

/// Fullscreen quad vertices: two triangles (as a strip) covering clip space
/// `[-1, 1]`, matching `QUAD_VERTICES` in the reference.
const QUAD_VERTICES: [f32; 8] = [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0];

/// Owns the three shader programs, the fullscreen quad geometry, and a
/// render target pool; applies Dual Kawase blur to an already-imported GL
/// texture.
pub struct KawaseRenderer {
    downsample: ShaderProgram,
    upsample: ShaderProgram,
    finish: ShaderProgram,
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    pub pool: RenderTargetPool,
}

impl KawaseRenderer {
    pub fn create(ctx: &EglContext) -> Result<Self> {
        ctx.make_current()?;
        let gl = &ctx.gl;

        let downsample =
            ShaderProgram::compile(gl, VERTEX_SHADER_SRC, DOWNSAMPLE_FRAGMENT_SHADER_SRC)?;
        let upsample = match ShaderProgram::compile(gl, VERTEX_SHADER_SRC, UPSAMPLE_FRAGMENT_SHADER_SRC)
        {
            Ok(s) => s,
            Err(e) => {
                downsample.destroy(gl);
                return Err(e);
            }
        };
        let finish = match ShaderProgram::compile(gl, VERTEX_SHADER_SRC, FINISH_FRAGMENT_SHADER_SRC)
        {
            Ok(s) => s,
            Err(e) => {
                downsample.destroy(gl);
                upsample.destroy(gl);
                return Err(e);
            }
        };

        let (vao, vbo) = unsafe { create_fullscreen_quad(gl) }?;

        Ok(KawaseRenderer {
            downsample,
            upsample,
            finish,
            vao,
            vbo,
            pool: RenderTargetPool::new(),
        })
    }

    fn draw_quad(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);
        }
    }

    /// Applies Dual Kawase blur to `input_texture` (dimensions
    /// `width`x`height`) and returns the render target index holding the
    /// result. The target remains marked in-use in `self.pool`; the caller
    /// releases it after export.
    pub fn blur(
        &mut self,
        ctx: &EglContext,
        input_texture: glow::NativeTexture,
        width: i32,
        height: i32,
        params: &BlurParams,
    ) -> Result<usize> {
        if width <= 0 || height <= 0 {
            return Err(Error::InvalidParams(format!(
                "invalid texture dimensions {width}x{height}"
            )));
        }
        if !params.validate() {
            return Err(Error::InvalidParams("blur parameters out of range".into()));
        }

        let gl = &ctx.gl;
        let num_passes = params.passes as i32;

        let mut down_targets = Vec::with_capacity(num_passes as usize);
        for i in 0..num_passes {
            let w = (width >> (i + 1)).max(1);
            let h = (height >> (i + 1)).max(1);
            match self.pool.acquire(gl, w, h) {
                Ok(idx) => down_targets.push(idx),
                Err(e) => {
                    for idx in down_targets {
                        self.pool.release(idx);
                    }
                    return Err(e);
                }
            }
        }

        let mut current_tex = input_texture;

        // Downsample pyramid: halve resolution each pass, radius grows with
        // pass index.
        self.downsample.use_program(gl);
        for (pass, &target_idx) in down_targets.iter().enumerate() {
            let target = self.pool.get(target_idx);
            let (tw, th) = (target.width, target.height);
            unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target.fbo));
                gl.viewport(0, 0, tw, th);
                if let Some(loc) = &self.downsample.u_tex {
                    gl.uniform_1_i32(Some(loc), 0);
                }
                if let Some(loc) = &self.downsample.u_halfpixel {
                    gl.uniform_2_f32(Some(loc), 0.5 / tw as f32, 0.5 / th as f32);
                }
                if let Some(loc) = &self.downsample.u_radius {
                    gl.uniform_1_f32(Some(loc), params.radius + pass as f32);
                }
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, Some(current_tex));
            }
            self.draw_quad(gl);
            current_tex = target.texture;
        }

        // Upsample pyramid: collapse back toward full resolution. The last
        // pass (pass == 0) renders to a fresh full-size target rather than
        // reusing a downsample-pass target.
        self.upsample.use_program(gl);
        for pass in (0..num_passes).rev() {
            let target_idx = if pass == 0 {
                match self.pool.acquire(gl, width, height) {
                    Ok(idx) => idx,
                    Err(e) => {
                        for idx in down_targets {
                            self.pool.release(idx);
                        }
                        return Err(e);
                    }
                }
            } else {
                down_targets[(pass - 1) as usize]
            };

            let target = self.pool.get(target_idx);
            let (tw, th) = (target.width, target.height);
            unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(target.fbo));
                gl.viewport(0, 0, tw, th);
                if let Some(loc) = &self.upsample.u_tex {
                    gl.uniform_1_i32(Some(loc), 0);
                }
                if let Some(loc) = &self.upsample.u_halfpixel {
                    gl.uniform_2_f32(Some(loc), 0.5 / tw as f32, 0.5 / th as f32);
                }
                if let Some(loc) = &self.upsample.u_radius {
                    gl.uniform_1_f32(Some(loc), params.radius + pass as f32);
                }
                gl.active_texture(glow::TEXTURE0);
                gl.bind_texture(glow::TEXTURE_2D, Some(current_tex));
            }
            self.draw_quad(gl);
            current_tex = target.texture;
        }

        for idx in &down_targets {
            self.pool.release(*idx);
        }

        // Finish pass: brightness/contrast/saturation/noise, full resolution.
        let final_idx = self.pool.acquire(gl, width, height)?;
        let final_target = self.pool.get(final_idx);
        self.finish.use_program(gl);
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(final_target.fbo));
            gl.viewport(0, 0, width, height);
            if let Some(loc) = &self.finish.u_tex {
                gl.uniform_1_i32(Some(loc), 0);
            }
            if let Some(loc) = &self.finish.u_brightness {
                gl.uniform_1_f32(Some(loc), params.brightness);
            }
            if let Some(loc) = &self.finish.u_contrast {
                gl.uniform_1_f32(Some(loc), params.contrast);
            }
            if let Some(loc) = &self.finish.u_saturation {
                gl.uniform_1_f32(Some(loc), params.saturation);
            }
            if let Some(loc) = &self.finish.u_noise {
                gl.uniform_1_f32(Some(loc), params.noise);
            }
            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(current_tex));
        }
        self.draw_quad(gl);
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };

        if let Err(e) = ctx.check_gl_error() {
            self.pool.release(final_idx);
            return Err(Error::RenderFailed(e));
        }

        Ok(final_idx)
    }

    pub fn destroy(self, gl: &glow::Context) {
        self.downsample.destroy(gl);
        self.upsample.destroy(gl);
        self.finish.destroy(gl);
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

unsafe fn create_fullscreen_quad(
    gl: &glow::Context,
) -> Result<(glow::NativeVertexArray, glow::NativeBuffer)> {
    let vao = gl.create_vertex_array().map_err(Error::RenderFailed)?;
    gl.bind_vertex_array(Some(vao));

    let vbo = gl.create_buffer().map_err(Error::RenderFailed)?;
    gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
    let bytes = bytemuck::cast_slice(&QUAD_VERTICES);
    gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::STATIC_DRAW);

    gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 2 * std::mem::size_of::<f32>() as i32, 0);
    gl.enable_vertex_attrib_array(0);

    gl.bind_buffer(glow::ARRAY_BUFFER, None);
    gl.bind_vertex_array(None);

    Ok((vao, vbo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_radius_grows_by_pass_index() {
        let base_radius = 5.0_f32;
        let per_pass: Vec<f32> = (0..3).map(|pass| base_radius + pass as f32).collect();
        assert_eq!(per_pass, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn downsample_dimensions_halve_and_floor_at_one() {
        let (width, height) = (5, 3);
        let dims: Vec<(i32, i32)> = (0..3)
            .map(|i| ((width >> (i + 1)).max(1), (height >> (i + 1)).max(1)))
            .collect();
        assert_eq!(dims, vec![(2, 1), (1, 1), (1, 1)]);
    }
}
