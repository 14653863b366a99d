//! DMA-BUF buffer descriptors and the EGL import/export bridge.
//!
//! Field order and the EGL attribute-list construction mirror
//! `libwlblur/src/dmabuf.c` and `libwlblur/include/wlblur/dmabuf.h` exactly.

use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::context::EglContext;
use crate::error::{Error, Result};

/// The DRM format modifier sentinel meaning "no explicit modifier", matching
/// `DRM_FORMAT_MOD_INVALID` (`(1u64 << 56) - 1`).
pub const MODIFIER_INVALID: u64 = (1u64 << 56) - 1;

/// Maximum planes a DMA-BUF buffer may declare (matches `planes[4]` in the
/// reference header).
pub const MAX_PLANES: usize = 4;

/// A single imported/exported DMA-BUF plane: an owned descriptor plus its
/// byte offset and row stride within the buffer.
///
/// Closes its descriptor on `Drop`, replacing the reference's manual
/// `close()` calls in `wlblur_dmabuf_close`.
#[derive(Debug)]
pub struct BufferFd {
    fd: OwnedFd,
    pub offset: u32,
    pub stride: u32,
}

impl BufferFd {
    pub fn new(fd: OwnedFd, offset: u32, stride: u32) -> Self {
        BufferFd { fd, offset, stride }
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Consumes the wrapper, handing raw ownership to the caller (e.g. to
    /// pass across a socket via `SCM_RIGHTS`, where the kernel duplicates
    /// the reference rather than taking it).
    pub fn into_owned_fd(self) -> OwnedFd {
        self.fd
    }
}

/// DMA-BUF buffer attributes as received from, or produced for, a
/// compositor. Mirrors `struct wlblur_dmabuf_attribs`.
#[derive(Debug)]
pub struct DmabufAttribs {
    pub width: i32,
    pub height: i32,
    pub format: u32,
    pub modifier: u64,
    pub planes: Vec<BufferFd>,
}

impl DmabufAttribs {
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }
}

/// Builds the EGL attribute list for `eglCreateImageKHR(..., EGL_LINUX_DMA_BUF_EXT, ...)`
/// in the same field order as the reference: width, height, fourcc, then
/// per-plane fd/offset/pitch, then modifier lo/hi (only when the modifier is
/// not [`MODIFIER_INVALID`]).
fn build_import_attribs(attribs: &DmabufAttribs) -> Vec<i32> {
    const EGL_WIDTH: i32 = 0x3057;
    const EGL_HEIGHT: i32 = 0x3056;
    const EGL_LINUX_DRM_FOURCC_EXT: i32 = 0x3271;
    const PLANE_FD: [i32; 4] = [0x3272, 0x3275, 0x3278, 0x327B];
    const PLANE_OFFSET: [i32; 4] = [0x3273, 0x3276, 0x3279, 0x327C];
    const PLANE_PITCH: [i32; 4] = [0x3274, 0x3277, 0x327A, 0x327D];
    const PLANE_MODIFIER_LO: [i32; 4] = [0x3443, 0x3445, 0x3447, 0x3449];
    const PLANE_MODIFIER_HI: [i32; 4] = [0x3444, 0x3446, 0x3448, 0x344A];
    const EGL_NONE: i32 = 0x3038;

    let mut v = Vec::with_capacity(50);
    v.push(EGL_WIDTH);
    v.push(attribs.width);
    v.push(EGL_HEIGHT);
    v.push(attribs.height);
    v.push(EGL_LINUX_DRM_FOURCC_EXT);
    v.push(attribs.format as i32);

    for (i, plane) in attribs.planes.iter().enumerate().take(MAX_PLANES) {
        v.push(PLANE_FD[i]);
        v.push(plane.as_raw_fd());
        v.push(PLANE_OFFSET[i]);
        v.push(plane.offset as i32);
        v.push(PLANE_PITCH[i]);
        v.push(plane.stride as i32);

        if attribs.modifier != MODIFIER_INVALID {
            v.push(PLANE_MODIFIER_LO[i]);
            v.push((attribs.modifier & 0xFFFF_FFFF) as i32);
            v.push(PLANE_MODIFIER_HI[i]);
            v.push((attribs.modifier >> 32) as i32);
        }
    }

    v.push(EGL_NONE);
    v
}

/// Imports a DMA-BUF as a GL texture, returning the texture name.
///
/// Mirrors `wlblur_dmabuf_import`: builds an `EGLImageKHR` from the buffer's
/// planes, creates a 2D texture, binds the image via
/// `glEGLImageTargetTexture2DOES`, sets LINEAR/CLAMP_TO_EDGE sampling, then
/// destroys the (now texture-retained) image.
pub fn import(ctx: &EglContext, attribs: &DmabufAttribs) -> Result<glow::NativeTexture> {
    if !ctx.has_dmabuf_import {
        return Err(Error::DmabufImportFailed(
            "EGL_EXT_image_dma_buf_import not supported".into(),
        ));
    }
    if attribs.num_planes() < 1 || attribs.num_planes() > MAX_PLANES {
        return Err(Error::DmabufImportFailed(format!(
            "invalid plane count: {}",
            attribs.num_planes()
        )));
    }

    let egl_attribs = build_import_attribs(attribs);
    let image = ctx.create_image_from_dmabuf(&egl_attribs)?;

    let gl = &ctx.gl;
    let texture = unsafe {
        let texture = gl
            .create_texture()
            .map_err(Error::DmabufImportFailed)?;
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        ctx.bind_image_to_texture(image);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_S,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_T,
            glow::CLAMP_TO_EDGE as i32,
        );

        if let Err(e) = ctx.check_gl_error() {
            gl.delete_texture(texture);
            ctx.destroy_image(image);
            return Err(Error::DmabufImportFailed(e));
        }
        texture
    };

    ctx.destroy_image(image);
    Ok(texture)
}

/// Exports a GL texture as a DMA-BUF.
///
/// Mirrors `wlblur_dmabuf_export`: creates an `EGLImageKHR` from the
/// texture, queries plane count/format/modifier via
/// `eglExportDMABUFImageQueryMESA`, then exports descriptors/strides/offsets
/// via `eglExportDMABUFImageMESA`.
pub fn export(
    ctx: &EglContext,
    texture: glow::NativeTexture,
    width: i32,
    height: i32,
) -> Result<DmabufAttribs> {
    if !ctx.has_dmabuf_export {
        return Err(Error::DmabufExportFailed(
            "EGL_MESA_image_dma_buf_export not supported".into(),
        ));
    }

    let image = ctx.create_image_from_texture(texture)?;
    let query = ctx.query_dmabuf_export(image);
    let query = match query {
        Ok(q) => q,
        Err(e) => {
            ctx.destroy_image(image);
            return Err(Error::DmabufExportFailed(e));
        }
    };

    if query.num_planes < 1 || query.num_planes > MAX_PLANES {
        ctx.destroy_image(image);
        return Err(Error::DmabufExportFailed(format!(
            "invalid plane count from export: {}",
            query.num_planes
        )));
    }

    let exported = ctx.export_dmabuf(image, query.num_planes);
    ctx.destroy_image(image);
    let exported = exported.map_err(Error::DmabufExportFailed)?;

    Ok(DmabufAttribs {
        width,
        height,
        format: query.fourcc,
        modifier: query.modifier,
        planes: exported,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::FromRawFd;

    fn dummy_plane(fd_value: RawFd, offset: u32, stride: u32) -> BufferFd {
        // SAFETY: test-only; the fd is never used for IO, only its numeric
        // value is inspected by `build_import_attribs`.
        let owned = unsafe { OwnedFd::from_raw_fd(fd_value) };
        BufferFd::new(owned, offset, stride)
    }

    #[test]
    fn single_plane_attrib_list_has_no_modifier_fields_when_invalid() {
        let attribs = DmabufAttribs {
            width: 1920,
            height: 1080,
            format: 0x3432_4152, // DRM_FORMAT_ARGB8888-ish placeholder
            modifier: MODIFIER_INVALID,
            planes: vec![dummy_plane(-1, 0, 7680)],
        };
        let list = build_import_attribs(&attribs);
        // width,height,fourcc (6) + plane0 fd/offset/pitch (6) + EGL_NONE (1)
        assert_eq!(list.len(), 13);
        assert_eq!(list.last(), Some(&0x3038));
        std::mem::forget(attribs.planes.into_iter().next().unwrap().into_owned_fd());
    }

    #[test]
    fn modifier_present_adds_lo_hi_pair() {
        let attribs = DmabufAttribs {
            width: 64,
            height: 64,
            format: 1,
            modifier: 0x00AB_CDEF_1234_5678,
            planes: vec![dummy_plane(-1, 0, 256)],
        };
        let list = build_import_attribs(&attribs);
        assert_eq!(list.len(), 17);
        std::mem::forget(attribs.planes.into_iter().next().unwrap().into_owned_fd());
    }

    #[test]
    fn multi_plane_list_grows_per_plane() {
        let attribs = DmabufAttribs {
            width: 64,
            height: 64,
            format: 1,
            modifier: MODIFIER_INVALID,
            planes: vec![
                dummy_plane(-1, 0, 256),
                dummy_plane(-1, 0, 128),
            ],
        };
        let list = build_import_attribs(&attribs);
        assert_eq!(list.len(), 6 + 6 + 6 + 1);
        for p in attribs.planes {
            std::mem::forget(p.into_owned_fd());
        }
    }
}
