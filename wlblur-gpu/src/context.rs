//! Surfaceless EGL context host: display/context setup, extension checks,
//! and the raw DMA-BUF extension function pointers resolved once at
//! creation.
//!
//! Mirrors `libwlblur/src/egl_helpers.c` step for step: default display,
//! `eglInitialize`, extension string scan, ES3-capable RGBA8888 config,
//! ES 3.0 context, `eglGetProcAddress` resolution of the four DMA-BUF/image
//! entry points plus `glEGLImageTargetTexture2DOES`.

use std::ffi::{c_void, CString};
use std::os::fd::{FromRawFd, OwnedFd};

use glow::HasContext;

use crate::dmabuf::BufferFd;
use crate::error::{Error, Result};

type Egl = egl::DynamicInstance<egl::EGL1_5>;

/// Opaque `EGLImageKHR` handle.
pub type EglImage = *const c_void;

const EGL_NO_IMAGE: EglImage = std::ptr::null();

#[allow(non_snake_case)]
struct ExtensionFns {
    eglCreateImageKHR: unsafe extern "C" fn(
        egl::EGLDisplay,
        egl::EGLContext,
        egl::EGLenum,
        egl::EGLClientBuffer,
        *const egl::EGLint,
    ) -> EglImage,
    eglDestroyImageKHR: unsafe extern "C" fn(egl::EGLDisplay, EglImage) -> egl::EGLBoolean,
    eglExportDMABUFImageMESA: unsafe extern "C" fn(
        egl::EGLDisplay,
        EglImage,
        *mut i32,
        *mut i32,
        *mut i32,
    ) -> egl::EGLBoolean,
    eglExportDMABUFImageQueryMESA: unsafe extern "C" fn(
        egl::EGLDisplay,
        EglImage,
        *mut i32,
        *mut i32,
        *mut u64,
    ) -> egl::EGLBoolean,
    glEGLImageTargetTexture2DOES: unsafe extern "C" fn(u32, EglImage),
}

/// Plane count, format, and modifier as reported by
/// `eglExportDMABUFImageQueryMESA`.
pub struct DmabufExportQuery {
    pub fourcc: u32,
    pub num_planes: usize,
    pub modifier: u64,
}

/// A surfaceless EGL 1.5 / GLES 3.0 context used for all blur rendering.
///
/// One instance lives for the daemon's whole lifetime (§5 of the
/// specification: one GPU context, no re-entrant engine calls).
pub struct EglContext {
    egl: Egl,
    display: egl::EGLDisplay,
    context: egl::EGLContext,
    config: egl::EGLConfig,
    pub has_surfaceless: bool,
    pub has_dmabuf_import: bool,
    pub has_dmabuf_export: bool,
    ext: ExtensionFns,
    pub gl: glow::Context,
}

fn has_extension(exts: &str, name: &str) -> bool {
    exts.split(' ').any(|e| e == name)
}

impl EglContext {
    /// Creates and makes current a surfaceless EGL/GLES3 context.
    ///
    /// Fails if any of `EGL_KHR_surfaceless_context` (or `_opengl`),
    /// `EGL_EXT_image_dma_buf_import` + `EGL_KHR_image_base`, or
    /// `EGL_MESA_image_dma_buf_export` are unavailable — exactly the gating
    /// the reference performs before returning a usable context.
    pub fn create() -> Result<Self> {
        let egl = unsafe { Egl::load_required() }
            .map_err(|e| Error::RenderFailed(format!("failed to load libEGL: {e}")))?;

        let display = egl
            .get_display(egl::DEFAULT_DISPLAY)
            .ok_or_else(|| Error::RenderFailed("eglGetDisplay returned no display".into()))?;

        let (major, minor) = egl
            .initialize(display)
            .map_err(|e| Error::RenderFailed(format!("eglInitialize failed: {e}")))?;
        log::info!("EGL {major}.{minor} initialized");

        let exts = egl
            .query_string(Some(display), egl::EXTENSIONS)
            .map_err(|e| Error::RenderFailed(format!("eglQueryString failed: {e}")))?
            .to_string_lossy()
            .into_owned();

        let has_surfaceless = has_extension(&exts, "EGL_KHR_surfaceless_context")
            || has_extension(&exts, "EGL_KHR_surfaceless_opengl");
        if !has_surfaceless {
            return Err(Error::RenderFailed(
                "EGL_KHR_surfaceless_context not available".into(),
            ));
        }

        let has_dmabuf_import = has_extension(&exts, "EGL_EXT_image_dma_buf_import")
            && has_extension(&exts, "EGL_KHR_image_base");
        if !has_dmabuf_import {
            return Err(Error::RenderFailed(
                "DMA-BUF import extensions not available".into(),
            ));
        }

        let has_dmabuf_export = has_extension(&exts, "EGL_MESA_image_dma_buf_export");
        if !has_dmabuf_export {
            return Err(Error::RenderFailed(
                "EGL_MESA_image_dma_buf_export not available".into(),
            ));
        }

        egl.bind_api(egl::OPENGL_ES_API)
            .map_err(|e| Error::RenderFailed(format!("eglBindAPI failed: {e}")))?;

        let config_attribs = [
            egl::SURFACE_TYPE,
            egl::DONT_CARE,
            egl::RENDERABLE_TYPE,
            egl::OPENGL_ES3_BIT,
            egl::RED_SIZE,
            8,
            egl::GREEN_SIZE,
            8,
            egl::BLUE_SIZE,
            8,
            egl::ALPHA_SIZE,
            8,
            egl::NONE,
        ];
        let config = egl
            .choose_first_config(display, &config_attribs)
            .map_err(|e| Error::RenderFailed(format!("eglChooseConfig failed: {e}")))?
            .ok_or_else(|| Error::RenderFailed("no matching EGL config".into()))?;

        let context_attribs = [
            egl::CONTEXT_MAJOR_VERSION,
            3,
            egl::CONTEXT_MINOR_VERSION,
            0,
            egl::NONE,
        ];
        let context = egl
            .create_context(display, config, None, &context_attribs)
            .map_err(|e| Error::RenderFailed(format!("eglCreateContext failed: {e}")))?;

        egl.make_current(display, None, None, Some(context))
            .map_err(|e| Error::RenderFailed(format!("eglMakeCurrent failed: {e}")))?;

        let ext = unsafe { load_extension_fns(&egl) }?;

        let gl = unsafe {
            glow::Context::from_loader_function(|name| {
                let cname = CString::new(name).unwrap_or_default();
                egl.get_proc_address(cname.to_str().unwrap_or(""))
                    .map(|f| f as *const c_void)
                    .unwrap_or(std::ptr::null())
            })
        };

        let version = unsafe { gl.get_parameter_string(glow::VERSION) };
        log::info!("OpenGL ES version: {version}");

        Ok(EglContext {
            egl,
            display,
            context,
            config,
            has_surfaceless,
            has_dmabuf_import,
            has_dmabuf_export,
            ext,
            gl,
        })
    }

    pub fn make_current(&self) -> Result<()> {
        self.egl
            .make_current(self.display, None, None, Some(self.context))
            .map_err(|e| Error::RenderFailed(format!("eglMakeCurrent failed: {e}")))
    }

    pub fn check_gl_error(&self) -> std::result::Result<(), String> {
        let err = unsafe { self.gl.get_error() };
        if err == glow::NO_ERROR {
            Ok(())
        } else {
            Err(format!("GL error: 0x{err:x}"))
        }
    }

    pub fn create_image_from_dmabuf(&self, attribs: &[i32]) -> Result<EglImage> {
        const EGL_LINUX_DMA_BUF_EXT: egl::EGLenum = 0x3270;
        let image = unsafe {
            (self.ext.eglCreateImageKHR)(
                self.display.as_ptr(),
                egl::NO_CONTEXT,
                EGL_LINUX_DMA_BUF_EXT,
                std::ptr::null_mut(),
                attribs.as_ptr(),
            )
        };
        if image == EGL_NO_IMAGE {
            return Err(Error::DmabufImportFailed(
                "eglCreateImageKHR(EGL_LINUX_DMA_BUF_EXT) failed".into(),
            ));
        }
        Ok(image)
    }

    pub fn create_image_from_texture(&self, texture: glow::NativeTexture) -> Result<EglImage> {
        const EGL_GL_TEXTURE_2D: egl::EGLenum = 0x30B1;
        let texture_name: u32 = texture.0.get();
        let image = unsafe {
            (self.ext.eglCreateImageKHR)(
                self.display.as_ptr(),
                self.context.as_ptr(),
                EGL_GL_TEXTURE_2D,
                texture_name as egl::EGLClientBuffer,
                std::ptr::null(),
            )
        };
        if image == EGL_NO_IMAGE {
            return Err(Error::DmabufExportFailed(
                "eglCreateImageKHR(EGL_GL_TEXTURE_2D) failed".into(),
            ));
        }
        Ok(image)
    }

    pub fn destroy_image(&self, image: EglImage) {
        unsafe {
            (self.ext.eglDestroyImageKHR)(self.display.as_ptr(), image);
        }
    }

    pub fn bind_image_to_texture(&self, image: EglImage) {
        unsafe {
            (self.ext.glEGLImageTargetTexture2DOES)(glow::TEXTURE_2D, image);
        }
    }

    pub fn query_dmabuf_export(&self, image: EglImage) -> std::result::Result<DmabufExportQuery, String> {
        let mut fourcc: i32 = 0;
        let mut num_planes: i32 = 0;
        let mut modifier: u64 = 0;
        let ok = unsafe {
            (self.ext.eglExportDMABUFImageQueryMESA)(
                self.display.as_ptr(),
                image,
                &mut fourcc,
                &mut num_planes,
                &mut modifier,
            )
        };
        if ok == egl::FALSE {
            return Err("eglExportDMABUFImageQueryMESA failed".into());
        }
        Ok(DmabufExportQuery {
            fourcc: fourcc as u32,
            num_planes: num_planes as usize,
            modifier,
        })
    }

    pub fn export_dmabuf(
        &self,
        image: EglImage,
        num_planes: usize,
    ) -> std::result::Result<Vec<BufferFd>, String> {
        let mut fds = [-1i32; crate::dmabuf::MAX_PLANES];
        let mut strides = [0i32; crate::dmabuf::MAX_PLANES];
        let mut offsets = [0i32; crate::dmabuf::MAX_PLANES];

        let ok = unsafe {
            (self.ext.eglExportDMABUFImageMESA)(
                self.display.as_ptr(),
                image,
                fds.as_mut_ptr(),
                strides.as_mut_ptr(),
                offsets.as_mut_ptr(),
            )
        };
        if ok == egl::FALSE {
            return Err("eglExportDMABUFImageMESA failed".into());
        }

        let mut planes = Vec::with_capacity(num_planes);
        for i in 0..num_planes {
            // SAFETY: the driver just handed us ownership of this descriptor.
            let owned = unsafe { OwnedFd::from_raw_fd(fds[i]) };
            planes.push(BufferFd::new(owned, offsets[i] as u32, strides[i] as u32));
        }
        Ok(planes)
    }
}

impl Drop for EglContext {
    fn drop(&mut self) {
        let _ = self.egl.make_current(self.display, None, None, None);
        let _ = self.egl.destroy_context(self.display, self.context);
        let _ = self.egl.terminate(self.display);
    }
}

unsafe fn load_extension_fns(egl: &Egl) -> Result<ExtensionFns> {
    macro_rules! load {
        ($name:literal) => {{
            let addr = egl.get_proc_address($name).ok_or_else(|| {
                Error::RenderFailed(format!("missing required EGL/GL entry point: {}", $name))
            })?;
            std::mem::transmute(addr as *const c_void)
        }};
    }

    Ok(ExtensionFns {
        eglCreateImageKHR: load!("eglCreateImageKHR"),
        eglDestroyImageKHR: load!("eglDestroyImageKHR"),
        eglExportDMABUFImageMESA: load!("eglExportDMABUFImageMESA"),
        eglExportDMABUFImageQueryMESA: load!("eglExportDMABUFImageQueryMESA"),
        glEGLImageTargetTexture2DOES: load!("glEGLImageTargetTexture2DOES"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_name_match_is_exact_not_substring() {
        assert!(has_extension(
            "EGL_KHR_image_base EGL_EXT_image_dma_buf_import",
            "EGL_EXT_image_dma_buf_import"
        ));
        assert!(!has_extension(
            "EGL_EXT_image_dma_buf_import_modifiers",
            "EGL_EXT_image_dma_buf_import"
        ));
    }
}
