//! GLSL shader sources and a thin compiled-program wrapper with cached
//! uniform locations.
//!
//! Sources implement the Dual Kawase downsample/upsample passes and the
//! post-processing finish pass described by `blur_kawase.c`; the vertex
//! shader and uniform names (`tex`, `halfpixel`, `radius`, `brightness`,
//! `contrast`, `saturation`, `noise`) match `shaders.c` exactly so a
//! fragment shader swap at the file level would be a drop-in replacement.

use glow::HasContext;

use crate::error::{Error, Result};

pub const VERTEX_SHADER_SRC: &str = r#"#version 300 es
precision mediump float;

in vec2 position;
out vec2 v_texcoord;

void main() {
    v_texcoord = position * 0.5 + 0.5;
    gl_Position = vec4(position, 0.0, 1.0);
}
"#;

pub const DOWNSAMPLE_FRAGMENT_SHADER_SRC: &str = r#"#version 300 es
precision mediump float;

in vec2 v_texcoord;
out vec4 frag_color;

uniform sampler2D tex;
uniform vec2 halfpixel;
uniform float radius;

void main() {
    vec2 uv = v_texcoord;
    vec4 sum = texture(tex, uv) * 4.0;
    sum += texture(tex, uv - halfpixel * radius);
    sum += texture(tex, uv + halfpixel * radius);
    sum += texture(tex, uv + vec2(halfpixel.x, -halfpixel.y) * radius);
    sum += texture(tex, uv - vec2(halfpixel.x, -halfpixel.y) * radius);
    frag_color = sum / 8.0;
}
"#;

pub const UPSAMPLE_FRAGMENT_SHADER_SRC: &str = r#"#version 300 es
precision mediump float;

in vec2 v_texcoord;
out vec4 frag_color;

uniform sampler2D tex;
uniform vec2 halfpixel;
uniform float radius;

void main() {
    vec2 uv = v_texcoord;
    vec4 sum = texture(tex, uv + vec2(-halfpixel.x * 2.0, 0.0) * radius);
    sum += texture(tex, uv + vec2(-halfpixel.x, halfpixel.y) * radius) * 2.0;
    sum += texture(tex, uv + vec2(0.0, halfpixel.y * 2.0) * radius);
    sum += texture(tex, uv + vec2(halfpixel.x, halfpixel.y) * radius) * 2.0;
    sum += texture(tex, uv + vec2(halfpixel.x * 2.0, 0.0) * radius);
    sum += texture(tex, uv + vec2(halfpixel.x, -halfpixel.y) * radius) * 2.0;
    sum += texture(tex, uv + vec2(0.0, -halfpixel.y * 2.0) * radius);
    sum += texture(tex, uv + vec2(-halfpixel.x, -halfpixel.y) * radius) * 2.0;
    frag_color = sum / 12.0;
}
"#;

pub const FINISH_FRAGMENT_SHADER_SRC: &str = r#"#version 300 es
precision mediump float;

in vec2 v_texcoord;
out vec4 frag_color;

uniform sampler2D tex;
uniform float brightness;
uniform float contrast;
uniform float saturation;
uniform float noise;

float pseudo_random(vec2 co) {
    return fract(sin(dot(co, vec2(12.9898, 78.233))) * 43758.5453);
}

void main() {
    vec4 color = texture(tex, v_texcoord);

    color.rgb *= brightness;
    color.rgb = (color.rgb - 0.5) * contrast + 0.5;

    float luma = dot(color.rgb, vec3(0.2126, 0.7152, 0.0722));
    color.rgb = mix(vec3(luma), color.rgb, saturation);

    float dither = (pseudo_random(v_texcoord) - 0.5) * noise;
    color.rgb += dither;

    frag_color = color;
}
"#;

/// A compiled, linked shader program with the uniform locations the Dual
/// Kawase passes need, resolved once at link time.
pub struct ShaderProgram {
    pub program: glow::NativeProgram,
    pub u_tex: Option<glow::UniformLocation>,
    pub u_halfpixel: Option<glow::UniformLocation>,
    pub u_radius: Option<glow::UniformLocation>,
    pub u_brightness: Option<glow::UniformLocation>,
    pub u_contrast: Option<glow::UniformLocation>,
    pub u_saturation: Option<glow::UniformLocation>,
    pub u_noise: Option<glow::UniformLocation>,
}

impl ShaderProgram {
    /// Compiles `vertex_src`/`fragment_src`, links them, and caches uniform
    /// locations. Compile/link failures carry the driver's info log,
    /// mirroring `compile_shader`/`link_program` in `shaders.c`.
    pub fn compile(gl: &glow::Context, vertex_src: &str, fragment_src: &str) -> Result<Self> {
        unsafe {
            let vertex_shader = compile_stage(gl, glow::VERTEX_SHADER, vertex_src)?;
            let fragment_shader = match compile_stage(gl, glow::FRAGMENT_SHADER, fragment_src) {
                Ok(s) => s,
                Err(e) => {
                    gl.delete_shader(vertex_shader);
                    return Err(e);
                }
            };

            let program = gl.create_program().map_err(Error::RenderFailed)?;
            gl.attach_shader(program, vertex_shader);
            gl.attach_shader(program, fragment_shader);
            gl.link_program(program);

            let linked = gl.get_program_link_status(program);
            if !linked {
                let log = gl.get_program_info_log(program);
                gl.delete_shader(vertex_shader);
                gl.delete_shader(fragment_shader);
                gl.delete_program(program);
                return Err(Error::RenderFailed(format!("program link failed: {log}")));
            }

            // The reference keeps attached shader objects alive on the
            // program object for the program's lifetime; detach+delete here
            // instead, since glow's program owns no such retained handles.
            gl.detach_shader(program, vertex_shader);
            gl.detach_shader(program, fragment_shader);
            gl.delete_shader(vertex_shader);
            gl.delete_shader(fragment_shader);

            Ok(ShaderProgram {
                u_tex: gl.get_uniform_location(program, "tex"),
                u_halfpixel: gl.get_uniform_location(program, "halfpixel"),
                u_radius: gl.get_uniform_location(program, "radius"),
                u_brightness: gl.get_uniform_location(program, "brightness"),
                u_contrast: gl.get_uniform_location(program, "contrast"),
                u_saturation: gl.get_uniform_location(program, "saturation"),
                u_noise: gl.get_uniform_location(program, "noise"),
                program,
            })
        }
    }

    pub fn use_program(&self, gl: &glow::Context) {
        unsafe { gl.use_program(Some(self.program)) };
    }

    pub fn destroy(self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}

unsafe fn compile_stage(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::NativeShader> {
    let shader = gl.create_shader(kind).map_err(Error::RenderFailed)?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);

    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(Error::RenderFailed(format!("shader compile failed: {log}")));
    }
    Ok(shader)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_sources_reference_the_expected_uniforms() {
        for name in ["tex", "halfpixel", "radius"] {
            assert!(DOWNSAMPLE_FRAGMENT_SHADER_SRC.contains(name));
            assert!(UPSAMPLE_FRAGMENT_SHADER_SRC.contains(name));
        }
        for name in ["tex", "brightness", "contrast", "saturation", "noise"] {
            assert!(FINISH_FRAGMENT_SHADER_SRC.contains(name));
        }
    }

    #[test]
    fn vertex_shader_derives_texcoord_from_clip_position() {
        assert!(VERTEX_SHADER_SRC.contains("v_texcoord = position * 0.5 + 0.5"));
    }
}
