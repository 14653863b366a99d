//! Fixed-layout request/response records exchanged over the control socket.
//!
//! Layouts mirror `wlblurd/include/protocol.h`'s `__attribute__((packed))`
//! structs field-for-field. `BlurParams` itself is not `Pod` (it carries an
//! enum and a nested struct), so the wire form flattens it into
//! [`WireBlurParams`], a plain C-layout struct, and conversion is explicit.

use bytemuck::{Pod, Zeroable};
use wlblur_params::{BlurAlgorithm, BlurParams, Tint};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    CreateNode = 1,
    DestroyNode = 2,
    RenderBlur = 3,
}

impl Opcode {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            1 => Some(Opcode::CreateNode),
            2 => Some(Opcode::DestroyNode),
            3 => Some(Opcode::RenderBlur),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Success = 0,
    InvalidNode = 1,
    InvalidParams = 2,
    DmabufImportFailed = 3,
    DmabufExportFailed = 4,
    RenderFailed = 5,
    OutOfMemory = 6,
}

impl Status {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Status::Success),
            1 => Some(Status::InvalidNode),
            2 => Some(Status::InvalidParams),
            3 => Some(Status::DmabufImportFailed),
            4 => Some(Status::DmabufExportFailed),
            5 => Some(Status::RenderFailed),
            6 => Some(Status::OutOfMemory),
            _ => None,
        }
    }
}

/// Flat, `Pod`-safe mirror of [`BlurParams`] for on-wire transport.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WireBlurParams {
    pub algorithm: u32,
    pub num_passes: u32,
    pub radius: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub noise: f32,
    pub vibrancy: f32,
    pub vibrancy_darkness: f32,
    pub tint_r: f32,
    pub tint_g: f32,
    pub tint_b: f32,
    pub tint_a: f32,
}

impl From<BlurParams> for WireBlurParams {
    fn from(p: BlurParams) -> Self {
        WireBlurParams {
            algorithm: p.algorithm.to_wire(),
            num_passes: p.passes,
            radius: p.radius,
            brightness: p.brightness,
            contrast: p.contrast,
            saturation: p.saturation,
            noise: p.noise,
            vibrancy: p.vibrancy,
            vibrancy_darkness: p.vibrancy_darkness,
            tint_r: p.tint.r,
            tint_g: p.tint.g,
            tint_b: p.tint.b,
            tint_a: p.tint.a,
        }
    }
}

impl WireBlurParams {
    /// Decodes to a validated [`BlurParams`], rejecting unknown algorithm ids.
    pub fn to_params(self) -> Option<BlurParams> {
        Some(BlurParams {
            algorithm: BlurAlgorithm::from_wire(self.algorithm)?,
            passes: self.num_passes,
            radius: self.radius,
            brightness: self.brightness,
            contrast: self.contrast,
            saturation: self.saturation,
            noise: self.noise,
            vibrancy: self.vibrancy,
            vibrancy_darkness: self.vibrancy_darkness,
            tint: Tint {
                r: self.tint_r,
                g: self.tint_g,
                b: self.tint_b,
                a: self.tint_a,
            },
        })
    }
}

/// Client-to-daemon request. For `RenderBlur`, one DMA-BUF descriptor follows
/// via `SCM_RIGHTS`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WireRequest {
    pub protocol_version: u32,
    pub op: u32,
    pub node_id: u32,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub modifier: u64,
    pub stride: u32,
    pub offset: u32,
    pub params: WireBlurParams,
}

/// Daemon-to-client response. On `RenderBlur` success, one result DMA-BUF
/// descriptor follows via `SCM_RIGHTS`.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct WireResponse {
    pub status: u32,
    pub node_id: u32,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub modifier: u64,
    pub stride: u32,
    pub offset: u32,
}

impl WireResponse {
    pub fn error(status: Status) -> Self {
        WireResponse {
            status: status as u32,
            node_id: 0,
            width: 0,
            height: 0,
            format: 0,
            modifier: 0,
            stride: 0,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_roundtrip_through_wire_form() {
        let p = BlurParams::default();
        let wire = WireBlurParams::from(p);
        let back = wire.to_params().unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn unknown_algorithm_id_rejected() {
        let mut wire = WireBlurParams::from(BlurParams::default());
        wire.algorithm = 99;
        assert!(wire.to_params().is_none());
    }

    #[test]
    fn opcode_roundtrip() {
        assert_eq!(Opcode::from_wire(1), Some(Opcode::CreateNode));
        assert_eq!(Opcode::from_wire(2), Some(Opcode::DestroyNode));
        assert_eq!(Opcode::from_wire(3), Some(Opcode::RenderBlur));
        assert_eq!(Opcode::from_wire(4), None);
    }

    #[test]
    fn request_record_size_matches_packed_c_layout() {
        // protocol_version, op, node_id, width, height, format: 6 * u32
        // modifier: u64 (8 bytes)
        // stride, offset: 2 * u32
        // params: 2 * u32 + 11 * f32 = 8 + 44 = 52
        let expected = 6 * 4 + 8 + 2 * 4 + (2 * 4 + 11 * 4);
        assert_eq!(std::mem::size_of::<WireRequest>(), expected);
    }
}
