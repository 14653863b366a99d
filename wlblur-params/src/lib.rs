//! Blur parameter schema: the value type exchanged between compositor and
//! daemon, its validation rules, and derived (computed) quantities.
//!
//! Field ranges and defaults mirror `libwlblur/include/wlblur/blur_params.h`
//! and `libwlblur/src/blur_params.c` from the reference implementation.

mod presets;

pub use presets::{Preset, PresetRegistry};

/// Blur algorithm discriminant.
///
/// Only `Kawase` is implemented; other identifiers are reserved for future
/// algorithms and must be rejected wherever a wire value decodes to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum BlurAlgorithm {
    #[default]
    Kawase = 0,
}

impl BlurAlgorithm {
    /// Decodes the wire representation of an algorithm identifier.
    ///
    /// Returns `None` for any value other than `0` (Kawase), including the
    /// identifiers SceneFX/Hyprland-style configs reserve for gaussian/box/
    /// bokeh blur — those are not yet implemented.
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(BlurAlgorithm::Kawase),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            BlurAlgorithm::Kawase => 0,
        }
    }
}

/// A named, validated RGBA tint applied as the last post-processing step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Tint {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

/// The full blur parameter set: one Dual Kawase configuration.
///
/// Every field has an inclusive range stated in its doc comment; a
/// `BlurParams` is only meaningful once it has passed [`BlurParams::validate`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BlurParams {
    pub algorithm: BlurAlgorithm,
    /// Number of downsample/upsample pass pairs. Range: `1..=8`.
    pub passes: u32,
    /// Base blur radius in pixels. Range: `1.0..=20.0`.
    pub radius: f32,
    /// `color.rgb *= brightness`. Range: `0.0..=2.0`.
    pub brightness: f32,
    /// `color.rgb = (color.rgb - 0.5) * contrast + 0.5`. Range: `0.0..=2.0`.
    pub contrast: f32,
    /// `mix(luma, color.rgb, saturation)`. Range: `0.0..=2.0`.
    pub saturation: f32,
    /// Per-pixel dither amount. Range: `0.0..=0.1`.
    pub noise: f32,
    /// HSL saturation boost strength. Range: `0.0..=2.0`.
    pub vibrancy: f32,
    /// Lightness reduction paired with vibrancy. Range: `0.0..=1.0`.
    pub vibrancy_darkness: f32,
    pub tint: Tint,
}

impl Default for BlurParams {
    /// SceneFX-style defaults: balanced quality/performance, slightly
    /// darkened and desaturated to improve foreground contrast.
    fn default() -> Self {
        BlurParams {
            algorithm: BlurAlgorithm::Kawase,
            passes: 3,
            radius: 5.0,
            brightness: 0.9,
            contrast: 0.9,
            saturation: 1.1,
            noise: 0.02,
            vibrancy: 0.0,
            vibrancy_darkness: 0.0,
            tint: Tint::default(),
        }
    }
}

/// Quantities derived from a [`BlurParams`], not independently stored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputedParams {
    /// `2^(passes+1) * radius`: how far the blur kernel reaches in pixels.
    pub blur_size: f32,
    /// Damage-region expansion a compositor must apply; equal to `blur_size`.
    pub damage_expand: f32,
}

fn in_range(v: f32, lo: f32, hi: f32) -> bool {
    v >= lo && v <= hi
}

impl BlurParams {
    /// True iff every field lies within its declared inclusive range.
    pub fn validate(&self) -> bool {
        matches!(self.algorithm, BlurAlgorithm::Kawase)
            && (1..=8).contains(&self.passes)
            && in_range(self.radius, 1.0, 20.0)
            && in_range(self.brightness, 0.0, 2.0)
            && in_range(self.contrast, 0.0, 2.0)
            && in_range(self.saturation, 0.0, 2.0)
            && in_range(self.noise, 0.0, 0.1)
            && in_range(self.vibrancy, 0.0, 2.0)
            && in_range(self.vibrancy_darkness, 0.0, 1.0)
            && in_range(self.tint.r, 0.0, 1.0)
            && in_range(self.tint.g, 0.0, 1.0)
            && in_range(self.tint.b, 0.0, 1.0)
            && in_range(self.tint.a, 0.0, 1.0)
    }

    /// Derived values: effective blur size and the damage expansion it implies.
    pub fn compute(&self) -> ComputedParams {
        let blur_size = 2f32.powi(self.passes as i32 + 1) * self.radius;
        ComputedParams {
            blur_size,
            damage_expand: blur_size,
        }
    }

    /// Resolves the parameter set to use for a render, in priority order:
    /// 1. a named preset, if `preset_name` is non-empty and present in `registry`;
    /// 2. `override_params`, if supplied;
    /// 3. `config_defaults`, if the daemon configuration carries them;
    /// 4. hardcoded [`BlurParams::default`].
    ///
    /// Mirrors `resolve_preset` in the reference `wlblurd/src/presets.c`.
    pub fn resolve(
        registry: &PresetRegistry,
        preset_name: &str,
        override_params: Option<BlurParams>,
        config_defaults: Option<BlurParams>,
    ) -> BlurParams {
        if !preset_name.is_empty() {
            if let Some(preset) = registry.lookup(preset_name) {
                return preset.params;
            }
            log::warn!("preset '{preset_name}' not found, using fallback");
        }
        if let Some(p) = override_params {
            return p;
        }
        if let Some(p) = config_defaults {
            return p;
        }
        BlurParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(BlurParams::default().validate());
    }

    #[test]
    fn endpoints_pass_and_one_ulp_outside_fails() {
        let mut p = BlurParams::default();
        p.radius = 1.0;
        assert!(p.validate());
        p.radius = 20.0;
        assert!(p.validate());
        p.radius = 20.0 + f32::EPSILON * 32.0;
        assert!(!p.validate());
        p.radius = 1.0 - f32::EPSILON * 8.0;
        assert!(!p.validate());
    }

    #[test]
    fn passes_out_of_range_rejected() {
        let mut p = BlurParams::default();
        p.passes = 0;
        assert!(!p.validate());
        p.passes = 9;
        assert!(!p.validate());
        p.passes = 8;
        assert!(p.validate());
    }

    #[test]
    fn compute_matches_formula() {
        let p = BlurParams {
            passes: 3,
            radius: 5.0,
            ..BlurParams::default()
        };
        let c = p.compute();
        assert_eq!(c.blur_size, 80.0);
        assert_eq!(c.damage_expand, 80.0);
    }

    #[test]
    fn resolve_empty_preset_returns_override() {
        let registry = PresetRegistry::with_builtins();
        let over = BlurParams {
            radius: 12.0,
            ..BlurParams::default()
        };
        let resolved = BlurParams::resolve(&registry, "", Some(over), None);
        assert_eq!(resolved, over);
    }

    #[test]
    fn resolve_unknown_preset_falls_back_to_override() {
        let registry = PresetRegistry::with_builtins();
        let over = BlurParams {
            radius: 9.0,
            ..BlurParams::default()
        };
        let resolved = BlurParams::resolve(&registry, "nonexistent", Some(over), None);
        assert_eq!(resolved, over);
    }

    #[test]
    fn resolve_known_preset_wins_over_override() {
        let registry = PresetRegistry::with_builtins();
        let over = BlurParams {
            radius: 9.0,
            ..BlurParams::default()
        };
        let resolved = BlurParams::resolve(&registry, "window", Some(over), None);
        assert_eq!(resolved, registry.lookup("window").unwrap().params);
        assert_ne!(resolved.radius, 9.0);
    }

    #[test]
    fn resolve_with_nothing_supplied_uses_hardcoded_defaults() {
        let registry = PresetRegistry::new();
        let resolved = BlurParams::resolve(&registry, "", None, None);
        assert_eq!(resolved, BlurParams::default());
    }
}
