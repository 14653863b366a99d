//! Named, reusable blur configurations.
//!
//! Mirrors `wlblurd/src/presets.c` from the reference implementation. The C
//! registry hashes names into 64 buckets with djb2; Design Note 9 of the
//! specification ("Hash of preset names") sanctions either that scheme or any
//! equivalent-complexity table as correct, so this uses a `HashMap` directly.

use std::collections::HashMap;

use crate::BlurParams;

/// Preset name length limit, matching the reference's `char name[32]` (31
/// usable bytes plus NUL).
pub const MAX_PRESET_NAME_LEN: usize = 31;

#[derive(Debug, Clone, PartialEq)]
pub struct Preset {
    pub name: String,
    pub params: BlurParams,
}

/// A lookup table of named [`BlurParams`] configurations.
#[derive(Debug, Clone, Default)]
pub struct PresetRegistry {
    presets: HashMap<String, Preset>,
}

impl PresetRegistry {
    /// An empty registry with no presets defined.
    pub fn new() -> Self {
        PresetRegistry {
            presets: HashMap::new(),
        }
    }

    /// A registry pre-populated with the four standard presets: `window`,
    /// `panel`, `hud`, `tooltip`. Values match `preset_registry_init` in the
    /// reference exactly.
    pub fn with_builtins() -> Self {
        let mut registry = PresetRegistry::new();
        registry.add(
            "window",
            BlurParams {
                passes: 3,
                radius: 8.0,
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.15,
                noise: 0.02,
                vibrancy: 0.0,
                vibrancy_darkness: 0.0,
                ..BlurParams::default()
            },
        );
        registry.add(
            "panel",
            BlurParams {
                passes: 2,
                radius: 4.0,
                brightness: 1.05,
                contrast: 1.0,
                saturation: 1.1,
                noise: 0.01,
                vibrancy: 0.0,
                vibrancy_darkness: 0.0,
                ..BlurParams::default()
            },
        );
        registry.add(
            "hud",
            BlurParams {
                passes: 4,
                radius: 12.0,
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.2,
                noise: 0.02,
                vibrancy: 0.2,
                vibrancy_darkness: 0.0,
                ..BlurParams::default()
            },
        );
        registry.add(
            "tooltip",
            BlurParams {
                passes: 1,
                radius: 2.0,
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.0,
                noise: 0.0,
                vibrancy: 0.0,
                vibrancy_darkness: 0.0,
                ..BlurParams::default()
            },
        );
        registry
    }

    /// Adds or replaces a preset. Names longer than [`MAX_PRESET_NAME_LEN`]
    /// are truncated, matching the reference's fixed-size `strncpy` into
    /// `char name[32]`.
    pub fn add(&mut self, name: &str, params: BlurParams) {
        let truncated: String = name.chars().take(MAX_PRESET_NAME_LEN).collect();
        self.presets.insert(
            truncated.clone(),
            Preset {
                name: truncated,
                params,
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<&Preset> {
        self.presets.get(name)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_present_and_distinct() {
        let registry = PresetRegistry::with_builtins();
        assert_eq!(registry.len(), 4);
        for name in ["window", "panel", "hud", "tooltip"] {
            assert!(registry.lookup(name).is_some(), "missing preset {name}");
        }
    }

    #[test]
    fn window_preset_matches_reference_values() {
        let registry = PresetRegistry::with_builtins();
        let window = registry.lookup("window").unwrap();
        assert_eq!(window.params.passes, 3);
        assert_eq!(window.params.radius, 8.0);
        assert_eq!(window.params.saturation, 1.15);
    }

    #[test]
    fn unknown_preset_returns_none() {
        let registry = PresetRegistry::with_builtins();
        assert!(registry.lookup("does-not-exist").is_none());
    }

    #[test]
    fn add_overwrites_existing_preset_in_place() {
        let mut registry = PresetRegistry::new();
        registry.add("custom", BlurParams::default());
        assert_eq!(registry.len(), 1);
        let mut updated = BlurParams::default();
        updated.radius = 15.0;
        registry.add("custom", updated);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("custom").unwrap().params.radius, 15.0);
    }

    #[test]
    fn overlong_name_is_truncated() {
        let mut registry = PresetRegistry::new();
        let long_name = "x".repeat(64);
        registry.add(&long_name, BlurParams::default());
        let truncated: String = long_name.chars().take(MAX_PRESET_NAME_LEN).collect();
        assert!(registry.lookup(&truncated).is_some());
        assert!(registry.lookup(&long_name).is_none());
    }
}
