//! TOML daemon configuration: socket path, log level, resource limits,
//! default blur parameters, and named presets.
//!
//! Mirrors `wlblurd/src/config.c` / `wlblurd/include/config.h`: the load
//! order (`--config` path, then `$XDG_CONFIG_HOME/wlblur/config.toml`, then
//! `~/.config/wlblur/config.toml`, then `/etc/wlblur/config.toml`, then
//! hardcoded defaults) and the validated field ranges.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use wlblur_params::{BlurParams, PresetRegistry};

pub const DEFAULT_MAX_NODES_PER_CLIENT: u32 = 100;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The socket path used when nothing in the config file overrides it:
/// `$XDG_RUNTIME_DIR/wlblur.sock`, falling back to `/tmp/wlblur.sock`.
/// Mirrors the fallback chain in the reference `main()`.
pub fn default_socket_path() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir).join("wlblur.sock"),
        _ => PathBuf::from("/tmp/wlblur.sock"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Raw `[daemon]` section as it appears in the TOML file.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDaemonSection {
    socket_path: Option<String>,
    log_level: Option<String>,
    max_nodes_per_client: Option<u32>,
}

/// Top-level TOML shape: `[daemon]`, `[defaults]`, `[presets.<name>]`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    daemon: RawDaemonSection,
    defaults: Option<BlurParams>,
    presets: std::collections::HashMap<String, BlurParams>,
}

/// Fully resolved daemon configuration, ready for use.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub log_level: String,
    pub max_nodes_per_client: u32,
    pub has_defaults: bool,
    pub defaults: Option<BlurParams>,
    pub presets: PresetRegistry,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        DaemonConfig {
            socket_path: default_socket_path(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            max_nodes_per_client: DEFAULT_MAX_NODES_PER_CLIENT,
            has_defaults: false,
            defaults: None,
            presets: PresetRegistry::with_builtins(),
        }
    }
}

/// Candidate config file locations in priority order, matching
/// `config_load`'s fallback chain when no `--config` path is given.
fn default_search_path() -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            candidates.push(PathBuf::from(xdg).join("wlblur/config.toml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".config/wlblur/config.toml"));
    }
    candidates.push(PathBuf::from("/etc/wlblur/config.toml"));
    candidates
}

/// Loads configuration from `path`, or (if `None`) the first existing file
/// in [`default_search_path`]. If no file exists anywhere, returns
/// hardcoded defaults rather than an error — `config_load` never fails
/// solely because a config file is absent.
pub fn load(path: Option<&Path>) -> Result<DaemonConfig, ConfigError> {
    let chosen = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_search_path().into_iter().find(|p| p.exists()),
    };

    let Some(chosen) = chosen else {
        log::info!("no configuration file found, using hardcoded defaults");
        return Ok(DaemonConfig::default());
    };

    let text = fs::read_to_string(&chosen).map_err(|source| ConfigError::Read {
        path: chosen.clone(),
        source,
    })?;
    let raw: RawConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: chosen.clone(),
        source,
    })?;

    let mut presets = PresetRegistry::with_builtins();
    for (name, params) in raw.presets {
        presets.add(&name, params);
    }

    let config = DaemonConfig {
        socket_path: raw
            .daemon
            .socket_path
            .map(PathBuf::from)
            .unwrap_or_else(default_socket_path),
        log_level: raw.daemon.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        max_nodes_per_client: raw
            .daemon
            .max_nodes_per_client
            .unwrap_or(DEFAULT_MAX_NODES_PER_CLIENT),
        has_defaults: raw.defaults.is_some(),
        defaults: raw.defaults,
        presets,
    };

    validate(&config)?;
    log::info!("loaded configuration from {}", chosen.display());
    Ok(config)
}

/// Checks every field against the ranges `config_validate` enforces, plus
/// daemon-specific bounds not covered by [`BlurParams::validate`].
pub fn validate(config: &DaemonConfig) -> Result<(), ConfigError> {
    if config.max_nodes_per_client == 0 {
        return Err(ConfigError::Invalid(
            "max_nodes_per_client must be at least 1".into(),
        ));
    }
    if !matches!(config.log_level.as_str(), "debug" | "info" | "warn" | "error") {
        return Err(ConfigError::Invalid(format!(
            "unknown log_level '{}'",
            config.log_level
        )));
    }
    if let Some(defaults) = config.defaults {
        if !defaults.validate() {
            return Err(ConfigError::Invalid(
                "[defaults] blur parameters out of range".into(),
            ));
        }
    }
    for preset in config.presets.iter() {
        if !preset.params.validate() {
            return Err(ConfigError::Invalid(format!(
                "preset '{}' blur parameters out of range",
                preset.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DaemonConfig::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.presets.len(), 4);
    }

    #[test]
    fn parses_daemon_and_defaults_sections() {
        let toml_text = r#"
            [daemon]
            socket_path = "/run/wlblur/custom.sock"
            log_level = "debug"
            max_nodes_per_client = 50

            [defaults]
            passes = 4
            radius = 6.0
            brightness = 1.0
            contrast = 1.0
            saturation = 1.0
            noise = 0.01
            vibrancy = 0.0
            vibrancy_darkness = 0.0
        "#;
        let raw: RawConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(raw.daemon.socket_path.as_deref(), Some("/run/wlblur/custom.sock"));
        assert_eq!(raw.daemon.max_nodes_per_client, Some(50));
        assert!(raw.defaults.is_some());
        assert_eq!(raw.defaults.unwrap().passes, 4);
    }

    #[test]
    fn parses_named_presets_section() {
        let toml_text = r#"
            [presets.sidebar]
            passes = 2
            radius = 3.0
            brightness = 1.0
            contrast = 1.0
            saturation = 1.0
            noise = 0.0
            vibrancy = 0.0
            vibrancy_darkness = 0.0
        "#;
        let raw: RawConfig = toml::from_str(toml_text).unwrap();
        assert!(raw.presets.contains_key("sidebar"));
        assert_eq!(raw.presets["sidebar"].radius, 3.0);
    }

    #[test]
    fn zero_max_nodes_per_client_rejected() {
        let mut config = DaemonConfig::default();
        config.max_nodes_per_client = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_log_level_rejected() {
        let mut config = DaemonConfig::default();
        config.log_level = "verbose".into();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn invalid_preset_params_rejected() {
        let mut config = DaemonConfig::default();
        let mut bad = BlurParams::default();
        bad.passes = 99;
        config.presets.add("broken", bad);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_hardcoded_defaults() {
        let config = load(Some(Path::new("/nonexistent/path/should/not/exist.toml")));
        // A missing explicit --config path is a hard error (unlike the
        // no-path-given search, which tolerates absence); confirm it surfaces.
        assert!(config.is_err());
    }
}
