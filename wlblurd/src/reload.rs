//! Hot configuration reload via `SIGUSR1`.
//!
//! Mirrors `wlblurd/src/reload.c`: a signal-safe flag set by the handler
//! and polled from the event loop, plus a reload routine that keeps the
//! running configuration on any load or validation failure.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::config::{self, ConfigError, DaemonConfig};

static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn sigusr1_handler(_: i32) {
    RELOAD_REQUESTED.store(true, Ordering::SeqCst);
}

/// Installs the `SIGUSR1` handler. Must be called once during daemon
/// startup, after the event loop's other signal dispositions are in place.
///
/// # Safety
/// Registers a process-wide signal handler via `sigaction`; must not be
/// called concurrently with other signal-disposition changes.
pub unsafe fn init() -> nix::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(sigusr1_handler),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    signal::sigaction(Signal::SIGUSR1, &action)?;
    log::info!("hot reload initialized (send SIGUSR1 to reload)");
    Ok(())
}

pub fn pending() -> bool {
    RELOAD_REQUESTED.load(Ordering::SeqCst)
}

/// Reloads configuration from `config_path`, validating it before
/// accepting it. On any failure, logs the reason and returns `None` — the
/// caller keeps its existing configuration in that case.
pub fn handle_config_reload(config_path: Option<&std::path::Path>) -> Option<DaemonConfig> {
    RELOAD_REQUESTED.store(false, Ordering::SeqCst);
    log::info!("reloading configuration");

    match config::load(config_path) {
        Ok(new_config) => {
            log::info!(
                "configuration reloaded successfully ({} presets loaded)",
                new_config.presets.len()
            );
            Some(new_config)
        }
        Err(ConfigError::Invalid(reason)) => {
            log::error!("config validation failed ({reason}) - keeping old configuration");
            None
        }
        Err(e) => {
            log::error!("failed to load config ({e}) - keeping old configuration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_reflects_flag_state() {
        RELOAD_REQUESTED.store(false, Ordering::SeqCst);
        assert!(!pending());
        RELOAD_REQUESTED.store(true, Ordering::SeqCst);
        assert!(pending());
        RELOAD_REQUESTED.store(false, Ordering::SeqCst);
    }

    #[test]
    fn reload_with_missing_path_keeps_old_config() {
        RELOAD_REQUESTED.store(true, Ordering::SeqCst);
        let result = handle_config_reload(Some(std::path::Path::new("/nonexistent/x.toml")));
        assert!(result.is_none());
        assert!(!pending());
    }
}
