//! `wlblurd`: compositor-agnostic background-blur daemon.
//!
//! Mirrors `main()` in the reference `wlblurd/src/main.c`: installs
//! `SIGTERM`/`SIGINT` handlers for graceful shutdown, ignores `SIGPIPE`,
//! binds the control socket, creates the GPU context, and hands off to the
//! event loop until a termination signal is observed. Initialization
//! failures (config, socket bind, GPU context/shader compile) are fatal —
//! the process exits non-zero; per-request failures never reach this file.

mod client;
mod config;
mod dispatch;
mod node;
mod reload;
mod server;

use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};

use server::Server;

/// Compositor-agnostic background-blur daemon for Wayland.
#[derive(Parser, Debug)]
#[command(name = "wlblurd", version, about)]
struct Args {
    /// Path to a TOML configuration file. Defaults to the first of
    /// `$XDG_CONFIG_HOME/wlblur/config.toml`, `~/.config/wlblur/config.toml`,
    /// `/etc/wlblur/config.toml` that exists, then hardcoded defaults.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Overrides the configuration file's `log_level` (`error`, `warn`,
    /// `info`, or `debug`).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

static RUNNING: AtomicBool = AtomicBool::new(true);

extern "C" fn terminate_handler(_: i32) {
    RUNNING.store(false, Ordering::SeqCst);
}

/// Installs `SIGTERM`/`SIGINT` handlers that clear [`RUNNING`] and ignores
/// `SIGPIPE` (a broken client pipe must tear down only that client, handled
/// at the write call site, not kill the daemon).
///
/// # Safety
/// Registers process-wide signal dispositions; must run once at startup
/// before any other thread or signal handler touches them.
unsafe fn install_signal_handlers() -> nix::Result<()> {
    let terminate = SigAction::new(
        SigHandler::Handler(terminate_handler),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    signal::sigaction(Signal::SIGTERM, &terminate)?;
    signal::sigaction(Signal::SIGINT, &terminate)?;

    let ignore_pipe = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());
    signal::sigaction(Signal::SIGPIPE, &ignore_pipe)?;

    Ok(())
}

/// Binds a Unix stream socket at `path`, mode 0700, backlog 8, removing any
/// stale file left over from a previous run first.
fn bind_socket(path: &Path) -> std::io::Result<UnixListener> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    let listener = UnixListener::bind(path)?;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))?;
    Ok(listener)
}

fn init_logging(log_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn main() {
    let args = Args::parse();

    let mut cfg = match config::load(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("wlblurd: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(level) = &args.log_level {
        cfg.log_level = level.clone();
    }

    init_logging(&cfg.log_level);
    log::info!("wlblur daemon starting...");

    if let Err(e) = unsafe { install_signal_handlers() } {
        log::error!("failed to install signal handlers: {e}");
        std::process::exit(1);
    }
    if let Err(e) = unsafe { reload::init() } {
        log::error!("failed to install SIGUSR1 reload handler: {e}");
        std::process::exit(1);
    }

    let listener = match bind_socket(&cfg.socket_path) {
        Ok(l) => l,
        Err(e) => {
            log::error!("failed to bind socket at {}: {e}", cfg.socket_path.display());
            std::process::exit(1);
        }
    };
    log::info!("listening on {}", cfg.socket_path.display());

    let mut engine = match wlblur_gpu::BlurEngine::create() {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("GPU engine initialization failed: {e}");
            let _ = std::fs::remove_file(&cfg.socket_path);
            std::process::exit(1);
        }
    };

    let mut server = match Server::bind(listener, cfg.max_nodes_per_client, args.config.clone()) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to initialize event loop: {e}");
            let _ = std::fs::remove_file(&cfg.socket_path);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(&mut engine, &RUNNING) {
        log::error!("event loop terminated abnormally: {e}");
    }

    let _ = std::fs::remove_file(&cfg.socket_path);
    log::info!("shutdown complete");
}
