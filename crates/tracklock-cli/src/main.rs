//! `tracklock` – pointing control client.
//!
//! 1. Loads `~/.tracklock/config.toml` (or `--config`), then applies
//!    `TRACKLOCK_*` env overrides and command-line flags, in that order.
//! 2. Validates everything before opening a socket.
//! 3. Connects to the motion controller and runs one search-and-lock.
//! 4. Intercepts **Ctrl-C**: the search switches the emitter off at its
//!    next waypoint and the session is closed.
//!
//! Exit status: `0` target locked, `1` not found, `2` error.

mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use colored::Colorize;
use tracing::{error, warn};

use tracklock_hal::ControllerSession;
use tracklock_runtime::{SearchController, SearchPhase, init_tracing};
use tracklock_types::{AimError, LockResult};

#[derive(Debug, Parser)]
#[command(name = "tracklock", version, about = "Scan for a target and lock the emitter onto it")]
struct Cli {
    /// Config file (defaults to ~/.tracklock/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Motion controller host.
    #[arg(long)]
    host: Option<String>,

    /// Motion controller port.
    #[arg(long)]
    port: Option<u16>,

    /// Path to the detection script.
    #[arg(long)]
    detector: Option<String>,

    /// Number of raster passes before giving up.
    #[arg(long)]
    max_cycles: Option<u32>,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut config::Config) {
        if let Some(host) = &self.host {
            cfg.controller.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.controller.port = port;
        }
        if let Some(detector) = &self.detector {
            cfg.detector.script = detector.clone();
        }
        if let Some(cycles) = self.max_cycles {
            cfg.scan.max_cycles = cycles;
        }
    }
}

fn main() -> ExitCode {
    // Tracing first: the Tokio runtime is only built afterwards.
    let _guard = init_tracing("tracklock");
    let cli = Cli::parse();

    print_banner();

    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut cfg = match config::load_from(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            return ExitCode::from(2);
        }
    };
    cli.apply(&mut cfg);

    if cli.write_default_config {
        return match config::save_to(&cfg, &path) {
            Ok(()) => {
                println!("  {} Config saved to {}", "✓".green().bold(), path.display().to_string().bold());
                ExitCode::SUCCESS
            }
            Err(e) => {
                println!("{}: {}", "Error saving config".red(), e);
                ExitCode::from(2)
            }
        };
    }

    if let Err(e) = cfg.validate() {
        println!("{}: {}", "Config error".red(), e);
        return ExitCode::from(2);
    }

    // ── Ctrl-C interlock ──────────────────────────────────────────────────
    let abort = Arc::new(AtomicBool::new(false));
    let abort_flag = Arc::clone(&abort);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – switching emitter off …".yellow().bold());
        abort_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the search cannot be interrupted safely");
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start Tokio runtime");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(run(&cfg, abort)) {
        Ok(result) if result.found => {
            println!("  {}", "Target lock sequence complete.".green().bold());
            if let Some(aim) = result.aim {
                println!("    aimed at pan {:.3}° tilt {:.3}° after {} poll(s)", aim.pan, aim.tilt, result.polls);
            }
            ExitCode::SUCCESS
        }
        Ok(result) => {
            println!(
                "  {} ({} pass(es), {} poll(s))",
                "Target not found.".yellow().bold(),
                result.cycles_completed,
                result.polls
            );
            ExitCode::from(1)
        }
        Err(e) => {
            println!("  {}: {}", "Search failed".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

async fn run(cfg: &config::Config, abort: Arc<AtomicBool>) -> Result<LockResult, AimError> {
    let pattern = cfg.scan_pattern()?;
    let detector = cfg.detector()?;
    let search = SearchController::new(cfg.search_config()?)?.with_abort_flag(abort);

    let mut phases = search.subscribe();
    let reporter = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            if phase != SearchPhase::Scanning {
                println!("  » {}", format!("{phase:?}").cyan());
            }
        }
    });

    print!(
        "\n  Connecting to controller at {} … ",
        format!("{}:{}", cfg.controller.host, cfg.controller.port).dimmed()
    );
    let session = match ControllerSession::connect_timeout(
        &cfg.controller.host,
        cfg.controller.port,
        cfg.connect_timeout()?,
    )
    .await
    {
        Ok(session) => {
            println!("{}", "online".green());
            session
        }
        Err(e) => {
            println!("{}", "offline".red());
            reporter.abort();
            return Err(e);
        }
    };

    let result = search.search(&session, &pattern, &detector).await;

    let last = session.read_telemetry();
    println!(
        "  Controller reports pan {:.3}° tilt {:.3}° emitter {}",
        last.pan,
        last.tilt,
        if last.emitter_on { "on" } else { "off" }
    );
    session.close().await;
    drop(search);
    let _ = reporter.await;
    result
}

fn print_banner() {
    println!();
    println!("  {} {}", "tracklock".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Pan/tilt search-and-lock client");
    println!();
}
