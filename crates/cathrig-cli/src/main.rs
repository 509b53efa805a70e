//! `cathrig` – operator shell for the catheter/guidewire rig.
//!
//! This binary:
//!
//! 1. Loads `~/.cathrig/config.toml`, writing the defaults when the file is
//!    absent.
//! 2. Assembles a [`ClampSystem`][cathrig_kernel::ClampSystem] over the
//!    in-process simulator.
//! 3. Drops the operator into an **interactive shell** with slash-commands
//!    (`/home`, `/move`, `/sync`, `/jaw`, `/grip`, `/status`, `/events`).
//! 4. Intercepts **Ctrl-C** to cancel any motion in progress and exit safely.

mod config;
mod repl;
mod rig;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use cathrig_kernel::MotionGuard;

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG selects the filter (default "info"); CATHRIG_LOG_FORMAT=json
    // switches to newline-delimited JSON.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    if std::env::var("CATHRIG_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .compact()
            .init();
    }

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            match config::save(&config::Config::default()) {
                Ok(()) => println!(
                    "  Wrote default config to {}",
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => warn!(error = %e, "could not write default config"),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };

    // ── Shared shutdown flag and motion guard ─────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let guard = MotionGuard::new(cfg.rig.safety.max_ticks);

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown_clone = shutdown.clone();
    let guard_ctrlc = guard.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping motion …".yellow().bold());
        guard_ctrlc.cancel();
        println!("{}", "  ✓ Motion cancelled.".green());
        println!("{}", "  ✓ Exiting cathrig.".green());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; motion cannot be cancelled from the terminal");
    }

    // ── Rig ───────────────────────────────────────────────────────────────
    let (mut system, sim) = match rig::build(&cfg, guard) {
        Ok(built) => built,
        Err(e) => {
            eprintln!("{}: {}", "Rig error".red().bold(), e);
            std::process::exit(1);
        }
    };
    info!(
        assembly = %cfg.sim.assembly,
        travel_steps = cfg.sim.travel_steps,
        realtime = cfg.sim.realtime,
        "simulated rig ready"
    );

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    // ── Interactive shell ─────────────────────────────────────────────────
    repl::run(&mut system, &sim, shutdown);
}

fn print_banner() {
    println!();
    println!("{}", "  ┌─────────────────────────────────────┐".cyan());
    println!("{}", "  │   cathrig · catheter rig operator   │".cyan().bold());
    println!("{}", "  └─────────────────────────────────────┘".cyan());
    println!("  {}", format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!();
}
