#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! CLI entrypoint for the rowing-metrics core.
//!
//! Responsibilities:
//! - Parse config/flags and assemble the pulse source (GPIO or simulated)
//! - Initialize tracing and manage log sinks
//! - Offer `--json` mode emitting stable JSON lines to stdout (logs to stderr)
//! - Provide optional RT helpers via libc on supported OSes, with safety docs
//! - Map domain errors to stable exit codes

mod calibrate;
mod cli;
mod error_fmt;
mod rt;
mod run;
mod selfcheck;
mod sessions;
mod tracing_setup;

use std::fs;

use clap::Parser;
use rowmetrics_config::Config;

use cli::{Cli, Commands, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use tracing_setup::init_tracing;

fn main() -> eyre::Result<()> {
    let _ = color_eyre::install();

    let shutdown = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let shutdown_clone = std::sync::Arc::clone(&shutdown);

    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived shutdown signal, stopping gracefully...");
        shutdown_clone.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        eprintln!("Warning: Failed to set signal handler: {e}");
    }

    if let Err(e) = real_main(shutdown) {
        let json = *JSON_MODE.get().unwrap_or(&false);
        let code = exit_code_for_error(&e);
        if json {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(code);
    }
    Ok(())
}

fn real_main(shutdown: std::sync::Arc<std::sync::atomic::AtomicBool>) -> eyre::Result<()> {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    let cfg_text = fs::read_to_string(&cli.config)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", cli.config, e))?;
    let cfg: Config = rowmetrics_config::load_toml(&cfg_text)
        .map_err(|e| eyre::eyre!("parse config {:?}: {}", cli.config, e))?;
    cfg.validate().map_err(|e| eyre::eyre!("invalid configuration: {}", e))?;

    init_tracing(cli.json, &cli.log_level, cfg.logging.file.as_deref());

    fs::create_dir_all(&cli.data_dir)
        .map_err(|e| eyre::eyre!("create data dir {:?}: {}", cli.data_dir, e))?;

    match cli.cmd {
        Commands::Run {
            duration_s,
            flywheel_pin,
            seat_pin,
            quiet,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => run::run(
            &cfg,
            &cli.data_dir,
            duration_s,
            flywheel_pin,
            seat_pin,
            quiet,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
            shutdown,
        ),
        Commands::Calibrate { apply } => {
            calibrate::run(&cfg, &cli.config, apply, None, shutdown)
        }
        Commands::Sessions { action } => sessions::run(&cfg, &cli.data_dir, action, cli.json),
        Commands::SelfCheck => selfcheck::run(&cfg, None, None),
    }
}
