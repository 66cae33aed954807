//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error/telemetry output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "rowmetrics", version, about = "Rowing-metrics core CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/rowmetrics.toml")]
    pub config: PathBuf,

    /// Directory the session store (`FileSessionStore`) persists into
    #[arg(long, value_name = "DIR", default_value = "var/rowmetrics/sessions")]
    pub data_dir: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[cfg(target_os = "macos")]
        {
            return RtLock::None;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the live pulse-ingestion → metrics → broadcast pipeline
    Run {
        /// Stop after this many seconds; omit to run until Ctrl-C
        #[arg(long, value_name = "SECONDS")]
        duration_s: Option<u64>,
        /// BCM pin of the flywheel edge input (hardware feature only)
        #[arg(long, value_name = "BCM")]
        flywheel_pin: Option<u8>,
        /// BCM pin of the seat-position edge input (hardware feature only)
        #[arg(long, value_name = "BCM")]
        seat_pin: Option<u8>,
        /// Suppress the per-interval metrics line on stdout
        #[arg(long, action = ArgAction::SetTrue)]
        quiet: bool,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall) for the pulse-ingestion thread
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes for the pulse-ingestion thread.\n\nLinux: Attempts SCHED_FIFO priority, pins to CPU 0, and calls mlockall(MCL_CURRENT|MCL_FUTURE) to lock the process address space into RAM. This reduces page faults and jitter but can impact overall system performance and may require elevated privileges or ulimits (e.g., memlock). Use with care on shared systems.\n\nmacOS: Only mlockall is applied; SCHED_FIFO/affinity are unavailable."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
        /// Real-time CPU index to pin the process to (Linux only)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
    },
    /// Run an inertia spin-up/spin-down calibration and report the fitted moment of inertia
    Calibrate {
        /// Write the fitted moment of inertia back into the config TOML
        #[arg(long, action = ArgAction::SetTrue)]
        apply: bool,
    },
    /// Inspect and manage persisted sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Estimate the flywheel pulse rate and report debounce rejection counts
    SelfCheck,
}

#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List recently persisted session ids
    List,
    /// Show one session's record and sample count
    Show {
        #[arg(value_name = "ID")]
        id: u32,
    },
    /// Delete a persisted session
    Rm {
        #[arg(value_name = "ID")]
        id: u32,
    },
}
