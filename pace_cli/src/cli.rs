//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pace", version, about = "Continuous-culture rig orchestrator")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/pace.toml")]
    pub config: PathBuf,

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

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Service turbidostats and lagoons on their schedules until interrupted
    Run {
        /// Simulated robot and reader, disabled pumps and shaker, short periods
        #[arg(long, action = ArgAction::SetTrue)]
        simulate: bool,
        /// Simulated robot and reader on the real schedule; pumps and shaker stay live
        #[arg(long = "sim-deck", action = ArgAction::SetTrue)]
        sim_deck: bool,
        /// Log pump commands instead of running them
        #[arg(long, action = ArgAction::SetTrue)]
        no_pumps: bool,
        /// Treat the turbidostats as already equilibrated
        #[arg(long, action = ArgAction::SetTrue)]
        no_equilibrate: bool,
        /// Stop after this many routine firings (smoke runs)
        #[arg(long, value_name = "N")]
        max_firings: Option<usize>,
    },
    /// Build the station against simulated devices and run start-up once
    SelfCheck,
    /// Parse and validate the config, then exit
    Validate,
}
