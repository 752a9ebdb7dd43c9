//! CLI subcommand definitions and handlers.
//!
//! Implements a git-like subcommand architecture:
//! - `portwatch scan <target>` - Scan a target
//! - `portwatch jobs list|status|results|cancel|delete|stats` - Inspect scan jobs
//! - `portwatch export <job-id>` - Export job results
//! - `portwatch schedules list|show|create|update|toggle|delete` - Manage schedules
//! - `portwatch daemon` - Run scheduled and queued scans

mod daemon;
mod export;
mod jobs;
mod scan;
mod schedules;

pub use daemon::DaemonCommand;
pub use export::ExportCommand;
pub use jobs::JobsCommand;
pub use scan::ScanCommand;
pub use schedules::SchedulesCommand;

use crate::config::{Paths, Settings};
use crate::engine::ScanEngine;
use crate::error::CliResult;
use crate::storage::{JsonJobStore, JsonScheduleStore, ScheduleStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

/// portwatch - port scan jobs with banner grabbing and scheduled rescans.
///
/// Scans run as persistent jobs: each one is stored, can be inspected while
/// it runs, and keeps its results for later export. Schedules re-run a scan
/// periodically while `portwatch daemon` is running.
#[derive(Parser, Debug)]
#[command(name = "portwatch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Port scan jobs with service identification and scheduling", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a settings file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding jobs and schedules
    #[arg(long, global = true, value_name = "DIR", env = "PORTWATCH_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a target for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Inspect and manage scan jobs
    #[command(alias = "j")]
    Jobs(JobsCommand),

    /// Export job results
    #[command(alias = "e")]
    Export(ExportCommand),

    /// Manage scheduled scans
    #[command(alias = "sc")]
    Schedules(SchedulesCommand),

    /// Run scheduled and queued scans until interrupted
    #[command(alias = "d")]
    Daemon(DaemonCommand),
}

impl Cli {
    /// Open the stores and run the selected subcommand.
    pub async fn run(self) -> CliResult<()> {
        let ctx = Context::open(&self)?;
        match &self.command {
            Commands::Scan(cmd) => cmd.execute(&ctx).await,
            Commands::Jobs(cmd) => cmd.execute(&ctx),
            Commands::Export(cmd) => cmd.execute(&ctx),
            Commands::Schedules(cmd) => cmd.execute(&ctx),
            Commands::Daemon(cmd) => cmd.execute(&ctx).await,
        }
    }
}

/// Everything a subcommand needs, opened once per invocation.
pub struct Context {
    pub paths: Paths,
    pub settings: Settings,
    pub engine: Arc<ScanEngine>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub quiet: bool,
}

impl Context {
    /// Resolve directories, load settings and open the JSON stores.
    pub fn open(cli: &Cli) -> CliResult<Self> {
        let mut paths = Paths::discover()?;
        if let Some(dir) = &cli.data_dir {
            paths = paths.with_data_dir(dir)?;
        }

        let settings = match &cli.config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load(&paths)?,
        };

        let jobs = Arc::new(JsonJobStore::open(paths.jobs_dir())?);
        let schedules = Arc::new(JsonScheduleStore::open(paths.schedules_dir())?);
        let engine = Arc::new(ScanEngine::with_tcp(jobs, &settings.scanner_config()));

        Ok(Self {
            paths,
            settings,
            engine,
            schedules,
            quiet: cli.quiet,
        })
    }
}

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}
