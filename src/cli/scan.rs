//! Scan subcommand implementation.
//!
//! Handles the `portwatch scan <target>` command: creates a job, follows its
//! progress, and prints the results once it finishes.

use crate::cli::{Context, OutputFormat};
use crate::error::{CliError, CliResult};
use crate::job::{JobStatus, JobSummary};
use crate::output;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Scan a target for open ports.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Target to scan (IP address or hostname)
    ///
    /// Examples:
    ///   192.168.1.1        IPv4 address
    ///   ::1                IPv6 address
    ///   example.com        Hostname
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Ports to scan: "common", "all", or a list like "22,80,8000-8100"
    #[arg(short, long, default_value = "common")]
    pub ports: String,

    /// Output format for results
    #[arg(short, long, value_enum, default_value = "plain")]
    pub output: OutputFormat,

    /// Queue the job for a running daemon instead of scanning now
    #[arg(long)]
    pub detach: bool,

    /// Show only open ports in the results
    #[arg(long)]
    pub open_only: bool,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<()> {
        if self.detach {
            let job = ctx.engine.enqueue_job(&self.target, &self.ports)?;
            if ctx.quiet {
                println!("{}", job.id);
            } else {
                output::print_success(&format!(
                    "Queued scan job {} ({} ports on {})",
                    job.id.short(),
                    job.total_ports,
                    job.target
                ));
                output::print_info("It will start when `portwatch daemon` next ticks.");
            }
            return Ok(());
        }

        let job = ctx.engine.create_job(&self.target, &self.ports)?;
        let interactive = !ctx.quiet && self.output == OutputFormat::Plain;
        if interactive {
            print_scan_header(&job);
        }

        let summary = self.follow(ctx, &job, interactive).await?;

        let mut record = ctx.engine.get_full_results(&job.id)?;
        if self.open_only {
            record.results.retain(|r| r.is_open());
        }
        output::write_report(&mut io::stdout().lock(), &record, self.output)?;

        match summary.status {
            JobStatus::Failed => Err(CliError::Other(format!(
                "scan failed: {}",
                summary.error_message.unwrap_or_default()
            ))),
            JobStatus::Cancelled => Err(CliError::Other("scan cancelled".to_string())),
            _ => Ok(()),
        }
    }

    /// Poll the job until it finishes, cancelling it on Ctrl-C.
    async fn follow(&self, ctx: &Context, job: &JobSummary, show: bool) -> CliResult<JobSummary> {
        let bar = if show {
            progress_bar(job.total_ports as u64)
        } else {
            ProgressBar::hidden()
        };

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        let summary = loop {
            tokio::select! {
                _ = &mut ctrl_c => {
                    bar.abandon_with_message("interrupted");
                    output::print_warning("Interrupted, cancelling scan...");
                    ctx.engine.cancel(&job.id)?;
                    // Let the coordinator observe the cancellation.
                    break ctx.engine.wait_for(&job.id, POLL_INTERVAL).await?;
                }
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    let status = ctx.engine.get_status(&job.id)?;
                    bar.set_position(status.scanned_ports as u64);
                    if status.status.is_terminal() {
                        break status;
                    }
                }
            }
        };

        bar.finish_and_clear();
        Ok(summary)
    }
}

fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_scan_header(job: &JobSummary) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("portwatch").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{} Job: {}", style("•").dim(), style(job.id.short()).yellow());
    println!("{} Target: {}", style("•").dim(), style(&job.target).white().bold());
    println!(
        "{} Scanning {} ports ({})...",
        style("•").dim(),
        style(job.total_ports).white().bold(),
        job.port_range
    );
    println!();
}
