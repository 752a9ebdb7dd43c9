//! Jobs subcommand implementation.
//!
//! Handles `portwatch jobs` for listing, inspecting, cancelling and deleting
//! scan jobs.

use crate::cli::{Context, OutputFormat};
use crate::engine::JobFilter;
use crate::error::{CliError, CliResult};
use crate::job::JobStatus;
use crate::output;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, Write};

/// Inspect and manage scan jobs.
#[derive(Parser, Debug)]
pub struct JobsCommand {
    #[command(subcommand)]
    pub action: JobsAction,
}

/// Job actions. Job ids may be given in full or as a unique prefix.
#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// List jobs, newest first
    #[command(alias = "ls")]
    List {
        /// Only jobs in this status (pending, running, completed, failed, cancelled)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<JobStatus>,

        /// Only jobs created in the last N hours
        #[arg(long, value_name = "HOURS")]
        since_hours: Option<u32>,

        /// Maximum number of jobs to show
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        output: OutputFormat,
    },

    /// Show the status and counts of a job
    Status {
        /// Job ID or prefix
        id: String,
    },

    /// Show a job with its port results
    Results {
        /// Job ID or prefix
        id: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        output: OutputFormat,
    },

    /// Cancel a pending or running job
    Cancel {
        /// Job ID or prefix
        id: String,
    },

    /// Delete a job and its results
    #[command(alias = "rm")]
    Delete {
        /// Job ID or prefix
        id: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show aggregate job statistics
    Stats {
        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        output: OutputFormat,
    },
}

fn parse_status(s: &str) -> Result<JobStatus, String> {
    s.parse()
}

impl JobsCommand {
    /// Execute the jobs command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();

        match &self.action {
            JobsAction::List {
                status,
                since_hours,
                limit,
                output,
            } => {
                let filter = JobFilter {
                    status: *status,
                    since: since_hours.map(|h| Utc::now() - Duration::hours(i64::from(h))),
                    limit: *limit,
                };
                let jobs = ctx.engine.list_jobs(&filter)?;
                output::write_jobs(&mut out, &jobs, *output)?;
            }
            JobsAction::Status { id } => {
                let id = ctx.engine.resolve_job_id(id)?;
                let summary = ctx.engine.get_status(&id)?;
                output::write_job_summary(&mut out, &summary)?;
            }
            JobsAction::Results { id, output } => {
                let id = ctx.engine.resolve_job_id(id)?;
                let job = ctx.engine.get_full_results(&id)?;
                output::write_report(&mut out, &job, *output)?;
            }
            JobsAction::Cancel { id } => {
                let id = ctx.engine.resolve_job_id(id)?;
                let summary = ctx.engine.cancel(&id)?;
                if summary.status == JobStatus::Cancelled {
                    if !ctx.quiet {
                        output::print_success(&format!("Job {} cancelled", id.short()));
                    }
                } else {
                    output::print_warning(&format!(
                        "Job {} already finished ({})",
                        id.short(),
                        summary.status
                    ));
                }
            }
            JobsAction::Delete { id, yes } => {
                let id = ctx.engine.resolve_job_id(id)?;
                if !*yes && !confirm(&mut out, &format!("Delete job {}?", id.short()))? {
                    writeln!(out, "Cancelled.")?;
                    return Ok(());
                }
                ctx.engine.delete(&id)?;
                if !ctx.quiet {
                    output::print_success(&format!("Job {} deleted", id.short()));
                }
            }
            JobsAction::Stats { output } => {
                let stats = ctx.engine.dashboard(Utc::now())?;
                match output {
                    OutputFormat::Plain => output::write_dashboard(&mut out, &stats)?,
                    OutputFormat::Json => output::write_json(&mut out, &stats)?,
                    OutputFormat::Csv => {
                        return Err(CliError::Other(
                            "statistics are not available as CSV".to_string(),
                        ))
                    }
                }
            }
        }

        Ok(())
    }
}

/// Ask a yes/no question on the terminal; anything but "y" is no.
pub(crate) fn confirm<W: Write>(out: &mut W, question: &str) -> CliResult<bool> {
    write!(out, "{} [y/N] ", question)?;
    out.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(args: &[&str]) -> JobsAction {
        let mut argv = vec!["portwatch", "jobs"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Jobs(cmd) => cmd.action,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_list_filters() {
        match parse(&["list", "--status", "running", "--since-hours", "24"]) {
            JobsAction::List {
                status, since_hours, ..
            } => {
                assert_eq!(status, Some(JobStatus::Running));
                assert_eq!(since_hours, Some(24));
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_bad_status_rejected() {
        assert!(Cli::try_parse_from(["portwatch", "jobs", "list", "--status", "done"]).is_err());
    }

    #[test]
    fn test_parse_delete() {
        assert!(matches!(
            parse(&["rm", "1a2b3c4d", "-y"]),
            JobsAction::Delete { yes: true, .. }
        ));
    }
}
