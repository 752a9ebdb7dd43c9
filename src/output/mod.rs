//! Output formatting module.
//!
//! Renders jobs, schedules and dashboard figures as plain text, JSON, or CSV.
//! Every renderer writes to an `io::Write`, so the same code backs terminal
//! output and file export.

mod csv_format;
mod json_format;
mod plain;

pub use csv_format::{write_jobs_csv, write_results_csv};
pub use json_format::write_json;
pub use plain::{
    print_error, print_info, print_success, print_warning, write_dashboard, write_job_report,
    write_job_summary, write_job_table, write_schedule, write_schedule_table,
};

use crate::cli::OutputFormat;
use crate::job::{JobSummary, ScanJob};
use std::io::{self, Write};

/// Render a job with its outcomes.
pub fn write_report<W: Write>(out: &mut W, job: &ScanJob, format: OutputFormat) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_job_report(out, job),
        OutputFormat::Json => write_json(out, job),
        OutputFormat::Csv => write_results_csv(out, &job.results),
    }
}

/// Render a list of job summaries.
pub fn write_jobs<W: Write>(
    out: &mut W,
    jobs: &[JobSummary],
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_job_table(out, jobs),
        OutputFormat::Json => write_json(out, &jobs),
        OutputFormat::Csv => write_jobs_csv(out, jobs),
    }
}
