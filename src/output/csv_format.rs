//! CSV output formatting.

use crate::job::JobSummary;
use crate::scanner::PortOutcome;
use std::io::{self, Write};

/// Write one row per port outcome.
pub fn write_results_csv<W: Write>(out: &mut W, results: &[PortOutcome]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record(["port", "status", "service", "banner", "latency_ms", "reason"])?;

    for result in results {
        wtr.write_record([
            &result.port.to_string(),
            &result.status.to_string(),
            &result.service,
            &result.banner,
            &result.latency_ms.to_string(),
            result.reason.as_deref().unwrap_or(""),
        ])?;
    }

    wtr.flush()
}

/// Write one row per job.
pub fn write_jobs_csv<W: Write>(out: &mut W, jobs: &[JobSummary]) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);

    wtr.write_record([
        "id",
        "target",
        "port_range",
        "status",
        "progress",
        "total_ports",
        "open_ports",
        "closed_ports",
        "filtered_ports",
        "created_at",
        "completed_at",
    ])?;

    for job in jobs {
        wtr.write_record([
            job.id.to_string(),
            job.target.clone(),
            job.port_range.clone(),
            job.status.to_string(),
            job.progress.to_string(),
            job.total_ports.to_string(),
            job.open_ports.to_string(),
            job.closed_ports.to_string(),
            job.filtered_ports.to_string(),
            job.created_at.to_rfc3339(),
            job.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()
}
