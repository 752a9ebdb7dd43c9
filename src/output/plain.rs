//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::engine::DashboardStats;
use crate::job::{JobStatus, JobSummary, ScanJob};
use crate::scanner::PortStatus;
use crate::scheduler::ScheduleDefinition;
use chrono::{DateTime, Utc};
use console::{style, Style};
use std::io::{self, Write};

const HEAVY_RULE: &str = "═══════════════════════════════════════════════════════════════";
const LIGHT_RULE: &str = "───────────────────────────────────────────────────────────────";

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Completed => Style::new().green().bold(),
        JobStatus::Running => Style::new().cyan(),
        JobStatus::Pending => Style::new().dim(),
        JobStatus::Failed => Style::new().red().bold(),
        JobStatus::Cancelled => Style::new().yellow(),
    }
}

fn timestamp(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Write a full report for one job, including its port table.
pub fn write_job_report<W: Write>(out: &mut W, job: &ScanJob) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", style(HEAVY_RULE).cyan())?;
    writeln!(
        out,
        "                  {} Scan Report",
        style("portwatch").cyan().bold()
    )?;
    writeln!(out, "{}", style(HEAVY_RULE).cyan())?;
    writeln!(out)?;

    write_job_summary(out, &job.summary())?;
    writeln!(out)?;

    if job.results.is_empty() {
        writeln!(out, "  {}", style("No ports to display.").dim())?;
    } else {
        writeln!(out, "  {}", style(LIGHT_RULE).dim())?;
        writeln!(
            out,
            "  {:>6}  {:^10}  {:<15}  {}",
            style("PORT").bold(),
            style("STATE").bold(),
            style("SERVICE").bold(),
            style("BANNER").bold()
        )?;
        writeln!(out, "  {}", style(LIGHT_RULE).dim())?;

        for result in &job.results {
            let state = match result.status {
                PortStatus::Open => Style::new().green().bold(),
                PortStatus::Closed => Style::new().red(),
                PortStatus::Filtered => Style::new().yellow(),
            };
            let banner = result.banner.lines().next().unwrap_or_default();

            writeln!(
                out,
                "  {:>6}  {:^10}  {:<15}  {}",
                result.port,
                state.apply_to(result.status.to_string()),
                result.service,
                style(truncate_string(banner, 35)).dim()
            )?;
        }

        writeln!(out, "  {}", style(LIGHT_RULE).dim())?;
    }

    writeln!(out)?;
    writeln!(out, "{}", style(HEAVY_RULE).cyan())?;
    writeln!(out)
}

/// Write the header fields and counts of one job.
pub fn write_job_summary<W: Write>(out: &mut W, job: &JobSummary) -> io::Result<()> {
    writeln!(out, "  {} {}", style("Job ID:").bold(), style(job.id).dim())?;
    writeln!(out, "  {} {}", style("Target:").bold(), job.target)?;
    writeln!(out, "  {} {}", style("Ports:").bold(), job.port_range)?;
    writeln!(
        out,
        "  {} {} ({}%)",
        style("Status:").bold(),
        status_style(job.status).apply_to(job.status),
        job.progress
    )?;
    writeln!(out, "  {} {}", style("Created:").bold(), timestamp(Some(job.created_at)))?;
    writeln!(out, "  {} {}", style("Completed:").bold(), timestamp(job.completed_at))?;
    if let Some(error) = &job.error_message {
        writeln!(out, "  {} {}", style("Error:").red().bold(), error)?;
    }
    writeln!(out)?;

    let stats = &job.statistics;
    writeln!(
        out,
        "  {} {} of {} ports scanned",
        style("Statistics:").bold(),
        job.scanned_ports,
        job.total_ports
    )?;
    writeln!(
        out,
        "              {} open ({:.1}%), {} closed ({:.1}%), {} filtered ({:.1}%)",
        style(job.open_ports).green().bold(),
        stats.open_percentage,
        style(job.closed_ports).red(),
        stats.closed_percentage,
        style(job.filtered_ports).yellow(),
        stats.filtered_percentage
    )
}

/// Write one line per job.
pub fn write_job_table<W: Write>(out: &mut W, jobs: &[JobSummary]) -> io::Result<()> {
    if jobs.is_empty() {
        return writeln!(out, "{}", style("No scan jobs found.").dim());
    }

    writeln!(
        out,
        "{:<8}  {:<9}  {:>4}  {:<24}  {:>5}  {:<19}  {}",
        style("ID").bold(),
        style("STATUS").bold(),
        style("DONE").bold(),
        style("TARGET").bold(),
        style("OPEN").bold(),
        style("CREATED").bold(),
        style("PORTS").bold()
    )?;
    for job in jobs {
        writeln!(
            out,
            "{:<8}  {:<9}  {:>3}%  {:<24}  {:>5}  {:<19}  {}",
            job.id.short(),
            status_style(job.status).apply_to(job.status),
            job.progress,
            truncate_string(&job.target, 24),
            job.open_ports,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
            truncate_string(&job.port_range, 30)
        )?;
    }
    Ok(())
}

/// Write one line per schedule definition.
pub fn write_schedule_table<W: Write>(out: &mut W, defs: &[ScheduleDefinition]) -> io::Result<()> {
    if defs.is_empty() {
        return writeln!(out, "{}", style("No schedules defined.").dim());
    }

    writeln!(
        out,
        "{:<8}  {:<20}  {:<8}  {:<24}  {:<12}  {}",
        style("ID").bold(),
        style("NAME").bold(),
        style("ENABLED").bold(),
        style("TARGET").bold(),
        style("TRIGGER").bold(),
        style("LAST RUN").bold()
    )?;
    for def in defs {
        let enabled = if def.enabled {
            style("yes").green()
        } else {
            style("no").dim()
        };
        writeln!(
            out,
            "{:<8}  {:<20}  {:<8}  {:<24}  {:<12}  {}",
            def.id.short(),
            truncate_string(&def.name, 20),
            enabled,
            truncate_string(&def.target, 24),
            def.trigger.as_deref().unwrap_or("-"),
            timestamp(def.last_run_at)
        )?;
    }
    Ok(())
}

/// Write every field of one schedule definition.
pub fn write_schedule<W: Write>(out: &mut W, def: &ScheduleDefinition) -> io::Result<()> {
    writeln!(out, "{}", style(&def.name).cyan().bold())?;
    writeln!(out, "  {} {}", style("ID:").bold(), style(def.id).dim())?;
    writeln!(out, "  {} {}", style("Target:").bold(), def.target)?;
    writeln!(out, "  {} {}", style("Ports:").bold(), def.port_range)?;
    writeln!(
        out,
        "  {} {}",
        style("Trigger:").bold(),
        def.trigger.as_deref().unwrap_or("(fixed interval)")
    )?;
    writeln!(out, "  {} {}", style("Enabled:").bold(), def.enabled)?;
    writeln!(out, "  {} {}", style("Created:").bold(), timestamp(Some(def.created_at)))?;
    writeln!(out, "  {} {}", style("Last run:").bold(), timestamp(def.last_run_at))?;
    writeln!(out, "  {} {}", style("Next run:").bold(), timestamp(def.next_run_at))
}

/// Write aggregate job counts and the recent job list.
pub fn write_dashboard<W: Write>(out: &mut W, stats: &DashboardStats) -> io::Result<()> {
    writeln!(out, "{}", style("Scan statistics").cyan().bold())?;
    writeln!(out, "  {:<18} {}", "Total scans:", stats.total_scans)?;
    writeln!(out, "  {:<18} {}", "Last 24 hours:", stats.scans_last_24h)?;
    writeln!(out, "  {:<18} {}", "Last 7 days:", stats.scans_last_7d)?;
    writeln!(out, "  {:<18} {}", "Running:", style(stats.running_scans).cyan())?;
    writeln!(out, "  {:<18} {}", "Completed:", style(stats.completed_scans).green())?;
    writeln!(out, "  {:<18} {}", "Failed:", style(stats.failed_scans).red())?;
    writeln!(out, "  {:<18} {}", "Cancelled:", style(stats.cancelled_scans).yellow())?;
    writeln!(out)?;
    writeln!(out, "{}", style("Recent scans").cyan().bold())?;
    write_job_table(out, &stats.recent_scans)
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print a success message.
pub fn print_success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum number of characters, adding an ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::PortOutcome;
    use crate::types::Port;

    fn render<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> String {
        console::set_colors_enabled(false);
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ßßßßßß", 5), "ßß...");
    }

    #[test]
    fn test_job_report() {
        let mut job = ScanJob::pending("10.0.0.1", "22,9999", 2);
        job.mark_running().unwrap();
        job.complete(vec![
            PortOutcome::open(
                Port::new(22).unwrap(),
                "SSH",
                "SSH-2.0-OpenSSH_8.9\nsecond line".to_string(),
                2,
            ),
            PortOutcome::closed(Port::new(9999).unwrap(), 1),
        ])
        .unwrap();

        let text = render(|out| write_job_report(out, &job));
        assert!(text.contains("10.0.0.1"));
        assert!(text.contains("COMPLETED"));
        assert!(text.contains("SSH-2.0-OpenSSH_8.9"));
        assert!(!text.contains("second line"));
        assert!(text.contains("1 open (50.0%)"));
    }

    #[test]
    fn test_empty_tables() {
        assert!(render(|out| write_job_table(out, &[])).contains("No scan jobs"));
        assert!(render(|out| write_schedule_table(out, &[])).contains("No schedules"));
    }

    #[test]
    fn test_schedule_table() {
        let def = ScheduleDefinition::new("nightly", "10.0.0.1", "common").with_trigger("@daily");
        let text = render(|out| write_schedule_table(out, &[def.clone()]));
        assert!(text.contains("nightly"));
        assert!(text.contains("@daily"));
        assert!(text.contains(&def.id.short()));
    }
}
