//! Export subcommand implementation.
//!
//! Handles the `portwatch export <job-id>` command for exporting job results.

use crate::cli::{Context, OutputFormat};
use crate::error::CliResult;
use crate::output;
use crate::scanner::PortStatus;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

/// Export job results.
#[derive(Parser, Debug)]
pub struct ExportCommand {
    /// Job ID or prefix to export
    ///
    /// Can be a full UUID or the first few characters (short ID).
    #[arg(value_name = "JOB_ID")]
    pub job_id: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// Output file path (prints to stdout if not specified)
    #[arg(short = 'o', long = "output")]
    pub output_file: Option<PathBuf>,

    /// Include closed ports in export
    #[arg(long, conflicts_with = "open_only")]
    pub include_closed: bool,

    /// Export only open ports
    #[arg(long)]
    pub open_only: bool,
}

impl ExportCommand {
    /// Execute the export command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let id = ctx.engine.resolve_job_id(&self.job_id)?;
        let mut job = ctx.engine.get_full_results(&id)?;

        if self.open_only {
            job.results.retain(|r| r.is_open());
        } else if !self.include_closed {
            job.results.retain(|r| r.status != PortStatus::Closed);
        }

        match &self.output_file {
            Some(path) => {
                // Files get plain bytes, never terminal escapes.
                console::set_colors_enabled(false);
                let mut out = BufWriter::new(File::create(path)?);
                output::write_report(&mut out, &job, self.format)?;
                out.flush()?;

                if !ctx.quiet {
                    output::print_success(&format!(
                        "Exported job {} to {}",
                        id.short(),
                        path.display()
                    ));
                }
            }
            None => output::write_report(&mut io::stdout().lock(), &job, self.format)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};

    fn parse(args: &[&str]) -> ExportCommand {
        let mut argv = vec!["portwatch", "export"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Export(cmd) => cmd,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_defaults_to_json_on_stdout() {
        let cmd = parse(&["1a2b3c4d"]);
        assert_eq!(cmd.job_id, "1a2b3c4d");
        assert_eq!(cmd.format, OutputFormat::Json);
        assert!(cmd.output_file.is_none());
        assert!(!cmd.open_only && !cmd.include_closed);
    }

    #[test]
    fn test_csv_to_file() {
        let cmd = parse(&["1a2b3c4d", "-f", "csv", "-o", "out.csv", "--open-only"]);
        assert_eq!(cmd.format, OutputFormat::Csv);
        assert_eq!(cmd.output_file, Some(PathBuf::from("out.csv")));
        assert!(cmd.open_only);
    }

    #[test]
    fn test_closed_filters_conflict() {
        assert!(Cli::try_parse_from([
            "portwatch",
            "export",
            "1a2b3c4d",
            "--open-only",
            "--include-closed"
        ])
        .is_err());
    }
}
