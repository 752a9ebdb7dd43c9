//! Schedules subcommand implementation.
//!
//! Handles the `portwatch schedules` command for managing recurring scans.

use crate::cli::jobs::confirm;
use crate::cli::{Context, OutputFormat};
use crate::error::CliResult;
use crate::output;
use crate::scheduler::{ScheduleDefinition, ScheduleManager, ScheduleUpdate};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::sync::Arc;

/// Manage scheduled scans.
#[derive(Parser, Debug)]
pub struct SchedulesCommand {
    #[command(subcommand)]
    pub action: SchedulesAction,
}

/// Schedule actions. Schedules are addressed by name or id prefix.
#[derive(Subcommand, Debug)]
pub enum SchedulesAction {
    /// List all schedules
    #[command(alias = "ls")]
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        output: OutputFormat,
    },

    /// Show details of a schedule
    Show {
        /// Schedule name or ID prefix
        schedule: String,
    },

    /// Create a new schedule
    Create {
        /// Unique schedule name
        name: String,

        /// Target to scan
        target: String,

        /// Ports to scan
        #[arg(short, long, default_value = "common")]
        ports: String,

        /// Trigger expression (@hourly, @daily, @weekly, @every 30m)
        #[arg(short, long)]
        trigger: Option<String>,

        /// Create the schedule disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Change fields of a schedule
    Update {
        /// Schedule name or ID prefix
        schedule: String,

        /// New name
        #[arg(long)]
        name: Option<String>,

        /// New target
        #[arg(long)]
        target: Option<String>,

        /// New port specification
        #[arg(short, long)]
        ports: Option<String>,

        /// New trigger expression
        #[arg(short, long, conflicts_with = "clear_trigger")]
        trigger: Option<String>,

        /// Remove the trigger expression
        #[arg(long)]
        clear_trigger: bool,
    },

    /// Enable a disabled schedule or disable an enabled one
    Toggle {
        /// Schedule name or ID prefix
        schedule: String,
    },

    /// Delete a schedule
    #[command(alias = "rm")]
    Delete {
        /// Schedule name or ID prefix
        schedule: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

impl SchedulesCommand {
    /// Execute the schedules command.
    pub fn execute(&self, ctx: &Context) -> CliResult<()> {
        let manager = ScheduleManager::new(Arc::clone(&ctx.schedules));
        let stdout = io::stdout();
        let mut out = stdout.lock();

        match &self.action {
            SchedulesAction::List { output } => {
                let defs = manager.list()?;
                match output {
                    OutputFormat::Json => output::write_json(&mut out, &defs)?,
                    _ => output::write_schedule_table(&mut out, &defs)?,
                }
            }
            SchedulesAction::Show { schedule } => {
                output::write_schedule(&mut out, &manager.get(schedule)?)?;
            }
            SchedulesAction::Create {
                name,
                target,
                ports,
                trigger,
                disabled,
            } => {
                let mut def = ScheduleDefinition::new(name.as_str(), target.as_str(), ports.as_str());
                def.trigger = trigger.clone();
                def.enabled = !disabled;
                let def = manager.create(def)?;
                if !ctx.quiet {
                    output::print_success(&format!(
                        "Schedule '{}' created ({})",
                        def.name,
                        def.id.short()
                    ));
                }
            }
            SchedulesAction::Update {
                schedule,
                name,
                target,
                ports,
                trigger,
                clear_trigger,
            } => {
                let trigger = if *clear_trigger {
                    Some(None)
                } else {
                    trigger.clone().map(Some)
                };
                let update = ScheduleUpdate {
                    name: name.clone(),
                    target: target.clone(),
                    port_range: ports.clone(),
                    trigger,
                    enabled: None,
                };
                let def = manager.update(schedule, update)?;
                if !ctx.quiet {
                    output::print_success(&format!("Schedule '{}' updated", def.name));
                }
            }
            SchedulesAction::Toggle { schedule } => {
                let def = manager.toggle(schedule)?;
                if !ctx.quiet {
                    let state = if def.enabled { "enabled" } else { "disabled" };
                    output::print_success(&format!("Schedule '{}' {}", def.name, state));
                }
            }
            SchedulesAction::Delete { schedule, yes } => {
                let def = manager.get(schedule)?;
                if !*yes && !confirm(&mut out, &format!("Delete schedule '{}'?", def.name))? {
                    writeln!(out, "Cancelled.")?;
                    return Ok(());
                }
                manager.delete(&def.id.to_string())?;
                if !ctx.quiet {
                    output::print_success(&format!("Schedule '{}' deleted", def.name));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> SchedulesAction {
        let mut argv = vec!["portwatch", "schedules"];
        argv.extend_from_slice(args);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Schedules(cmd) => cmd.action,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_create() {
        match parse(&["create", "nightly", "10.0.0.1", "-p", "1-1024", "-t", "@daily"]) {
            SchedulesAction::Create {
                name,
                ports,
                trigger,
                disabled,
                ..
            } => {
                assert_eq!(name, "nightly");
                assert_eq!(ports, "1-1024");
                assert_eq!(trigger.as_deref(), Some("@daily"));
                assert!(!disabled);
            }
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_trigger_flags_conflict() {
        assert!(Cli::try_parse_from([
            "portwatch",
            "schedules",
            "update",
            "nightly",
            "-t",
            "@daily",
            "--clear-trigger"
        ])
        .is_err());
    }
}
