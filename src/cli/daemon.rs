//! Daemon subcommand implementation.
//!
//! Runs the schedule trigger loop and starts queued jobs until Ctrl-C.

use crate::cli::Context;
use crate::error::CliResult;
use crate::output;
use crate::scheduler::ScheduleTrigger;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Run scheduled and queued scans until interrupted.
#[derive(Parser, Debug)]
pub struct DaemonCommand {
    /// Seconds between schedule evaluations (overrides settings)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick: Option<u64>,
}

impl DaemonCommand {
    /// Execute the daemon command.
    pub async fn execute(&self, ctx: &Context) -> CliResult<()> {
        let mut config = ctx.settings.trigger_config();
        if let Some(secs) = self.tick {
            config.tick = Duration::from_secs(secs);
        }

        let trigger = ScheduleTrigger::new(
            Arc::clone(&ctx.engine),
            Arc::clone(&ctx.schedules),
            &config,
        );
        let shutdown = CancellationToken::new();

        if !ctx.quiet {
            output::print_info(&format!(
                "portwatch daemon running (data in {}), press Ctrl-C to stop",
                ctx.paths.data_dir.display()
            ));
        }
        info!(policy = ?config.policy, tick_secs = config.tick.as_secs(), "daemon started");

        let engine = Arc::clone(&ctx.engine);
        let queue_shutdown = shutdown.clone();
        let tick = config.tick;
        let queue = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = queue_shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = engine.start_queued() {
                            warn!(error = %e, "could not start queued jobs");
                        }
                    }
                }
            }
        });

        tokio::select! {
            _ = trigger.run(shutdown.clone()) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("shutdown requested");
            }
        }

        shutdown.cancel();
        // No queued job can start once the runner is gone.
        join_queue(queue).await;
        ctx.engine.cancel_all();

        // Running jobs record their cancellation on the way out.
        while ctx.engine.active_jobs() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        if !ctx.quiet {
            output::print_success("Daemon stopped");
        }
        Ok(())
    }
}

/// Wait for the queue task, reporting whether it ended cleanly.
async fn join_queue(queue: JoinHandle<()>) -> bool {
    match queue.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "queued job runner ended abnormally");
            false
        }
    }
}
