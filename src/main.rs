use clap::Parser;
use portwatch::cli::Cli;
use portwatch::output;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Default log filter; `RUST_LOG` takes precedence when set.
fn default_filter(cli: &Cli) -> &'static str {
    if cli.verbose {
        "portwatch=debug"
    } else if cli.quiet {
        "portwatch=warn"
    } else {
        "portwatch=info"
    }
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter(cli)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(&cli) {
        output::print_warning(&format!("logging disabled: {e:#}"));
    }

    match cli.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&format!("{:#}", anyhow::Error::from(e)));
            ExitCode::FAILURE
        }
    }
}
