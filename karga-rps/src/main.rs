use std::{io, process::ExitCode};

use clap::Parser;
use karga_rps::{
    transport, watch_interrupts, Banner, Cli, OutputFormat, RequestExecutor, Scheduler, Summary,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit status of a run stopped by Ctrl-C, as a shell would report it.
const EXIT_INTERRUPTED: u8 = 130;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

async fn run(cli: &Cli) -> karga_rps::Result<Summary> {
    let config = cli.load_config()?;
    let executor = RequestExecutor::new(transport(&config)?, &config)?;

    let banner = Banner::from(&config);
    tracing::info!(
        url = %executor.target(),
        method = %config.method,
        rate = %config.rate,
        duration_secs = banner.duration_secs,
        total_requests = banner.total_requests,
        "load test configured"
    );
    if cli.output == OutputFormat::Human {
        println!("{banner}");
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match watch_interrupts(interrupt, tokio::signal::ctrl_c).await {
            Ok(()) => std::process::exit(EXIT_INTERRUPTED.into()),
            Err(err) => tracing::warn!(error = %err, "unable to listen for interrupts"),
        }
    });

    Ok(Scheduler::new(executor, &config)
        .with_cancellation(cancel)
        .run()
        .await)
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let summary = match run(&cli).await {
        Ok(summary) => summary,
        Err(err) => {
            tracing::error!(error = %err, "load test aborted");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = summary.write_to(cli.output, io::stdout().lock()) {
        tracing::error!(error = %err, "failed to write summary");
        return ExitCode::FAILURE;
    }

    if summary.interrupted {
        ExitCode::from(EXIT_INTERRUPTED)
    } else {
        ExitCode::SUCCESS
    }
}
