use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use pointwatch::cli::{Args, CliError, Mode};
use pointwatch::config::Settings;
use pointwatch::export::{describe_jobs, export_to_file};
use pointwatch::jobs::build_jobs;
use pointwatch::format_duration;
use pointwatch_sdk::{PublishStats, Scheduler, Sink};

const DEFAULT_FILTER: &str = "pointwatch=info,pointwatch_sdk=info,pointwatch_adapters=warn";

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(kind = %e.kind(), "{e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let mode = args.mode()?;

    let settings =
        Settings::load(args.config.as_deref()).map_err(|e| CliError::Config(e.to_string()))?;
    let roster = Arc::new(settings.roster().map_err(|e| CliError::Config(e.to_string()))?);
    let jobs = build_jobs(&args.job_kinds(), &settings).map_err(|e| CliError::Config(e.to_string()))?;

    let port = match &mode {
        Mode::Export(path) => {
            export_to_file(&describe_jobs(&jobs, &roster), path)?;
            return Ok(());
        }
        Mode::Once { port } | Mode::Loop { port, .. } => *port,
    };

    let sink = match &settings.sink.file {
        Some(path) => Sink::file(path),
        None => Sink::udp(format!("{}:{}", settings.sink.host, port)),
    };

    let stats = Arc::new(PublishStats::new());
    let mut builder = Scheduler::builder(sink)
        .roster(roster.clone())
        .stats(stats.clone());
    if let Mode::Loop { cadence, .. } = mode {
        builder = builder.cadence(cadence);
    }
    for job in jobs {
        builder = builder.job(job);
    }
    let scheduler = builder.build();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        units = roster.len(),
        jobs = ?scheduler.job_names(),
        cadence = %format_duration(scheduler.cadence()),
        "pointwatch starting"
    );

    if args.once {
        let report = scheduler.run_once().await;
        if report.abandoned {
            return Err(CliError::Runtime(anyhow::anyhow!(
                "could not open a publisher session"
            )));
        }
        return Ok(());
    }

    let handle = scheduler.start();
    shutdown_signal().await;
    let cycles = handle
        .shutdown()
        .await
        .map_err(|e| CliError::Runtime(anyhow::Error::new(e).context("scheduler task failed")))?;

    let snapshot = stats.snapshot();
    tracing::info!(
        cycles,
        submitted = snapshot.submitted,
        failed = snapshot.failed,
        abandoned = snapshot.abandoned_cycles,
        job_failures = snapshot.job_failures,
        "pointwatch stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
