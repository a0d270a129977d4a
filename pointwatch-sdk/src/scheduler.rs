//! Fixed-cadence, fault-isolating job scheduler.
//!
//! Each cycle opens a fresh [`PublisherSession`], runs every due job in
//! registration order and always stops the session afterwards. A job that
//! errors or panics is logged and the remaining jobs still run. The cadence
//! is measured from the start of one cycle to the start of the next; a
//! cycle that overruns is followed immediately by the next one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pointwatch_types::FleetRoster;

use crate::job::{CycleContext, Job, JobReport, PointDescriptor};
use crate::session::PublisherSession;
use crate::sink::Sink;
use crate::stats::PublishStats;

const DEFAULT_CADENCE: Duration = Duration::from_secs(60);

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub iteration: u64,
    /// The session could not start and no job ran.
    pub abandoned: bool,
    pub jobs_run: u64,
    pub jobs_failed: u64,
    /// Totals over every job that completed.
    pub totals: JobReport,
    #[serde(skip)]
    pub elapsed: Duration,
}

/// Runs jobs on a fixed cadence.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use pointwatch_sdk::{Scheduler, Sink};
///
/// #[tokio::main]
/// async fn main() {
///     let scheduler = Scheduler::builder(Sink::udp("127.0.0.1:9999"))
///         .cadence(Duration::from_secs(60))
///         .build();
///
///     let handle = scheduler.start();
///     tokio::time::sleep(Duration::from_secs(300)).await;
///     handle.stop();
/// }
/// ```
pub struct Scheduler {
    sink: Sink,
    jobs: Vec<Arc<dyn Job>>,
    cadence: Duration,
    roster: Arc<FleetRoster>,
    stats: Arc<PublishStats>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("sink", &self.sink)
            .field("jobs", &self.jobs.iter().map(|j| j.name()).collect::<Vec<_>>())
            .field("cadence", &self.cadence)
            .field("units", &self.roster.len())
            .finish()
    }
}

impl Scheduler {
    /// Create a builder publishing to `sink`.
    pub fn builder(sink: Sink) -> SchedulerBuilder {
        SchedulerBuilder::new(sink)
    }

    /// Time between cycle starts.
    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Shared statistics.
    pub fn stats(&self) -> Arc<PublishStats> {
        self.stats.clone()
    }

    /// Names of the registered jobs, in run order.
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name()).collect()
    }

    /// Every point the registered jobs can publish.
    pub fn describe(&self) -> Vec<PointDescriptor> {
        self.jobs
            .iter()
            .flat_map(|job| job.describe(&self.roster))
            .collect()
    }

    /// Run one cycle.
    pub async fn run_cycle(&self, iteration: u64) -> CycleReport {
        let ctx = CycleContext::new(iteration, self.roster.clone());
        let mut report = CycleReport {
            iteration,
            ..Default::default()
        };

        let mut session = PublisherSession::new(self.sink.clone());
        if let Err(e) = session.start().await {
            tracing::error!(iteration, error = %e, kind = %e.kind(), "Cycle abandoned");
            self.stats.record_abandoned();
            report.abandoned = true;
            report.elapsed = ctx.started_at.elapsed();
            return report;
        }

        for job in &self.jobs {
            if !ctx.is_due(job.every()) {
                continue;
            }
            report.jobs_run += 1;

            let outcome = AssertUnwindSafe(job.run(&ctx, &mut session))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(job_report)) => {
                    tracing::debug!(
                        job = job.name(),
                        submitted = job_report.submitted,
                        units_failed = job_report.units_failed,
                        "Job finished"
                    );
                    self.stats.record_job(job.name(), &job_report);
                    report.totals.merge(&job_report);
                }
                Ok(Err(e)) => {
                    tracing::error!(job = job.name(), error = %e, kind = %e.kind(), "Job failed");
                    self.stats.record_job_failure();
                    report.jobs_failed += 1;
                }
                Err(panic) => {
                    tracing::error!(job = job.name(), reason = panic_message(panic.as_ref()), "Job panicked");
                    self.stats.record_job_failure();
                    report.jobs_failed += 1;
                }
            }
        }

        session.stop().await;
        self.stats.record_cycle();

        report.elapsed = ctx.started_at.elapsed();
        tracing::info!(
            iteration,
            jobs = report.jobs_run,
            failed = report.jobs_failed,
            submitted = report.totals.submitted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cycle complete"
        );
        report
    }

    /// Run a single cycle as iteration zero.
    pub async fn run_once(&self) -> CycleReport {
        self.run_cycle(0).await
    }

    /// Run cycles until `stop` turns true or its sender goes away.
    ///
    /// Returns the number of cycles run.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> u64 {
        let mut iteration = 0;

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let report = self.run_cycle(iteration).await;
            iteration += 1;

            let pause = remaining_sleep(self.cadence, report.elapsed);
            if pause.is_zero() {
                tracing::warn!(
                    iteration = report.iteration,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cycle overran cadence"
                );
            }

            let deadline = Instant::now() + pause;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break,
                    changed = stop.changed() => {
                        if changed.is_err() || *stop.borrow_and_update() {
                            tracing::info!(cycles = iteration, "Scheduler stopped");
                            return iteration;
                        }
                    }
                }
            }
        }

        tracing::info!(cycles = iteration, "Scheduler stopped");
        iteration
    }

    /// Run in a background task.
    ///
    /// Returns a handle used to stop the loop.
    pub fn start(self) -> SchedulerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(async move { self.run(stop_rx).await });
        SchedulerHandle { stop_tx, join }
    }
}

/// How long to wait before the next cycle.
pub fn remaining_sleep(cadence: Duration, elapsed: Duration) -> Duration {
    cadence.saturating_sub(elapsed)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown"
    }
}

/// Builder for Scheduler.
pub struct SchedulerBuilder {
    sink: Sink,
    jobs: Vec<Arc<dyn Job>>,
    cadence: Option<Duration>,
    roster: Option<Arc<FleetRoster>>,
    stats: Option<Arc<PublishStats>>,
}

impl SchedulerBuilder {
    fn new(sink: Sink) -> Self {
        Self {
            sink,
            jobs: Vec::new(),
            cadence: None,
            roster: None,
            stats: None,
        }
    }

    /// Register a job. Jobs run in registration order.
    pub fn job(mut self, job: Arc<dyn Job>) -> Self {
        self.jobs.push(job);
        self
    }

    /// Set the cycle cadence (default: 60 seconds).
    pub fn cadence(mut self, cadence: Duration) -> Self {
        self.cadence = Some(cadence);
        self
    }

    /// Set the fleet (default: the full fleet).
    pub fn roster(mut self, roster: Arc<FleetRoster>) -> Self {
        self.roster = Some(roster);
        self
    }

    /// Share statistics with an observer.
    pub fn stats(mut self, stats: Arc<PublishStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Build the scheduler.
    pub fn build(self) -> Scheduler {
        Scheduler {
            sink: self.sink,
            jobs: self.jobs,
            cadence: self.cadence.unwrap_or(DEFAULT_CADENCE),
            roster: self
                .roster
                .unwrap_or_else(|| Arc::new(FleetRoster::full_fleet())),
            stats: self.stats.unwrap_or_default(),
        }
    }
}

/// Handle for a scheduler running in the background.
///
/// Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct SchedulerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Ask the loop to stop after the current cycle.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Wait for the loop to finish, returning the number of cycles run.
    pub async fn join(self) -> Result<u64, tokio::task::JoinError> {
        let SchedulerHandle { stop_tx, join } = self;
        let cycles = join.await;
        drop(stop_tx);
        cycles
    }

    /// Stop the loop and wait for it.
    pub async fn shutdown(self) -> Result<u64, tokio::task::JoinError> {
        self.stop();
        self.join().await
    }
}
