//! Harvest jobs and the context they run in.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use pointwatch_adapters::SourceError;
use pointwatch_types::{ErrorKind, FleetRoster, FreshnessError, IasType, MonitorPointId, NameError};

use crate::harvest::HarvestError;
use crate::session::PublisherSession;

/// Per-cycle state passed explicitly to every job.
#[derive(Debug, Clone)]
pub struct CycleContext {
    /// Zero-based cycle counter.
    pub iteration: u64,
    /// Monotonic start of the cycle.
    pub started_at: tokio::time::Instant,
    /// Wall clock start of the cycle, used as `now` for freshness checks.
    pub started_utc: DateTime<Utc>,
    /// The fleet to harvest.
    pub roster: Arc<FleetRoster>,
}

impl CycleContext {
    /// Context for cycle `iteration` starting now.
    pub fn new(iteration: u64, roster: Arc<FleetRoster>) -> Self {
        Self {
            iteration,
            started_at: tokio::time::Instant::now(),
            started_utc: Utc::now(),
            roster,
        }
    }

    /// Whether a job running every `every` cycles is due.
    pub fn is_due(&self, every: u64) -> bool {
        every <= 1 || self.iteration % every == 0
    }
}

/// What one job run achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobReport {
    /// Records delivered to the sink.
    pub submitted: u64,
    /// Records the sink refused.
    pub failed: u64,
    /// Units that produced nothing because of an error.
    pub units_failed: u64,
    /// Individual fields skipped because of an error.
    pub fields_skipped: u64,
}

impl JobReport {
    /// Add another report to this one.
    pub fn merge(&mut self, other: &JobReport) {
        self.submitted += other.submitted;
        self.failed += other.failed;
        self.units_failed += other.units_failed;
        self.fields_skipped += other.fields_skipped;
    }
}

/// A job that could not complete.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Harvest(#[from] HarvestError),

    #[error(transparent)]
    Freshness(#[from] FreshnessError),

    #[error(transparent)]
    Name(#[from] NameError),

    /// The job gave up for a reason of its own.
    #[error("{0}")]
    Abandoned(String),
}

impl JobError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::Source(e) => e.kind(),
            JobError::Harvest(e) => e.kind(),
            JobError::Freshness(e) => e.kind(),
            JobError::Name(e) => e.kind(),
            JobError::Abandoned(_) => ErrorKind::KeyNotFound,
        }
    }
}

/// A point a job publishes, as listed in the alarm system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointDescriptor {
    pub id: MonitorPointId,
    pub short_desc: String,
    pub ias_type: IasType,
}

/// A unit of periodic work.
///
/// Jobs fetch, filter, name and submit on their own; the scheduler only
/// decides when they run and isolates their failures.
#[async_trait]
pub trait Job: Send + Sync {
    /// Name used in logs and statistics.
    fn name(&self) -> &str;

    /// Run on every `every`-th cycle. Defaults to every cycle.
    fn every(&self) -> u64 {
        1
    }

    /// Run once, submitting records through `session`.
    async fn run(
        &self,
        ctx: &CycleContext,
        session: &mut PublisherSession,
    ) -> Result<JobReport, JobError>;

    /// Every point this job can publish for `roster`.
    fn describe(&self, roster: &FleetRoster) -> Vec<PointDescriptor>;
}
