//! # pointwatch-sdk
//!
//! Harvesting pipeline and scheduler for publishing antenna monitor points
//! to an alarm system.
//!
//! Jobs fetch raw samples from telemetry sources, drop stale values, name
//! the result per antenna and submit typed records through a
//! [`PublisherSession`]. The [`Scheduler`] runs every job on a fixed
//! cadence with a fresh session per cycle, isolating failures so that one
//! antenna or one job never stops the others.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use pointwatch_sdk::{CycleContext, Job, JobError, JobReport, PointDescriptor};
//! use pointwatch_sdk::{PublisherSession, Scheduler, Sink};
//! use pointwatch_types::{FleetRoster, MonitorPointId, MonitorPointRecord};
//!
//! struct Heartbeat;
//!
//! #[async_trait]
//! impl Job for Heartbeat {
//!     fn name(&self) -> &str {
//!         "heartbeat"
//!     }
//!
//!     async fn run(
//!         &self,
//!         _ctx: &CycleContext,
//!         session: &mut PublisherSession,
//!     ) -> Result<JobReport, JobError> {
//!         let record = MonitorPointRecord::builder(MonitorPointId::fixed("Array-Heartbeat"), true).build();
//!         let mut report = JobReport::default();
//!         if session.submit(&record).await {
//!             report.submitted += 1;
//!         }
//!         Ok(report)
//!     }
//!
//!     fn describe(&self, _roster: &FleetRoster) -> Vec<PointDescriptor> {
//!         Vec::new()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::builder(Sink::udp("127.0.0.1:10101"))
//!         .job(Arc::new(Heartbeat))
//!         .cadence(Duration::from_secs(60))
//!         .build();
//!
//!     let handle = scheduler.start();
//!     tokio::signal::ctrl_c().await.ok();
//!     handle.shutdown().await.ok();
//! }
//! ```

mod harvest;
mod job;
mod scheduler;
mod session;
mod sink;
mod stats;

pub use harvest::{
    FieldSpec, HarvestError, Harvester, KeyTemplate, Probe, UnitHarvest, UNIT_PLACEHOLDER,
};
pub use job::{CycleContext, Job, JobError, JobReport, PointDescriptor};
pub use scheduler::{remaining_sleep, CycleReport, Scheduler, SchedulerBuilder, SchedulerHandle};
pub use session::{PublishError, PublisherSession, SessionState};
pub use sink::{SessionEvent, Sink};
pub use stats::{PublishStats, StatsSnapshot};

// Re-export types for convenience
pub use pointwatch_types::{
    FieldPolicy, FleetRoster, FreshnessFilter, IasType, MonitorPointId, MonitorPointRecord,
    PointTemplate, UnitId, Value,
};
