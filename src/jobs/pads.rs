//! Antenna-to-pad assignments.
//!
//! Looks up every configured sub-array in the directory service and
//! publishes one STRING point listing `ANTENNA:PAD` pairs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use pointwatch_adapters::{fetch_with_timeout, Source, SourceError, SourceKey};
use pointwatch_sdk::{
    CycleContext, IasType, Job, JobError, JobReport, MonitorPointId, MonitorPointRecord,
    PointDescriptor, PublisherSession,
};
use pointwatch_types::FleetRoster;

use crate::config::DirectorySettings;

/// Id of the published point.
pub const PADS_POINT: &str = "Array-AntennasToPads";

pub struct PadsJob {
    source: Arc<dyn Source>,
    sub_arrays: Vec<String>,
    every: u64,
    timeout: Duration,
}

impl PadsJob {
    pub fn new(source: Arc<dyn Source>, settings: &DirectorySettings, timeout: Duration) -> Self {
        Self {
            source,
            sub_arrays: settings.sub_arrays.clone(),
            every: settings.every,
            timeout,
        }
    }

    /// Collect the `ANTENNA:PAD` pairs of every reachable sub-array.
    ///
    /// Fails only when no sub-array could be read.
    async fn collect_pairs(&self) -> Result<(Vec<String>, u64), SourceError> {
        let mut pairs = Vec::new();
        let mut skipped = 0;
        let mut last_error = None;

        for sub_array in &self.sub_arrays {
            match fetch_with_timeout(self.source.as_ref(), &SourceKey::new(sub_array), self.timeout)
                .await
            {
                Ok(samples) => {
                    pairs.extend(
                        samples
                            .iter()
                            .map(|(antenna, pad)| format!("{}:{}", antenna, pad.value)),
                    );
                }
                Err(e) => {
                    tracing::warn!(sub_array = %sub_array, error = %e, kind = %e.kind(), "Sub-array skipped");
                    skipped += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if skipped as usize == self.sub_arrays.len() => Err(e),
            _ => Ok((pairs, skipped)),
        }
    }
}

#[async_trait]
impl Job for PadsJob {
    fn name(&self) -> &str {
        "pads"
    }

    fn every(&self) -> u64 {
        self.every
    }

    async fn run(
        &self,
        ctx: &CycleContext,
        session: &mut PublisherSession,
    ) -> Result<JobReport, JobError> {
        let (pairs, skipped) = self.collect_pairs().await?;
        tracing::info!(antennas = pairs.len(), "Antenna pads collected");

        let record = MonitorPointRecord::builder(MonitorPointId::fixed(PADS_POINT), pairs.join(","))
            .ias_type(IasType::String)
            .timestamp(ctx.started_utc)
            .build();

        let mut report = JobReport {
            fields_skipped: skipped,
            ..Default::default()
        };
        if session.submit(&record).await {
            report.submitted += 1;
        } else {
            report.failed += 1;
        }
        Ok(report)
    }

    fn describe(&self, _roster: &FleetRoster) -> Vec<PointDescriptor> {
        vec![PointDescriptor {
            id: MonitorPointId::fixed(PADS_POINT),
            short_desc: "Pads where the antennas are located".to_string(),
            ias_type: IasType::String,
        }]
    }
}
