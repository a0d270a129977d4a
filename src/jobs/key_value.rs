//! Laser lock, cryostat and compressor points from the telemetry cache.
//!
//! The laser point depends on the master laser distributor input switch:
//! `1.0` selects the first master laser, `2.0` the second. Any other value,
//! or a missing or stale switch, leaves the laser point out of the cycle.
//! Per-unit cryostat and compressor points are harvested independently.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use pointwatch_adapters::{Source, SourceKey};
use pointwatch_sdk::{
    CycleContext, FieldPolicy, FieldSpec, HarvestError, Harvester, IasType, Job, JobError,
    JobReport, KeyTemplate, MonitorPointRecord, PointDescriptor, PointTemplate, Probe,
    PublisherSession,
};
use pointwatch_types::FleetRoster;

use crate::config::KeyValueSettings;

pub const SWITCH_FIELD: &str = "INPUT_SWITCH";
pub const LASER_FIELD: &str = "LASER_LOCKED";
pub const LASER_POINT: &str = "Array-Laser-Locked";

/// Raw cryostat field and the name it is published under.
const CRYOSTAT_FIELDS: [(&str, &str); 5] = [
    ("TEMP0_TEMP", "TEMP0"),
    ("TEMP5_TEMP", "TEMP5"),
    ("TEMP9_TEMP", "TEMP9"),
    ("VACUUM_GAUGE_SENSOR0_PRESSURE", "VACUUM-PRES0"),
    ("VACUUM_GAUGE_SENSOR1_PRESSURE", "VACUUM-PRES1"),
];

const COMPRESSOR_FIELD: (&str, &str) = ("COMPRESSOR_DRIVE_INDICATION_ON", "DRIVE_ON");

pub struct KeyValueJob {
    source: Arc<dyn Source>,
    harvester: Harvester,
    switch_component: String,
    ml_component: String,
    ml2_component: String,
    laser: FieldSpec,
    probes: Vec<Probe>,
}

impl KeyValueJob {
    pub fn new(source: Arc<dyn Source>, settings: &KeyValueSettings, harvester: Harvester) -> Self {
        let laser = FieldSpec::new(LASER_FIELD, PointTemplate::fixed(LASER_POINT), IasType::Double)
            .policy(settings.policy_for(LASER_FIELD, FieldPolicy::Sentinel))
            .short_desc("Master laser locked");

        let cryostat = CRYOSTAT_FIELDS.iter().fold(
            Probe::new(source.clone(), KeyTemplate::new("CONTROL/{unit}/FrontEnd/Cryostat")),
            |probe, (field, name)| {
                probe.field(
                    FieldSpec::new(*field, PointTemplate::per_family("Array", "CRIO", *name), IasType::Double)
                        .policy(settings.policy_for(field, FieldPolicy::Sentinel))
                        .short_desc(format!("Cryostat {name} of {{unit}}")),
                )
            },
        );

        let (field, name) = COMPRESSOR_FIELD;
        let compressor = Probe::new(source.clone(), KeyTemplate::new("CONTROL/{unit}/CMPR")).field(
            FieldSpec::new(field, PointTemplate::per_family("Array", "CMPR", name), IasType::Boolean)
                .policy(settings.policy_for(field, FieldPolicy::Optional))
                .short_desc("Compressor drive of {unit} on"),
        );

        Self {
            source,
            harvester,
            switch_component: settings.switch_component.clone(),
            ml_component: settings.ml_component.clone(),
            ml2_component: settings.ml2_component.clone(),
            laser,
            probes: vec![cryostat, compressor],
        }
    }

    /// The master laser component selected by the input switch, if any.
    async fn selected_laser(&self, now: DateTime<Utc>) -> Result<Option<&str>, HarvestError> {
        let key = SourceKey::new(&self.switch_component);
        let samples = self.harvester.fetch(self.source.as_ref(), &key).await?;
        let Some(switch) = self.harvester.filter().resolve(
            FieldPolicy::Required,
            SWITCH_FIELD,
            samples.get(SWITCH_FIELD),
            now,
        )?
        else {
            return Ok(None);
        };

        Ok(select_laser(&switch).map(|which| match which {
            Laser::Ml => self.ml_component.as_str(),
            Laser::Ml2 => self.ml2_component.as_str(),
        }))
    }

    /// Build the laser locked record, if the switch lets one through.
    async fn laser_record(&self, now: DateTime<Utc>) -> Result<Option<MonitorPointRecord>, HarvestError> {
        let Some(component) = self.selected_laser(now).await? else {
            tracing::warn!(component = %self.switch_component, "Input switch selects no master laser");
            return Ok(None);
        };
        tracing::debug!(component, "Master laser selected");

        let samples = self
            .harvester
            .fetch(self.source.as_ref(), &SourceKey::new(component))
            .await?;
        self.harvester
            .build_record(None, &self.laser, samples.get(LASER_FIELD), now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Laser {
    Ml,
    Ml2,
}

fn select_laser(switch: &str) -> Option<Laser> {
    match switch.trim().parse::<f64>() {
        Ok(v) if v == 1.0 => Some(Laser::Ml),
        Ok(v) if v == 2.0 => Some(Laser::Ml2),
        _ => None,
    }
}

#[async_trait]
impl Job for KeyValueJob {
    fn name(&self) -> &str {
        "key-value"
    }

    async fn run(
        &self,
        ctx: &CycleContext,
        session: &mut PublisherSession,
    ) -> Result<JobReport, JobError> {
        let mut report = JobReport::default();

        match self.laser_record(ctx.started_utc).await {
            Ok(Some(record)) => {
                if session.submit(&record).await {
                    report.submitted += 1;
                } else {
                    report.failed += 1;
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, kind = %e.kind(), "Laser point skipped");
                report.fields_skipped += 1;
            }
        }

        let units = self
            .harvester
            .harvest_roster(&ctx.roster, &self.probes, ctx.started_utc, session)
            .await;
        report.merge(&units);
        Ok(report)
    }

    fn describe(&self, roster: &FleetRoster) -> Vec<PointDescriptor> {
        let mut points: Vec<_> = self
            .laser
            .template
            .render(None)
            .ok()
            .map(|id| PointDescriptor {
                id,
                short_desc: self.laser.short_desc.clone(),
                ias_type: self.laser.ias_type,
            })
            .into_iter()
            .collect();
        points.extend(Harvester::describe(roster, &self.probes));
        points
    }
}
