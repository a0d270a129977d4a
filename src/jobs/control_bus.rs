//! Power supply and compressor states over the control bus.
//!
//! For every unit, each configured device method is invoked on
//! `CONTROL/{unit}/{device}` and published as
//! `Array-{device}-{field}-{family}[!#n!]`.

use std::sync::Arc;

use async_trait::async_trait;

use pointwatch_adapters::Source;
use pointwatch_sdk::{
    CycleContext, FieldSpec, Harvester, Job, JobError, JobReport, KeyTemplate, PointDescriptor,
    PointTemplate, Probe, PublisherSession,
};
use pointwatch_types::FleetRoster;

use crate::config::ControlBusSettings;

pub struct ControlBusJob {
    harvester: Harvester,
    probes: Vec<Probe>,
}

impl ControlBusJob {
    pub fn new(source: Arc<dyn Source>, settings: &ControlBusSettings, harvester: Harvester) -> Self {
        let mut probes = Vec::new();
        for device in &settings.devices {
            for field in &device.fields {
                let Some(point) = settings.point(field) else {
                    tracing::warn!(device = %device.name, field = %field, "No method configured for field");
                    continue;
                };
                let key = KeyTemplate::new(format!("CONTROL/{{unit}}/{}", device.name));
                probes.push(
                    Probe::new(source.clone(), key)
                        .method(&point.method)
                        .field(
                            FieldSpec::new(
                                &point.method,
                                PointTemplate::per_family("Array", &device.name, &point.field),
                                point.ias_type,
                            )
                            .policy(point.policy)
                            .short_desc(format!("{} {} of {{unit}}", device.name, point.field)),
                        ),
                );
            }
        }

        Self { harvester, probes }
    }
}

#[async_trait]
impl Job for ControlBusJob {
    fn name(&self) -> &str {
        "control-bus"
    }

    async fn run(
        &self,
        ctx: &CycleContext,
        session: &mut PublisherSession,
    ) -> Result<JobReport, JobError> {
        Ok(self
            .harvester
            .harvest_roster(&ctx.roster, &self.probes, ctx.started_utc, session)
            .await)
    }

    fn describe(&self, roster: &FleetRoster) -> Vec<PointDescriptor> {
        Harvester::describe(roster, &self.probes)
    }
}
