//! End-to-end cycles over in-memory sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use pointwatch_adapters::{RawSample, SampleSet, Source, SourceError, SourceKey};
use pointwatch_sdk::{
    CycleContext, FieldPolicy, FieldSpec, FleetRoster, FreshnessFilter, Harvester, IasType, Job, JobError,
    JobReport, KeyTemplate, PointDescriptor, PointTemplate, Probe, PublisherSession, Scheduler,
    SessionEvent, Sink,
};
use pointwatch_types::SourceTimestamp;

/// Answers from a fixed map keyed by path; anything else is unreachable.
#[derive(Debug, Default)]
struct FixedSource {
    sets: HashMap<String, SampleSet>,
}

impl FixedSource {
    fn answering(units: &[&str], sample: RawSample) -> Self {
        let sets = units
            .iter()
            .map(|u| {
                (
                    format!("CONTROL/{u}/PSA"),
                    SampleSet::new().with("OPERATIONAL", sample.clone()),
                )
            })
            .collect();
        Self { sets }
    }
}

#[async_trait]
impl Source for FixedSource {
    async fn fetch(&self, key: &SourceKey) -> Result<SampleSet, SourceError> {
        self.sets
            .get(&key.path)
            .cloned()
            .ok_or_else(|| SourceError::Unreachable(key.path.clone()))
    }

    fn description(&self) -> &str {
        "fixed"
    }
}

struct PsaJob {
    harvester: Harvester,
    probes: Vec<Probe>,
}

impl PsaJob {
    fn new(source: FixedSource, concurrency: usize) -> Arc<Self> {
        Self::with_field(source, concurrency, IasType::String, FieldPolicy::Optional)
    }

    fn with_field(
        source: FixedSource,
        concurrency: usize,
        ias_type: IasType,
        policy: FieldPolicy,
    ) -> Arc<Self> {
        let probe = Probe::new(Arc::new(source), KeyTemplate::new("CONTROL/{unit}/PSA")).field(
            FieldSpec::new(
                "OPERATIONAL",
                PointTemplate::per_family("Array", "PSA", "OPERATIONAL"),
                ias_type,
            )
            .policy(policy),
        );
        Arc::new(Self {
            harvester: Harvester::new(FreshnessFilter::new(Duration::from_secs(100)))
                .concurrency(concurrency),
            probes: vec![probe],
        })
    }
}

#[async_trait]
impl Job for PsaJob {
    fn name(&self) -> &str {
        "psa"
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

fn drain(rx: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn record_ids(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Record(r) => Some(r.id().as_str().to_string()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_one_failing_unit_out_of_five() {
    let units = ["DV01", "DV02", "DV03", "DV04", "DV05"];
    let source = FixedSource::answering(&["DV01", "DV02", "DV04", "DV05"], RawSample::new("1.0"));

    let (sink, mut rx) = Sink::channel(64);
    let scheduler = Scheduler::builder(sink)
        .job(PsaJob::new(source, 3))
        .roster(Arc::new(FleetRoster::from_names(units).unwrap()))
        .build();

    let report = scheduler.run_once().await;
    assert!(!report.abandoned);
    assert_eq!(report.totals.submitted, 4);
    assert_eq!(report.totals.units_failed, 1);

    let events = drain(&mut rx);
    let started = events.iter().filter(|e| **e == SessionEvent::Started).count();
    let stopped = events.iter().filter(|e| **e == SessionEvent::Stopped).count();
    assert_eq!(started, 1);
    assert_eq!(stopped, 1);
    assert_eq!(events.last(), Some(&SessionEvent::Stopped));

    // Records follow roster order even when units are harvested concurrently.
    assert_eq!(
        record_ids(&events),
        vec![
            "Array-PSA-OPERATIONAL-DV[!#1!]",
            "Array-PSA-OPERATIONAL-DV[!#2!]",
            "Array-PSA-OPERATIONAL-DV[!#4!]",
            "Array-PSA-OPERATIONAL-DV[!#5!]",
        ]
    );

    let stats = scheduler.stats().snapshot();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.submitted, 4);
    assert_eq!(stats.units_failed, 1);
    assert_eq!(stats.last_reports["psa"].submitted, 4);
}

#[tokio::test]
async fn test_every_unit_unreachable_still_closes_session() {
    let (sink, mut rx) = Sink::channel(64);
    let scheduler = Scheduler::builder(sink)
        .job(PsaJob::new(FixedSource::default(), 1))
        .roster(Arc::new(FleetRoster::from_names(["DA41", "PM01"]).unwrap()))
        .build();

    let report = scheduler.run_once().await;
    assert_eq!(report.totals.submitted, 0);
    assert_eq!(report.totals.units_failed, 2);
    assert_eq!(report.jobs_failed, 0);
    assert_eq!(
        drain(&mut rx),
        vec![SessionEvent::Started, SessionEvent::Stopped]
    );
}

#[tokio::test]
async fn test_stale_sample_is_not_published() {
    let old = Utc::now() - chrono::Duration::hours(2);
    let source = FixedSource::answering(&["DA41"], RawSample::stamped("1.0", SourceTimestamp::Utc(old)));

    let (sink, mut rx) = Sink::channel(64);
    let scheduler = Scheduler::builder(sink)
        .job(PsaJob::new(source, 1))
        .roster(Arc::new(FleetRoster::from_names(["DA41"]).unwrap()))
        .build();

    let report = scheduler.run_once().await;
    assert_eq!(report.totals.submitted, 0);
    assert!(record_ids(&drain(&mut rx)).is_empty());
}

#[tokio::test]
async fn test_file_sink_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    let source = FixedSource::answering(&["DA41", "CM03"], RawSample::new("ON"));

    let scheduler = Scheduler::builder(Sink::file(&path))
        .job(PsaJob::new(source, 1))
        .roster(Arc::new(FleetRoster::from_names(["DA41", "CM03"]).unwrap()))
        .build();

    scheduler.run_once().await;
    scheduler.run_once().await;

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["id"], "Array-PSA-OPERATIONAL-DA[!#41!]");
    assert_eq!(lines[1]["id"], "Array-PSA-OPERATIONAL-CM[!#3!]");
    assert_eq!(lines[0]["valueType"], "STRING");
    assert_eq!(lines[0]["operMode"], "OPERATIONAL");
    assert_eq!(lines[2]["id"], lines[0]["id"]);
}

#[tokio::test]
async fn test_stale_sentinel_reaches_the_file_as_nan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    let old = Utc::now() - chrono::Duration::hours(2);
    let mut source = FixedSource::answering(&["DA41"], RawSample::stamped("3.9", SourceTimestamp::Utc(old)));
    source.sets.insert(
        "CONTROL/DV01/PSA".to_string(),
        SampleSet::new().with("OPERATIONAL", RawSample::new("3.9")),
    );

    let scheduler = Scheduler::builder(Sink::file(&path))
        .job(PsaJob::with_field(source, 1, IasType::Double, FieldPolicy::Sentinel))
        .roster(Arc::new(FleetRoster::from_names(["DA41", "DV01"]).unwrap()))
        .build();

    let report = scheduler.run_once().await;
    assert_eq!(report.totals.submitted, 2);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], "Array-PSA-OPERATIONAL-DA[!#41!]");
    assert_eq!(lines[0]["value"], "nan");
    assert_eq!(lines[0]["valueType"], "DOUBLE");
    assert_eq!(lines[1]["value"], 3.9);
}
