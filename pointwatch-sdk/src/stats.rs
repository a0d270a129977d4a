//! Cumulative publishing statistics.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;

use crate::job::JobReport;

/// Thread-safe counters shared between the scheduler and its observers.
#[derive(Debug, Default)]
pub struct PublishStats {
    cycles: AtomicU64,
    abandoned_cycles: AtomicU64,
    submitted: AtomicU64,
    failed: AtomicU64,
    units_failed: AtomicU64,
    job_failures: AtomicU64,
    last_reports: RwLock<BTreeMap<String, JobReport>>,
}

/// A point-in-time copy of [`PublishStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub abandoned_cycles: u64,
    pub submitted: u64,
    pub failed: u64,
    pub units_failed: u64,
    pub job_failures: u64,
    pub last_reports: BTreeMap<String, JobReport>,
}

impl PublishStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a completed cycle.
    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a cycle given up because the session could not start.
    pub fn record_abandoned(&self) {
        self.abandoned_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a job that returned an error or panicked.
    pub fn record_job_failure(&self) {
        self.job_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold in the report of one job run.
    pub fn record_job(&self, job: &str, report: &JobReport) {
        self.submitted.fetch_add(report.submitted, Ordering::Relaxed);
        self.failed.fetch_add(report.failed, Ordering::Relaxed);
        self.units_failed
            .fetch_add(report.units_failed, Ordering::Relaxed);

        self.last_reports
            .write()
            .insert(job.to_string(), report.clone());
    }

    /// The last report of `job`, if it ever ran.
    pub fn last_report(&self, job: &str) -> Option<JobReport> {
        self.last_reports.read().get(job).cloned()
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            abandoned_cycles: self.abandoned_cycles.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            job_failures: self.job_failures.load(Ordering::Relaxed),
            last_reports: self.last_reports.read().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_record_job_accumulates() {
        let stats = PublishStats::new();
        stats.record_job(
            "control-bus",
            &JobReport {
                submitted: 10,
                failed: 1,
                units_failed: 2,
                fields_skipped: 0,
            },
        );
        stats.record_job(
            "control-bus",
            &JobReport {
                submitted: 5,
                ..Default::default()
            },
        );

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 15);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.units_failed, 2);
        assert_eq!(
            stats.last_report("control-bus").map(|r| r.submitted),
            Some(5)
        );
        assert_eq!(stats.last_report("pads"), None);
    }

    #[test]
    fn test_cycle_counters() {
        let stats = PublishStats::new();
        stats.record_cycle();
        stats.record_cycle();
        stats.record_abandoned();
        stats.record_job_failure();

        let snap = stats.snapshot();
        assert_eq!(snap.cycles, 2);
        assert_eq!(snap.abandoned_cycles, 1);
        assert_eq!(snap.job_failures, 1);
    }

    #[test]
    fn test_concurrent_updates() {
        let stats = Arc::new(PublishStats::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        stats.record_job(
                            &format!("job-{i}"),
                            &JobReport {
                                submitted: 1,
                                ..Default::default()
                            },
                        );
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = stats.snapshot();
        assert_eq!(snap.submitted, 400);
        assert_eq!(snap.last_reports.len(), 4);
    }
}
