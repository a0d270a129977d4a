//! Alarm system point configuration export.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use pointwatch_sdk::{Job, PointDescriptor};
use pointwatch_types::FleetRoster;

/// Every point `jobs` can publish over `roster`, in job order.
pub fn describe_jobs(jobs: &[Arc<dyn Job>], roster: &FleetRoster) -> Vec<PointDescriptor> {
    jobs.iter().flat_map(|job| job.describe(roster)).collect()
}

/// Write `points` as a pretty-printed JSON list.
pub fn export_to_file(points: &[PointDescriptor], path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(points).context("serializing point list")?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(points = points.len(), path = %path.display(), "Exported point configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pointwatch_sdk::{FreshnessFilter, Harvester};

    use super::*;
    use crate::config::DirectorySettings;
    use crate::jobs::testing::MapSource;
    use crate::jobs::{PadsJob, UtilityModuleJob};

    #[test]
    fn test_export_lists_every_point() {
        let jobs: Vec<Arc<dyn Job>> = vec![
            Arc::new(PadsJob::new(
                Arc::new(MapSource::default()),
                &DirectorySettings::default(),
                Duration::from_secs(1),
            )),
            Arc::new(UtilityModuleJob::new(
                Arc::new(MapSource::default()),
                false,
                Harvester::new(FreshnessFilter::new(Duration::from_secs(100))),
            )),
        ];
        let roster = FleetRoster::full_fleet();
        let points = describe_jobs(&jobs, &roster);
        assert_eq!(points.len(), 67);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iasios.json");
        export_to_file(&points, &path).unwrap();

        let written: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.len(), 67);
        assert_eq!(
            written[0],
            serde_json::json!({
                "id": "Array-AntennasToPads",
                "shortDesc": "Pads where the antennas are located",
                "iasType": "STRING"
            })
        );
        assert_eq!(written[1]["id"], "Array-UMStatus-Ant[!#1!]");
        assert_eq!(written[66]["id"], "Array-UMStatus-Ant[!#62!]");
    }

    #[test]
    fn test_export_to_missing_dir_fails() {
        let err = export_to_file(&[], Path::new("/nonexistent/dir/iasios.json")).unwrap_err();
        assert!(err.to_string().contains("writing"));
    }
}
