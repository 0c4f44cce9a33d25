//! Snapshot assembly and publication.
//!
//! Each publication writes all five artifacts into its own versioned directory
//! beside the data path. The data path itself is a symlink, replaced with a
//! single `rename(2)` of a freshly created link, so readers always resolve to
//! one complete snapshot. The version before the current one is kept so
//! in-flight readers of it can finish; older versions are pruned.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    DissertationSummary, SchoolTimeseries, SchoolsReport, SnapshotMeta, Statistics, Timeline,
};
use crate::schools::aggregate_schools;
use crate::source::RecordSource;
use crate::stats::build_statistics;
use crate::timeline::build_timeline;
use crate::timeseries::{build_school_timeseries, top_school_names, SNAPSHOT_TIMESERIES_SCHOOLS};

pub const TIMELINE_FILE: &str = "timeline.json";
pub const SCHOOLS_FILE: &str = "schools.json";
pub const STATISTICS_FILE: &str = "statistics.json";
pub const SCHOOL_TIMESERIES_FILE: &str = "school_timeseries.json";
pub const META_FILE: &str = "meta.json";

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub timeline: Timeline,
    pub schools: SchoolsReport,
    pub statistics: Statistics,
    pub school_timeseries: SchoolTimeseries,
    pub meta: SnapshotMeta,
}

impl Snapshot {
    pub fn build(records: &[DissertationSummary], generated_at: DateTime<Utc>) -> Self {
        let timeline = build_timeline(records);
        let schools = aggregate_schools(records);
        let statistics = build_statistics(records, &schools);
        let top = top_school_names(&schools.schools, SNAPSHOT_TIMESERIES_SCHOOLS);
        let school_timeseries = build_school_timeseries(records, top.as_slice());

        let meta = SnapshotMeta {
            generated_at,
            record_count: records.len() as u64,
            year_range: statistics.year_range,
            school_count: schools.schools.len() as u64,
            snapshot_id: Uuid::new_v4(),
        };

        Self {
            timeline,
            schools,
            statistics,
            school_timeseries,
            meta,
        }
    }

    /// Rendered `(file name, pretty JSON)` pairs for every artifact.
    pub fn artifacts(&self) -> Result<Vec<(&'static str, String)>> {
        Ok(vec![
            (TIMELINE_FILE, render(&self.timeline)?),
            (SCHOOLS_FILE, render(&self.schools)?),
            (STATISTICS_FILE, render(&self.statistics)?),
            (SCHOOL_TIMESERIES_FILE, render(&self.school_timeseries)?),
            (META_FILE, render(&self.meta)?),
        ])
    }
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Owns the explorer data path. Publications are serialized per process.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    publish_lock: Mutex<()>,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            publish_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn name(&self) -> Result<&str> {
        self.dir
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::Config(format!("invalid data directory: {}", self.dir.display())))
    }

    fn parent(&self) -> PathBuf {
        match self.dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File name of the versioned directory holding snapshot `id`.
    fn version_name(&self, id: Uuid) -> Result<String> {
        Ok(format!(".{}-{}", self.name()?, id))
    }

    fn link_path(&self, id: Uuid) -> Result<PathBuf> {
        Ok(self.parent().join(format!(".{}.link-{}", self.name()?, id)))
    }

    /// Version directory the data path currently points at.
    async fn current_version(&self) -> Result<Option<String>> {
        match tokio::fs::symlink_metadata(&self.dir).await {
            Ok(meta) if meta.file_type().is_symlink() => {
                let target = tokio::fs::read_link(&self.dir).await?;
                Ok(target
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned()))
            }
            Ok(_) => {
                // A plain directory from an older layout becomes a version.
                let legacy = self.version_name(Uuid::new_v4())?;
                warn!(
                    "Converting {} into a versioned snapshot ({})",
                    self.dir.display(),
                    legacy
                );
                tokio::fs::rename(&self.dir, self.parent().join(&legacy)).await?;
                Ok(Some(legacy))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn publish(&self, snapshot: &Snapshot) -> Result<()> {
        let artifacts = snapshot.artifacts()?;
        let _guard = self.publish_lock.lock().await;

        let id = snapshot.meta.snapshot_id;
        let parent = self.parent();
        tokio::fs::create_dir_all(&parent).await?;

        let version = self.version_name(id)?;
        let version_path = parent.join(&version);
        if let Err(e) = write_version(&version_path, artifacts).await {
            discard(&version_path).await;
            return Err(e);
        }

        let previous = match self.current_version().await {
            Ok(previous) => previous,
            Err(e) => {
                discard(&version_path).await;
                return Err(e);
            }
        };

        let link = self.link_path(id)?;
        if let Err(e) = swap_link(&version, &link, &self.dir).await {
            discard(&link).await;
            discard(&version_path).await;
            return Err(e);
        }

        let mut keep = vec![version];
        keep.extend(previous);
        self.prune(&keep).await;

        info!(
            "Published snapshot {} ({} records) to {}",
            id,
            snapshot.meta.record_count,
            self.dir.display()
        );
        Ok(())
    }

    /// Removes versions, links and leftovers from interrupted runs, except `keep`.
    async fn prune(&self, keep: &[String]) {
        let Ok(name) = self.name() else {
            return;
        };
        let version_prefix = format!(".{name}-");
        let scratch_prefix = format!(".{name}.");

        let mut entries = match tokio::fs::read_dir(self.parent()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to list snapshot versions: {}", e);
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let owned = file_name.starts_with(&version_prefix) || file_name.starts_with(&scratch_prefix);
            if owned && !keep.contains(&file_name) {
                discard(&entry.path()).await;
            }
        }
    }

    /// Current meta document, or `None` before the first publication.
    pub async fn read_meta(&self) -> Result<Option<SnapshotMeta>> {
        match tokio::fs::read_to_string(self.dir.join(META_FILE)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

async fn write_version(dir: &Path, artifacts: Vec<(&'static str, String)>) -> Result<()> {
    tokio::fs::create_dir(dir).await?;

    let mut writes = JoinSet::new();
    for (name, content) in artifacts {
        let path = dir.join(name);
        writes.spawn(async move { tokio::fs::write(path, content).await });
    }
    while let Some(joined) = writes.join_next().await {
        joined.map_err(std::io::Error::other)??;
    }
    Ok(())
}

/// Points `target` at the sibling `version` by renaming a new link over it.
#[cfg(unix)]
async fn swap_link(version: &str, link: &Path, target: &Path) -> Result<()> {
    tokio::fs::symlink(version, link).await?;
    tokio::fs::rename(link, target).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn swap_link(_version: &str, _link: &Path, _target: &Path) -> Result<()> {
    Err(Error::Config(
        "snapshot publication requires a filesystem with symlinks".to_string(),
    ))
}

async fn discard(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Fetches the current catalog, rebuilds every artifact and publishes them.
pub async fn regenerate(source: &dyn RecordSource, store: &SnapshotStore) -> Result<SnapshotMeta> {
    let records = source.fetch_all().await?;
    info!("Building snapshot from {} records", records.len());

    let snapshot = Snapshot::build(&records, Utc::now());
    store.publish(&snapshot).await?;
    Ok(snapshot.meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<DissertationSummary> {
        vec![
            DissertationSummary::new(Some(1950), Some("X")),
            DissertationSummary::new(Some(1952), Some("X")),
            DissertationSummary::new(Some(1952), Some("Y")),
            DissertationSummary::new(None, Some("Z")),
        ]
    }

    #[test]
    fn meta_describes_the_snapshot() {
        let now = Utc::now();
        let snapshot = Snapshot::build(&catalog(), now);

        assert_eq!(snapshot.meta.generated_at, now);
        assert_eq!(snapshot.meta.record_count, 4);
        assert_eq!(snapshot.meta.year_range, [1950, 1952]);
        assert_eq!(snapshot.meta.school_count, 3);
        assert_eq!(snapshot.school_timeseries.len(), 3);
    }

    #[test]
    fn rebuilding_unchanged_input_is_idempotent() {
        let first = Snapshot::build(&catalog(), Utc::now()).artifacts().unwrap();
        let second = Snapshot::build(&catalog(), Utc::now()).artifacts().unwrap();

        let data = |artifacts: &[(&'static str, String)]| {
            artifacts
                .iter()
                .filter(|(name, _)| *name != META_FILE)
                .cloned()
                .collect::<Vec<_>>()
        };
        assert_eq!(data(&first), data(&second));
        assert_eq!(first.len(), 5);
    }

    #[test]
    fn artifacts_are_pretty_printed() {
        let artifacts = Snapshot::build(&catalog(), Utc::now()).artifacts().unwrap();
        let (_, timeline) = artifacts
            .iter()
            .find(|(name, _)| *name == TIMELINE_FILE)
            .unwrap();
        assert!(timeline.starts_with("{\n  \"by_year\": ["));
    }

    #[test]
    fn versions_and_links_sit_beside_the_data_path() {
        let store = SnapshotStore::new("explorer/data");
        let id = Uuid::nil();
        assert_eq!(store.version_name(id).unwrap(), format!(".data-{id}"));
        assert_eq!(
            store.link_path(id).unwrap(),
            PathBuf::from(format!("explorer/.data.link-{id}"))
        );

        let bare = SnapshotStore::new("data");
        assert_eq!(
            bare.link_path(id).unwrap(),
            PathBuf::from(format!("./.data.link-{id}"))
        );
    }
}
