//! Atomic snapshots of coordination status and the agent directory.
//!
//! Both documents are rewritten on every mutating call. Each write goes to a
//! uniquely named temporary file in the target directory, is synced, and is
//! then renamed over the previous document, so a concurrent reader sees
//! either the old or the new file, never a partial one.

use crate::monitor::SystemStatus;
use crate::registry::Registry;
use crate::types::Agent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hero_core::{HeroError, HeroResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Layout version of the agent directory document.
pub const AGENT_DIRECTORY_VERSION: u32 = 1;
/// File name of the coordination status snapshot.
pub const COORDINATION_FILE: &str = "agent_coordination.json";
/// File name of the agent directory dump.
pub const AGENTS_FILE: &str = "registered_agents.json";

/// Every known agent, keyed by id, as written for warm restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDirectory {
    /// Layout version; only [`AGENT_DIRECTORY_VERSION`] is accepted.
    pub version: u32,
    /// When the dump was taken.
    pub last_updated: DateTime<Utc>,
    /// Agents keyed by id.
    pub agents: BTreeMap<Uuid, Agent>,
}

impl AgentDirectory {
    /// Copy every agent out of `registry`.
    pub fn from_registry(registry: &Registry, now: DateTime<Utc>) -> Self {
        Self {
            version: AGENT_DIRECTORY_VERSION,
            last_updated: now,
            agents: registry.iter().map(|a| (a.id, a.clone())).collect(),
        }
    }

    /// Decode a directory document, rejecting unknown layout versions.
    pub fn parse(raw: &str) -> HeroResult<Self> {
        #[derive(Deserialize)]
        struct VersionHeader {
            version: Option<u32>,
        }

        let header: VersionHeader = serde_json::from_str(raw)?;
        match header.version {
            Some(AGENT_DIRECTORY_VERSION) => Ok(serde_json::from_str(raw)?),
            Some(other) => Err(HeroError::Persistence(format!(
                "unsupported agent directory version {other}"
            ))),
            None => Err(HeroError::Persistence(
                "agent directory has no version field".to_string(),
            )),
        }
    }
}

/// Read-only copy of coordinator state taken at the end of a mutation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Increases by one per mutation; later snapshots win.
    pub generation: u64,
    /// Status report written to the coordination document.
    pub status: SystemStatus,
    /// Agent dump written for warm restarts.
    pub directory: AgentDirectory,
}

/// Destination for coordinator snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Persist `snapshot` unless a newer one was already written.
    async fn save(&self, snapshot: &Snapshot) -> HeroResult<()>;
    /// The last persisted agent directory, if any.
    async fn load_directory(&self) -> HeroResult<Option<AgentDirectory>>;
}

/// Keeps nothing. Used when no data directory is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSnapshotStore;

#[async_trait]
impl SnapshotStore for NullSnapshotStore {
    async fn save(&self, _snapshot: &Snapshot) -> HeroResult<()> {
        Ok(())
    }

    async fn load_directory(&self) -> HeroResult<Option<AgentDirectory>> {
        Ok(None)
    }
}

/// Writes both documents as pretty JSON under one directory.
pub struct FileSnapshotStore {
    dir: PathBuf,
    /// Generation of the newest snapshot on disk. Held across a save so two
    /// writers never interleave.
    last_generation: Mutex<Option<u64>>,
}

impl FileSnapshotStore {
    /// Store rooted at `dir`, created if missing.
    pub async fn new(dir: PathBuf) -> HeroResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            last_generation: Mutex::new(None),
        })
    }

    /// Path of the coordination status document.
    pub fn coordination_path(&self) -> PathBuf {
        self.dir.join(COORDINATION_FILE)
    }

    /// Path of the agent directory dump.
    pub fn agents_path(&self) -> PathBuf {
        self.dir.join(AGENTS_FILE)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> HeroResult<()> {
        let mut last = self.last_generation.lock().await;
        if last.is_some_and(|g| g >= snapshot.generation) {
            debug!(generation = snapshot.generation, "Skipping superseded snapshot");
            return Ok(());
        }

        let status = serde_json::to_vec_pretty(&snapshot.status)?;
        let directory = serde_json::to_vec_pretty(&snapshot.directory)?;
        atomic_write(&self.coordination_path(), &status).await?;
        atomic_write(&self.agents_path(), &directory).await?;

        *last = Some(snapshot.generation);
        Ok(())
    }

    async fn load_directory(&self) -> HeroResult<Option<AgentDirectory>> {
        let path = self.agents_path();
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        AgentDirectory::parse(&raw).map(Some)
    }
}

/// Write `bytes` to `path` through a synced temporary file and a rename.
pub async fn atomic_write(path: &Path, bytes: &[u8]) -> HeroResult<()> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(HeroError::Persistence(format!(
            "failed to write {}: {e}",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::metrics::CoordinationStats;
    use crate::monitor::build_status;
    use crate::task_queue::TaskStore;
    use crate::types::{AgentStatus, Payload};
    use chrono::Duration;

    fn snapshot(registry: &Registry, generation: u64) -> Snapshot {
        let now = Utc::now();
        let tasks = TaskStore::new();
        let stats = CoordinationStats::new(now);
        Snapshot {
            generation,
            status: build_status(registry, &tasks, &stats, now, Duration::hours(1)),
            directory: AgentDirectory::from_registry(registry, now),
        }
    }

    fn sample_registry() -> (Registry, Uuid) {
        let mut registry = Registry::new();
        let id = registry.register(
            "scanner",
            "monitor",
            vec!["system_info".to_string(), "cpu".to_string()],
            "hero",
            Payload::new(),
            Utc::now(),
        );
        (registry, id)
    }

    #[tokio::test]
    async fn test_save_and_reload_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path().to_path_buf()).await.unwrap();
        let (registry, id) = sample_registry();

        store.save(&snapshot(&registry, 1)).await.unwrap();
        assert!(store.coordination_path().exists());

        let directory = store.load_directory().await.unwrap().unwrap();
        assert_eq!(directory.version, AGENT_DIRECTORY_VERSION);
        let agent = &directory.agents[&id];
        let original = registry.get(id).unwrap();
        assert_eq!(agent.capabilities, original.capabilities);
        assert_eq!(agent.status, AgentStatus::Idle);
        assert_eq!(agent.name, "scanner");
    }

    #[tokio::test]
    async fn test_missing_directory_loads_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path().join("nested")).await.unwrap();
        assert!(store.load_directory().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_older_generation_does_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path().to_path_buf()).await.unwrap();
        let (mut registry, _) = sample_registry();
        let newer = snapshot(&registry, 5);

        registry.register("late", "t", Vec::new(), "hero", Payload::new(), Utc::now());
        let stale_but_bigger = snapshot(&registry, 4);

        store.save(&newer).await.unwrap();
        store.save(&stale_but_bigger).await.unwrap();

        let directory = store.load_directory().await.unwrap().unwrap();
        assert_eq!(directory.agents.len(), 1);
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(tmp.path().to_path_buf()).await.unwrap();
        let (registry, _) = sample_registry();
        store.save(&snapshot(&registry, 1)).await.unwrap();
        store.save(&snapshot(&registry, 2)).await.unwrap();

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(tmp.path()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        assert_eq!(names, vec![COORDINATION_FILE, AGENTS_FILE]);
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let raw = r#"{"version": 7, "last_updated": "2024-01-01T00:00:00Z", "agents": {}}"#;
        let err = AgentDirectory::parse(raw).unwrap_err();
        assert!(matches!(err, HeroError::Persistence(_)));

        let unversioned = r#"{"agents": {}}"#;
        assert!(matches!(
            AgentDirectory::parse(unversioned).unwrap_err(),
            HeroError::Persistence(_)
        ));
    }

    #[test]
    fn test_parse_corrupt_document() {
        assert!(matches!(
            AgentDirectory::parse("{not json").unwrap_err(),
            HeroError::Json(_)
        ));
    }
}
