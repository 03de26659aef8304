//! Registry of running export jobs
//!
//! The registry is written from two contexts: the submitting caller adds a
//! job, the job's own task removes it. Listing always returns a snapshot, so
//! concurrent add/remove never disturbs a lister.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RegistryError, Result};

use super::request::JobState;

/// Directory of running jobs, keyed by job identity
pub trait JobRegistry: Send + Sync {
    /// Register a running job
    fn add(&self, state: &JobState) -> Result<()>;

    /// Deregister a job; removing an unknown job is not an error
    fn remove(&self, state: &JobState) -> Result<()>;

    /// Snapshot of the running jobs, oldest first
    fn list(&self) -> Result<Vec<JobState>>;
}

/// Process-local registry
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<Uuid, JobState>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn add(&self, state: &JobState) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(|_| RegistryError::Poisoned)?;
        jobs.insert(state.id, state.clone());
        Ok(())
    }

    fn remove(&self, state: &JobState) -> Result<()> {
        let mut jobs = self.jobs.write().map_err(|_| RegistryError::Poisoned)?;
        jobs.remove(&state.id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<JobState>> {
        let jobs = self.jobs.read().map_err(|_| RegistryError::Poisoned)?;
        let mut states: Vec<JobState> = jobs.values().cloned().collect();
        states.sort_by_key(|s| s.started_at);
        Ok(states)
    }
}

/// Registry mirrored to a JSON state file after every change
///
/// The file always holds the jobs of this process only; entries left over by
/// a previous process are reported and discarded when the registry opens.
pub struct FileJobRegistry {
    jobs: InMemoryJobRegistry,
    path: PathBuf,
    /// Serializes file rewrites
    persist_lock: Mutex<()>,
}

impl FileJobRegistry {
    /// Open a registry persisting to `path`
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Ok(content) = fs::read_to_string(&path) {
            match serde_json::from_str::<Vec<JobState>>(&content) {
                Ok(stale) if !stale.is_empty() => {
                    warn!(
                        "discarding {} stale job entries from {}",
                        stale.len(),
                        path.display()
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("ignoring unreadable job state {}: {}", path.display(), e),
            }
        }

        let registry = Self {
            jobs: InMemoryJobRegistry::new(),
            path,
            persist_lock: Mutex::new(()),
        };
        registry.persist()?;
        Ok(registry)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let _guard = self.persist_lock.lock().map_err(|_| RegistryError::Poisoned)?;
        let states = self.jobs.list()?;
        write_state(&self.path, &states).map_err(RegistryError::Persist)?;
        debug!("persisted {} jobs to {}", states.len(), self.path.display());
        Ok(())
    }
}

/// Write through a sibling temp file so readers never see a partial file
fn write_state(path: &Path, states: &[JobState]) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(states).map_err(io::Error::other)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

impl JobRegistry for FileJobRegistry {
    fn add(&self, state: &JobState) -> Result<()> {
        self.jobs.add(state)?;
        if let Err(e) = self.persist() {
            self.jobs.remove(state)?;
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, state: &JobState) -> Result<()> {
        self.jobs.remove(state)?;
        self.persist()
    }

    fn list(&self) -> Result<Vec<JobState>> {
        self.jobs.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KnapsackError;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_add_list_remove() {
        let registry = InMemoryJobRegistry::new();
        let first = JobState::export("node", "a.jsonl");
        let mut second = JobState::export("node", "b.jsonl");
        second.started_at = first.started_at + chrono::Duration::seconds(1);

        registry.add(&second).unwrap();
        registry.add(&first).unwrap();
        assert_eq!(registry.list().unwrap(), vec![first.clone(), second.clone()]);

        registry.remove(&first).unwrap();
        registry.remove(&first).unwrap();
        assert_eq!(registry.list().unwrap(), vec![second]);
    }

    #[test]
    fn test_concurrent_add_remove_against_lister() {
        let registry = Arc::new(InMemoryJobRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let state = JobState::export("node", format!("{i}.jsonl"));
                        registry.add(&state).unwrap();
                        assert!(registry.list().unwrap().contains(&state));
                        registry.remove(&state).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn test_file_registry_mirrors_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("jobs.json");
        let registry = FileJobRegistry::open(&path).unwrap();
        let state = JobState::export("node", "out.jsonl");

        registry.add(&state).unwrap();
        let on_disk: Vec<JobState> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, vec![state.clone()]);

        registry.remove(&state).unwrap();
        let on_disk: Vec<JobState> =
            serde_json::from_str(&fs::read_to_string(registry.path()).unwrap()).unwrap();
        assert!(on_disk.is_empty());
    }

    #[test]
    fn test_file_registry_discards_stale_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");
        let stale = vec![JobState::export("old-node", "old.jsonl")];
        fs::write(&path, serde_json::to_string(&stale).unwrap()).unwrap();

        let registry = FileJobRegistry::open(&path).unwrap();
        assert!(registry.list().unwrap().is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
    }

    #[test]
    fn test_file_registry_persist_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jobs.json");
        let registry = FileJobRegistry::open(&path).unwrap();
        // a directory in place of the temp file makes every rewrite fail
        fs::create_dir(path.with_extension("tmp")).unwrap();

        let state = JobState::export("node", "out.jsonl");
        let err = registry.add(&state).unwrap_err();
        assert!(matches!(err, KnapsackError::Registry(RegistryError::Persist(_))));
        assert!(registry.list().unwrap().is_empty());
    }
}
