//! JSON-file cache of the last known remote state.
//!
//! The file holds one document with the keys `siap_user`, `siap_schools`,
//! `siap_visits`, and `siap_outbox`. Writes go to a sibling temp file that is
//! persisted over the target, so a crash mid-write leaves the previous cache
//! intact.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use siap_core::{InspectorProfile, School, SchoolVisit};
use tracing::{debug, info, warn};

use crate::StoreError;

/// Everything the field client keeps between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedState {
    #[serde(rename = "siap_user", default)]
    pub user: Option<InspectorProfile>,
    #[serde(rename = "siap_schools", default)]
    pub schools: Vec<School>,
    #[serde(rename = "siap_visits", default)]
    pub visits: Vec<SchoolVisit>,
    /// Finalized visits not yet acknowledged by the data service, oldest first.
    #[serde(rename = "siap_outbox", default)]
    pub outbox: Vec<SchoolVisit>,
}

impl CachedState {
    /// Record a freshly finalized visit: newest first in the visit list,
    /// and appended to the outbox.
    pub fn record_finalized(&mut self, visit: SchoolVisit) {
        self.visits.retain(|v| v.id != visit.id);
        self.visits.insert(0, visit.clone());
        self.outbox.retain(|v| v.id != visit.id);
        self.outbox.push(visit);
    }

    /// Remove a delivered visit from the outbox.
    pub fn acknowledge(&mut self, visit_id: &str) -> Result<SchoolVisit, StoreError> {
        let index = self
            .outbox
            .iter()
            .position(|v| v.id == visit_id)
            .ok_or_else(|| StoreError::NotQueued(visit_id.to_string()))?;
        Ok(self.outbox.remove(index))
    }

    pub fn pending(&self) -> &[SchoolVisit] {
        &self.outbox
    }

    /// Replace the visit list with a server snapshot, keeping any queued
    /// visits the server has not seen yet at the front.
    pub fn merge_remote_visits(&mut self, remote: Vec<SchoolVisit>) {
        let mut merged: Vec<SchoolVisit> = self
            .outbox
            .iter()
            .rev()
            .filter(|queued| !remote.iter().any(|r| r.id == queued.id))
            .cloned()
            .collect();
        merged.extend(remote);
        self.visits = merged;
    }
}

/// Persistence for [`CachedState`].
pub trait CacheStore: Send + Sync {
    /// Load the cached state. A missing cache loads as the default state.
    fn load(&self) -> Result<CachedState, StoreError>;

    fn save(&self, state: &CachedState) -> Result<(), StoreError>;

    /// Drop everything, e.g. on logout.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Cache backed by a single JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CacheStore for JsonFileCache {
    fn load(&self) -> Result<CachedState, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file; starting empty");
                return Ok(CachedState::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let state: CachedState = serde_json::from_slice(&bytes)?;
        info!(
            path = %self.path.display(),
            schools = state.schools.len(),
            visits = state.visits.len(),
            outbox = state.outbox.len(),
            "loaded cache"
        );
        Ok(state)
    }

    fn save(&self, state: &CachedState) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.flush().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), outbox = state.outbox.len(), "saved cache");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// In-process cache for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<CachedState>,
}

impl MemoryCache {
    pub fn new(state: CachedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }
}

impl CacheStore for MemoryCache {
    fn load(&self) -> Result<CachedState, StoreError> {
        let state = self
            .state
            .lock()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(state.clone())
    }

    fn save(&self, state: &CachedState) -> Result<(), StoreError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        *guard = state.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        warn!("clearing in-memory cache");
        self.save(&CachedState::default())
    }
}
