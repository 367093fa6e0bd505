//! # Draft Repositories
//!
//! The single active draft per agent, persisted so it survives process
//! restarts. [`FileDraftStore`] writes one JSON file per agent with an atomic
//! rename; [`MemoryDraftStore`] is for tests and ephemeral deployments.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use campus_core::AgentId;
use parking_lot::RwLock;

use crate::error::DraftStoreError;
use crate::report::FieldAuditReport;

/// Durable key-value storage for drafts, keyed by agent.
pub trait DraftStore: Send + Sync {
    /// The agent's draft, if any.
    fn load(&self, agent_id: &AgentId) -> Result<Option<FieldAuditReport>, DraftStoreError>;

    /// Persist the draft, replacing any previous one for the same agent.
    fn save(&self, draft: &FieldAuditReport) -> Result<(), DraftStoreError>;

    /// Remove the agent's draft. Removing a missing draft is not an error.
    fn clear(&self, agent_id: &AgentId) -> Result<(), DraftStoreError>;
}

/// In-memory draft store.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<AgentId, FieldAuditReport>>,
}

impl MemoryDraftStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored drafts.
    pub fn len(&self) -> usize {
        self.drafts.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DraftStore for MemoryDraftStore {
    fn load(&self, agent_id: &AgentId) -> Result<Option<FieldAuditReport>, DraftStoreError> {
        Ok(self.drafts.read().get(agent_id).cloned())
    }

    fn save(&self, draft: &FieldAuditReport) -> Result<(), DraftStoreError> {
        self.drafts.write().insert(draft.agent_id, draft.clone());
        Ok(())
    }

    fn clear(&self, agent_id: &AgentId) -> Result<(), DraftStoreError> {
        self.drafts.write().remove(agent_id);
        Ok(())
    }
}

/// File-backed draft store: `<dir>/<agent-uuid>.json`.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
}

impl FileDraftStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, DraftStoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| DraftStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, agent_id: &AgentId) -> PathBuf {
        self.dir.join(format!("{}.json", agent_id.as_uuid()))
    }
}

impl DraftStore for FileDraftStore {
    fn load(&self, agent_id: &AgentId) -> Result<Option<FieldAuditReport>, DraftStoreError> {
        let path = self.path_for(agent_id);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(DraftStoreError::Io { path, source }),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| DraftStoreError::Corrupt { path, source })
    }

    fn save(&self, draft: &FieldAuditReport) -> Result<(), DraftStoreError> {
        let path = self.path_for(&draft.agent_id);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(draft)?;
        std::fs::write(&tmp, bytes).map_err(|source| DraftStoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        // rename is atomic on the same filesystem: readers see old or new, never half.
        std::fs::rename(&tmp, &path).map_err(|source| DraftStoreError::Io { path, source })
    }

    fn clear(&self, agent_id: &AgentId) -> Result<(), DraftStoreError> {
        let path = self.path_for(agent_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(DraftStoreError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RentPeriod;
    use campus_core::{GeoPoint, TaskId, Timestamp};

    fn draft_for(agent_id: AgentId) -> FieldAuditReport {
        FieldAuditReport {
            task_id: TaskId::new(),
            agent_id,
            check_in_geom: GeoPoint::new(-1.29, 36.82).unwrap(),
            visited_at: Timestamp::now(),
            degraded_check_in: true,
            amenities: vec![],
            physical_rent_quote: None,
            rent_period: RentPeriod::Monthly,
            is_rent_match: None,
            is_manager_valid: Some(true),
            manager_notes: "caretaker showed letter".into(),
            media: vec![],
            poi_suggestions: vec!["bus stop".into()],
            comments: String::new(),
            last_saved_at: Timestamp::now(),
            revision: 3,
        }
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let agent = AgentId::new();
        let draft = draft_for(agent);
        FileDraftStore::open(dir.path()).unwrap().save(&draft).unwrap();

        let reopened = FileDraftStore::open(dir.path()).unwrap();
        assert_eq!(reopened.load(&agent).unwrap(), Some(draft));
    }

    #[test]
    fn file_store_missing_draft_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::open(dir.path()).unwrap();
        assert!(store.load(&AgentId::new()).unwrap().is_none());
        store.clear(&AgentId::new()).unwrap();
    }

    #[test]
    fn file_store_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::open(dir.path()).unwrap();
        let agent = AgentId::new();
        store.save(&draft_for(agent)).unwrap();
        store.clear(&agent).unwrap();
        assert!(store.load(&agent).unwrap().is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDraftStore::open(dir.path()).unwrap();
        let agent = AgentId::new();
        std::fs::write(
            dir.path().join(format!("{}.json", agent.as_uuid())),
            b"{not json",
        )
        .unwrap();
        assert!(matches!(
            store.load(&agent),
            Err(DraftStoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn memory_store_one_draft_per_agent() {
        let store = MemoryDraftStore::new();
        let agent = AgentId::new();
        store.save(&draft_for(agent)).unwrap();
        let replacement = draft_for(agent);
        store.save(&replacement).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(&agent).unwrap(), Some(replacement));
    }
}
