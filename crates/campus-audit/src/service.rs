//! # Audit Service
//!
//! Orchestrates draft mutations and submission for all agents. Each agent's
//! draft is its own aggregate: mutations for one agent are serialized by a
//! per-agent lock, and different agents never contend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use campus_core::{AgentId, MediaId};
use campus_geo::CheckIn;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::reconcile::{reconcile, Reconciliation, ServerView};
use crate::report::{DraftPatch, FieldAuditReport, MediaItem};
use crate::store::DraftStore;
use crate::submission::{ReportSubmitter, SubmissionReceipt, VerificationReportSubmission};
use crate::task::VerificationTask;

/// Audit settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Minimum number of media items for a submission.
    pub min_media: usize,
    /// Directory for [`FileDraftStore`](crate::FileDraftStore).
    pub draft_dir: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            min_media: 2,
            draft_dir: PathBuf::from("./drafts"),
        }
    }
}

/// Draft lifecycle operations over a [`DraftStore`] and a [`ReportSubmitter`].
#[derive(Clone)]
pub struct AuditService {
    store: Arc<dyn DraftStore>,
    submitter: Arc<dyn ReportSubmitter>,
    config: AuditConfig,
    locks: Arc<Mutex<HashMap<AgentId, Arc<Mutex<()>>>>>,
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuditService {
    /// Build a service.
    pub fn new(
        store: Arc<dyn DraftStore>,
        submitter: Arc<dyn ReportSubmitter>,
        config: AuditConfig,
    ) -> Self {
        Self {
            store,
            submitter,
            config,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    fn agent_lock(&self, agent_id: AgentId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(agent_id).or_default())
    }

    /// Start an audit of `task` from a verified check-in.
    ///
    /// Any unsubmitted draft the agent had, for this or another task, is
    /// replaced. The replacement is logged at `warn`.
    pub fn start_audit(
        &self,
        task: &VerificationTask,
        check_in: &CheckIn,
    ) -> Result<FieldAuditReport, AuditError> {
        if check_in.task_id() != task.id {
            return Err(AuditError::CheckInMismatch {
                task_id: task.id,
                check_in_task: check_in.task_id(),
            });
        }
        task.require_assignee(check_in.agent_id())?;
        if !task.status.accepts_audit() {
            return Err(crate::error::TaskError::InvalidTransition {
                task_id: task.id,
                from: task.status.as_str().to_string(),
                to: crate::task::TaskStatus::InProgress.as_str().to_string(),
            }
            .into());
        }

        let agent_id = check_in.agent_id();
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();
        if let Some(previous) = self.store.load(&agent_id)? {
            tracing::warn!(
                %agent_id,
                previous_task = %previous.task_id,
                previous_revision = previous.revision,
                new_task = %task.id,
                "discarding unsubmitted audit draft"
            );
        }
        let draft = FieldAuditReport::start(check_in, &task.listed_amenities);
        self.store.save(&draft)?;
        tracing::info!(%agent_id, task_id = %task.id, "audit draft started");
        Ok(draft)
    }

    /// The agent's current draft.
    pub fn draft(&self, agent_id: AgentId) -> Result<Option<FieldAuditReport>, AuditError> {
        Ok(self.store.load(&agent_id)?)
    }

    /// Apply a partial update.
    pub fn update_draft(&self, agent_id: AgentId, patch: DraftPatch) -> Result<FieldAuditReport, AuditError> {
        self.mutate(agent_id, |d| {
            d.apply(patch);
            Ok(())
        })
    }

    /// Flip an amenity's confirmation.
    pub fn toggle_amenity(&self, agent_id: AgentId, amenity_id: &str) -> Result<FieldAuditReport, AuditError> {
        self.mutate(agent_id, |d| {
            let amenity = d
                .amenities
                .iter_mut()
                .find(|a| a.id == amenity_id)
                .ok_or_else(|| AuditError::AmenityNotFound {
                    amenity_id: amenity_id.to_string(),
                })?;
            amenity.confirmed = !amenity.confirmed;
            Ok(())
        })
    }

    /// Attach a captured media item.
    pub fn add_media(&self, agent_id: AgentId, item: MediaItem) -> Result<FieldAuditReport, AuditError> {
        self.mutate(agent_id, |d| {
            if d.media.iter().any(|m| m.id == item.id) {
                return Err(AuditError::DuplicateMedia { media_id: item.id });
            }
            d.media.push(item);
            Ok(())
        })
    }

    /// Detach a media item.
    pub fn remove_media(&self, agent_id: AgentId, media_id: MediaId) -> Result<FieldAuditReport, AuditError> {
        self.mutate(agent_id, |d| {
            let before = d.media.len();
            d.media.retain(|m| m.id != media_id);
            if d.media.len() == before {
                return Err(AuditError::MediaNotFound { media_id });
            }
            Ok(())
        })
    }

    /// Validate, submit, and on acknowledgment clear the draft.
    ///
    /// On validation or transport failure the draft is left untouched so the
    /// agent can fix it or retry. If the agent edited the draft while the
    /// request was in flight, the newer draft is kept.
    pub async fn submit(&self, agent_id: AgentId) -> Result<SubmissionReceipt, AuditError> {
        let draft = self
            .store
            .load(&agent_id)?
            .ok_or(AuditError::NoActiveDraft { agent_id })?;
        let submission = VerificationReportSubmission::from_draft(&draft, self.config.min_media)?;

        let receipt = match self.submitter.submit(&submission).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%agent_id, task_id = %draft.task_id, error = %e, "report submission failed; draft retained");
                return Err(e.into());
            }
        };

        let view = ServerView::Acknowledged {
            task_id: submission.task_id,
            revision: submission.draft_revision,
            accepted_at: receipt.accepted_at,
        };
        self.apply_reconciliation(agent_id, &view)?;
        tracing::info!(
            %agent_id,
            task_id = %submission.task_id,
            report_id = %receipt.report_id,
            digest = %submission.digest,
            "verification report acknowledged"
        );
        Ok(receipt)
    }

    /// Reconcile the local draft against the server's view and apply the result.
    pub fn reconcile_with(&self, agent_id: AgentId, server: &ServerView) -> Result<Reconciliation, AuditError> {
        self.apply_reconciliation(agent_id, server)
    }

    fn apply_reconciliation(&self, agent_id: AgentId, server: &ServerView) -> Result<Reconciliation, AuditError> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();
        let local = self.store.load(&agent_id)?;
        let decision = reconcile(local.as_ref(), server);
        match &decision {
            Reconciliation::KeepLocal => {
                tracing::debug!(%agent_id, "local draft kept during reconciliation");
            }
            Reconciliation::AdoptServer(draft) if draft.agent_id == agent_id => self.store.save(draft)?,
            Reconciliation::AdoptServer(draft) => {
                tracing::warn!(%agent_id, owner = %draft.agent_id, "ignoring server draft owned by another agent");
                return Ok(Reconciliation::KeepLocal);
            }
            Reconciliation::Discard => self.store.clear(&agent_id)?,
        }
        Ok(decision)
    }

    fn mutate(
        &self,
        agent_id: AgentId,
        f: impl FnOnce(&mut FieldAuditReport) -> Result<(), AuditError>,
    ) -> Result<FieldAuditReport, AuditError> {
        let lock = self.agent_lock(agent_id);
        let _guard = lock.lock();
        let mut draft = self
            .store
            .load(&agent_id)?
            .ok_or(AuditError::NoActiveDraft { agent_id })?;
        f(&mut draft)?;
        draft.touch();
        self.store.save(&draft)?;
        Ok(draft)
    }
}
