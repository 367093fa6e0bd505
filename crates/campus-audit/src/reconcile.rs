//! # Local/Server Reconciliation
//!
//! The local draft and the server's view can diverge while the agent is
//! offline or a submission retry is pending. [`reconcile`] decides which side
//! wins; it never merges field by field.

use campus_core::{TaskId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::report::FieldAuditReport;

/// What the server knows about the agent's audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServerView {
    /// No record.
    Nothing,
    /// A server-side copy of a draft (e.g. saved from another device).
    Saved {
        /// The server's copy.
        draft: FieldAuditReport,
    },
    /// A submission was acknowledged.
    Acknowledged {
        /// Task the acknowledged report is for.
        task_id: TaskId,
        /// Draft revision that was submitted.
        revision: u64,
        /// When it was accepted.
        accepted_at: Timestamp,
    },
}

/// The decision.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The local draft is current; keep it.
    KeepLocal,
    /// Replace the local draft with the server's copy.
    AdoptServer(FieldAuditReport),
    /// The local draft has been submitted (or there is nothing); clear it.
    Discard,
}

/// Decide between the local draft and the server's view.
///
/// - A newer server copy of the same task wins; the newest `last_saved_at`
///   (then `revision`) decides.
/// - An acknowledgment at or after the local revision means the draft has been
///   delivered and is discarded.
/// - A local draft for a different task always wins, since starting an audit
///   replaces the previous one.
pub fn reconcile(local: Option<&FieldAuditReport>, server: &ServerView) -> Reconciliation {
    let Some(local) = local else {
        return match server {
            ServerView::Saved { draft } => Reconciliation::AdoptServer(draft.clone()),
            _ => Reconciliation::Discard,
        };
    };
    match server {
        ServerView::Nothing => Reconciliation::KeepLocal,
        ServerView::Saved { draft } if draft.task_id == local.task_id => {
            let server_key = (draft.last_saved_at, draft.revision);
            let local_key = (local.last_saved_at, local.revision);
            if server_key > local_key {
                Reconciliation::AdoptServer(draft.clone())
            } else {
                Reconciliation::KeepLocal
            }
        }
        ServerView::Acknowledged {
            task_id, revision, ..
        } if *task_id == local.task_id && *revision >= local.revision => Reconciliation::Discard,
        _ => Reconciliation::KeepLocal,
    }
}
