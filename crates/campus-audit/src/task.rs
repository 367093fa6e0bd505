//! # Verification Task
//!
//! Tasks are created by an external scheduler. This crate only drives their
//! status as audits start and submissions are acknowledged.
//!
//! ```text
//! PENDING ─assign()─▶ ASSIGNED ─begin_audit()─▶ IN_PROGRESS ─complete()─▶ COMPLETED
//!                        ▲                          ▲                        │
//!                        └──── assign() ─── DISPUTE_REVERIFICATION ◀─────────┘
//!                                              └── begin_audit() ──▶ IN_PROGRESS
//! ```

use campus_core::{AgentId, Amount, GeoPoint, TaskId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::report::Amenity;

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Awaiting assignment.
    Pending,
    /// Assigned to an agent.
    Assigned,
    /// An audit draft exists.
    InProgress,
    /// Report acknowledged by the server.
    Completed,
    /// Reopened for a fresh visit because of a dispute.
    DisputeReverification,
}

impl TaskStatus {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::DisputeReverification => "dispute_reverification",
        }
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [TaskStatus] {
        match self {
            Self::Pending => &[Self::Assigned],
            Self::Assigned => &[Self::InProgress, Self::Assigned],
            Self::InProgress => &[Self::Completed, Self::InProgress],
            Self::Completed => &[Self::DisputeReverification],
            Self::DisputeReverification => &[Self::InProgress, Self::Assigned],
        }
    }

    /// Whether an agent may start (or restart) an audit.
    pub fn accepts_audit(&self) -> bool {
        self.valid_transitions().contains(&Self::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Routine.
    #[default]
    Normal,
    /// Expedite (e.g. dispute re-verification).
    High,
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransition {
    /// Status before.
    pub from: TaskStatus,
    /// Status after.
    pub to: TaskStatus,
    /// When.
    pub at: Timestamp,
}

/// A property verification task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationTask {
    /// Identifier.
    pub id: TaskId,
    /// Current status.
    pub status: TaskStatus,
    /// Scheduling priority.
    pub priority: TaskPriority,
    /// Where the property is.
    pub property_geom: GeoPoint,
    /// Agent responsible, once assigned.
    pub assigned_agent_id: Option<AgentId>,
    /// What the agent earns on completion.
    pub commission_amount: Amount,
    /// Amenities the listing claims.
    pub listed_amenities: Vec<Amenity>,
    /// Status history.
    pub transitions: Vec<TaskTransition>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last change.
    pub updated_at: Timestamp,
}

impl VerificationTask {
    /// A new pending task.
    pub fn new(
        property_geom: GeoPoint,
        commission_amount: Amount,
        listed_amenities: Vec<Amenity>,
        priority: TaskPriority,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            id: TaskId::new(),
            status: TaskStatus::Pending,
            priority,
            property_geom,
            assigned_agent_id: None,
            commission_amount,
            listed_amenities,
            transitions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign (or reassign) to an agent.
    pub fn assign(&mut self, agent_id: AgentId) -> Result<(), TaskError> {
        self.transition(TaskStatus::Assigned)?;
        self.assigned_agent_id = Some(agent_id);
        Ok(())
    }

    /// Mark the audit as started by `agent_id`.
    pub fn begin_audit(&mut self, agent_id: AgentId) -> Result<(), TaskError> {
        self.require_assignee(agent_id)?;
        self.transition(TaskStatus::InProgress)
    }

    /// Mark the report as acknowledged.
    pub fn complete(&mut self, agent_id: AgentId) -> Result<(), TaskError> {
        self.require_assignee(agent_id)?;
        self.transition(TaskStatus::Completed)
    }

    /// Reopen a completed task for a dispute re-visit. Raises priority.
    pub fn request_reverification(&mut self) -> Result<(), TaskError> {
        self.transition(TaskStatus::DisputeReverification)?;
        self.priority = TaskPriority::High;
        Ok(())
    }

    /// Fail unless `agent_id` is the assignee.
    pub fn require_assignee(&self, agent_id: AgentId) -> Result<(), TaskError> {
        if self.assigned_agent_id != Some(agent_id) {
            return Err(TaskError::NotAssigned {
                task_id: self.id,
                agent_id,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(TaskError::InvalidTransition {
                task_id: self.id,
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        let now = Timestamp::now();
        if self.status != to {
            self.transitions.push(TaskTransition {
                from: self.status,
                to,
                at: now,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> VerificationTask {
        VerificationTask::new(
            GeoPoint::new(6.45, 3.39).unwrap(),
            Amount::new(5_000).unwrap(),
            vec![],
            TaskPriority::Normal,
        )
    }

    #[test]
    fn happy_path() {
        let agent = AgentId::new();
        let mut t = task();
        t.assign(agent).unwrap();
        t.begin_audit(agent).unwrap();
        t.complete(agent).unwrap();
        assert_eq!(t.status, TaskStatus::Completed);
        assert_eq!(t.transitions.len(), 3);
    }

    #[test]
    fn cannot_start_audit_before_assignment() {
        let mut t = task();
        let err = t.begin_audit(AgentId::new()).unwrap_err();
        assert!(matches!(err, TaskError::NotAssigned { .. }));
    }

    #[test]
    fn other_agent_cannot_complete() {
        let agent = AgentId::new();
        let mut t = task();
        t.assign(agent).unwrap();
        t.begin_audit(agent).unwrap();
        assert!(t.complete(AgentId::new()).is_err());
    }

    #[test]
    fn restarting_audit_is_not_logged_twice() {
        let agent = AgentId::new();
        let mut t = task();
        t.assign(agent).unwrap();
        t.begin_audit(agent).unwrap();
        t.begin_audit(agent).unwrap();
        assert_eq!(t.transitions.len(), 2);
    }

    #[test]
    fn reverification_raises_priority_and_reopens() {
        let agent = AgentId::new();
        let mut t = task();
        t.assign(agent).unwrap();
        t.begin_audit(agent).unwrap();
        t.complete(agent).unwrap();
        t.request_reverification().unwrap();
        assert_eq!(t.priority, TaskPriority::High);
        assert!(t.status.accepts_audit());
        t.begin_audit(agent).unwrap();
        assert_eq!(t.status, TaskStatus::InProgress);
    }

    #[test]
    fn completed_task_rejects_new_audit() {
        let agent = AgentId::new();
        let mut t = task();
        t.assign(agent).unwrap();
        t.begin_audit(agent).unwrap();
        t.complete(agent).unwrap();
        let err = t.begin_audit(agent).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { .. }));
    }
}
