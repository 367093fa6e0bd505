//! # Application State
//!
//! Shared state for the Axum server. The escrow ledger and adjudication
//! engine own their own locking; the API adds in-memory stores for the
//! records it alone manages (verification tasks, proximity sessions,
//! issued check-ins).

use std::collections::HashMap;
use std::sync::Arc;

use campus_arbitration::{DisputeAdjudicationEngine, EvidenceScorer};
use campus_audit::{AuditService, DraftStore, ReportSubmitter, VerificationTask};
use campus_client::BankResolverClient;
use campus_core::Timestamp;
use campus_escrow::{EscrowError, EscrowLedger};
use campus_geo::{CheckIn, ProximityGate, Requesting};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::bootstrap::EngineConfig;
use self::unconfigured::Unconfigured;

// -- Generic Store ------------------------------------------------------------

/// Thread-safe in-memory store keyed by UUID.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Atomically read-validate-update a record.
    ///
    /// Returns `None` if the record doesn't exist, or `Some(result)` with
    /// the closure's `Result`. The closure runs under the write lock.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        self.data.write().get_mut(id).map(f)
    }

    /// Remove a record by ID.
    pub fn remove(&self, id: &Uuid) -> Option<T> {
        self.data.write().remove(id)
    }

    /// Drop every record for which `keep` is false. Returns how many went.
    pub fn retain(&self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, v| keep(v));
        before - data.len()
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Proximity Sessions -------------------------------------------------------

/// Open proximity gates awaiting a relayed position fix.
///
/// A gate is taken out of the map while a fix is applied, so two fixes for
/// the same session cannot race.
#[derive(Debug, Default)]
pub struct ProximitySessions {
    gates: Mutex<HashMap<Uuid, ProximityGate<Requesting>>>,
}

impl ProximitySessions {
    /// Park a requesting gate under `id`.
    pub fn park(&self, id: Uuid, gate: ProximityGate<Requesting>) {
        self.gates.lock().insert(id, gate);
    }

    /// Take the gate out for resolution.
    pub fn take(&self, id: &Uuid) -> Option<ProximityGate<Requesting>> {
        self.gates.lock().remove(id)
    }

    /// Drop sessions whose request window closed before `now`.
    pub fn sweep_expired(&self, now: Timestamp) -> usize {
        let mut gates = self.gates.lock();
        let before = gates.len();
        gates.retain(|_, gate| !gate.is_expired(now));
        before - gates.len()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.gates.lock().len()
    }

    /// Whether there are no open sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// -- Configuration ------------------------------------------------------------

/// Server configuration.
///
/// Custom `Debug` redacts the `auth_token`.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Static bearer secret. If `None`, authentication is disabled.
    pub auth_token: Option<String>,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
        }
    }
}

// -- Collaborators ------------------------------------------------------------

/// The external services the engine delegates to.
#[derive(Clone)]
pub struct Collaborators {
    /// Dispute evidence scorer.
    pub scorer: Arc<dyn EvidenceScorer>,
    /// Verification report intake.
    pub submitter: Arc<dyn ReportSubmitter>,
    /// Draft persistence.
    pub drafts: Arc<dyn DraftStore>,
    /// Bank-account name resolver. `None` disables `/v1/bank/resolve`.
    pub bank: Option<BankResolverClient>,
}

impl Collaborators {
    /// No remote collaborators: scoring and submission answer 503.
    pub fn unconfigured(drafts: Arc<dyn DraftStore>) -> Self {
        Self {
            scorer: Arc::new(Unconfigured),
            submitter: Arc::new(Unconfigured),
            drafts,
            bank: None,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("bank", &self.bank.is_some())
            .finish_non_exhaustive()
    }
}

// -- AppState -----------------------------------------------------------------

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub engine_config: Arc<EngineConfig>,
    pub ledger: Arc<EscrowLedger>,
    pub adjudicator: Arc<DisputeAdjudicationEngine>,
    pub audits: AuditService,
    pub tasks: Store<VerificationTask>,
    pub proximity: Arc<ProximitySessions>,
    /// Issued check-ins keyed by check-in token. Consumed by `POST /v1/audits`.
    pub check_ins: Store<CheckIn>,
    pub bank: Option<BankResolverClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .field("proximity_sessions", &self.proximity.len())
            .field("check_ins", &self.check_ins.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the engine components together.
    pub fn new(
        config: AppConfig,
        engine_config: EngineConfig,
        collaborators: Collaborators,
    ) -> Result<Self, EscrowError> {
        let ledger = Arc::new(EscrowLedger::new(engine_config.escrow.clone())?);
        let adjudicator = Arc::new(DisputeAdjudicationEngine::new(
            Arc::clone(&ledger),
            collaborators.scorer,
        ));
        let audits = AuditService::new(
            collaborators.drafts,
            collaborators.submitter,
            engine_config.audit.clone(),
        );
        Ok(Self {
            config,
            engine_config: Arc::new(engine_config),
            ledger,
            adjudicator,
            audits,
            tasks: Store::new(),
            proximity: Arc::new(ProximitySessions::default()),
            check_ins: Store::new(),
            bank: collaborators.bank,
        })
    }

    /// Drop timed-out proximity sessions and unredeemed check-ins past
    /// their lifetime. Returns `(sessions, check_ins)` removed.
    pub fn sweep_expired(&self, now: Timestamp) -> (usize, usize) {
        let ttl = self.engine_config.proximity.check_in_ttl();
        let sessions = self.proximity.sweep_expired(now);
        let check_ins = self.check_ins.retain(|c| c.is_fresh(ttl, now));
        (sessions, check_ins)
    }
}

mod unconfigured {
    use async_trait::async_trait;
    use campus_arbitration::{EvidenceScorer, ScoreReport, ScoreRequest, ScorerError};
    use campus_audit::{
        ReportSubmitter, SubmissionReceipt, SubmitterError, VerificationReportSubmission,
    };

    /// Stand-in for a collaborator that has no configured endpoint.
    #[derive(Debug, Clone, Copy)]
    pub struct Unconfigured;

    const REASON: &str = "collaborator endpoint not configured";

    #[async_trait]
    impl EvidenceScorer for Unconfigured {
        async fn score(&self, _request: &ScoreRequest) -> Result<ScoreReport, ScorerError> {
            Err(ScorerError::Unavailable {
                reason: REASON.into(),
            })
        }
    }

    #[async_trait]
    impl ReportSubmitter for Unconfigured {
        async fn submit(
            &self,
            _report: &VerificationReportSubmission,
        ) -> Result<SubmissionReceipt, SubmitterError> {
            Err(SubmitterError::Unavailable {
                reason: REASON.into(),
            })
        }
    }
}
