//! # Proximity Gate Typestate Machine
//!
//! ```text
//! IDLE ─begin()──▶ REQUESTING ─resolve()─┬─▶ VERIFIED   (terminal, yields CheckIn)
//!                      ▲                 ├─▶ TOO_FAR ──retry()/cancel()
//!                      │                 └─▶ FAILED  ──retry()/cancel()
//!                      └──────── retry() ─────┘
//! any non-terminal ─cancel()──▶ CANCELLED (terminal)
//! ```
//!
//! Each state is a distinct type, so an audit can only be started from a
//! [`CheckIn`], and a `CheckIn` can only be produced by `ProximityGate<Verified>`.
//! A cancelled gate has no path to a check-in, so cancellation cannot leave an
//! audit draft behind.

use std::marker::PhantomData;
use std::time::Duration;

use campus_core::{AgentId, GeoPoint, TaskId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::policy::{ProximityPolicy, ProximityResult};
use crate::provider::{GeolocationError, PositionFix, PositionRequest};

// ── State Types ──────────────────────────────────────────────────────

/// No location request has been made yet.
#[derive(Debug, Clone, Copy)]
pub struct Idle;

/// A location request is in flight.
#[derive(Debug, Clone, Copy)]
pub struct Requesting;

/// The agent was within range. Terminal.
#[derive(Debug, Clone, Copy)]
pub struct Verified;

/// A fix was obtained but it was beyond the threshold.
#[derive(Debug, Clone, Copy)]
pub struct TooFar;

/// The request failed or the fix was refused.
#[derive(Debug, Clone, Copy)]
pub struct Failed;

/// The agent aborted. Terminal.
#[derive(Debug, Clone, Copy)]
pub struct Cancelled;

/// Marker trait for gate states. Sealed.
pub trait GateState: private::Sealed + std::fmt::Debug {
    /// Runtime mirror of this state.
    fn dyn_state() -> DynGateState;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Idle {}
    impl Sealed for super::Requesting {}
    impl Sealed for super::Verified {}
    impl Sealed for super::TooFar {}
    impl Sealed for super::Failed {}
    impl Sealed for super::Cancelled {}
}

macro_rules! gate_state {
    ($ty:ident => $dyn:ident) => {
        impl GateState for $ty {
            fn dyn_state() -> DynGateState {
                DynGateState::$dyn
            }
        }
    };
}

gate_state!(Idle => Idle);
gate_state!(Requesting => Requesting);
gate_state!(Verified => Verified);
gate_state!(TooFar => TooFar);
gate_state!(Failed => Failed);
gate_state!(Cancelled => Cancelled);

/// Runtime representation of the gate state, for logs and API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DynGateState {
    /// See [`Idle`].
    Idle,
    /// See [`Requesting`].
    Requesting,
    /// See [`Verified`].
    Verified,
    /// See [`TooFar`].
    TooFar,
    /// See [`Failed`].
    Failed,
    /// See [`Cancelled`].
    Cancelled,
}

impl DynGateState {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Requesting => "REQUESTING",
            Self::Verified => "VERIFIED",
            Self::TooFar => "TOO_FAR",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Cancelled)
    }

    /// States reachable in one step.
    pub fn valid_transitions(&self) -> &'static [DynGateState] {
        match self {
            Self::Idle => &[Self::Requesting, Self::Cancelled],
            Self::Requesting => &[Self::Verified, Self::TooFar, Self::Failed, Self::Cancelled],
            Self::TooFar | Self::Failed => &[Self::Requesting, Self::Cancelled],
            Self::Verified | Self::Cancelled => &[],
        }
    }
}

impl std::fmt::Display for DynGateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the gate's transition log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateTransition {
    /// State before.
    pub from: DynGateState,
    /// State after.
    pub to: DynGateState,
    /// When it happened.
    pub at: Timestamp,
    /// Distance or error code, when relevant.
    pub detail: Option<String>,
}

/// Proof that an agent stood within range of a task's property.
///
/// Only obtainable from [`ProximityGate<Verified>::check_in`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckIn {
    task_id: TaskId,
    agent_id: AgentId,
    point: GeoPoint,
    accuracy_meters: f64,
    distance_meters: f64,
    degraded_accuracy: bool,
    verified_at: Timestamp,
}

impl CheckIn {
    /// Task the check-in is for.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Agent who checked in.
    pub fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Measured coordinate at check-in.
    pub fn point(&self) -> GeoPoint {
        self.point
    }

    /// Reported accuracy of the fix.
    pub fn accuracy_meters(&self) -> f64 {
        self.accuracy_meters
    }

    /// Distance from the property.
    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    /// Whether the fix was flagged as low accuracy.
    pub fn degraded_accuracy(&self) -> bool {
        self.degraded_accuracy
    }

    /// When the gate verified the fix.
    pub fn verified_at(&self) -> Timestamp {
        self.verified_at
    }

    /// Whether the check-in may still open an audit at `now`.
    pub fn is_fresh(&self, ttl: Duration, now: Timestamp) -> bool {
        elapsed(self.verified_at, now) <= ttl
    }
}

/// Wall time from `from` to `now`, clamped at zero.
fn elapsed(from: Timestamp, now: Timestamp) -> Duration {
    now.since(&from).to_std().unwrap_or_default()
}

// ── Gate ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct GateInner {
    policy: ProximityPolicy,
    attempts: u32,
    requested_at: Option<Timestamp>,
    last_fix: Option<PositionFix>,
    last_result: Option<ProximityResult>,
    last_error: Option<GeolocationError>,
    transitions: Vec<GateTransition>,
}

/// A proximity check for one agent and one task.
#[derive(Debug)]
pub struct ProximityGate<S: GateState> {
    /// Task being verified.
    pub task_id: TaskId,
    /// Agent performing the check.
    pub agent_id: AgentId,
    /// The property's coordinate.
    pub target: GeoPoint,
    inner: GateInner,
    _state: PhantomData<S>,
}

/// The result of resolving a location request.
#[derive(Debug)]
pub enum GateOutcome {
    /// Within range.
    Verified(ProximityGate<Verified>),
    /// Out of range.
    TooFar(ProximityGate<TooFar>),
    /// Provider error or refused fix.
    Failed(ProximityGate<Failed>),
    /// Aborted while the request was in flight.
    Cancelled(ProximityGate<Cancelled>),
}

impl GateOutcome {
    /// The state this outcome represents.
    pub fn state(&self) -> DynGateState {
        match self {
            Self::Verified(_) => DynGateState::Verified,
            Self::TooFar(_) => DynGateState::TooFar,
            Self::Failed(_) => DynGateState::Failed,
            Self::Cancelled(_) => DynGateState::Cancelled,
        }
    }

    /// The check-in, if verified.
    pub fn check_in(&self) -> Option<CheckIn> {
        match self {
            Self::Verified(g) => Some(g.check_in()),
            _ => None,
        }
    }
}

impl<S: GateState> ProximityGate<S> {
    /// Current state.
    pub fn state(&self) -> DynGateState {
        S::dyn_state()
    }

    /// Number of location requests made so far.
    pub fn attempts(&self) -> u32 {
        self.inner.attempts
    }

    /// The transition log.
    pub fn transitions(&self) -> &[GateTransition] {
        &self.inner.transitions
    }

    /// Most recent proximity result, if any fix was accepted.
    pub fn last_result(&self) -> Option<&ProximityResult> {
        self.inner.last_result.as_ref()
    }

    fn transmute<T: GateState>(self, detail: Option<String>) -> ProximityGate<T> {
        let mut inner = self.inner;
        inner.transitions.push(GateTransition {
            from: S::dyn_state(),
            to: T::dyn_state(),
            at: Timestamp::now(),
            detail,
        });
        tracing::debug!(
            task_id = %self.task_id,
            agent_id = %self.agent_id,
            from = %S::dyn_state(),
            to = %T::dyn_state(),
            "proximity gate transition"
        );
        ProximityGate {
            task_id: self.task_id,
            agent_id: self.agent_id,
            target: self.target,
            inner,
            _state: PhantomData,
        }
    }

    fn start_request(mut self) -> ProximityGate<Requesting> {
        self.inner.attempts += 1;
        self.inner.requested_at = Some(Timestamp::now());
        self.inner.last_error = None;
        let attempt = self.inner.attempts;
        self.transmute(Some(format!("attempt {attempt}")))
    }

    fn abort(self) -> ProximityGate<Cancelled> {
        self.transmute(None)
    }
}

impl ProximityGate<Idle> {
    /// A fresh gate for `agent_id` at `target`.
    pub fn new(task_id: TaskId, agent_id: AgentId, target: GeoPoint, policy: ProximityPolicy) -> Self {
        Self {
            task_id,
            agent_id,
            target,
            inner: GateInner {
                policy,
                attempts: 0,
                requested_at: None,
                last_fix: None,
                last_result: None,
                last_error: None,
                transitions: Vec::new(),
            },
            _state: PhantomData,
        }
    }

    /// Issue the first location request.
    pub fn begin(self) -> ProximityGate<Requesting> {
        self.start_request()
    }

    /// Abort before requesting.
    pub fn cancel(self) -> ProximityGate<Cancelled> {
        self.abort()
    }
}

impl ProximityGate<Requesting> {
    /// Parameters for the in-flight request.
    pub fn position_request(&self) -> PositionRequest {
        PositionRequest {
            not_before: self.inner.requested_at.unwrap_or_else(Timestamp::now),
            timeout: self.inner.policy.request_timeout(),
            high_accuracy: true,
        }
    }

    /// Abort the in-flight request.
    pub fn cancel(self) -> ProximityGate<Cancelled> {
        self.abort()
    }

    /// Whether the request window has closed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        let request = self.position_request();
        elapsed(request.not_before, now) > request.timeout
    }

    /// Apply an answer that arrived at `received_at`.
    ///
    /// Past the request timeout the reading is discarded and the attempt
    /// fails with [`GeolocationError::Timeout`].
    pub fn resolve_at(
        self,
        reading: Result<PositionFix, GeolocationError>,
        received_at: Timestamp,
    ) -> GateOutcome {
        if self.is_expired(received_at) {
            let waited = elapsed(self.position_request().not_before, received_at);
            let elapsed_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
            return self.resolve(Err(GeolocationError::Timeout { elapsed_ms }));
        }
        self.resolve(reading)
    }

    /// Apply the provider's answer.
    ///
    /// Cached fixes (captured before the request started) and replays of
    /// the previous fix are refused as [`GeolocationError::StalePosition`].
    pub fn resolve(mut self, reading: Result<PositionFix, GeolocationError>) -> GateOutcome {
        let fix = match reading.and_then(|fix| self.admit(fix)) {
            Ok(fix) => fix,
            Err(err) => {
                tracing::info!(
                    task_id = %self.task_id,
                    code = err.as_code(),
                    error = %err,
                    "location request failed"
                );
                let detail = err.as_code().to_string();
                self.inner.last_error = Some(err);
                return GateOutcome::Failed(self.transmute(Some(detail)));
            }
        };

        let result = self
            .inner
            .policy
            .check(&self.target, &fix.point, fix.accuracy_meters);
        self.inner.last_fix = Some(fix);
        self.inner.last_result = Some(result);
        let detail = Some(format!("{:.1}m", result.distance_meters));
        if result.within_range {
            tracing::info!(
                task_id = %self.task_id,
                agent_id = %self.agent_id,
                distance_meters = result.distance_meters,
                "proximity verified"
            );
            GateOutcome::Verified(self.transmute(detail))
        } else {
            GateOutcome::TooFar(self.transmute(detail))
        }
    }

    fn admit(&self, fix: PositionFix) -> Result<PositionFix, GeolocationError> {
        if fix.point.validate().is_err() || fix.accuracy_meters.is_nan() || fix.accuracy_meters < 0.0 {
            return Err(GeolocationError::PositionUnavailable {
                reason: format!(
                    "invalid fix lat={} lng={} accuracy={}",
                    fix.point.lat, fix.point.lng, fix.accuracy_meters
                ),
            });
        }
        let not_before = self.position_request().not_before;
        let replayed = self
            .inner
            .last_fix
            .map(|prev| prev.captured_at == fix.captured_at)
            .unwrap_or(false);
        if fix.captured_at < not_before || replayed {
            return Err(GeolocationError::StalePosition {
                captured_at: fix.captured_at,
                not_before,
            });
        }
        Ok(fix)
    }
}

impl ProximityGate<TooFar> {
    /// Distance of the rejected fix.
    pub fn distance_meters(&self) -> f64 {
        self.inner
            .last_result
            .map(|r| r.distance_meters)
            .unwrap_or(f64::INFINITY)
    }

    /// Request a new fix.
    pub fn retry(self) -> ProximityGate<Requesting> {
        self.start_request()
    }

    /// Give up.
    pub fn cancel(self) -> ProximityGate<Cancelled> {
        self.abort()
    }
}

impl ProximityGate<Failed> {
    /// The error that failed the last attempt.
    pub fn error(&self) -> Option<&GeolocationError> {
        self.inner.last_error.as_ref()
    }

    /// Request a new fix.
    pub fn retry(self) -> ProximityGate<Requesting> {
        self.start_request()
    }

    /// Give up.
    pub fn cancel(self) -> ProximityGate<Cancelled> {
        self.abort()
    }
}

impl ProximityGate<Verified> {
    /// Produce the check-in that authorizes starting an audit.
    pub fn check_in(&self) -> CheckIn {
        // Verified is only reachable through resolve(), which sets both.
        let fix = self.inner.last_fix;
        let result = self.inner.last_result;
        CheckIn {
            task_id: self.task_id,
            agent_id: self.agent_id,
            point: fix.map(|f| f.point).unwrap_or(self.target),
            accuracy_meters: fix.map(|f| f.accuracy_meters).unwrap_or_default(),
            distance_meters: result.map(|r| r.distance_meters).unwrap_or_default(),
            degraded_accuracy: result.map(|r| r.degraded_accuracy).unwrap_or_default(),
            verified_at: self
                .inner
                .transitions
                .last()
                .map(|t| t.at)
                .unwrap_or_else(Timestamp::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::offset_north;

    fn property() -> GeoPoint {
        GeoPoint::new(6.5158, 3.3898).unwrap()
    }

    fn gate() -> ProximityGate<Idle> {
        ProximityGate::new(TaskId::new(), AgentId::new(), property(), ProximityPolicy::default())
    }

    fn fresh_fix(meters: f64, accuracy: f64) -> PositionFix {
        PositionFix {
            point: offset_north(&property(), meters),
            accuracy_meters: accuracy,
            captured_at: Timestamp::now(),
        }
    }

    #[test]
    fn within_range_verifies_and_yields_check_in() {
        let requesting = gate().begin();
        let outcome = requesting.resolve(Ok(fresh_fix(40.0, 8.0)));
        assert_eq!(outcome.state(), DynGateState::Verified);
        let check_in = outcome.check_in().unwrap();
        assert!((check_in.distance_meters() - 40.0).abs() < 0.5);
        assert!(!check_in.degraded_accuracy());
    }

    #[test]
    fn out_of_range_is_too_far_and_retryable() {
        let outcome = gate().begin().resolve(Ok(fresh_fix(105.0, 8.0)));
        let GateOutcome::TooFar(too_far) = outcome else {
            panic!("expected TooFar");
        };
        assert!((too_far.distance_meters() - 105.0).abs() < 0.5);
        let retrying = too_far.retry();
        assert_eq!(retrying.attempts(), 2);
        let outcome = retrying.resolve(Ok(fresh_fix(30.0, 8.0)));
        assert_eq!(outcome.state(), DynGateState::Verified);
    }

    #[test]
    fn provider_error_fails_with_code() {
        let outcome = gate()
            .begin()
            .resolve(Err(GeolocationError::PermissionDenied));
        let GateOutcome::Failed(failed) = outcome else {
            panic!("expected Failed");
        };
        assert_eq!(failed.error().unwrap().as_code(), "permission_denied");
        assert_eq!(failed.retry().state(), DynGateState::Requesting);
    }

    #[test]
    fn cached_fix_is_refused() {
        let requesting = gate().begin();
        let not_before = requesting.position_request().not_before;
        let stale = PositionFix {
            captured_at: not_before.plus(-chrono::Duration::seconds(30)),
            ..fresh_fix(10.0, 5.0)
        };
        let outcome = requesting.resolve(Ok(stale));
        let GateOutcome::Failed(failed) = outcome else {
            panic!("expected Failed");
        };
        assert!(matches!(
            failed.error(),
            Some(GeolocationError::StalePosition { .. })
        ));
    }

    #[test]
    fn replayed_fix_is_refused_on_retry() {
        let requesting = gate().begin();
        let first = PositionFix {
            captured_at: requesting.position_request().not_before,
            ..fresh_fix(150.0, 5.0)
        };
        let GateOutcome::TooFar(too_far) = requesting.resolve(Ok(first)) else {
            panic!("expected TooFar");
        };
        let retrying = too_far.retry();
        // Same capture instant handed back, now placed on site and dated
        // inside the new window.
        let not_before = retrying.position_request().not_before;
        let replay = PositionFix {
            point: property(),
            captured_at: not_before,
            ..first
        };
        let outcome = retrying.resolve(Ok(replay));
        let GateOutcome::Failed(failed) = outcome else {
            panic!("expected Failed");
        };
        assert!(matches!(
            failed.error(),
            Some(GeolocationError::StalePosition { .. })
        ));
    }

    #[test]
    fn fix_after_timeout_fails_the_attempt() {
        let requesting = gate().begin();
        let not_before = requesting.position_request().not_before;
        let late = not_before.plus(chrono::Duration::seconds(16));
        assert!(!requesting.is_expired(not_before.plus(chrono::Duration::seconds(15))));
        assert!(requesting.is_expired(late));

        let fix = PositionFix {
            captured_at: late,
            ..fresh_fix(5.0, 5.0)
        };
        let GateOutcome::Failed(failed) = requesting.resolve_at(Ok(fix), late) else {
            panic!("expected Failed");
        };
        assert_eq!(failed.error().unwrap().as_code(), "timeout");
        assert!(failed.last_result().is_none());

        let retrying = failed.retry();
        let fix = fresh_fix(5.0, 5.0);
        assert_eq!(
            retrying.resolve_at(Ok(fix), fix.captured_at).state(),
            DynGateState::Verified
        );
    }

    #[test]
    fn check_in_expires_after_ttl() {
        let GateOutcome::Verified(v) = gate().begin().resolve(Ok(fresh_fix(5.0, 5.0))) else {
            panic!("expected Verified");
        };
        let check_in = v.check_in();
        let ttl = ProximityPolicy::default().check_in_ttl();
        let verified_at = check_in.verified_at();
        assert!(check_in.is_fresh(ttl, verified_at));
        assert!(check_in.is_fresh(ttl, verified_at.plus(chrono::Duration::seconds(600))));
        assert!(!check_in.is_fresh(ttl, verified_at.plus(chrono::Duration::seconds(601))));
    }

    #[test]
    fn invalid_coordinates_are_refused() {
        let bad = PositionFix {
            point: GeoPoint { lat: 123.0, lng: 0.0 },
            ..fresh_fix(0.0, 5.0)
        };
        assert_eq!(gate().begin().resolve(Ok(bad)).state(), DynGateState::Failed);
    }

    #[test]
    fn cancel_from_every_non_terminal_state() {
        assert_eq!(gate().cancel().state(), DynGateState::Cancelled);
        assert_eq!(gate().begin().cancel().state(), DynGateState::Cancelled);
        let GateOutcome::TooFar(t) = gate().begin().resolve(Ok(fresh_fix(500.0, 5.0))) else {
            panic!("expected TooFar");
        };
        assert_eq!(t.cancel().state(), DynGateState::Cancelled);
    }

    #[test]
    fn transition_log_records_path() {
        let GateOutcome::TooFar(t) = gate().begin().resolve(Ok(fresh_fix(500.0, 5.0))) else {
            panic!("expected TooFar");
        };
        let GateOutcome::Verified(v) = t.retry().resolve(Ok(fresh_fix(5.0, 5.0))) else {
            panic!("expected Verified");
        };
        let path: Vec<_> = v.transitions().iter().map(|t| t.to).collect();
        assert_eq!(
            path,
            vec![
                DynGateState::Requesting,
                DynGateState::TooFar,
                DynGateState::Requesting,
                DynGateState::Verified
            ]
        );
    }

    #[test]
    fn dyn_state_transition_table() {
        assert!(DynGateState::Verified.is_terminal());
        assert!(DynGateState::Cancelled.valid_transitions().is_empty());
        assert!(DynGateState::TooFar
            .valid_transitions()
            .contains(&DynGateState::Requesting));
        assert!(!DynGateState::Idle
            .valid_transitions()
            .contains(&DynGateState::Verified));
    }
}
