//! # Location Request Driver
//!
//! Runs one location attempt as a cancellable future bounded by the policy
//! timeout. Retrying is the caller's decision; a `TooFar` or `Failed` gate
//! can be retried and passed back in.

use tokio::sync::watch;

use crate::gate::{GateOutcome, ProximityGate, Requesting};
use crate::provider::{GeolocationError, GeolocationProvider};

/// Create a linked cancel handle and signal.
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// The side that aborts an attempt (the agent's "cancel" button).
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// The side observed by [`locate`].
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self(rx)
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Handle dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Perform one location request for `gate`.
///
/// Returns `Cancelled` if `cancel` fires first, `Failed` with
/// [`GeolocationError::Timeout`] if the policy timeout elapses, and otherwise
/// the result of [`ProximityGate::resolve`].
pub async fn locate(
    gate: ProximityGate<Requesting>,
    provider: &dyn GeolocationProvider,
    cancel: &mut CancelSignal,
) -> GateOutcome {
    if cancel.is_cancelled() {
        return GateOutcome::Cancelled(gate.cancel());
    }
    let request = gate.position_request();
    let started = tokio::time::Instant::now();
    tracing::debug!(
        task_id = %gate.task_id,
        provider = provider.provider_name(),
        attempt = gate.attempts(),
        "requesting position"
    );

    let reading = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        res = tokio::time::timeout(request.timeout, provider.current_position(&request)) => Some(res),
    };

    match reading {
        None => {
            tracing::info!(task_id = %gate.task_id, "location request cancelled");
            GateOutcome::Cancelled(gate.cancel())
        }
        Some(Ok(result)) => gate.resolve(result),
        Some(Err(_elapsed)) => gate.resolve(Err(GeolocationError::Timeout {
            elapsed_ms: started.elapsed().as_millis() as u64,
        })),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use campus_core::{AgentId, GeoPoint, TaskId};

    use super::*;
    use crate::gate::{DynGateState, ProximityGate};
    use crate::policy::ProximityPolicy;
    use crate::provider::{MockGeolocationProvider, MockResponse};

    fn property() -> GeoPoint {
        GeoPoint::new(-1.2921, 36.8219).unwrap()
    }

    fn requesting() -> ProximityGate<Requesting> {
        ProximityGate::new(TaskId::new(), AgentId::new(), property(), ProximityPolicy::default()).begin()
    }

    #[tokio::test]
    async fn fresh_fix_near_property_verifies() {
        let provider = MockGeolocationProvider::new([MockResponse::Fix {
            point: property(),
            accuracy_meters: 12.0,
        }]);
        let outcome = locate(requesting(), &provider, &mut CancelSignal::never()).await;
        assert_eq!(outcome.state(), DynGateState::Verified);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_times_out_after_policy_bound() {
        let provider = MockGeolocationProvider::new([MockResponse::Hang]);
        let outcome = locate(requesting(), &provider, &mut CancelSignal::never()).await;
        let crate::gate::GateOutcome::Failed(failed) = outcome else {
            panic!("expected Failed");
        };
        match failed.error() {
            Some(GeolocationError::Timeout { elapsed_ms }) => assert!(*elapsed_ms >= 15_000),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_request_yields_cancelled() {
        let provider = MockGeolocationProvider::new([MockResponse::Hang]);
        let (handle, mut signal) = cancellation();
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            handle.cancel();
        });
        let outcome = locate(requesting(), &provider, &mut signal).await;
        canceller.await.unwrap();
        assert_eq!(outcome.state(), DynGateState::Cancelled);
        assert!(outcome.check_in().is_none());
    }

    #[tokio::test]
    async fn already_cancelled_signal_skips_provider() {
        let provider = MockGeolocationProvider::new([MockResponse::Fix {
            point: property(),
            accuracy_meters: 5.0,
        }]);
        let (handle, mut signal) = cancellation();
        handle.cancel();
        let outcome = locate(requesting(), &provider, &mut signal).await;
        assert_eq!(outcome.state(), DynGateState::Cancelled);
        assert_eq!(provider.remaining(), 1);
    }

    #[tokio::test]
    async fn stale_fix_from_provider_fails_then_retry_succeeds() {
        let provider = MockGeolocationProvider::new([
            MockResponse::Stale {
                point: property(),
                accuracy_meters: 5.0,
                age: chrono::Duration::minutes(10),
            },
            MockResponse::Fix {
                point: property(),
                accuracy_meters: 5.0,
            },
        ]);
        let mut never = CancelSignal::never();
        let crate::gate::GateOutcome::Failed(failed) = locate(requesting(), &provider, &mut never).await else {
            panic!("expected Failed");
        };
        let outcome = locate(failed.retry(), &provider, &mut never).await;
        assert_eq!(outcome.state(), DynGateState::Verified);
    }
}
