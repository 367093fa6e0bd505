//! # campus-geo — Proximity Gate
//!
//! Proves a field agent is physically near a property before a verification
//! audit may begin.
//!
//! - [`distance`]: haversine great-circle distance.
//! - [`policy`]: the threshold check (`check_proximity`).
//! - [`provider`]: the geolocation collaborator and its typed errors.
//! - [`gate`]: the `Idle → Requesting → {Verified | TooFar | Failed | Cancelled}`
//!   typestate machine. Only a `Verified` gate yields a [`CheckIn`].
//! - [`driver`]: one bounded, cancellable location request per attempt.

pub mod distance;
pub mod driver;
pub mod gate;
pub mod policy;
pub mod provider;

pub use distance::{haversine_meters, EARTH_RADIUS_METERS};
pub use driver::{cancellation, locate, CancelHandle, CancelSignal};
pub use gate::{
    Cancelled, CheckIn, DynGateState, Failed, GateOutcome, GateState, GateTransition, Idle,
    ProximityGate, Requesting, TooFar, Verified,
};
pub use policy::{check_proximity, ProximityPolicy, ProximityResult};
pub use provider::{
    GeolocationError, GeolocationProvider, PositionFix, PositionRequest, MockGeolocationProvider,
    MockResponse,
};
