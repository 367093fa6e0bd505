#![deny(missing_docs)]

//! # campus-core — Foundational Types for the Trust Engine
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** An [`OrderId`] cannot be passed
//!    where a [`DisputeId`] is expected.
//!
//! 2. **Integer money.** [`Amount`] is always in the smallest currency unit and
//!    [`CommissionRate`] is in basis points. Floats never touch a balance.
//!
//! 3. **[`CanonicalBytes`] is the sole path to digest computation.** Submission
//!    and evidence digests are computed over canonical JSON only.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod geo;
pub mod identity;
pub mod money;
pub mod temporal;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest, DigestAlgorithm};
pub use error::{CanonicalizationError, ValidationError};
pub use geo::{GeoPoint, MicroDegrees};
pub use identity::{AgentId, DisputeId, MediaId, OrderId, OwnerId, TaskId};
pub use money::{Amount, CommissionRate, CommissionSplit};
pub use temporal::Timestamp;
