//! # Escrow Error Types
//!
//! Every variant carries the order id and enough state to diagnose the
//! rejection without reading logs.

use campus_core::{Amount, OrderId, OwnerId, ValidationError};
use thiserror::Error;

/// Errors from escrow ledger operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// No such order.
    #[error("{order_id} not found")]
    NotFound {
        /// The order identifier.
        order_id: OrderId,
    },

    /// The caller's view of the order is stale; another transition committed first.
    #[error("{order_id} was modified concurrently: expected version {expected_version}, found {actual_version}")]
    Conflict {
        /// The order identifier.
        order_id: OrderId,
        /// Version the caller read.
        expected_version: u64,
        /// Current version.
        actual_version: u64,
    },

    /// The operation is not legal in the order's current escrow status.
    #[error("{order_id} cannot perform {operation} in status {status}: {reason}")]
    InvariantViolation {
        /// The order identifier.
        order_id: OrderId,
        /// The attempted operation (e.g. "release_funds").
        operation: &'static str,
        /// The current escrow status.
        status: String,
        /// Why it was refused.
        reason: String,
    },

    /// A payment event's amount does not match the order.
    #[error("payment for {order_id} captured {received} but order amount is {expected}")]
    AmountMismatch {
        /// The order identifier.
        order_id: OrderId,
        /// Order amount.
        expected: Amount,
        /// Captured amount.
        received: Amount,
    },

    /// A posting would drive a wallet bucket negative or overflow it.
    ///
    /// Ledger postings are computed from the order, so this indicates a
    /// consistency bug; nothing is applied when it is returned.
    #[error("posting {delta} to {bucket} of {owner_id} is not possible with balance {balance}")]
    InsufficientBalance {
        /// Wallet owner.
        owner_id: OwnerId,
        /// Bucket name.
        bucket: &'static str,
        /// Current balance of the bucket.
        balance: i64,
        /// Attempted change.
        delta: i64,
    },

    /// Invalid order input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}
