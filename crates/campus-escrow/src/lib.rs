//! # campus-escrow — Escrow Ledger and Disclosure Policy
//!
//! ## State machine
//!
//! ```text
//! CREATED ─capture_payment()─▶ HELD ─release_funds()─▶ RELEASED
//!                               │                        │ (within dispute window)
//!                               └──── raise_dispute() ───┴──▶ DISPUTED
//!                                                               │ settle_dispute()
//!                                               RESOLVED_BUYER ◀┴▶ RESOLVED_SELLER
//! ```
//!
//! ## Invariants
//!
//! - `seller_receives + commission == amount`, recomputed from the rate, never stored.
//! - Wallet balances change only through ledger transitions, and every change
//!   is applied together with its status flip or not at all.
//! - Every operation is idempotent on duplicate delivery.
//! - Each order is a single-writer aggregate with a version counter; a caller
//!   holding a stale version gets [`EscrowError::Conflict`] and must refetch.
//!
//! ## Lock order
//!
//! Order lock, then the wallet book. No operation holds two order locks.

pub mod config;
pub mod disclosure;
pub mod error;
pub mod ledger;
pub mod order;
pub mod wallet;

pub use config::EscrowConfig;
pub use disclosure::{
    disclose_contact, visibility, ContactField, Disclosure, DisclosedContact, REDACTED,
};
pub use error::EscrowError;
pub use ledger::{EscrowLedger, TransitionOutcome};
pub use order::{
    ContactDetails, DisputeClaim, DisputeHold, EscrowStatus, FulfillmentType, NewOrder, Order,
    OrderTransition, PaymentCaptured, ReleaseTrigger, SettlementOutcome,
};
pub use wallet::{Bucket, EntryKind, LedgerEntry, Posting, Wallet, WalletBook};
