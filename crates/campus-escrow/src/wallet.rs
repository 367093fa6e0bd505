//! # Wallets
//!
//! Per-owner balances in three buckets. Balances only move through
//! [`WalletBook::apply`], which takes a batch of postings and applies all of
//! them or none.

use std::collections::HashMap;

use campus_core::{Amount, OrderId, OwnerId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;

/// A participant's balances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    /// Owner. [`OwnerId::PLATFORM`] for the commission wallet.
    pub owner_id: OwnerId,
    /// Withdrawable funds.
    pub available: Amount,
    /// Funds credited but still held by escrow or frozen by a dispute.
    pub pending: Amount,
    /// Lifetime earnings from released orders.
    pub total_earnings: Amount,
}

impl Wallet {
    /// An empty wallet.
    pub fn empty(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            available: Amount::ZERO,
            pending: Amount::ZERO,
            total_earnings: Amount::ZERO,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut Amount {
        match bucket {
            Bucket::Available => &mut self.available,
            Bucket::Pending => &mut self.pending,
            Bucket::TotalEarnings => &mut self.total_earnings,
        }
    }

    fn post(&mut self, bucket: Bucket, delta: i64) -> Result<(), EscrowError> {
        let owner_id = self.owner_id;
        let slot = self.bucket_mut(bucket);
        let balance = slot.minor_units();
        let next = balance
            .checked_add(delta)
            .and_then(|v| Amount::new(v).ok())
            .ok_or(EscrowError::InsufficientBalance {
                owner_id,
                bucket: bucket.as_str(),
                balance,
                delta,
            })?;
        *slot = next;
        Ok(())
    }
}

/// A wallet balance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Withdrawable.
    Available,
    /// Held or frozen.
    Pending,
    /// Lifetime earnings.
    TotalEarnings,
}

impl Bucket {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Pending => "pending",
            Self::TotalEarnings => "total_earnings",
        }
    }
}

/// Which ledger operation produced a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Payment captured; seller share moved into pending.
    Capture,
    /// Funds released to seller and platform.
    Release,
    /// Released funds pulled back into pending by a dispute.
    DisputeFreeze,
    /// Dispute settled for the buyer.
    SettleBuyer,
    /// Dispute settled for the seller.
    SettleSeller,
}

/// A single signed change to one wallet bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Wallet owner.
    pub owner: OwnerId,
    /// Bucket changed.
    pub bucket: Bucket,
    /// Signed change in minor units.
    pub delta: i64,
}

impl Posting {
    /// Credit `amount` to `bucket`.
    pub fn credit(owner: OwnerId, bucket: Bucket, amount: Amount) -> Self {
        Self {
            owner,
            bucket,
            delta: amount.minor_units(),
        }
    }

    /// Debit `amount` from `bucket`.
    pub fn debit(owner: OwnerId, bucket: Bucket, amount: Amount) -> Self {
        Self {
            owner,
            bucket,
            delta: -amount.minor_units(),
        }
    }
}

/// An applied posting, kept on the order's journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Order the posting belongs to.
    pub order_id: OrderId,
    /// Producing operation.
    pub kind: EntryKind,
    /// Wallet owner.
    pub owner: OwnerId,
    /// Bucket changed.
    pub bucket: Bucket,
    /// Signed change in minor units.
    pub delta: i64,
    /// When it was applied.
    pub at: Timestamp,
}

/// All wallets, keyed by owner.
#[derive(Debug, Default)]
pub struct WalletBook {
    wallets: HashMap<OwnerId, Wallet>,
}

impl WalletBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The owner's wallet, or an empty one if they have never been credited.
    pub fn wallet(&self, owner: OwnerId) -> Wallet {
        self.wallets
            .get(&owner)
            .copied()
            .unwrap_or_else(|| Wallet::empty(owner))
    }

    /// Apply every posting or none of them.
    ///
    /// Returns the journal entries for the applied postings.
    pub fn apply(
        &mut self,
        order_id: OrderId,
        kind: EntryKind,
        postings: &[Posting],
    ) -> Result<Vec<LedgerEntry>, EscrowError> {
        let mut staged: HashMap<OwnerId, Wallet> = HashMap::new();
        for p in postings {
            let wallet = staged.entry(p.owner).or_insert_with(|| self.wallet(p.owner));
            wallet.post(p.bucket, p.delta)?;
        }
        self.wallets.extend(staged);

        let at = Timestamp::now();
        Ok(postings
            .iter()
            .map(|p| LedgerEntry {
                order_id,
                kind,
                owner: p.owner,
                bucket: p.bucket,
                delta: p.delta,
                at,
            })
            .collect())
    }

    /// Number of wallets with any history.
    pub fn len(&self) -> usize {
        self.wallets.len()
    }

    /// Whether no wallet has been touched.
    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }
}
