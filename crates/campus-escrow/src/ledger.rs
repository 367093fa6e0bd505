//! # Escrow Ledger
//!
//! Owns every order and every wallet. Each order sits behind its own mutex;
//! the wallet book sits behind a single mutex taken after the order lock.
//! An operation computes its postings from the locked order, applies them to
//! the wallet book, and flips the order status before releasing either lock.

use std::collections::HashMap;
use std::sync::Arc;

use campus_core::{CommissionRate, DisputeId, OrderId, OwnerId, Timestamp};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::config::EscrowConfig;
use crate::error::EscrowError;
use crate::order::{
    DisputeClaim, DisputeHold, EscrowStatus, NewOrder, Order, PaymentCaptured, ReleaseTrigger,
    SettlementOutcome,
};
use crate::wallet::{Bucket, EntryKind, LedgerEntry, Posting, Wallet, WalletBook};

/// Result of a ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// The order after the operation.
    pub order: Order,
    /// `false` when the call was a duplicate and nothing changed.
    pub applied: bool,
}

impl TransitionOutcome {
    fn applied(order: &Order) -> Self {
        Self {
            order: order.clone(),
            applied: true,
        }
    }

    fn unchanged(order: &Order) -> Self {
        Self {
            order: order.clone(),
            applied: false,
        }
    }
}

/// The escrow ledger.
#[derive(Debug)]
pub struct EscrowLedger {
    orders: RwLock<HashMap<OrderId, Arc<Mutex<Order>>>>,
    wallets: Mutex<WalletBook>,
    default_rate: CommissionRate,
    config: EscrowConfig,
}

impl EscrowLedger {
    /// Create an empty ledger.
    ///
    /// Fails if the configured default commission is out of range.
    pub fn new(config: EscrowConfig) -> Result<Self, EscrowError> {
        let default_rate = CommissionRate::from_bps(config.default_commission_bps)?;
        Ok(Self {
            orders: RwLock::new(HashMap::new()),
            wallets: Mutex::new(WalletBook::new()),
            default_rate,
            config,
        })
    }

    /// Escrow policy in force.
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    fn handle(&self, order_id: OrderId) -> Result<Arc<Mutex<Order>>, EscrowError> {
        self.orders
            .read()
            .get(&order_id)
            .cloned()
            .ok_or(EscrowError::NotFound { order_id })
    }

    /// Register a new order in `Created`.
    pub fn create_order(&self, input: NewOrder) -> Result<Order, EscrowError> {
        let order = Order::new(input, self.default_rate)?;
        tracing::info!(
            order_id = %order.id,
            amount = %order.amount,
            commission_rate = %order.commission_rate,
            "order created"
        );
        self.orders
            .write()
            .insert(order.id, Arc::new(Mutex::new(order.clone())));
        Ok(order)
    }

    /// Snapshot of an order.
    pub fn order(&self, order_id: OrderId) -> Result<Order, EscrowError> {
        Ok(self.handle(order_id)?.lock().clone())
    }

    /// Snapshots of every order, in creation order.
    pub fn orders(&self) -> Vec<Order> {
        let handles: Vec<_> = self.orders.read().values().cloned().collect();
        let mut orders: Vec<Order> = handles.iter().map(|h| h.lock().clone()).collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Current balances of `owner`.
    pub fn wallet(&self, owner: OwnerId) -> Wallet {
        self.wallets.lock().wallet(owner)
    }

    /// Balances of the platform commission wallet.
    pub fn platform_wallet(&self) -> Wallet {
        self.wallet(OwnerId::PLATFORM)
    }

    /// Apply a payment-captured event: `Created → Held`.
    ///
    /// A repeat delivery for an order that has already left `Created` is a
    /// no-op. The seller's share is credited to their pending balance.
    pub fn capture_payment(&self, event: PaymentCaptured) -> Result<TransitionOutcome, EscrowError> {
        let handle = self.handle(event.order_id)?;
        let mut order = handle.lock();
        if order.status != EscrowStatus::Created {
            tracing::debug!(order_id = %order.id, status = %order.status, "duplicate payment event ignored");
            return Ok(TransitionOutcome::unchanged(&order));
        }
        if event.amount != order.amount {
            return Err(EscrowError::AmountMismatch {
                order_id: order.id,
                expected: order.amount,
                received: event.amount,
            });
        }
        order.ensure_transition("capture_payment", EscrowStatus::Held)?;

        let postings = [Posting::credit(order.seller_id, Bucket::Pending, order.seller_receives())];
        let mut wallets = self.wallets.lock();
        let entries = post(&mut wallets, order.id, EntryKind::Capture, &postings)?;
        order.paid_at = Some(Timestamp::now());
        order.commit(EscrowStatus::Held, "payment_captured", entries);
        Ok(TransitionOutcome::applied(&order))
    }

    /// Record that the goods were handed over or delivered.
    ///
    /// Starts the auto-release timer. Repeat calls keep the first timestamp.
    pub fn mark_fulfilled(&self, order_id: OrderId) -> Result<TransitionOutcome, EscrowError> {
        let handle = self.handle(order_id)?;
        let mut order = handle.lock();
        if order.status != EscrowStatus::Held {
            return Err(order.violation("mark_fulfilled", "only held orders can be fulfilled"));
        }
        if order.fulfilled_at.is_some() {
            return Ok(TransitionOutcome::unchanged(&order));
        }
        order.fulfilled_at = Some(Timestamp::now());
        order.version += 1;
        tracing::info!(order_id = %order.id, fulfillment = ?order.fulfillment_type, "order fulfilled");
        Ok(TransitionOutcome::applied(&order))
    }

    /// Release held funds: `Held → Released`.
    ///
    /// Credits the seller's share to their available balance and the
    /// commission to the platform. Releasing an already released order is a
    /// no-op.
    pub fn release_funds(
        &self,
        order_id: OrderId,
        expected_version: u64,
        trigger: ReleaseTrigger,
    ) -> Result<TransitionOutcome, EscrowError> {
        let handle = self.handle(order_id)?;
        let mut order = handle.lock();
        if order.status == EscrowStatus::Released {
            tracing::debug!(order_id = %order.id, "duplicate release ignored");
            return Ok(TransitionOutcome::unchanged(&order));
        }
        order.check_version(expected_version)?;
        self.release_locked(&mut order, trigger)?;
        Ok(TransitionOutcome::applied(&order))
    }

    fn release_locked(&self, order: &mut Order, trigger: ReleaseTrigger) -> Result<(), EscrowError> {
        if order.status != EscrowStatus::Held {
            return Err(order.violation("release_funds", "funds are not held"));
        }
        order.ensure_transition("release_funds", EscrowStatus::Released)?;

        let mut wallets = self.wallets.lock();
        let entries = post(&mut wallets, order.id, EntryKind::Release, &release_postings(order))?;
        order.released_at = Some(Timestamp::now());
        order.commit(EscrowStatus::Released, trigger.as_str(), entries);
        Ok(())
    }

    /// Freeze an order for adjudication: `Held | Released → Disputed`.
    ///
    /// A released order can only be disputed inside the dispute window; its
    /// released credits move back to pending. Repeating the call with the
    /// same dispute id is a no-op.
    pub fn raise_dispute(
        &self,
        order_id: OrderId,
        expected_version: u64,
        claim: DisputeClaim,
    ) -> Result<TransitionOutcome, EscrowError> {
        self.raise_dispute_at(order_id, expected_version, claim, Timestamp::now())
    }

    fn raise_dispute_at(
        &self,
        order_id: OrderId,
        expected_version: u64,
        claim: DisputeClaim,
        now: Timestamp,
    ) -> Result<TransitionOutcome, EscrowError> {
        let handle = self.handle(order_id)?;
        let mut order = handle.lock();
        if order.status == EscrowStatus::Disputed
            && order.dispute.as_ref().map(|d| d.dispute_id) == Some(claim.dispute_id)
        {
            return Ok(TransitionOutcome::unchanged(&order));
        }
        order.check_version(expected_version)?;

        let origin = order.status;
        let postings = match origin {
            EscrowStatus::Held => Vec::new(),
            EscrowStatus::Released => {
                let released_at = order.released_at.unwrap_or(order.created_at);
                if now.since(&released_at) > self.config.dispute_window() {
                    return Err(order.violation(
                        "raise_dispute",
                        format!(
                            "dispute window of {}h closed",
                            self.config.dispute_window_hours
                        ),
                    ));
                }
                freeze_postings(&order)
            }
            EscrowStatus::Disputed => {
                return Err(order.violation("raise_dispute", "order is already disputed"))
            }
            _ => return Err(order.violation("raise_dispute", "order cannot be disputed")),
        };
        order.ensure_transition("raise_dispute", EscrowStatus::Disputed)?;

        let mut wallets = self.wallets.lock();
        let entries = post(&mut wallets, order.id, EntryKind::DisputeFreeze, &postings)?;
        let trigger = claim.dispute_id.to_string();
        order.dispute = Some(DisputeHold {
            dispute_id: claim.dispute_id,
            origin,
            reason: claim.reason,
            evidence: claim.evidence,
            raised_at: now,
        });
        order.commit(EscrowStatus::Disputed, trigger, entries);
        Ok(TransitionOutcome::applied(&order))
    }

    /// Apply an adjudicated outcome: `Disputed → ResolvedBuyer | ResolvedSeller`.
    ///
    /// Repeating the same outcome is a no-op; a different outcome on a
    /// resolved order is rejected.
    pub fn settle_dispute(
        &self,
        order_id: OrderId,
        dispute_id: DisputeId,
        outcome: SettlementOutcome,
    ) -> Result<TransitionOutcome, EscrowError> {
        let handle = self.handle(order_id)?;
        let mut order = handle.lock();
        let origin = match &order.dispute {
            Some(hold) if hold.dispute_id == dispute_id => hold.origin,
            _ => {
                return Err(order.violation(
                    "settle_dispute",
                    format!("{dispute_id} does not hold this order"),
                ))
            }
        };
        let to = outcome.status();
        if order.status.is_terminal() {
            if order.status == to {
                return Ok(TransitionOutcome::unchanged(&order));
            }
            return Err(order.violation("settle_dispute", "order is already resolved"));
        }
        order.ensure_transition("settle_dispute", to)?;

        let (kind, postings) = match outcome {
            SettlementOutcome::RefundBuyer => (EntryKind::SettleBuyer, refund_postings(&order, origin)),
            SettlementOutcome::PaySeller => (EntryKind::SettleSeller, payout_postings(&order, origin)),
        };
        let mut wallets = self.wallets.lock();
        let entries = post(&mut wallets, order.id, kind, &postings)?;
        let now = Timestamp::now();
        if outcome == SettlementOutcome::PaySeller && order.released_at.is_none() {
            order.released_at = Some(now);
        }
        order.resolved_at = Some(now);
        order.commit(to, dispute_id.to_string(), entries);
        Ok(TransitionOutcome::applied(&order))
    }

    /// Release every held order fulfilled at least `auto_release_after` before `now`.
    ///
    /// Returns the ids released by this sweep.
    pub fn sweep_auto_release(&self, now: Timestamp) -> Vec<OrderId> {
        let handles: Vec<_> = self.orders.read().values().cloned().collect();
        let after = self.config.auto_release_after();
        let mut released = Vec::new();
        for handle in handles {
            let mut order = handle.lock();
            let due = order.status == EscrowStatus::Held
                && order
                    .fulfilled_at
                    .map(|at| now.since(&at) >= after)
                    .unwrap_or(false);
            if !due {
                continue;
            }
            match self.release_locked(&mut order, ReleaseTrigger::AutoRelease) {
                Ok(()) => released.push(order.id),
                Err(err) => tracing::warn!(order_id = %order.id, error = %err, "auto-release failed"),
            }
        }
        if !released.is_empty() {
            tracing::info!(count = released.len(), "auto-release sweep");
        }
        released
    }
}

fn post(
    wallets: &mut WalletBook,
    order_id: OrderId,
    kind: EntryKind,
    postings: &[Posting],
) -> Result<Vec<LedgerEntry>, EscrowError> {
    let postings: Vec<Posting> = postings.iter().copied().filter(|p| p.delta != 0).collect();
    wallets.apply(order_id, kind, &postings)
}

fn release_postings(order: &Order) -> Vec<Posting> {
    let split = order.split();
    let platform = OwnerId::PLATFORM;
    vec![
        Posting::debit(order.seller_id, Bucket::Pending, split.seller_receives),
        Posting::credit(order.seller_id, Bucket::Available, split.seller_receives),
        Posting::credit(order.seller_id, Bucket::TotalEarnings, split.seller_receives),
        Posting::credit(platform, Bucket::Available, split.commission),
        Posting::credit(platform, Bucket::TotalEarnings, split.commission),
    ]
}

fn freeze_postings(order: &Order) -> Vec<Posting> {
    let split = order.split();
    let platform = OwnerId::PLATFORM;
    vec![
        Posting::debit(order.seller_id, Bucket::Available, split.seller_receives),
        Posting::credit(order.seller_id, Bucket::Pending, split.seller_receives),
        Posting::debit(platform, Bucket::Available, split.commission),
        Posting::credit(platform, Bucket::Pending, split.commission),
    ]
}

fn refund_postings(order: &Order, origin: EscrowStatus) -> Vec<Posting> {
    let split = order.split();
    let platform = OwnerId::PLATFORM;
    let mut postings = vec![Posting::debit(order.seller_id, Bucket::Pending, split.seller_receives)];
    if origin == EscrowStatus::Released {
        postings.extend([
            Posting::debit(order.seller_id, Bucket::TotalEarnings, split.seller_receives),
            Posting::debit(platform, Bucket::Pending, split.commission),
            Posting::debit(platform, Bucket::TotalEarnings, split.commission),
        ]);
    }
    postings.push(Posting::credit(order.buyer_id, Bucket::Available, order.amount));
    postings
}

fn payout_postings(order: &Order, origin: EscrowStatus) -> Vec<Posting> {
    if origin == EscrowStatus::Held {
        return release_postings(order);
    }
    let split = order.split();
    let platform = OwnerId::PLATFORM;
    vec![
        Posting::debit(order.seller_id, Bucket::Pending, split.seller_receives),
        Posting::credit(order.seller_id, Bucket::Available, split.seller_receives),
        Posting::debit(platform, Bucket::Pending, split.commission),
        Posting::credit(platform, Bucket::Available, split.commission),
    ]
}
