//! # Orders
//!
//! The order aggregate and its escrow status. Money movements are computed by
//! the [`EscrowLedger`](crate::EscrowLedger); this module owns the status
//! table and the transition log.

use campus_core::{Amount, CommissionRate, CommissionSplit, DisputeId, OrderId, OwnerId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::EscrowError;
use crate::wallet::{Bucket, LedgerEntry};

/// Escrow status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Awaiting payment.
    Created,
    /// Paid; funds held by the platform.
    Held,
    /// Funds released to the seller.
    Released,
    /// Frozen pending adjudication.
    Disputed,
    /// Adjudicated for the buyer; refunded. Terminal.
    ResolvedBuyer,
    /// Adjudicated for the seller; paid out. Terminal.
    ResolvedSeller,
}

impl EscrowStatus {
    /// All statuses.
    pub const ALL: [EscrowStatus; 6] = [
        Self::Created,
        Self::Held,
        Self::Released,
        Self::Disputed,
        Self::ResolvedBuyer,
        Self::ResolvedSeller,
    ];

    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Held => "held",
            Self::Released => "released",
            Self::Disputed => "disputed",
            Self::ResolvedBuyer => "resolved_buyer",
            Self::ResolvedSeller => "resolved_seller",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ResolvedBuyer | Self::ResolvedSeller)
    }

    /// Statuses reachable in one step.
    pub fn valid_transitions(&self) -> &'static [EscrowStatus] {
        match self {
            Self::Created => &[Self::Held],
            Self::Held => &[Self::Released, Self::Disputed],
            Self::Released => &[Self::Disputed],
            Self::Disputed => &[Self::ResolvedBuyer, Self::ResolvedSeller],
            Self::ResolvedBuyer | Self::ResolvedSeller => &[],
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the goods reach the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentType {
    /// Buyer collects in person.
    Pickup,
    /// Seller delivers.
    Delivery,
}

/// What authorized a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseTrigger {
    /// Buyer confirmed receipt.
    BuyerConfirmed,
    /// Pickup handover confirmed.
    PickupConfirmed,
    /// Delivery confirmed.
    DeliveryConfirmed,
    /// Release timer elapsed after fulfilment.
    AutoRelease,
    /// Platform administrator.
    AdminOverride,
}

impl ReleaseTrigger {
    /// Canonical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyerConfirmed => "buyer_confirmed",
            Self::PickupConfirmed => "pickup_confirmed",
            Self::DeliveryConfirmed => "delivery_confirmed",
            Self::AutoRelease => "auto_release",
            Self::AdminOverride => "admin_override",
        }
    }
}

/// Adjudicated outcome applied by [`EscrowLedger::settle_dispute`](crate::EscrowLedger::settle_dispute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Refund the buyer and reverse any seller/platform credit.
    RefundBuyer,
    /// Pay (or confirm payment to) the seller.
    PaySeller,
}

impl SettlementOutcome {
    /// Terminal status this outcome produces.
    pub fn status(&self) -> EscrowStatus {
        match self {
            Self::RefundBuyer => EscrowStatus::ResolvedBuyer,
            Self::PaySeller => EscrowStatus::ResolvedSeller,
        }
    }
}

/// Counterparty personal details, disclosed per [`crate::disclosure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    /// Full name.
    pub name: String,
    /// Delivery or pickup address.
    pub address: String,
    /// Phone number. Never disclosed.
    pub phone: String,
}

/// Input for [`EscrowLedger::create_order`](crate::EscrowLedger::create_order).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    /// Paying party.
    pub buyer_id: OwnerId,
    /// Selling party.
    pub seller_id: OwnerId,
    /// Order total in minor units.
    pub amount: Amount,
    /// Overrides the configured default.
    #[serde(default)]
    pub commission_rate: Option<CommissionRate>,
    /// Pickup or delivery.
    pub fulfillment_type: FulfillmentType,
    /// Buyer's contact details.
    pub buyer_contact: ContactDetails,
    /// Seller's contact details.
    pub seller_contact: ContactDetails,
}

/// Payment-captured event from the payment collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCaptured {
    /// Order paid.
    pub order_id: OrderId,
    /// Amount captured.
    pub amount: Amount,
}

/// A buyer's dispute request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeClaim {
    /// Id of the dispute record the adjudicator will create.
    pub dispute_id: DisputeId,
    /// Buyer's stated reason.
    pub reason: String,
    /// Evidence URLs.
    pub evidence: Vec<String>,
}

/// Frozen-funds record on a disputed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeHold {
    /// The adjudicating dispute.
    pub dispute_id: DisputeId,
    /// Status the order was in when the dispute was raised.
    pub origin: EscrowStatus,
    /// Buyer's stated reason.
    pub reason: String,
    /// Evidence URLs.
    pub evidence: Vec<String>,
    /// When it was raised.
    pub raised_at: Timestamp,
}

/// One status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransition {
    /// Status before.
    pub from: EscrowStatus,
    /// Status after.
    pub to: EscrowStatus,
    /// When.
    pub at: Timestamp,
    /// What caused it (release trigger, `payment_captured`, dispute id, ...).
    pub trigger: String,
}

/// A marketplace order under escrow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Identifier.
    pub id: OrderId,
    /// Paying party.
    pub buyer_id: OwnerId,
    /// Selling party.
    pub seller_id: OwnerId,
    /// Order total in minor units.
    pub amount: Amount,
    /// Platform commission rate.
    pub commission_rate: CommissionRate,
    /// Pickup or delivery.
    pub fulfillment_type: FulfillmentType,
    /// Escrow status. Owned by the ledger.
    pub status: EscrowStatus,
    /// Incremented on every committed change.
    pub version: u64,
    /// Buyer's contact details.
    pub buyer_contact: ContactDetails,
    /// Seller's contact details.
    pub seller_contact: ContactDetails,
    /// Dispute details while or after disputed.
    pub dispute: Option<DisputeHold>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Payment capture time.
    pub paid_at: Option<Timestamp>,
    /// Fulfilment time.
    pub fulfilled_at: Option<Timestamp>,
    /// Release time.
    pub released_at: Option<Timestamp>,
    /// Resolution time.
    pub resolved_at: Option<Timestamp>,
    /// Status history.
    pub transitions: Vec<OrderTransition>,
    /// Wallet postings made on behalf of this order.
    pub journal: Vec<LedgerEntry>,
}

impl Order {
    /// Build a `Created` order.
    pub fn new(input: NewOrder, default_rate: CommissionRate) -> Result<Self, EscrowError> {
        if input.amount.is_zero() {
            return Err(campus_core::ValidationError::InvalidAmount {
                value: 0,
                reason: "order amount must be positive".into(),
            }
            .into());
        }
        if input.buyer_id == input.seller_id {
            return Err(campus_core::ValidationError::InvalidField {
                field: "seller_id",
                reason: "buyer and seller must differ".into(),
            }
            .into());
        }
        Ok(Self {
            id: OrderId::new(),
            buyer_id: input.buyer_id,
            seller_id: input.seller_id,
            amount: input.amount,
            commission_rate: input.commission_rate.unwrap_or(default_rate),
            fulfillment_type: input.fulfillment_type,
            status: EscrowStatus::Created,
            version: 0,
            buyer_contact: input.buyer_contact,
            seller_contact: input.seller_contact,
            dispute: None,
            created_at: Timestamp::now(),
            paid_at: None,
            fulfilled_at: None,
            released_at: None,
            resolved_at: None,
            transitions: Vec::new(),
            journal: Vec::new(),
        })
    }

    /// Seller share and commission, recomputed from amount and rate.
    pub fn split(&self) -> CommissionSplit {
        self.commission_rate.split(self.amount)
    }

    /// What the seller is credited on release.
    pub fn seller_receives(&self) -> Amount {
        self.split().seller_receives
    }

    /// What the platform keeps.
    pub fn commission(&self) -> Amount {
        self.split().commission
    }

    /// Net journal movement for one owner and bucket, in minor units.
    pub fn journal_total(&self, owner: OwnerId, bucket: Bucket) -> i64 {
        self.journal
            .iter()
            .filter(|e| e.owner == owner && e.bucket == bucket)
            .map(|e| e.delta)
            .sum()
    }

    /// Fail with `Conflict` unless the caller read the current version.
    pub fn check_version(&self, expected: u64) -> Result<(), EscrowError> {
        if self.version != expected {
            return Err(EscrowError::Conflict {
                order_id: self.id,
                expected_version: expected,
                actual_version: self.version,
            });
        }
        Ok(())
    }

    pub(crate) fn violation(&self, operation: &'static str, reason: impl Into<String>) -> EscrowError {
        let reason = reason.into();
        tracing::warn!(
            order_id = %self.id,
            operation,
            status = %self.status,
            %reason,
            "escrow operation rejected"
        );
        EscrowError::InvariantViolation {
            order_id: self.id,
            operation,
            status: self.status.as_str().to_string(),
            reason,
        }
    }

    /// Fail with `InvariantViolation` unless `to` is reachable from the current status.
    pub(crate) fn ensure_transition(
        &self,
        operation: &'static str,
        to: EscrowStatus,
    ) -> Result<(), EscrowError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(self.violation(operation, format!("no transition to {to}")));
        }
        Ok(())
    }

    /// Flip status, bump version and append the journal entries.
    ///
    /// Callers run [`Order::ensure_transition`] first and apply the matching
    /// wallet postings under the same locks, so the two commit together.
    pub(crate) fn commit(
        &mut self,
        to: EscrowStatus,
        trigger: impl Into<String>,
        entries: Vec<LedgerEntry>,
    ) {
        debug_assert!(self.status.valid_transitions().contains(&to));
        let from = self.status;
        let at = Timestamp::now();
        self.transitions.push(OrderTransition {
            from,
            to,
            at,
            trigger: trigger.into(),
        });
        self.status = to;
        self.version += 1;
        self.journal.extend(entries);
        tracing::info!(order_id = %self.id, %from, %to, version = self.version, "escrow transition");
    }
}
