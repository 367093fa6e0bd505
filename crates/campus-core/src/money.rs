//! # Money
//!
//! Amounts are non-negative integers in the smallest currency unit (kobo,
//! cents). Commission rates are basis points. Every split of an amount into
//! seller and platform shares is computed here and nowhere else.
//!
//! ## Rounding
//!
//! `seller_receives = round_half_up(amount * (10000 - bps) / 10000)` and
//! `commission = amount - seller_receives`, so the two parts always sum to
//! the amount exactly.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const BPS_DENOMINATOR: i128 = 10_000;

/// A non-negative monetary amount in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Amount(i64);

impl Amount {
    /// Zero.
    pub const ZERO: Amount = Amount(0);

    /// Construct from minor units, rejecting negatives.
    pub fn new(minor_units: i64) -> Result<Self, ValidationError> {
        if minor_units < 0 {
            return Err(ValidationError::InvalidAmount {
                value: minor_units,
                reason: "must not be negative".into(),
            });
        }
        Ok(Self(minor_units))
    }

    /// The value in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Whether the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition. `None` on overflow.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked subtraction. `None` if the result would be negative.
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        match self.0.checked_sub(other.0) {
            Some(v) if v >= 0 => Some(Amount(v)),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Amount {
    type Error = ValidationError;

    fn try_from(v: i64) -> Result<Self, Self::Error> {
        Amount::new(v)
    }
}

impl From<Amount> for i64 {
    fn from(a: Amount) -> i64 {
        a.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A platform commission rate in basis points (1 bp = 0.01%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct CommissionRate(u32);

impl CommissionRate {
    /// Construct from basis points in `0..=10000`.
    pub fn from_bps(bps: u32) -> Result<Self, ValidationError> {
        if bps as i128 > BPS_DENOMINATOR {
            return Err(ValidationError::InvalidCommissionRate { bps });
        }
        Ok(Self(bps))
    }

    /// The rate in basis points.
    pub fn bps(&self) -> u32 {
        self.0
    }

    /// Split `amount` into the seller's share and the platform commission.
    pub fn split(&self, amount: Amount) -> CommissionSplit {
        let keep = BPS_DENOMINATOR - self.0 as i128;
        let scaled = amount.0 as i128 * keep;
        // Round half up; all operands are non-negative.
        let seller = (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR;
        // seller <= amount, so the narrowing cannot truncate.
        let seller_receives = Amount(seller as i64);
        CommissionSplit {
            seller_receives,
            commission: Amount(amount.0 - seller_receives.0),
        }
    }
}

impl TryFrom<u32> for CommissionRate {
    type Error = ValidationError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        CommissionRate::from_bps(bps)
    }
}

impl From<CommissionRate> for u32 {
    fn from(r: CommissionRate) -> u32 {
        r.0
    }
}

impl std::fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

/// The result of applying a [`CommissionRate`] to an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSplit {
    /// What the seller is credited on release.
    pub seller_receives: Amount,
    /// What the platform keeps.
    pub commission: Amount,
}
