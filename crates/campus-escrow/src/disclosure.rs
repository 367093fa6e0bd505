//! # Counterparty Disclosure
//!
//! Contact details are revealed to the counterparty only once money is
//! committed. The decision is a pure function of escrow status and field;
//! nothing about the viewer is consulted.
//!
//! | status          | name | address | phone |
//! |-----------------|------|---------|-------|
//! | created         | no   | no      | no    |
//! | held            | yes  | yes     | no    |
//! | released        | yes  | yes     | no    |
//! | disputed        | no   | no      | no    |
//! | resolved_buyer  | no   | no      | no    |
//! | resolved_seller | yes  | yes     | no    |

use serde::{Deserialize, Serialize};

use crate::order::{ContactDetails, EscrowStatus};

/// Placeholder shown in place of a hidden value.
pub const REDACTED: &str = "[REDACTED]";

/// A disclosable contact field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    /// Full name.
    Name,
    /// Address.
    Address,
    /// Phone number.
    Phone,
}

/// Whether `field` may be shown to the counterparty in `status`.
pub fn visibility(status: EscrowStatus, field: ContactField) -> bool {
    match field {
        ContactField::Phone => false,
        ContactField::Name | ContactField::Address => matches!(
            status,
            EscrowStatus::Held | EscrowStatus::Released | EscrowStatus::ResolvedSeller
        ),
    }
}

/// One field after the policy is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disclosure {
    /// Whether the raw value is shown.
    pub visible: bool,
    /// The raw value, or [`REDACTED`].
    pub value: String,
}

impl Disclosure {
    fn of(status: EscrowStatus, field: ContactField, raw: &str) -> Self {
        let visible = visibility(status, field);
        Self {
            visible,
            value: if visible { raw.to_string() } else { REDACTED.to_string() },
        }
    }
}

/// Contact details as the counterparty sees them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosedContact {
    /// Name.
    pub name: Disclosure,
    /// Address.
    pub address: Disclosure,
    /// Phone.
    pub phone: Disclosure,
}

/// Apply the policy to a full set of contact details.
pub fn disclose_contact(status: EscrowStatus, contact: &ContactDetails) -> DisclosedContact {
    DisclosedContact {
        name: Disclosure::of(status, ContactField::Name, &contact.name),
        address: Disclosure::of(status, ContactField::Address, &contact.address),
        phone: Disclosure::of(status, ContactField::Phone, &contact.phone),
    }
}
