//! # Identity Newtypes
//!
//! UUID-backed identifiers, valid by construction. Each one is a distinct
//! type and displays with a short prefix (`order:…`, `dispute:…`) so log
//! lines stay unambiguous.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $ty:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $ty(Uuid);

        impl $ty {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID.
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Access the underlying UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $ty {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $ty {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// A marketplace order held in escrow.
    OrderId,
    "order"
);
uuid_id!(
    /// A buyer/seller dispute over an order.
    DisputeId,
    "dispute"
);
uuid_id!(
    /// A property verification task.
    TaskId,
    "task"
);
uuid_id!(
    /// A field agent performing verification audits.
    AgentId,
    "agent"
);
uuid_id!(
    /// The owner of a wallet: buyer, seller, or the platform itself.
    OwnerId,
    "owner"
);
uuid_id!(
    /// A photo or video attached to a field audit.
    MediaId,
    "media"
);

impl OwnerId {
    /// The platform's own wallet, which receives commission.
    pub const PLATFORM: OwnerId = OwnerId(Uuid::nil());

    /// Whether this is the platform wallet.
    pub fn is_platform(&self) -> bool {
        self.0.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        let id = OrderId::from_uuid(Uuid::nil());
        assert_eq!(id.to_string(), "order:00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(DisputeId::new(), DisputeId::new());
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let uuid = Uuid::new_v4();
        let json = serde_json::to_string(&TaskId::from_uuid(uuid)).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_uuid(), &uuid);
    }

    #[test]
    fn platform_owner_is_distinguished() {
        assert!(OwnerId::PLATFORM.is_platform());
        assert!(!OwnerId::new().is_platform());
    }
}
