//! Common types used across CryptoSwap
//!
//! This module provides the domain vocabulary shared by the storage,
//! settlement and order management crates: record identifiers, the
//! caller identity handed over by the identity collaborator, and the
//! order status enumeration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| Error::invalid_input(format!("malformed identifier: {}", s)))
            }
        }
    };
}

define_id!(
    /// Identifier of an account owned by the identity collaborator
    AccountId
);
define_id!(
    /// Identifier of a currency record
    CurrencyId
);
define_id!(
    /// Identifier of an exchange order
    OrderId
);
define_id!(
    /// Identifier of a payment transaction recorded against an order
    TransactionId
);
define_id!(
    /// Identifier of an audit entry
    AuditEntryId
);

/// Account role as reported by the identity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Operator,
    Admin,
}

impl Role {
    /// Operators and admins may manage orders and currencies they do not own
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Operator | Role::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Operator => "operator",
            Role::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "operator" => Ok(Role::Operator),
            "admin" => Ok(Role::Admin),
            other => Err(Error::invalid_input(format!("unknown role: {}", other))),
        }
    }
}

/// KYC state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationTier {
    #[default]
    Unverified,
    Pending,
    Verified,
    Rejected,
}

impl VerificationTier {
    /// Only fully verified accounts bypass order-size limits
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationTier::Verified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationTier::Unverified => "unverified",
            VerificationTier::Pending => "pending",
            VerificationTier::Verified => "verified",
            VerificationTier::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for VerificationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VerificationTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unverified" => Ok(VerificationTier::Unverified),
            "pending" => Ok(VerificationTier::Pending),
            "verified" => Ok(VerificationTier::Verified),
            "rejected" => Ok(VerificationTier::Rejected),
            other => Err(Error::invalid_input(format!("unknown verification tier: {}", other))),
        }
    }
}

/// Authenticated caller, trusted as supplied by the identity collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub account_id: AccountId,
    pub role: Role,
    pub tier: VerificationTier,
}

impl Actor {
    /// Create a plain unverified user
    pub fn user(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::User,
            tier: VerificationTier::Unverified,
        }
    }

    /// Create an operator (verified, staff)
    pub fn operator(account_id: AccountId) -> Self {
        Self {
            account_id,
            role: Role::Operator,
            tier: VerificationTier::Verified,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_tier(mut self, tier: VerificationTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Owner of the resource or staff
    pub fn can_access(&self, owner: AccountId) -> bool {
        self.account_id == owner || self.is_staff()
    }
}

/// Lifecycle status of an exchange order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PendingPayment,
    Paid,
    Processing,
    Completed,
    Canceled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::New,
        OrderStatus::PendingPayment,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Completed,
        OrderStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "new",
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Completed => "completed",
            OrderStatus::Canceled => "canceled",
        }
    }

    /// Completed and canceled orders never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| Error::invalid_input(format!("invalid status: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_parse() {
        let id = CurrencyId::new();
        let parsed: CurrencyId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<CurrencyId>().is_err());
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("pending_payment".parse::<OrderStatus>().unwrap(), OrderStatus::PendingPayment);
        assert_eq!("CANCELED".parse::<OrderStatus>().unwrap(), OrderStatus::Canceled);
        assert!("cancelled".parse::<OrderStatus>().is_err());
        assert!(OrderStatus::Completed.is_terminal());
        assert!(!OrderStatus::Processing.is_terminal());
    }

    #[test]
    fn test_order_status_serde() {
        let json = serde_json::to_string(&OrderStatus::PendingPayment).unwrap();
        assert_eq!(json, "\"pending_payment\"");
    }

    #[test]
    fn test_actor_access() {
        let owner = AccountId::new();
        let user = Actor::user(owner);
        let stranger = Actor::user(AccountId::new());
        let operator = Actor::operator(AccountId::new());

        assert!(user.can_access(owner));
        assert!(!stranger.can_access(owner));
        assert!(operator.can_access(owner));
        assert!(!user.tier.is_verified());
        assert!(operator.tier.is_verified());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
        assert!(Role::Operator.is_staff());
        assert!(!Role::User.is_staff());
    }
}
