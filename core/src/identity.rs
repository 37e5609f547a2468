//! Roles, principals and per-operation capabilities.
//!
//! The identity provider hands us a principal with a stable id and exactly one
//! role. Every service operation names the [`Capability`] it needs and checks it
//! here, instead of comparing role strings at the call site.

use crate::error::DispatchError;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four actor roles of the marketplace.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Places and pays for orders
    Customer,
    /// Picks up and delivers orders
    Rider,
    /// Owns branches and their inventory
    Merchant,
    /// Operates the marketplace
    Admin,
}

impl Role {
    /// Whether this role holds the given capability.
    #[must_use]
    pub const fn allows(self, capability: Capability) -> bool {
        use Capability as C;
        match self {
            Self::Customer => matches!(
                capability,
                C::QuoteOrder
                    | C::PlaceOrder
                    | C::ConfirmOrder
                    | C::Reorder
                    | C::CancelOrder
                    | C::ManageAddresses
            ),
            Self::Rider => matches!(
                capability,
                C::AcceptOrder | C::UpdateOrderStatus | C::ManageAvailability | C::ReportLocation
            ),
            Self::Merchant => matches!(
                capability,
                C::ManageCatalog | C::ViewBranchAnalytics | C::UpdateOrderStatus | C::CancelOrder
            ),
            Self::Admin => matches!(
                capability,
                C::ReassignOrder
                    | C::ConfigureFees
                    | C::ViewAllOrders
                    | C::UpdateOrderStatus
                    | C::CancelOrder
            ),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Customer => "CUSTOMER",
            Self::Rider => "RIDER",
            Self::Merchant => "MERCHANT",
            Self::Admin => "ADMIN",
        };
        f.write_str(name)
    }
}

/// Operations that are gated by role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Price a cart
    QuoteOrder,
    /// Create an order from a cart
    PlaceOrder,
    /// Confirm payment for an own order
    ConfirmOrder,
    /// Copy an own order into a new one
    Reorder,
    /// Cancel an order
    CancelOrder,
    /// Create and list delivery addresses
    ManageAddresses,
    /// Self-accept an available order
    AcceptOrder,
    /// Move an order along its lifecycle
    UpdateOrderStatus,
    /// Toggle the online flag
    ManageAvailability,
    /// Report the current position
    ReportLocation,
    /// Create branches and inventory items
    ManageCatalog,
    /// Read branch statistics
    ViewBranchAnalytics,
    /// Assign or replace the rider of any order
    ReassignOrder,
    /// Change the flat delivery fee
    ConfigureFees,
    /// List every order in the marketplace
    ViewAllOrders,
}

/// An authenticated caller, trusted verbatim from the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user id
    pub user_id: UserId,
    /// The caller's single role
    pub role: Role,
}

impl Principal {
    /// Creates a principal.
    #[must_use]
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    /// Fails with `PermissionDenied` unless the role holds `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::PermissionDenied`] when the role lacks the capability.
    pub fn require(&self, capability: Capability) -> Result<(), DispatchError> {
        if self.role.allows(capability) {
            Ok(())
        } else {
            Err(DispatchError::PermissionDenied(format!(
                "role {} may not perform {capability:?}",
                self.role
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_riders_accept() {
        assert!(Role::Rider.allows(Capability::AcceptOrder));
        assert!(!Role::Customer.allows(Capability::AcceptOrder));
        assert!(!Role::Merchant.allows(Capability::AcceptOrder));
        assert!(!Role::Admin.allows(Capability::AcceptOrder));
    }

    #[test]
    fn test_only_admins_reassign_and_configure() {
        for role in [Role::Customer, Role::Rider, Role::Merchant] {
            assert!(!role.allows(Capability::ReassignOrder));
            assert!(!role.allows(Capability::ConfigureFees));
        }
        assert!(Role::Admin.allows(Capability::ReassignOrder));
        assert!(Role::Admin.allows(Capability::ConfigureFees));
    }

    #[test]
    fn test_require_reports_permission_denied() {
        let principal = Principal::new(UserId::new(), Role::Customer);
        assert!(principal.require(Capability::PlaceOrder).is_ok());
        assert!(matches!(
            principal.require(Capability::ManageCatalog),
            Err(DispatchError::PermissionDenied(_))
        ));
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Rider).ok().as_deref(), Some("\"RIDER\""));
    }
}
