//! Branches, inventory and customer addresses.

use crate::error::DispatchError;
use crate::types::{AddressId, AddressSnapshot, BranchId, ItemId, Money, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A merchant's fulfillment location.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch id
    pub id: BranchId,
    /// Owning merchant
    pub merchant_id: UserId,
    /// Display name
    pub name: String,
    /// Pickup address
    pub address: AddressSnapshot,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// An item a branch sells.
///
/// `stock` is informational: placing an order never decrements it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Item id
    pub id: ItemId,
    /// Owning branch
    pub branch_id: BranchId,
    /// Display name
    pub name: String,
    /// Free text description
    pub description: String,
    /// Current unit price
    pub price: Money,
    /// Units on hand
    pub stock: u32,
    /// Whether the item can be ordered
    pub is_active: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Partial update of an inventory item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdate {
    /// New name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New unit price
    pub price: Option<Money>,
    /// New stock level
    pub stock: Option<u32>,
    /// New active flag
    pub is_active: Option<bool>,
}

impl InventoryItem {
    /// Applies `update` in place. Existing orders keep their snapshots.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the new name is blank.
    pub fn apply(&mut self, update: ItemUpdate) -> Result<(), DispatchError> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DispatchError::validation("name", "must not be blank"));
            }
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(stock) = update.stock {
            self.stock = stock;
        }
        if let Some(is_active) = update.is_active {
            self.is_active = is_active;
        }
        Ok(())
    }
}

/// A delivery address owned by one customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerAddress {
    /// Address id
    pub id: AddressId,
    /// Owning customer
    pub customer_id: UserId,
    /// Short label such as "Home"
    pub label: String,
    /// The address itself
    pub address: AddressSnapshot,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Rejects addresses that cannot be delivered to.
///
/// # Errors
///
/// Returns a validation error naming the first offending field.
pub fn validate_address(address: &AddressSnapshot) -> Result<(), DispatchError> {
    if address.line1.trim().is_empty() {
        return Err(DispatchError::validation("line1", "must not be blank"));
    }
    if address.city.trim().is_empty() {
        return Err(DispatchError::validation("city", "must not be blank"));
    }
    if let Some(coordinates) = address.coordinates {
        if !coordinates.is_valid() {
            return Err(DispatchError::validation(
                "coordinates",
                "latitude or longitude out of range",
            ));
        }
    }
    Ok(())
}
