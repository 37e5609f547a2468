//! Quote builder: validates a cart against current inventory and prices it.
//!
//! Standalone quoting and order creation share [`build_quote`], so the totals a
//! customer previews are exactly the totals their order is created with.

use crate::catalog::Branch;
use crate::error::DispatchError;
use crate::lifecycle::OrderDraft;
use crate::order::{Order, OrderItem, OrderStatus, PaymentProvider};
use crate::pricing::{PriceBreakdown, price_lines};
use crate::store::{CatalogStore, FeeSettings};
use crate::types::{AddressId, AddressSnapshot, BranchId, ItemId, Money, OrderId, OrderItemId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One requested line of a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Inventory item
    pub item_id: ItemId,
    /// Requested quantity, at least 1
    pub quantity: u32,
}

/// A cart to be priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteRequest {
    /// Fulfilling branch
    pub branch_id: BranchId,
    /// Destination, owned by the caller
    pub address_id: AddressId,
    /// Requested lines
    #[serde(default)]
    pub items: Vec<CartLine>,
}

/// A resolved, priced line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedItem {
    /// Inventory item
    pub item_id: ItemId,
    /// Current item name
    pub name: String,
    /// Requested quantity
    pub quantity: u32,
    /// Current unit price
    pub unit_price: Money,
    /// `unit_price × quantity`
    pub line_total: Money,
}

/// A validated, priced preview of an order.
#[derive(Clone, Debug, PartialEq)]
pub struct Quote {
    /// The branch that would fulfil it
    pub branch: Branch,
    /// Destination snapshot
    pub dropoff: AddressSnapshot,
    /// Lines in request order
    pub items: Vec<QuotedItem>,
    /// Totals
    pub pricing: PriceBreakdown,
}

impl Quote {
    /// Turns the quote into the writes of a new order for `customer`.
    #[must_use]
    pub fn into_draft(
        self,
        customer: UserId,
        provider: PaymentProvider,
        at: DateTime<Utc>,
    ) -> OrderDraft {
        let items = self
            .items
            .into_iter()
            .map(|line| OrderItem {
                id: OrderItemId::new(),
                item_id: Some(line.item_id),
                name: line.name,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let order = Order {
            id: OrderId::new(),
            status: OrderStatus::Created,
            customer_id: customer,
            branch_id: self.branch.id,
            merchant_id: self.branch.merchant_id,
            rider_id: None,
            pickup: self.branch.address,
            dropoff: self.dropoff,
            subtotal: self.pricing.subtotal,
            delivery_fee: self.pricing.delivery_fee,
            total: self.pricing.total,
            items,
            created_at: at,
            updated_at: at,
        };
        OrderDraft::new(order, provider)
    }
}

/// Validates `request` for `customer` and prices it with the current flat fee.
///
/// Checks run in order: quantities, branch, address ownership, items. Missing,
/// inactive and cross-branch items (and duplicated ids) all surface as a single
/// [`DispatchError::ItemMismatch`]. An empty cart is accepted and priced at zero.
///
/// # Errors
///
/// Returns the first failed check, or a storage error.
pub async fn build_quote<S>(
    store: &S,
    customer: UserId,
    request: &QuoteRequest,
) -> Result<Quote, DispatchError>
where
    S: CatalogStore + FeeSettings + ?Sized,
{
    if request.items.iter().any(|line| line.quantity == 0) {
        return Err(DispatchError::validation("quantity", "must be at least 1"));
    }

    let branch = store
        .find_branch(request.branch_id)
        .await?
        .ok_or_else(|| DispatchError::validation("branch_id", "invalid branch"))?;

    let address = store
        .find_address(customer, request.address_id)
        .await?
        .ok_or_else(|| DispatchError::validation("address_id", "address not found"))?;

    let requested: Vec<ItemId> = request.items.iter().map(|line| line.item_id).collect();
    let resolved: HashMap<ItemId, _> = store
        .active_items(branch.id, &requested)
        .await?
        .into_iter()
        .filter(|item| item.branch_id == branch.id && item.is_active)
        .map(|item| (item.id, item))
        .collect();

    if resolved.len() != request.items.len() {
        return Err(DispatchError::ItemMismatch);
    }

    let items = request
        .items
        .iter()
        .map(|line| {
            let item = resolved.get(&line.item_id).ok_or(DispatchError::ItemMismatch)?;
            let line_total = item
                .price
                .checked_mul(line.quantity)
                .ok_or_else(|| DispatchError::validation("items", "order amount is too large"))?;
            Ok(QuotedItem {
                item_id: item.id,
                name: item.name.clone(),
                quantity: line.quantity,
                unit_price: item.price,
                line_total,
            })
        })
        .collect::<Result<Vec<_>, DispatchError>>()?;

    let flat_fee = store.flat_delivery_fee().await?;
    let pricing = price_lines(items.iter().map(|line| (line.unit_price, line.quantity)), flat_fee)?;

    Ok(Quote {
        branch,
        dropoff: address.address,
        items,
        pricing,
    })
}
