//! Relationship checks between a principal and an order.
//!
//! Capabilities say what a role may do at all; these checks say whether it may
//! do it to this particular order. An order the caller has no relationship with
//! is reported as not found.

use crate::error::DispatchError;
use crate::identity::{Principal, Role};
use crate::order::{Order, OrderStatus};
use crate::types::UserId;

/// Whether `principal` may observe `order` (read it, watch its topics).
#[must_use]
pub fn can_view(principal: &Principal, order: &Order) -> bool {
    match principal.role {
        Role::Admin => true,
        Role::Customer => order.customer_id == principal.user_id,
        Role::Rider => order.rider_id == Some(principal.user_id),
        Role::Merchant => order.merchant_id == principal.user_id,
    }
}

/// Fails with `NotFound` unless `principal` may observe `order`.
///
/// # Errors
///
/// Returns [`DispatchError::NotFound`] for unrelated callers.
pub fn ensure_visible(principal: &Principal, order: &Order) -> Result<(), DispatchError> {
    if can_view(principal, order) {
        Ok(())
    } else {
        Err(DispatchError::not_found("order"))
    }
}

/// Checks the per-role target rules of a plain status update.
///
/// # Errors
///
/// Returns `NotFound` for unrelated callers and `PermissionDenied` when the
/// target is outside what the role may request.
pub fn authorize_status_target(
    principal: &Principal,
    order: &Order,
    to: OrderStatus,
) -> Result<(), DispatchError> {
    ensure_visible(principal, order)?;

    let allowed = match principal.role {
        Role::Admin => true,
        Role::Rider => matches!(
            to,
            OrderStatus::PickedUp | OrderStatus::InTransit | OrderStatus::Delivered
        ),
        Role::Merchant => matches!(to, OrderStatus::Confirmed | OrderStatus::Canceled),
        Role::Customer => to == OrderStatus::Canceled,
    };

    if allowed {
        Ok(())
    } else {
        Err(DispatchError::PermissionDenied(format!(
            "role {} may not move an order to {to}",
            principal.role
        )))
    }
}

/// Addressee of a chat message written by `principal` on `order`.
///
/// Customers write to the assigned rider and riders to the customer. Merchants
/// and admins may watch a conversation but have no addressee, and neither does
/// a customer whose order has no rider yet.
#[must_use]
pub fn chat_recipient(principal: &Principal, order: &Order) -> Option<UserId> {
    match principal.role {
        Role::Customer if order.customer_id == principal.user_id => order.rider_id,
        Role::Rider if order.rider_id == Some(principal.user_id) => Some(order.customer_id),
        _ => None,
    }
}
