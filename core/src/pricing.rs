//! Pricing engine: subtotal, flat delivery fee and total.
//!
//! The fee is deliberately flat. It never depends on distance, weight or the
//! size of the cart, only on whether there is anything to deliver.

use crate::error::DispatchError;
use crate::types::Money;
use serde::{Deserialize, Serialize};

/// Fee charged when `DEFAULT_DELIVERY_FEE` and the stored setting are both absent.
pub const DEFAULT_DELIVERY_FEE: Money = Money::from_cents(500);

/// Priced totals of a cart or an order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Σ unit price × quantity
    pub subtotal: Money,
    /// Flat fee, zero for an empty cart
    pub delivery_fee: Money,
    /// `subtotal + delivery_fee`
    pub total: Money,
}

/// Delivery fee for `subtotal` under the configured `flat_fee`.
#[must_use]
pub const fn delivery_fee(subtotal: Money, flat_fee: Money) -> Money {
    if subtotal.is_zero() { Money::ZERO } else { flat_fee }
}

/// Prices `(unit_price, quantity)` lines.
///
/// # Errors
///
/// Returns a validation error if any amount overflows.
pub fn price_lines<I>(lines: I, flat_fee: Money) -> Result<PriceBreakdown, DispatchError>
where
    I: IntoIterator<Item = (Money, u32)>,
{
    let overflow = || DispatchError::validation("items", "order amount is too large");

    let subtotal = lines.into_iter().try_fold(Money::ZERO, |acc, (price, quantity)| {
        price
            .checked_mul(quantity)
            .and_then(|line| acc.checked_add(line))
            .ok_or_else(overflow)
    })?;
    let delivery_fee = delivery_fee(subtotal, flat_fee);
    let total = subtotal.checked_add(delivery_fee).ok_or_else(overflow)?;

    Ok(PriceBreakdown {
        subtotal,
        delivery_fee,
        total,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_cart_is_free() {
        let breakdown = price_lines(Vec::<(Money, u32)>::new(), DEFAULT_DELIVERY_FEE).unwrap();
        assert_eq!(breakdown.subtotal, Money::ZERO);
        assert_eq!(breakdown.delivery_fee, Money::ZERO);
        assert_eq!(breakdown.total, Money::ZERO);
    }

    #[test]
    fn test_two_items_at_ten_dollars() {
        let breakdown = price_lines([(Money::from_cents(1000), 2)], DEFAULT_DELIVERY_FEE).unwrap();
        assert_eq!(breakdown.subtotal.to_string(), "20.00");
        assert_eq!(breakdown.delivery_fee.to_string(), "5.00");
        assert_eq!(breakdown.total.to_string(), "25.00");
    }

    #[test]
    fn test_overflow_is_a_validation_error() {
        let result = price_lines([(Money::from_cents(u64::MAX), 2)], DEFAULT_DELIVERY_FEE);
        assert!(matches!(result, Err(DispatchError::Validation { field: "items", .. })));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn prop_total_is_subtotal_plus_flat_fee(
            lines in prop::collection::vec((0u64..1_000_000, 0u32..1_000), 0..8),
            flat in 0u64..10_000,
        ) {
            let flat = Money::from_cents(flat);
            let lines: Vec<(Money, u32)> = lines
                .into_iter()
                .map(|(cents, quantity)| (Money::from_cents(cents), quantity))
                .collect();
            let expected: u64 = lines.iter().map(|(p, q)| p.cents() * u64::from(*q)).sum();

            let breakdown = price_lines(lines, flat).unwrap();

            prop_assert_eq!(breakdown.subtotal.cents(), expected);
            if expected == 0 {
                prop_assert_eq!(breakdown.delivery_fee, Money::ZERO);
            } else {
                prop_assert_eq!(breakdown.delivery_fee, flat);
            }
            prop_assert_eq!(
                breakdown.total.cents(),
                breakdown.subtotal.cents() + breakdown.delivery_fee.cents()
            );
        }
    }
}
