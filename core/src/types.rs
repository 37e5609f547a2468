//! Value objects shared by every part of the dispatch engine.
//!
//! Identifiers are UUID newtypes, money is fixed-point cents, and addresses are
//! captured as immutable snapshots so that later edits to a branch or a
//! customer address never rewrite order history.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Identifier of a human principal (customer, rider, merchant or admin)
    UserId
);
define_id!(
    /// Identifier of an order
    OrderId
);
define_id!(
    /// Identifier of a line item inside an order
    OrderItemId
);
define_id!(
    /// Identifier of a merchant branch
    BranchId
);
define_id!(
    /// Identifier of an inventory item
    ItemId
);
define_id!(
    /// Identifier of a customer delivery address
    AddressId
);
define_id!(
    /// Identifier of an order tracking event
    TrackingEventId
);
define_id!(
    /// Identifier of a payment
    PaymentId
);
define_id!(
    /// Identifier of a payment ledger entry
    PaymentTransactionId
);
define_id!(
    /// Identifier of a notification
    NotificationId
);
define_id!(
    /// Identifier of a chat message
    ChatMessageId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents, rendered with exactly two decimals.
///
/// Serializes as a decimal string (`"25.00"`), never as a float.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two amounts, returning `None` on overflow
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Multiplies by a quantity, returning `None` on overflow
    #[must_use]
    pub const fn checked_mul(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Error returned when a decimal amount cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid money amount '{0}': expected a non-negative decimal with at most two places")]
pub struct ParseMoneyError(String);

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (whole, fraction) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let fraction: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Self)
            .ok_or_else(invalid)
    }
}

impl From<Money> for String {
    fn from(amount: Money) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Money {
    type Error = ParseMoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Raw latitude/longitude pair. No routing or geocoding is ever derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Whether both components are inside their valid ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Postal address captured by value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AddressSnapshot {
    /// First address line
    pub line1: String,
    /// Second address line
    #[serde(default)]
    pub line2: String,
    /// City
    pub city: String,
    /// State or region
    #[serde(default)]
    pub state: String,
    /// Postal code
    #[serde(default)]
    pub postal_code: String,
    /// Country code
    #[serde(default = "default_country")]
    pub country: String,
    /// Optional coordinates
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
}

fn default_country() -> String {
    "US".to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(2500).to_string(), "25.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_money_parse() {
        assert_eq!("5".parse::<Money>().unwrap(), Money::from_cents(500));
        assert_eq!("5.5".parse::<Money>().unwrap(), Money::from_cents(550));
        assert_eq!("10.05".parse::<Money>().unwrap(), Money::from_cents(1005));
        assert!("-1.00".parse::<Money>().is_err());
        assert!("1.005".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
        assert!(".50".parse::<Money>().is_err());
    }

    #[test]
    fn test_money_is_a_decimal_string_in_json() {
        let json = serde_json::to_string(&Money::from_cents(2500)).unwrap();
        assert_eq!(json, "\"25.00\"");
        let back: Money = serde_json::from_str("\"5.5\"").unwrap();
        assert_eq!(back, Money::from_cents(550));
        assert!(serde_json::from_str::<Money>("2500").is_err());
    }

    #[test]
    fn test_money_checked_arithmetic() {
        let price = Money::from_cents(1000);
        assert_eq!(price.checked_mul(2), Some(Money::from_cents(2000)));
        assert_eq!(Money::from_cents(u64::MAX).checked_add(price), None);
    }

    #[test]
    fn test_coordinates_range() {
        assert!(Coordinates::new(40.7, -74.0).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
    }

    #[test]
    fn test_ids_are_transparent_in_json() {
        let id = OrderId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
