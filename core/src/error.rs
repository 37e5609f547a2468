//! Error taxonomy of the dispatch engine.

use crate::order::OrderStatus;
use thiserror::Error;

/// Every failure a dispatch operation can report.
///
/// Any error aborts the enclosing unit of work; storage adapters never leave
/// partial writes behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Malformed or semantically invalid input. The message is safe to expose.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Offending input field
        field: &'static str,
        /// Human readable explanation
        message: String,
    },

    /// Requested items did not all resolve to active items of the branch.
    #[error("items must exist, be active and belong to the selected branch")]
    ItemMismatch,

    /// Resource absent, or present but not visible to the caller.
    #[error("{resource} not found")]
    NotFound {
        /// Kind of resource
        resource: &'static str,
    },

    /// Lost a concurrency race; the caller may retry.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The lifecycle does not allow this move.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// Confirmation was requested but the order has no payment row.
    #[error("payment record missing")]
    PaymentMissing,

    /// Role or relationship does not permit the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No valid principal was presented.
    #[error("authentication required")]
    Unauthenticated,

    /// Infrastructure failure. Never shown to callers.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DispatchError {
    /// Shorthand for a validation failure.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Shorthand for a missing resource.
    #[must_use]
    pub const fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Storage(_))
    }
}

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, DispatchError>;
