//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError         - Malformed checkout requests, catalog mismatch │
//! │  └── ValidationError   - Field-level input failures                    │
//! │                                                                         │
//! │  bazaar-core discount module                                           │
//! │  └── DiscountRejection - Why a discount cannot be applied              │
//! │                                                                         │
//! │  bazaar-db                                                             │
//! │  └── DbError           - Database operation failures                   │
//! │                                                                         │
//! │  bazaar-checkout                                                       │
//! │  └── CheckoutError     - The one terminal result callers see           │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → CheckoutError::InvalidInput       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Checkout request and pricing errors.
///
/// All of these are detected before any side effect happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// The request names no shop-groups, or a group with no items.
    #[error("Checkout request is empty: {0}")]
    EmptyRequest(String),

    /// The same product appears twice in one checkout.
    ///
    /// ## When This Occurs
    /// - Client splits one product across two lines
    /// - Client lists a product under two shop-groups
    ///
    /// Each product is reserved once per checkout, so duplicates are refused
    /// instead of silently merged.
    #[error("Product {0} appears more than once in the checkout")]
    DuplicateProduct(String),

    /// The same shop appears as two shop-groups.
    #[error("Shop {0} appears more than once in the checkout")]
    DuplicateShop(String),

    /// Product does not belong to the shop-group that claims it.
    #[error("Product {product_id} does not belong to shop {shop_id}")]
    ShopMismatch { product_id: String, shop_id: String },

    /// Product exists but is unpublished.
    #[error("Product {0} is not available for sale")]
    ProductInactive(String),

    /// Checkout has exceeded maximum allowed lines.
    #[error("Checkout cannot have more than {max} lines")]
    TooManyLines { max: usize },

    /// A price, line total or checkout total does not fit in i64 cents.
    #[error("Amount out of range while pricing {0}")]
    AmountOverflow(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., lowercase discount code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Two fields contradict each other (e.g., start after end).
    #[error("{field} is inconsistent: {reason}")]
    Inconsistent { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::ShopMismatch {
            product_id: "p-1".to_string(),
            shop_id: "shop-9".to_string(),
        };
        assert_eq!(err.to_string(), "Product p-1 does not belong to shop shop-9");

        let err = ValidationError::MustBePositive {
            field: "quantity".to_string(),
        };
        assert_eq!(err.to_string(), "quantity must be positive");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "buyer_id".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
