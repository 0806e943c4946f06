//! # Checkout Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                           │
//! │                                                                         │
//! │  Reviewing (no side effects)      Reserving / Committing (rolled back) │
//! │  ───────────────────────────      ──────────────────────────────────── │
//! │  InvalidInput                     InsufficientStock   (retryable)      │
//! │  NotFound                         LockContention      (retryable)      │
//! │  ProductInvalid                   Persistence                          │
//! │  DiscountRejected                 DiscountRejected (lost a race)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use bazaar_core::{CoreError, DiscountRejection};
use bazaar_db::DbError;
use serde::Serialize;
use thiserror::Error;

/// Result type alias for engine operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

/// The one terminal failure a checkout caller sees.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutError {
    /// Malformed request: empty groups, bad quantity, duplicate product...
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A product, discount or cart does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Product exists but cannot be sold in this shop-group.
    #[error("Product {product_id} cannot be checked out: {reason}")]
    ProductInvalid { product_id: String, reason: String },

    /// The named discount cannot be applied.
    #[error("Discount {discount} rejected: {reason}")]
    DiscountRejected {
        discount: String,
        reason: DiscountRejection,
    },

    /// The ledger refused the reservation.
    ///
    /// ## When This Occurs
    /// - Another buyer took the remaining units first
    /// - The product was never stocked
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },

    /// Could not get the product's lock within the retry budget.
    #[error("Stock for {product_id} is busy, try again")]
    LockContention { product_id: String },

    /// A store write failed.
    #[error("Persistence failure: {message}")]
    Persistence { message: String },
}

impl CheckoutError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CheckoutError::InvalidInput {
            message: message.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CheckoutError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        CheckoutError::Persistence {
            message: message.into(),
        }
    }

    /// True when the same request may succeed if sent again later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::InsufficientStock { .. } | CheckoutError::LockContention { .. }
        )
    }
}

impl From<CoreError> for CheckoutError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ShopMismatch { ref product_id, .. } | CoreError::ProductInactive(ref product_id) => {
                CheckoutError::ProductInvalid {
                    product_id: product_id.clone(),
                    reason: err.to_string(),
                }
            }
            other => CheckoutError::invalid(other.to_string()),
        }
    }
}

impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            DbError::UniqueViolation { .. } | DbError::InvalidInput(_) => {
                CheckoutError::invalid(err.to_string())
            }
            other => CheckoutError::persistence(other.to_string()),
        }
    }
}

// =============================================================================
// Lock Errors
// =============================================================================

/// Failure talking to the key-value store behind the lock manager.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Key-value store unreachable: {0}")]
    Connection(String),

    #[error("Key-value store command failed: {0}")]
    Command(String),
}

impl From<redis::RedisError> for LockError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_timeout() {
            LockError::Connection(err.to_string())
        } else {
            LockError::Command(err.to_string())
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        let stock = CheckoutError::InsufficientStock {
            product_id: "p-1".into(),
            requested: 3,
            available: 2,
        };
        assert!(stock.is_retryable());
        assert!(CheckoutError::LockContention {
            product_id: "p-1".into()
        }
        .is_retryable());
        assert!(!CheckoutError::persistence("disk full").is_retryable());
        assert!(!CheckoutError::not_found("Cart", "c-1").is_retryable());
    }

    #[test]
    fn test_core_error_mapping() {
        let err: CheckoutError = CoreError::ProductInactive("p-9".into()).into();
        assert!(matches!(err, CheckoutError::ProductInvalid { ref product_id, .. } if product_id == "p-9"));

        let err: CheckoutError = CoreError::DuplicateProduct("p-1".into()).into();
        assert!(matches!(err, CheckoutError::InvalidInput { .. }));
    }

    #[test]
    fn test_db_error_mapping() {
        let err: CheckoutError = DbError::not_found("Order", "o-1").into();
        assert_eq!(err, CheckoutError::not_found("Order", "o-1"));

        let err: CheckoutError = DbError::PoolExhausted.into();
        assert!(matches!(err, CheckoutError::Persistence { .. }));
    }

    #[test]
    fn test_serialized_kind_tag() {
        let json = serde_json::to_value(CheckoutError::DiscountRejected {
            discount: "code:SAVE10".into(),
            reason: DiscountRejection::UserLimitExceeded,
        })
        .unwrap();
        assert_eq!(json["kind"], "discount_rejected");
        assert_eq!(json["reason"]["reason"], "user_limit_exceeded");
    }
}
