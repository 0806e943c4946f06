//! # Validation Module
//!
//! Input validation for checkout requests and discount definitions.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Request shape (THIS MODULE)                                  │
//! │  ├── ids present, quantities 1..=999, fees >= 0                        │
//! │  └── no duplicate shops/products, bounded line count                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Catalog + discount rules (pricing / discount modules)        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (available >= 0)                                            │
//! │  └── UNIQUE (shop_id, code)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashSet;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::{CheckoutRequest, DiscountKind, DiscountScope, NewDiscount};
use crate::{
    DISCOUNT_CODE_MAX_LEN, DISCOUNT_CODE_MIN_LEN, MAX_CHECKOUT_LINES, MAX_ITEM_QUANTITY,
    MAX_SHIPPING_FEE_CENTS,
};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Field Validators
// =============================================================================

/// Validates that an identifier is present.
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0); a zero-quantity reservation is invalid input
/// - Must not exceed MAX_ITEM_QUANTITY (999)
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount in cents (shipping fee, minimum order).
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a shipping fee: not negative and at most
/// [`MAX_SHIPPING_FEE_CENTS`].
pub fn validate_shipping_fee(cents: i64) -> ValidationResult<()> {
    validate_non_negative_cents("shipping_fee_cents", cents)?;
    if cents > MAX_SHIPPING_FEE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: "shipping_fee_cents".to_string(),
            min: 0,
            max: MAX_SHIPPING_FEE_CENTS,
        });
    }
    Ok(())
}

/// Normalizes and validates a discount code.
///
/// ## Rules
/// - Surrounding whitespace is ignored, letters are uppercased
/// - 3 to 20 characters
/// - ASCII letters and digits only
///
/// ## Example
/// ```rust
/// use bazaar_core::validation::normalize_discount_code;
///
/// assert_eq!(normalize_discount_code(" save10 ").unwrap(), "SAVE10");
/// assert!(normalize_discount_code("NO").is_err());
/// assert!(normalize_discount_code("SAVE-10").is_err());
/// ```
pub fn normalize_discount_code(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.len() < DISCOUNT_CODE_MIN_LEN || code.len() > DISCOUNT_CODE_MAX_LEN {
        return Err(ValidationError::OutOfRange {
            field: "code length".to_string(),
            min: DISCOUNT_CODE_MIN_LEN as i64,
            max: DISCOUNT_CODE_MAX_LEN as i64,
        });
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(code)
}

// =============================================================================
// Discount Definitions
// =============================================================================

/// Validates a discount definition before it is stored.
///
/// Returns the normalized code.
///
/// ## Rules
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  code                 uppercase alphanumeric, 3..=20                    │
/// │  starts_at < ends_at                                                    │
/// │  percentage           0 < percent <= 100                                │
/// │  fixed amount         amount > 0 and min_order_value >= amount          │
/// │  max_uses             None (unlimited) or >= 1                          │
/// │  max_uses_per_user    >= 1                                              │
/// │  max_discount_amount  None or > 0                                       │
/// │  specific scope       at least one product id                           │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_new_discount(def: &NewDiscount) -> ValidationResult<String> {
    validate_id("shop_id", &def.shop_id)?;
    let code = normalize_discount_code(&def.code)?;

    if def.name.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if def.starts_at >= def.ends_at {
        return Err(ValidationError::Inconsistent {
            field: "starts_at".to_string(),
            reason: "must be before ends_at".to_string(),
        });
    }

    validate_non_negative_cents("min_order_value_cents", def.min_order_value_cents)?;

    match def.kind {
        DiscountKind::Percentage { percent } => {
            if percent == 0 || percent > 100 {
                return Err(ValidationError::OutOfRange {
                    field: "percent".to_string(),
                    min: 1,
                    max: 100,
                });
            }
        }
        DiscountKind::FixedAmount { amount_cents } => {
            if amount_cents <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "amount_cents".to_string(),
                });
            }
            if def.min_order_value_cents < amount_cents {
                return Err(ValidationError::Inconsistent {
                    field: "min_order_value_cents".to_string(),
                    reason: "must be at least the fixed discount amount".to_string(),
                });
            }
        }
        DiscountKind::FreeShipping | DiscountKind::BuyOneGetOne => {}
    }

    if let Some(max_uses) = def.max_uses {
        if max_uses < 1 {
            return Err(ValidationError::MustBePositive {
                field: "max_uses".to_string(),
            });
        }
    }

    if def.max_uses_per_user < 1 {
        return Err(ValidationError::MustBePositive {
            field: "max_uses_per_user".to_string(),
        });
    }

    if let Some(cap) = def.max_discount_amount_cents {
        if cap <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "max_discount_amount_cents".to_string(),
            });
        }
    }

    if def.scope == DiscountScope::Specific && def.product_ids.is_empty() {
        return Err(ValidationError::Required {
            field: "product_ids".to_string(),
        });
    }

    Ok(code)
}

// =============================================================================
// Checkout Requests
// =============================================================================

/// Validates the shape of a checkout request.
///
/// Nothing here looks at the catalog; it only rejects requests that could
/// never be priced.
pub fn validate_checkout_request(request: &CheckoutRequest) -> CoreResult<()> {
    validate_id("buyer_id", &request.buyer_id)?;
    validate_id("cart_id", &request.cart_id)?;

    if request.shop_groups.is_empty() {
        return Err(CoreError::EmptyRequest("no shop groups".to_string()));
    }

    let mut shops = HashSet::new();
    let mut products = HashSet::new();
    let mut line_count = 0usize;

    for group in &request.shop_groups {
        validate_id("shop_id", &group.shop_id)?;
        validate_shipping_fee(group.shipping_fee_cents)?;

        if !shops.insert(group.shop_id.as_str()) {
            return Err(CoreError::DuplicateShop(group.shop_id.clone()));
        }

        if group.items.is_empty() {
            return Err(CoreError::EmptyRequest(format!(
                "shop {} has no items",
                group.shop_id
            )));
        }

        for item in &group.items {
            validate_id("product_id", &item.product_id)?;
            validate_quantity(item.quantity)?;

            if !products.insert(item.product_id.as_str()) {
                return Err(CoreError::DuplicateProduct(item.product_id.clone()));
            }

            line_count += 1;
            if line_count > MAX_CHECKOUT_LINES {
                return Err(CoreError::TooManyLines {
                    max: MAX_CHECKOUT_LINES,
                });
            }
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LineRequest, ShopGroupRequest};
    use chrono::{Duration, Utc};

    fn new_discount() -> NewDiscount {
        let now = Utc::now();
        NewDiscount {
            shop_id: "shop-1".to_string(),
            code: "save10".to_string(),
            name: "Save ten".to_string(),
            description: None,
            kind: DiscountKind::Percentage { percent: 10 },
            starts_at: now,
            ends_at: now + Duration::days(7),
            max_uses: Some(100),
            max_uses_per_user: 1,
            min_order_value_cents: 10_000,
            max_discount_amount_cents: None,
            scope: DiscountScope::All,
            product_ids: Vec::new(),
        }
    }

    fn group(shop: &str, items: &[(&str, i64)]) -> ShopGroupRequest {
        ShopGroupRequest {
            shop_id: shop.to_string(),
            discount: None,
            shipping_fee_cents: 0,
            items: items
                .iter()
                .map(|(p, q)| LineRequest {
                    product_id: p.to_string(),
                    quantity: *q,
                })
                .collect(),
        }
    }

    fn request(groups: Vec<ShopGroupRequest>) -> CheckoutRequest {
        CheckoutRequest {
            buyer_id: "buyer-1".to_string(),
            cart_id: "cart-1".to_string(),
            shop_groups: groups,
        }
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_discount_code_rules() {
        assert_eq!(normalize_discount_code("abc123").unwrap(), "ABC123");
        assert!(normalize_discount_code("").is_err());
        assert!(normalize_discount_code("AB").is_err());
        assert!(normalize_discount_code(&"A".repeat(21)).is_err());
        assert!(normalize_discount_code("HALF OFF").is_err());
    }

    #[test]
    fn test_new_discount_accepts_valid_and_normalizes_code() {
        assert_eq!(validate_new_discount(&new_discount()).unwrap(), "SAVE10");
    }

    #[test]
    fn test_new_discount_rejects_inverted_window() {
        let mut def = new_discount();
        def.ends_at = def.starts_at;
        assert!(matches!(
            validate_new_discount(&def),
            Err(ValidationError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_new_discount_percentage_bounds() {
        let mut def = new_discount();
        def.kind = DiscountKind::Percentage { percent: 101 };
        assert!(validate_new_discount(&def).is_err());
        def.kind = DiscountKind::Percentage { percent: 100 };
        assert!(validate_new_discount(&def).is_ok());
    }

    #[test]
    fn test_new_discount_fixed_amount_needs_min_order() {
        let mut def = new_discount();
        def.kind = DiscountKind::FixedAmount { amount_cents: 20_000 };
        def.min_order_value_cents = 10_000;
        assert!(validate_new_discount(&def).is_err());

        def.min_order_value_cents = 20_000;
        assert!(validate_new_discount(&def).is_ok());
    }

    #[test]
    fn test_new_discount_caps_and_scope() {
        let mut def = new_discount();
        def.max_uses = Some(0);
        assert!(validate_new_discount(&def).is_err());

        let mut def = new_discount();
        def.max_uses_per_user = 0;
        assert!(validate_new_discount(&def).is_err());

        let mut def = new_discount();
        def.scope = DiscountScope::Specific;
        assert!(validate_new_discount(&def).is_err());
        def.product_ids = vec!["p-1".to_string()];
        assert!(validate_new_discount(&def).is_ok());
    }

    #[test]
    fn test_checkout_request_accepts_well_formed() {
        let req = request(vec![group("s-1", &[("p-1", 1), ("p-2", 2)]), group("s-2", &[("p-3", 1)])]);
        assert!(validate_checkout_request(&req).is_ok());
    }

    #[test]
    fn test_checkout_request_rejects_empty_and_duplicates() {
        assert!(matches!(
            validate_checkout_request(&request(vec![])),
            Err(CoreError::EmptyRequest(_))
        ));
        assert!(matches!(
            validate_checkout_request(&request(vec![group("s-1", &[])])),
            Err(CoreError::EmptyRequest(_))
        ));
        assert_eq!(
            validate_checkout_request(&request(vec![group("s-1", &[("p-1", 1)]), group("s-1", &[("p-2", 1)])])),
            Err(CoreError::DuplicateShop("s-1".to_string()))
        );
        assert_eq!(
            validate_checkout_request(&request(vec![group("s-1", &[("p-1", 1)]), group("s-2", &[("p-1", 1)])])),
            Err(CoreError::DuplicateProduct("p-1".to_string()))
        );
    }

    #[test]
    fn test_checkout_request_rejects_zero_quantity_and_negative_fee() {
        let req = request(vec![group("s-1", &[("p-1", 0)])]);
        assert!(matches!(validate_checkout_request(&req), Err(CoreError::Validation(_))));

        let mut g = group("s-1", &[("p-1", 1)]);
        g.shipping_fee_cents = -1;
        assert!(matches!(validate_checkout_request(&request(vec![g])), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_checkout_request_caps_shipping_fee() {
        let mut g = group("s-1", &[("p-1", 1)]);
        g.shipping_fee_cents = MAX_SHIPPING_FEE_CENTS;
        assert!(validate_checkout_request(&request(vec![g.clone()])).is_ok());

        g.shipping_fee_cents = i64::MAX;
        assert_eq!(
            validate_checkout_request(&request(vec![g])),
            Err(CoreError::Validation(ValidationError::OutOfRange {
                field: "shipping_fee_cents".to_string(),
                min: 0,
                max: MAX_SHIPPING_FEE_CENTS,
            }))
        );
    }

    #[test]
    fn test_checkout_request_line_limit() {
        let ids: Vec<String> = (0..=MAX_CHECKOUT_LINES).map(|i| format!("p-{}", i)).collect();
        let items: Vec<(&str, i64)> = ids.iter().map(|id| (id.as_str(), 1)).collect();
        let req = request(vec![group("s-1", &items)]);
        assert_eq!(
            validate_checkout_request(&req),
            Err(CoreError::TooManyLines { max: MAX_CHECKOUT_LINES })
        );
    }
}
