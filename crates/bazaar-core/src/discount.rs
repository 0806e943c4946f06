//! # Discount Rules
//!
//! Eligibility checks and amount computation for shop discounts.
//!
//! Both functions here are pure: they never consume a use of the discount.
//! Redemption bookkeeping (bumping `uses_count`, recording the user) is a
//! separate, explicit store operation performed only after an order exists,
//! so reviewing a checkout any number of times is free.
//!
//! ## Eligibility Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  check_eligibility()          first failing check wins                  │
//! │                                                                         │
//! │  1. discount.shop_id == shop  ──✗──► NotFound                           │
//! │  2. is_active                 ──✗──► Inactive                           │
//! │  3. starts_at <= now          ──✗──► NotYetActive                       │
//! │  4. now < ends_at             ──✗──► Expired                            │
//! │  5. uses_count < max_uses     ──✗──► UsageExceeded                      │
//! │  6. user uses < per-user max  ──✗──► UserLimitExceeded                  │
//! │                     │                                                   │
//! │                     ▼                                                   │
//! │                    Ok                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Amount Computation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  compute_amount(discount, lines)                                        │
//! │                                                                         │
//! │  Σ all lines >= min_order_value ?  ──✗──► BelowMinimumOrder             │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  restrict to scope (All | Specific ids)                                 │
//! │          │  Specific with no match ──► NoApplicableProducts             │
//! │          ▼                                                              │
//! │  match kind                                                             │
//! │    Percentage    → applicable_total × percent / 100                     │
//! │    FixedAmount   → amount                                               │
//! │    FreeShipping  → 0, waives_shipping = true                            │
//! │    BuyOneGetOne  → cheapest applicable unit price (needs ≥ 2 lines)     │
//! │          │                                                              │
//! │          ▼                                                              │
//! │  clamp to max_discount_amount, then to applicable_total                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Discount, DiscountKind, DiscountScope, PricedLine};

// =============================================================================
// Rejections
// =============================================================================

/// Why a discount cannot be applied to a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DiscountRejection {
    /// No such discount for this shop.
    #[error("discount not found")]
    NotFound,

    /// The shop switched the discount off.
    #[error("discount is not active")]
    Inactive,

    /// The validity window has not opened yet.
    #[error("discount is not active yet")]
    NotYetActive,

    /// The validity window has closed.
    #[error("discount has expired")]
    Expired,

    /// Global usage cap reached.
    #[error("discount usage limit reached")]
    UsageExceeded,

    /// This user already used the discount as often as allowed.
    #[error("discount already used the maximum number of times by this user")]
    UserLimitExceeded,

    /// The shop-group total is below the discount's minimum order value.
    #[error("order total {actual_cents} is below the minimum of {required_cents}")]
    BelowMinimumOrder { required_cents: i64, actual_cents: i64 },

    /// A product-specific discount matched nothing in the shop-group.
    #[error("discount does not apply to any product in this order")]
    NoApplicableProducts,
}

// =============================================================================
// Eligibility
// =============================================================================

/// Checks whether `discount` may be used in `shop_id` at `now`.
///
/// `user_redemptions` is the user's historical redemption count for this
/// discount; pass `None` to skip the per-user check (anonymous preview).
pub fn check_eligibility(
    discount: &Discount,
    shop_id: &str,
    now: DateTime<Utc>,
    user_redemptions: Option<i64>,
) -> Result<(), DiscountRejection> {
    if discount.shop_id != shop_id {
        return Err(DiscountRejection::NotFound);
    }

    if !discount.is_active {
        return Err(DiscountRejection::Inactive);
    }

    if now < discount.starts_at {
        return Err(DiscountRejection::NotYetActive);
    }

    if now >= discount.ends_at {
        return Err(DiscountRejection::Expired);
    }

    if let Some(max_uses) = discount.max_uses {
        if discount.uses_count >= max_uses {
            return Err(DiscountRejection::UsageExceeded);
        }
    }

    if let Some(used) = user_redemptions {
        if used >= discount.max_uses_per_user {
            return Err(DiscountRejection::UserLimitExceeded);
        }
    }

    Ok(())
}

// =============================================================================
// Amount
// =============================================================================

/// Outcome of applying a discount to one shop-group's lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountComputation {
    /// Goods total of the whole shop-group.
    pub order_total: Money,
    /// Products inside the discount's scope.
    pub applicable_product_ids: Vec<String>,
    /// Goods total of the in-scope lines.
    pub applicable_total: Money,
    /// Discount on goods. Zero for free shipping.
    pub amount: Money,
    /// `order_total - amount`.
    pub final_amount: Money,
    /// The caller should zero the shop-group's shipping fee.
    pub waives_shipping: bool,
}

/// Computes the discount for a shop-group.
///
/// ## Example
/// ```rust
/// use bazaar_core::discount::compute_amount;
/// # use bazaar_core::types::*;
/// # use chrono::{Duration, Utc};
/// # let now = Utc::now();
/// # let save10 = Discount {
/// #     id: "d".into(), shop_id: "s".into(), code: "SAVE10".into(), name: "n".into(),
/// #     description: None, kind: DiscountKind::Percentage { percent: 10 },
/// #     starts_at: now, ends_at: now + Duration::days(1), max_uses: None, uses_count: 0,
/// #     max_uses_per_user: 1, min_order_value_cents: 10_000, max_discount_amount_cents: None,
/// #     scope: DiscountScope::All, product_ids: vec![], is_active: true,
/// #     created_at: now, updated_at: now,
/// # };
/// let lines = vec![PricedLine {
///     product_id: "p".into(), shop_id: "s".into(), name: "Lamp".into(),
///     unit_price_cents: 15_000, quantity: 1, line_total_cents: 15_000,
/// }];
/// let result = compute_amount(&save10, &lines).unwrap();
/// assert_eq!(result.amount.cents(), 1_500);
/// assert_eq!(result.final_amount.cents(), 13_500);
/// ```
pub fn compute_amount(
    discount: &Discount,
    lines: &[PricedLine],
) -> Result<DiscountComputation, DiscountRejection> {
    let order_total: Money = lines.iter().map(PricedLine::line_total).sum();

    if order_total < discount.min_order_value() {
        return Err(DiscountRejection::BelowMinimumOrder {
            required_cents: discount.min_order_value_cents,
            actual_cents: order_total.cents(),
        });
    }

    let applicable: Vec<&PricedLine> = lines
        .iter()
        .filter(|line| discount.applies_to(&line.product_id))
        .collect();

    if discount.scope == DiscountScope::Specific && applicable.is_empty() {
        return Err(DiscountRejection::NoApplicableProducts);
    }

    let applicable_total: Money = applicable.iter().map(|line| line.line_total()).sum();

    let (raw_amount, waives_shipping) = match discount.kind {
        DiscountKind::Percentage { percent } => (applicable_total.percent_of(percent), false),
        DiscountKind::FixedAmount { amount_cents } => (Money::from_cents(amount_cents), false),
        DiscountKind::FreeShipping => (Money::zero(), true),
        DiscountKind::BuyOneGetOne => {
            let cheapest = if applicable.len() >= 2 {
                applicable.iter().map(|line| line.unit_price()).min()
            } else {
                None
            };
            (cheapest.unwrap_or_default(), false)
        }
    };

    let mut amount = raw_amount;
    if let Some(cap) = discount.max_discount_amount() {
        amount = amount.clamp_to(cap);
    }
    amount = amount.clamp_to(applicable_total);

    Ok(DiscountComputation {
        order_total,
        applicable_product_ids: applicable.iter().map(|l| l.product_id.clone()).collect(),
        applicable_total,
        amount,
        final_amount: order_total - amount,
        waives_shipping,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
