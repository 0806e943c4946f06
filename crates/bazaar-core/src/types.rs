//! # Domain Types
//!
//! Core domain types used throughout the checkout engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Persistent entities                                                    │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌─────────────┐       │
//! │  │  Product    │ │    Cart     │ │ Reservation │ │  Discount   │       │
//! │  │  shop_id    │ │  CartState  │ │  expires_at │ │ DiscountKind│       │
//! │  │  price      │ │  CartLine[] │ │  quantity   │ │ scope, caps │       │
//! │  └─────────────┘ └─────────────┘ └─────────────┘ └─────────────┘       │
//! │  ┌─────────────┐                                                        │
//! │  │   Order     │  one per shop-group, pricing frozen at creation        │
//! │  │ OrderLine[] │                                                        │
//! │  └─────────────┘                                                        │
//! │                                                                         │
//! │  Boundary shapes                                                        │
//! │  CheckoutRequest ──► CheckoutQuote ──► CheckoutReceipt                  │
//! │   ShopGroupRequest    ShopQuote[]        Order[]                        │
//! │   LineRequest         PricedLine[]       CheckoutTotals                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product as the catalog knows it. The catalog price is authoritative;
/// prices sent by clients are never used for checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Seller that owns this product.
    pub shop_id: String,

    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Unpublished products cannot be checked out.
    pub is_active: bool,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Lifecycle of a buyer's cart.
///
/// ```text
///   Active ──► Pending ──► Completed
///      │                      ▲
///      └──────────────────────┘  (successful checkout)
///      └──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CartState {
    #[default]
    Active,
    Pending,
    Completed,
    Failed,
}

impl CartState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CartState::Active => "active",
            CartState::Pending => "pending",
            CartState::Completed => "completed",
            CartState::Failed => "failed",
        }
    }
}

/// A line item in a cart. Shop, name and price are denormalized at add time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub shop_id: String,
    pub name: String,
    /// Price when the item was added (display only, never charged).
    pub price_cents: i64,
    pub quantity: i64,
}

/// A buyer's cart.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub id: String,
    pub user_id: String,
    pub state: CartState,
    pub lines: Vec<CartLine>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn is_active(&self) -> bool {
        self.state == CartState::Active
    }
}

// =============================================================================
// Reservation
// =============================================================================

/// A temporary claim on stock tied to one in-flight checkout.
///
/// Destroyed by `commit` (stock stays consumed) or `release`
/// (stock restored). Reservations past `expires_at` are reclaimed by
/// the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reservation {
    pub id: String,
    pub product_id: String,
    pub cart_id: String,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// =============================================================================
// Discount
// =============================================================================

/// What a discount does to a shop-group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountKind {
    /// `percent`% of the applicable goods total (0..=100).
    Percentage { percent: u32 },
    /// Flat amount off, regardless of cart size.
    FixedAmount { amount_cents: i64 },
    /// Waives the shop-group's shipping fee.
    FreeShipping,
    /// Cheapest applicable line's unit price is free.
    BuyOneGetOne,
}

impl DiscountKind {
    /// Column value used by the discounts table.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage { .. } => "percentage",
            DiscountKind::FixedAmount { .. } => "fixed_amount",
            DiscountKind::FreeShipping => "free_shipping",
            DiscountKind::BuyOneGetOne => "buy_one_get_one",
        }
    }

    /// Numeric parameter stored next to the kind (percent or cents).
    pub fn value(&self) -> i64 {
        match self {
            DiscountKind::Percentage { percent } => i64::from(*percent),
            DiscountKind::FixedAmount { amount_cents } => *amount_cents,
            DiscountKind::FreeShipping | DiscountKind::BuyOneGetOne => 0,
        }
    }

    /// Rebuilds a kind from its stored column pair.
    pub fn from_parts(kind: &str, value: i64) -> Option<Self> {
        match kind {
            "percentage" => u32::try_from(value)
                .ok()
                .map(|percent| DiscountKind::Percentage { percent }),
            "fixed_amount" => Some(DiscountKind::FixedAmount {
                amount_cents: value,
            }),
            "free_shipping" => Some(DiscountKind::FreeShipping),
            "buy_one_get_one" => Some(DiscountKind::BuyOneGetOne),
            _ => None,
        }
    }
}

/// Which products a discount applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountScope {
    #[default]
    All,
    Specific,
}

/// A shop's promotional rule plus its running usage counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Discount {
    pub id: String,
    pub shop_id: String,
    /// Uppercase alphanumeric, unique per shop.
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    /// Valid from this instant (inclusive).
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    /// Valid until this instant (exclusive).
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
    /// Global cap; `None` is unlimited.
    pub max_uses: Option<i64>,
    pub uses_count: i64,
    pub max_uses_per_user: i64,
    pub min_order_value_cents: i64,
    pub max_discount_amount_cents: Option<i64>,
    pub scope: DiscountScope,
    /// Only meaningful for `DiscountScope::Specific`.
    pub product_ids: Vec<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Discount {
    /// Uses left before the global cap; `None` when uncapped.
    pub fn remaining_uses(&self) -> Option<i64> {
        self.max_uses.map(|max| (max - self.uses_count).max(0))
    }

    /// Active, inside its window and not globally exhausted.
    pub fn is_currently_valid(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at <= now
            && now < self.ends_at
            && self.remaining_uses().map_or(true, |left| left > 0)
    }

    /// Whether `product_id` falls inside this discount's scope.
    pub fn applies_to(&self, product_id: &str) -> bool {
        match self.scope {
            DiscountScope::All => true,
            DiscountScope::Specific => self.product_ids.iter().any(|p| p == product_id),
        }
    }

    pub fn min_order_value(&self) -> Money {
        Money::from_cents(self.min_order_value_cents)
    }

    pub fn max_discount_amount(&self) -> Option<Money> {
        self.max_discount_amount_cents.map(Money::from_cents)
    }
}

/// A shop's request to create a discount.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewDiscount {
    pub shop_id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: DiscountKind,
    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub max_uses: Option<i64>,
    #[serde(default = "default_max_uses_per_user")]
    pub max_uses_per_user: i64,
    #[serde(default)]
    pub min_order_value_cents: i64,
    #[serde(default)]
    pub max_discount_amount_cents: Option<i64>,
    #[serde(default)]
    pub scope: DiscountScope,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

fn default_max_uses_per_user() -> i64 {
    1
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Cancelled,
    Delivered,
}

/// A priced line frozen into an order (snapshot of catalog data).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

/// What the orchestrator hands to the order store: everything but the
/// identity and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewOrder {
    pub user_id: String,
    pub shop_id: String,
    pub cart_id: String,
    pub lines: Vec<OrderLine>,
    pub total_price_cents: i64,
    pub fee_ship_cents: i64,
    pub total_discount_cents: i64,
    pub total_checkout_cents: i64,
    pub discount_id: Option<String>,
    pub discount_code: Option<String>,
}

/// One shop's order. Pricing fields never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Human-facing reference, e.g. `#1A2B3C4D`.
    pub tracking_number: String,
    pub user_id: String,
    pub shop_id: String,
    pub cart_id: String,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total_price_cents: i64,
    pub fee_ship_cents: i64,
    pub total_discount_cents: i64,
    pub total_checkout_cents: i64,
    pub discount_id: Option<String>,
    pub discount_code: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Checkout Request
// =============================================================================

/// How a shop-group names its discount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountRef {
    Id(String),
    Code(String),
}

impl std::fmt::Display for DiscountRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscountRef::Id(id) => write!(f, "id:{}", id),
            DiscountRef::Code(code) => write!(f, "code:{}", code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// The subset of a checkout belonging to one seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopGroupRequest {
    pub shop_id: String,
    #[serde(default)]
    pub discount: Option<DiscountRef>,
    /// Passed through as-is; waived by a free-shipping discount.
    #[serde(default)]
    pub shipping_fee_cents: i64,
    pub items: Vec<LineRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub buyer_id: String,
    pub cart_id: String,
    pub shop_groups: Vec<ShopGroupRequest>,
}

impl CheckoutRequest {
    /// Every requested line across all shop-groups.
    pub fn lines(&self) -> impl Iterator<Item = (&ShopGroupRequest, &LineRequest)> {
        self.shop_groups
            .iter()
            .flat_map(|group| group.items.iter().map(move |item| (group, item)))
    }
}

// =============================================================================
// Quotes and Receipts
// =============================================================================

/// A requested line priced from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub shop_id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
}

impl PricedLine {
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

impl From<&PricedLine> for OrderLine {
    fn from(line: &PricedLine) -> Self {
        OrderLine {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            unit_price_cents: line.unit_price_cents,
            quantity: line.quantity,
            line_total_cents: line.line_total_cents,
        }
    }
}

/// The discount that priced a shop-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AppliedDiscount {
    pub discount_id: String,
    pub code: String,
    pub kind: DiscountKind,
    pub amount_cents: i64,
    pub waives_shipping: bool,
}

/// Pricing of one shop-group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShopQuote {
    pub shop_id: String,
    pub lines: Vec<PricedLine>,
    /// Goods total before discount.
    pub raw_total_cents: i64,
    /// Shipping after any free-shipping waiver.
    pub shipping_fee_cents: i64,
    pub discount_cents: i64,
    /// `raw_total + shipping_fee - discount`.
    pub total_cents: i64,
    pub discount: Option<AppliedDiscount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutTotals {
    pub total_price_cents: i64,
    pub fee_ship_cents: i64,
    pub total_discount_cents: i64,
    pub total_checkout_cents: i64,
}

/// Result of reviewing a checkout: no side effects were made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutQuote {
    pub buyer_id: String,
    pub cart_id: String,
    pub shops: Vec<ShopQuote>,
    pub totals: CheckoutTotals,
}

/// Result of a committed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutReceipt {
    pub orders: Vec<Order>,
    pub totals: CheckoutTotals,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn discount(now: DateTime<Utc>) -> Discount {
        Discount {
            id: "d-1".to_string(),
            shop_id: "shop-1".to_string(),
            code: "SAVE10".to_string(),
            name: "Save 10".to_string(),
            description: None,
            kind: DiscountKind::Percentage { percent: 10 },
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
            max_uses: Some(3),
            uses_count: 1,
            max_uses_per_user: 1,
            min_order_value_cents: 10_000,
            max_discount_amount_cents: None,
            scope: DiscountScope::All,
            product_ids: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_remaining_uses() {
        let now = Utc::now();
        let mut d = discount(now);
        assert_eq!(d.remaining_uses(), Some(2));

        d.uses_count = 5;
        assert_eq!(d.remaining_uses(), Some(0));

        d.max_uses = None;
        assert_eq!(d.remaining_uses(), None);
    }

    #[test]
    fn test_is_currently_valid_window_is_half_open() {
        let now = Utc::now();
        let mut d = discount(now);
        assert!(d.is_currently_valid(now));

        d.starts_at = now;
        assert!(d.is_currently_valid(now));

        d.ends_at = now;
        assert!(!d.is_currently_valid(now));
    }

    #[test]
    fn test_is_currently_valid_respects_flag_and_cap() {
        let now = Utc::now();
        let mut d = discount(now);
        d.is_active = false;
        assert!(!d.is_currently_valid(now));

        d.is_active = true;
        d.uses_count = 3;
        assert!(!d.is_currently_valid(now));
    }

    #[test]
    fn test_specific_scope() {
        let now = Utc::now();
        let mut d = discount(now);
        assert!(d.applies_to("anything"));

        d.scope = DiscountScope::Specific;
        d.product_ids = vec!["p-1".to_string()];
        assert!(d.applies_to("p-1"));
        assert!(!d.applies_to("p-2"));
    }

    #[test]
    fn test_discount_kind_column_pairs() {
        let kinds = [
            DiscountKind::Percentage { percent: 15 },
            DiscountKind::FixedAmount { amount_cents: 500 },
            DiscountKind::FreeShipping,
            DiscountKind::BuyOneGetOne,
        ];
        for kind in kinds {
            assert_eq!(DiscountKind::from_parts(kind.as_str(), kind.value()), Some(kind));
        }
        assert_eq!(DiscountKind::from_parts("mystery", 1), None);
        assert_eq!(DiscountKind::from_parts("percentage", -1), None);
    }

    #[test]
    fn test_discount_kind_json_shape() {
        let json = serde_json::to_value(DiscountKind::Percentage { percent: 10 }).unwrap();
        assert_eq!(json["type"], "percentage");
        assert_eq!(json["percent"], 10);

        let parsed: DiscountRef = serde_json::from_str(r#"{"code":"SAVE10"}"#).unwrap();
        assert_eq!(parsed, DiscountRef::Code("SAVE10".to_string()));
    }

    #[test]
    fn test_request_lines_flatten_groups() {
        let request = CheckoutRequest {
            buyer_id: "u-1".to_string(),
            cart_id: "c-1".to_string(),
            shop_groups: vec![
                ShopGroupRequest {
                    shop_id: "s-1".to_string(),
                    discount: None,
                    shipping_fee_cents: 0,
                    items: vec![
                        LineRequest { product_id: "p-1".to_string(), quantity: 1 },
                        LineRequest { product_id: "p-2".to_string(), quantity: 2 },
                    ],
                },
                ShopGroupRequest {
                    shop_id: "s-2".to_string(),
                    discount: None,
                    shipping_fee_cents: 0,
                    items: vec![LineRequest { product_id: "p-3".to_string(), quantity: 3 }],
                },
            ],
        };
        let ids: Vec<_> = request.lines().map(|(_, l)| l.product_id.as_str()).collect();
        assert_eq!(ids, vec!["p-1", "p-2", "p-3"]);
    }
}
