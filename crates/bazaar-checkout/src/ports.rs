//! # Store Traits
//!
//! The narrow collaborator interfaces the engine calls. Everything behind
//! them (SQL, caching, another service) is somebody else's concern.
//!
//! ```text
//! ┌──────────────┬─────────────────────────────────────────────────────────┐
//! │ Trait        │ Used for                                                │
//! ├──────────────┼─────────────────────────────────────────────────────────┤
//! │ Catalog      │ authoritative price and shop ownership                  │
//! │ CartStore    │ the buyer's active cart, cleared after commit           │
//! │ OrderStore   │ durable orders, cancelled on rollback                   │
//! │ DiscountStore│ rules, per-user counts, conditional redemption          │
//! │ StockLedger  │ atomic conditional reserve, release, commit             │
//! └──────────────┴─────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations for the SQLite repositories live in [`crate::sqlite`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CheckoutResult;
use bazaar_core::{Cart, Discount, NewDiscount, NewOrder, Order, Product, Reservation};

pub use bazaar_db::{RedemptionOutcome, ReserveOutcome};

#[async_trait]
pub trait Catalog: Send + Sync {
    /// `None` when no such product exists.
    async fn get_product(&self, product_id: &str) -> CheckoutResult<Option<Product>>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The buyer's active cart, if any.
    async fn load(&self, buyer_id: &str) -> CheckoutResult<Option<Cart>>;

    /// Closes the buyer's active cart after a successful checkout.
    async fn clear(&self, buyer_id: &str) -> CheckoutResult<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create(&self, order: &NewOrder) -> CheckoutResult<Order>;

    /// Marks an order cancelled. Orders are never deleted.
    async fn cancel(&self, order_id: &str) -> CheckoutResult<()>;
}

#[async_trait]
pub trait DiscountStore: Send + Sync {
    async fn find_by_id(&self, discount_id: &str) -> CheckoutResult<Option<Discount>>;

    /// `code` is already normalized.
    async fn find_by_code(&self, shop_id: &str, code: &str) -> CheckoutResult<Option<Discount>>;

    async fn user_redemptions(&self, discount_id: &str, user_id: &str) -> CheckoutResult<i64>;

    /// Consumes one use if every cap still allows it.
    async fn record_redemption(
        &self,
        discount_id: &str,
        user_id: &str,
    ) -> CheckoutResult<RedemptionOutcome>;

    /// Undoes one use; `false` when the user had none.
    async fn revert_redemption(&self, discount_id: &str, user_id: &str) -> CheckoutResult<bool>;

    async fn create(&self, definition: &NewDiscount, code: &str) -> CheckoutResult<Discount>;

    async fn set_active(&self, shop_id: &str, discount_id: &str, is_active: bool)
        -> CheckoutResult<()>;

    async fn list_by_shop(&self, shop_id: &str, active_only: bool) -> CheckoutResult<Vec<Discount>>;
}

/// Per-product available quantity plus the reservations held against it.
///
/// `reserve` must be a single atomic conditional decrement: it is the
/// admission check, with or without the advisory lock.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn reserve(
        &self,
        product_id: &str,
        quantity: i64,
        cart_id: &str,
        expires_at: DateTime<Utc>,
    ) -> CheckoutResult<ReserveOutcome>;

    /// Restores the quantity; a second call for the same reservation is a no-op.
    async fn release(&self, reservation_id: &str) -> CheckoutResult<bool>;

    /// Drops the reservation record, keeping the stock consumed.
    async fn commit(&self, reservation_id: &str) -> CheckoutResult<bool>;

    async fn add_stock(
        &self,
        product_id: &str,
        shop_id: &str,
        quantity: i64,
        location: Option<&str>,
    ) -> CheckoutResult<i64>;

    async fn available(&self, product_id: &str) -> CheckoutResult<Option<i64>>;

    async fn active_reservations(&self, product_id: &str) -> CheckoutResult<Vec<Reservation>>;

    /// Releases every reservation whose expiry is at or before `now`.
    async fn release_expired(&self, now: DateTime<Utc>) -> CheckoutResult<Vec<Reservation>>;
}
