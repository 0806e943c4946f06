//! Store traits implemented for the `bazaar-db` repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{CheckoutError, CheckoutResult};
use crate::ports::{
    CartStore, Catalog, DiscountStore, OrderStore, RedemptionOutcome, ReserveOutcome, StockLedger,
};
use bazaar_core::{Cart, Discount, NewDiscount, NewOrder, Order, Product, Reservation};
use bazaar_db::{
    CartRepository, DiscountRepository, InventoryRepository, OrderRepository, ProductRepository,
};

#[async_trait]
impl Catalog for ProductRepository {
    async fn get_product(&self, product_id: &str) -> CheckoutResult<Option<Product>> {
        Ok(self.get_by_id(product_id).await?)
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn load(&self, buyer_id: &str) -> CheckoutResult<Option<Cart>> {
        Ok(self.get_active(buyer_id).await?)
    }

    async fn clear(&self, buyer_id: &str) -> CheckoutResult<()> {
        if self.complete_active(buyer_id).await? {
            Ok(())
        } else {
            Err(CheckoutError::not_found("Active cart", buyer_id))
        }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create(&self, order: &NewOrder) -> CheckoutResult<Order> {
        Ok(OrderRepository::create(self, order).await?)
    }

    async fn cancel(&self, order_id: &str) -> CheckoutResult<()> {
        Ok(OrderRepository::cancel(self, order_id).await?)
    }
}

#[async_trait]
impl DiscountStore for DiscountRepository {
    async fn find_by_id(&self, discount_id: &str) -> CheckoutResult<Option<Discount>> {
        Ok(self.get_by_id(discount_id).await?)
    }

    async fn find_by_code(&self, shop_id: &str, code: &str) -> CheckoutResult<Option<Discount>> {
        Ok(DiscountRepository::find_by_code(self, shop_id, code).await?)
    }

    async fn user_redemptions(&self, discount_id: &str, user_id: &str) -> CheckoutResult<i64> {
        Ok(self.user_redemption_count(discount_id, user_id).await?)
    }

    async fn record_redemption(
        &self,
        discount_id: &str,
        user_id: &str,
    ) -> CheckoutResult<RedemptionOutcome> {
        Ok(DiscountRepository::record_redemption(self, discount_id, user_id).await?)
    }

    async fn revert_redemption(&self, discount_id: &str, user_id: &str) -> CheckoutResult<bool> {
        Ok(DiscountRepository::revert_redemption(self, discount_id, user_id).await?)
    }

    async fn create(&self, definition: &NewDiscount, code: &str) -> CheckoutResult<Discount> {
        Ok(DiscountRepository::create(self, definition, code).await?)
    }

    async fn set_active(
        &self,
        shop_id: &str,
        discount_id: &str,
        is_active: bool,
    ) -> CheckoutResult<()> {
        Ok(DiscountRepository::set_active(self, shop_id, discount_id, is_active).await?)
    }

    async fn list_by_shop(&self, shop_id: &str, active_only: bool) -> CheckoutResult<Vec<Discount>> {
        Ok(DiscountRepository::list_by_shop(self, shop_id, active_only).await?)
    }
}

#[async_trait]
impl StockLedger for InventoryRepository {
    async fn reserve(
        &self,
        product_id: &str,
        quantity: i64,
        cart_id: &str,
        expires_at: DateTime<Utc>,
    ) -> CheckoutResult<ReserveOutcome> {
        Ok(InventoryRepository::reserve(self, product_id, quantity, cart_id, expires_at).await?)
    }

    async fn release(&self, reservation_id: &str) -> CheckoutResult<bool> {
        Ok(InventoryRepository::release(self, reservation_id).await?)
    }

    async fn commit(&self, reservation_id: &str) -> CheckoutResult<bool> {
        Ok(InventoryRepository::commit(self, reservation_id).await?)
    }

    async fn add_stock(
        &self,
        product_id: &str,
        shop_id: &str,
        quantity: i64,
        location: Option<&str>,
    ) -> CheckoutResult<i64> {
        Ok(InventoryRepository::add_stock(self, product_id, shop_id, quantity, location).await?)
    }

    async fn available(&self, product_id: &str) -> CheckoutResult<Option<i64>> {
        Ok(InventoryRepository::available(self, product_id).await?)
    }

    async fn active_reservations(&self, product_id: &str) -> CheckoutResult<Vec<Reservation>> {
        Ok(InventoryRepository::active_reservations(self, product_id).await?)
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> CheckoutResult<Vec<Reservation>> {
        Ok(InventoryRepository::release_expired(self, now).await?)
    }
}
