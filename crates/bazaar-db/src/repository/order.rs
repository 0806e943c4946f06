//! # Order Repository
//!
//! Orders are written once, with their lines, in one transaction. Pricing
//! columns are never updated afterwards; only `status` moves.
//!
//! ## Status Flow
//! ```text
//! pending ──► confirmed ──► shipped ──► delivered
//!    │            │
//!    └────────────┴──► cancelled   (checkout rollback or buyer cancel)
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use bazaar_core::pricing::tracking_number;
use bazaar_core::{NewOrder, Order, OrderLine, OrderStatus};

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    tracking_number: String,
    user_id: String,
    shop_id: String,
    cart_id: String,
    status: OrderStatus,
    total_price_cents: i64,
    fee_ship_cents: i64,
    total_discount_cents: i64,
    total_checkout_cents: i64,
    discount_id: Option<String>,
    discount_code: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, lines: Vec<OrderLine>) -> Order {
        Order {
            id: self.id,
            tracking_number: self.tracking_number,
            user_id: self.user_id,
            shop_id: self.shop_id,
            cart_id: self.cart_id,
            status: self.status,
            lines,
            total_price_cents: self.total_price_cents,
            fee_ship_cents: self.fee_ship_cents,
            total_discount_cents: self.total_discount_cents,
            total_checkout_cents: self.total_checkout_cents,
            discount_id: self.discount_id,
            discount_code: self.discount_code,
            created_at: self.created_at,
        }
    }
}

const ORDER_COLUMNS: &str = r#"
    id, tracking_number, user_id, shop_id, cart_id, status,
    total_price_cents, fee_ship_cents, total_discount_cents, total_checkout_cents,
    discount_id, discount_code, created_at
"#;

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Persists an order and its lines.
    ///
    /// ## Snapshot Pattern
    /// Line names and prices are copied from the quote, so the order keeps
    /// its history even if the catalog changes later.
    pub async fn create(&self, new_order: &NewOrder) -> DbResult<Order> {
        if new_order.lines.is_empty() {
            return Err(DbError::InvalidInput("order has no lines".to_string()));
        }

        let id = new_id();
        let now = Utc::now();
        let order = Order {
            tracking_number: tracking_number(&id),
            id,
            user_id: new_order.user_id.clone(),
            shop_id: new_order.shop_id.clone(),
            cart_id: new_order.cart_id.clone(),
            status: OrderStatus::Pending,
            lines: new_order.lines.clone(),
            total_price_cents: new_order.total_price_cents,
            fee_ship_cents: new_order.fee_ship_cents,
            total_discount_cents: new_order.total_discount_cents,
            total_checkout_cents: new_order.total_checkout_cents,
            discount_id: new_order.discount_id.clone(),
            discount_code: new_order.discount_code.clone(),
            created_at: now,
        };

        debug!(
            order_id = %order.id,
            shop_id = %order.shop_id,
            total = order.total_checkout_cents,
            "Creating order"
        );

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, tracking_number, user_id, shop_id, cart_id, status,
                total_price_cents, fee_ship_cents, total_discount_cents, total_checkout_cents,
                discount_id, discount_code, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.tracking_number)
        .bind(&order.user_id)
        .bind(&order.shop_id)
        .bind(&order.cart_id)
        .bind(order.status)
        .bind(order.total_price_cents)
        .bind(order.fee_ship_cents)
        .bind(order.total_discount_cents)
        .bind(order.total_checkout_cents)
        .bind(&order.discount_id)
        .bind(&order.discount_code)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, product_id, name,
                    unit_price_cents, quantity, line_total_cents
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&line.product_id)
            .bind(&line.name)
            .bind(line.unit_price_cents)
            .bind(line.quantity)
            .bind(line.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        info!(order_id = %order.id, tracking = %order.tracking_number, "Order created");
        Ok(order)
    }

    /// Gets an order with its lines.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = ?",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let lines = self.lines(&row.id).await?;
                Ok(Some(row.into_order(lines)))
            }
            None => Ok(None),
        }
    }

    /// Lists a buyer's orders, newest first.
    pub async fn list_by_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let lines = self.lines(&row.id).await?;
            orders.push(row.into_order(lines));
        }
        Ok(orders)
    }

    /// Cancels an order that has not shipped yet.
    ///
    /// Orders are never deleted; a rolled-back checkout leaves a cancelled
    /// record behind.
    pub async fn cancel(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'cancelled', updated_at = ?
            WHERE id = ? AND status IN ('pending', 'confirmed')
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order (cancellable)", id));
        }

        info!(order_id = id, "Order cancelled");
        Ok(())
    }

    /// Moves an order to a new status.
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    async fn lines(&self, order_id: &str) -> DbResult<Vec<OrderLine>> {
        let lines = sqlx::query_as::<_, OrderLine>(
            r#"
            SELECT product_id, name, unit_price_cents, quantity, line_total_cents
            FROM order_items
            WHERE order_id = ?
            ORDER BY position
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
