//! # Cart Repository
//!
//! Buyer carts. Checkout only reads the active cart and completes it; the
//! add/remove helpers exist for seeding and tests.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use bazaar_core::{Cart, CartLine, CartState};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: String,
    user_id: String,
    state: CartState,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Creates an empty active cart for a buyer.
    ///
    /// Fails with `UniqueViolation` if the buyer already has an active cart.
    pub async fn create(&self, user_id: &str) -> DbResult<Cart> {
        let now = Utc::now();
        let cart = Cart {
            id: new_id(),
            user_id: user_id.to_string(),
            state: CartState::Active,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(cart_id = %cart.id, user_id, "Creating cart");

        sqlx::query(
            "INSERT INTO carts (id, user_id, state, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&cart.id)
        .bind(&cart.user_id)
        .bind(cart.state)
        .bind(cart.created_at)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("active cart for user", user_id),
            other => other,
        })?;

        Ok(cart)
    }

    /// Adds a line, or increases its quantity if the product is already there.
    pub async fn add_line(&self, cart_id: &str, line: &CartLine) -> DbResult<()> {
        if line.quantity <= 0 {
            return Err(DbError::InvalidInput(format!(
                "cart quantity must be positive, got {}",
                line.quantity
            )));
        }

        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before reading.
        sqlx::query("UPDATE carts SET updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        let position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position), -1) + 1 FROM cart_items WHERE cart_id = ?",
        )
        .bind(cart_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, product_id, shop_id, name, price_cents, quantity, position)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (cart_id, product_id) DO UPDATE SET
                quantity = cart_items.quantity + excluded.quantity
            "#,
        )
        .bind(cart_id)
        .bind(&line.product_id)
        .bind(&line.shop_id)
        .bind(&line.name)
        .bind(line.price_cents)
        .bind(line.quantity)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Removes a product from a cart.
    pub async fn remove_line(&self, cart_id: &str, product_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ? AND product_id = ?")
            .bind(cart_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart item", product_id));
        }
        Ok(())
    }

    /// Gets a cart with its lines.
    pub async fn get_by_id(&self, cart_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, state, created_at, updated_at FROM carts WHERE id = ?",
        )
        .bind(cart_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    /// Gets the buyer's active cart, if any.
    pub async fn get_active(&self, user_id: &str) -> DbResult<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(
            r#"
            SELECT id, user_id, state, created_at, updated_at
            FROM carts
            WHERE user_id = ? AND state = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.with_lines(row).await?)),
            None => Ok(None),
        }
    }

    /// Marks the buyer's active cart completed after a checkout.
    ///
    /// Returns `false` when the buyer had no active cart.
    pub async fn complete_active(&self, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE carts SET state = 'completed', updated_at = ? WHERE user_id = ? AND state = 'active'",
        )
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets a cart's state.
    pub async fn set_state(&self, cart_id: &str, state: CartState) -> DbResult<()> {
        let result = sqlx::query("UPDATE carts SET state = ?, updated_at = ? WHERE id = ?")
            .bind(state)
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Cart", cart_id));
        }
        Ok(())
    }

    async fn with_lines(&self, row: CartRow) -> DbResult<Cart> {
        let lines = sqlx::query_as::<_, CartLine>(
            r#"
            SELECT product_id, shop_id, name, price_cents, quantity
            FROM cart_items
            WHERE cart_id = ?
            ORDER BY position
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Cart {
            id: row.id,
            user_id: row.user_id,
            state: row.state,
            lines,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
