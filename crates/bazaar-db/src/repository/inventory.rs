//! # Inventory Repository (Stock Ledger)
//!
//! Per-product available quantity plus the reservations held against it.
//!
//! ## Conservation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  For every product, after every call:                                  │
//! │                                                                         │
//! │     inventory.available + Σ reservations.quantity  ==  stock on hand    │
//! │                                                                         │
//! │  reserve(q)   available -= q   AND  insert reservation(q)   (one tx)    │
//! │  release(r)   available += q   AND  delete reservation      (one tx)    │
//! │  commit(r)                          delete reservation                  │
//! │  add_stock(q) available += q                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Admission
//! `reserve` is a single conditional UPDATE guarded by `available >= q`.
//! That guard is the authoritative oversell check: it holds whether or not
//! the caller took an advisory lock first.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use bazaar_core::Reservation;

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: String,
    product_id: String,
    cart_id: String,
    quantity: i64,
    created_at: DateTime<Utc>,
    expires_at: i64,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = DbError;

    fn try_from(row: ReservationRow) -> DbResult<Self> {
        let expires_at = DateTime::<Utc>::from_timestamp_millis(row.expires_at)
            .ok_or_else(|| DbError::corrupt("reservations", format!("expires_at {}", row.expires_at)))?;

        Ok(Reservation {
            id: row.id,
            product_id: row.product_id,
            cart_id: row.cart_id,
            quantity: row.quantity,
            created_at: row.created_at,
            expires_at,
        })
    }
}

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// Stock decremented and the reservation recorded.
    Reserved(Reservation),
    /// Not enough stock; nothing was written.
    Rejected { available: i64 },
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Atomically takes `quantity` units of `product_id` for `cart_id`.
    ///
    /// ## What This Does
    /// 1. `UPDATE inventory SET available = available - q WHERE available >= q`
    /// 2. If no row changed: roll back, report current availability
    /// 3. Otherwise insert the reservation row and commit
    ///
    /// ## Errors
    /// * `InvalidInput` - quantity is zero or negative
    /// * `NotFound` - the product has no stock row at all
    pub async fn reserve(
        &self,
        product_id: &str,
        quantity: i64,
        cart_id: &str,
        expires_at: DateTime<Utc>,
    ) -> DbResult<ReserveOutcome> {
        if quantity <= 0 {
            return Err(DbError::InvalidInput(format!(
                "reservation quantity must be positive, got {}",
                quantity
            )));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE inventory
            SET available = available - ?, updated_at = ?
            WHERE product_id = ? AND available >= ?
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let available: Option<i64> =
                sqlx::query_scalar("SELECT available FROM inventory WHERE product_id = ?")
                    .bind(product_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return match available {
                Some(available) => {
                    debug!(product_id, quantity, available, "Reservation rejected");
                    Ok(ReserveOutcome::Rejected { available })
                }
                None => Err(DbError::not_found("Inventory", product_id)),
            };
        }

        let reservation = Reservation {
            id: new_id(),
            product_id: product_id.to_string(),
            cart_id: cart_id.to_string(),
            quantity,
            created_at: now,
            expires_at,
        };

        sqlx::query(
            r#"
            INSERT INTO reservations (id, product_id, cart_id, quantity, created_at, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&reservation.id)
        .bind(&reservation.product_id)
        .bind(&reservation.cart_id)
        .bind(reservation.quantity)
        .bind(reservation.created_at)
        .bind(reservation.expires_at.timestamp_millis())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            reservation_id = %reservation.id,
            product_id,
            quantity,
            "Stock reserved"
        );
        Ok(ReserveOutcome::Reserved(reservation))
    }

    /// Returns a reservation's quantity to stock and deletes it.
    ///
    /// Restores only if the reservation row still existed, so a second
    /// call for the same reservation is a no-op returning `false`.
    ///
    /// The DELETE is the transaction's first statement so the connection
    /// takes the write lock up front. A read-first transaction cannot be
    /// upgraded once another connection has committed under WAL.
    pub async fn release(&self, reservation_id: &str) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;

        let row: Option<(String, i64)> = sqlx::query_as(
            "DELETE FROM reservations WHERE id = ? RETURNING product_id, quantity",
        )
        .bind(reservation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((product_id, quantity)) = row else {
            tx.rollback().await?;
            debug!(reservation_id, "Release skipped, reservation already gone");
            return Ok(false);
        };

        sqlx::query(
            "UPDATE inventory SET available = available + ?, updated_at = ? WHERE product_id = ?",
        )
        .bind(quantity)
        .bind(Utc::now())
        .bind(&product_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(reservation_id, product_id = %product_id, quantity, "Reservation released");
        Ok(true)
    }

    /// Converts a reservation into a permanent deduction.
    ///
    /// Returns `false` if the reservation no longer exists.
    pub async fn commit(&self, reservation_id: &str) -> DbResult<bool> {
        let deleted = sqlx::query("DELETE FROM reservations WHERE id = ?")
            .bind(reservation_id)
            .execute(&self.pool)
            .await?;

        let committed = deleted.rows_affected() > 0;
        if !committed {
            warn!(reservation_id, "Commit found no reservation");
        }
        Ok(committed)
    }

    /// Adds stock for a product, creating its ledger row on first restock.
    ///
    /// Returns the new available quantity.
    pub async fn add_stock(
        &self,
        product_id: &str,
        shop_id: &str,
        quantity: i64,
        location: Option<&str>,
    ) -> DbResult<i64> {
        if quantity <= 0 {
            return Err(DbError::InvalidInput(format!(
                "restock quantity must be positive, got {}",
                quantity
            )));
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO inventory (product_id, shop_id, available, location, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (product_id) DO UPDATE SET
                available = inventory.available + excluded.available,
                location = COALESCE(excluded.location, inventory.location),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product_id)
        .bind(shop_id)
        .bind(quantity)
        .bind(location)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let available: i64 = sqlx::query_scalar("SELECT available FROM inventory WHERE product_id = ?")
            .bind(product_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(product_id, quantity, available, "Stock added");
        Ok(available)
    }

    /// Currently available (unreserved) quantity; `None` if never stocked.
    pub async fn available(&self, product_id: &str) -> DbResult<Option<i64>> {
        let available = sqlx::query_scalar("SELECT available FROM inventory WHERE product_id = ?")
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(available)
    }

    /// Sum of quantities held by live reservation rows.
    pub async fn reserved_quantity(&self, product_id: &str) -> DbResult<i64> {
        let reserved: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM reservations WHERE product_id = ?",
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(reserved)
    }

    /// Reservations currently held against a product, oldest first.
    pub async fn active_reservations(&self, product_id: &str) -> DbResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, product_id, cart_id, quantity, created_at, expires_at
            FROM reservations
            WHERE product_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reservation::try_from).collect()
    }

    /// Releases every reservation whose expiry is at or before `now`.
    ///
    /// Reclaims stock held by checkouts whose process died between
    /// reserving and committing. Returns what was released.
    pub async fn release_expired(&self, now: DateTime<Utc>) -> DbResult<Vec<Reservation>> {
        let rows = sqlx::query_as::<_, ReservationRow>(
            r#"
            SELECT id, product_id, cart_id, quantity, created_at, expires_at
            FROM reservations
            WHERE expires_at <= ?
            ORDER BY expires_at
            "#,
        )
        .bind(now.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut released = Vec::with_capacity(rows.len());
        let mut failed = 0usize;
        for row in rows {
            let reservation = Reservation::try_from(row)?;
            match self.release(&reservation.id).await {
                Ok(true) => released.push(reservation),
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    warn!(
                        reservation_id = %reservation.id,
                        product_id = %reservation.product_id,
                        error = %e,
                        "Failed to release expired reservation"
                    );
                }
            }
        }

        if !released.is_empty() || failed > 0 {
            info!(count = released.len(), failed, "Expired reservations released");
        }
        Ok(released)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use bazaar_core::Product;
    use chrono::Duration;

    async fn stocked(stock: i64) -> (Database, InventoryRepository) {
        stocked_in(DbConfig::in_memory(), stock).await
    }

    async fn stocked_in(config: DbConfig, stock: i64) -> (Database, InventoryRepository) {
        let db = Database::new(config).await.unwrap();
        db.products()
            .insert(&Product {
                id: "p-1".to_string(),
                shop_id: "shop-1".to_string(),
                name: "Lamp".to_string(),
                price_cents: 4_500,
                is_active: true,
            })
            .await
            .unwrap();
        let repo = db.inventory();
        repo.add_stock("p-1", "shop-1", stock, Some("WH-1")).await.unwrap();
        (db, repo)
    }

    async fn conserved(repo: &InventoryRepository, total: i64) -> bool {
        let available = repo.available("p-1").await.unwrap().unwrap();
        let reserved = repo.reserved_quantity("p-1").await.unwrap();
        available + reserved == total
    }

    fn later() -> DateTime<Utc> {
        Utc::now() + Duration::minutes(15)
    }

    #[tokio::test]
    async fn test_reserve_release_commit_conserve_stock() {
        let (_db, repo) = stocked(10).await;

        let ReserveOutcome::Reserved(a) = repo.reserve("p-1", 3, "cart-a", later()).await.unwrap() else {
            panic!("expected reservation");
        };
        assert!(conserved(&repo, 10).await);

        let ReserveOutcome::Reserved(b) = repo.reserve("p-1", 4, "cart-b", later()).await.unwrap() else {
            panic!("expected reservation");
        };
        assert!(conserved(&repo, 10).await);

        assert!(repo.release(&a.id).await.unwrap());
        assert!(conserved(&repo, 10).await);
        assert_eq!(repo.available("p-1").await.unwrap(), Some(6));

        // Commit consumes stock permanently: total on hand drops by 4
        assert!(repo.commit(&b.id).await.unwrap());
        assert!(conserved(&repo, 6).await);
        assert_eq!(repo.available("p-1").await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_release_twice_restores_once() {
        let (_db, repo) = stocked(5).await;

        let ReserveOutcome::Reserved(r) = repo.reserve("p-1", 2, "cart-a", later()).await.unwrap() else {
            panic!("expected reservation");
        };
        assert!(repo.release(&r.id).await.unwrap());
        assert!(!repo.release(&r.id).await.unwrap());
        assert_eq!(repo.available("p-1").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_reserve_rejected_without_side_effect() {
        let (_db, repo) = stocked(2).await;

        let outcome = repo.reserve("p-1", 3, "cart-a", later()).await.unwrap();
        assert_eq!(outcome, ReserveOutcome::Rejected { available: 2 });
        assert_eq!(repo.available("p-1").await.unwrap(), Some(2));
        assert!(repo.active_reservations("p-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_positive_and_unknown() {
        let (_db, repo) = stocked(2).await;

        assert!(matches!(
            repo.reserve("p-1", 0, "cart-a", later()).await,
            Err(DbError::InvalidInput(_))
        ));
        assert!(matches!(
            repo.reserve("ghost", 1, "cart-a", later()).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let (_db, repo) = stocked(5).await;

        let mut handles = Vec::new();
        for i in 0..6 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.reserve("p-1", 2, &format!("cart-{}", i), later()).await.unwrap()
            }));
        }

        let mut reserved = 0;
        for handle in handles {
            if let ReserveOutcome::Reserved(r) = handle.await.unwrap() {
                reserved += r.quantity;
            }
        }

        assert_eq!(reserved, 4);
        assert_eq!(repo.available("p-1").await.unwrap(), Some(1));
        assert!(conserved(&repo, 5).await);
    }

    #[tokio::test]
    async fn test_release_expired_reclaims_stale_reservations() {
        let (_db, repo) = stocked(5).await;
        let now = Utc::now();

        repo.reserve("p-1", 2, "cart-stale", now - Duration::seconds(1)).await.unwrap();
        repo.reserve("p-1", 1, "cart-live", now + Duration::minutes(5)).await.unwrap();

        let released = repo.release_expired(now).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].cart_id, "cart-stale");
        assert_eq!(repo.available("p-1").await.unwrap(), Some(4));
        assert_eq!(repo.active_reservations("p-1").await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reserve_and_release_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("ledger.db")).max_connections(8);
        let (_db, repo) = stocked_in(config, 40).await;

        let mut handles = Vec::new();
        for i in 0..60 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.reserve("p-1", 1, &format!("cart-{}", i), later()).await.unwrap()
            }));
        }

        let mut reserved = Vec::new();
        for handle in handles {
            if let ReserveOutcome::Reserved(r) = handle.await.unwrap() {
                reserved.push(r.id);
            }
        }
        assert_eq!(reserved.len(), 40);
        assert_eq!(repo.available("p-1").await.unwrap(), Some(0));
        assert!(conserved(&repo, 40).await);

        let mut handles = Vec::new();
        for id in reserved {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move { repo.release(&id).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap());
        }

        assert_eq!(repo.available("p-1").await.unwrap(), Some(40));
        assert_eq!(repo.reserved_quantity("p-1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_release_expired_continues_past_a_failed_release() {
        let (db, repo) = stocked(5).await;
        let now = Utc::now();

        repo.reserve("p-1", 2, "cart-stuck", now - Duration::seconds(2)).await.unwrap();
        repo.reserve("p-1", 1, "cart-stale", now - Duration::seconds(1)).await.unwrap();

        sqlx::query(
            r#"
            CREATE TRIGGER block_stuck_release BEFORE DELETE ON reservations
            WHEN old.cart_id = 'cart-stuck'
            BEGIN SELECT RAISE(ABORT, 'release blocked'); END
            "#,
        )
        .execute(db.pool())
        .await
        .unwrap();

        let released = repo.release_expired(now).await.unwrap();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].cart_id, "cart-stale");
        assert_eq!(repo.available("p-1").await.unwrap(), Some(3));
        assert!(conserved(&repo, 5).await);
    }

    #[tokio::test]
    async fn test_add_stock_accumulates() {
        let (_db, repo) = stocked(5).await;
        assert_eq!(repo.add_stock("p-1", "shop-1", 7, None).await.unwrap(), 12);
        assert!(repo.add_stock("p-1", "shop-1", 0, None).await.is_err());
    }
}
