//! # Stock Reservation
//!
//! One `reserve` entry point over both halves of the reservation story:
//! the optional advisory lock and the ledger's conditional decrement.
//!
//! ```text
//! reserve(product, qty)
//!   │
//!   ├─ lock enabled? ──► acquire ──► None        ──► LockContention
//!   │                      │     └─► store error ──► warn, continue unlocked
//!   │                      ▼
//!   ├─ ledger.reserve (atomic: available >= qty) ──► Rejected ──► InsufficientStock
//!   │
//!   └─ release lock (always) ──► Reservation
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{CheckoutError, CheckoutResult};
use crate::lock::LockManager;
use crate::ports::{ReserveOutcome, StockLedger};
use bazaar_core::Reservation;

/// Default lifetime of a reservation before the sweep may reclaim it.
pub const DEFAULT_RESERVATION_TTL_SECS: i64 = 15 * 60;

#[derive(Clone)]
pub struct StockReserver {
    ledger: Arc<dyn StockLedger>,
    locks: Option<LockManager>,
    reservation_ttl: Duration,
}

impl StockReserver {
    /// `locks: None` relies on the ledger alone.
    pub fn new(ledger: Arc<dyn StockLedger>, locks: Option<LockManager>) -> Self {
        StockReserver {
            ledger,
            locks,
            reservation_ttl: Duration::seconds(DEFAULT_RESERVATION_TTL_SECS),
        }
    }

    pub fn with_reservation_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    pub fn ledger(&self) -> &Arc<dyn StockLedger> {
        &self.ledger
    }

    /// Reserves `quantity` units of `product_id` for `cart_id`.
    ///
    /// `holder_id` identifies the checkout attempt in the lock store.
    pub async fn reserve(
        &self,
        product_id: &str,
        quantity: i64,
        cart_id: &str,
        holder_id: &str,
    ) -> CheckoutResult<Reservation> {
        if quantity <= 0 {
            return Err(CheckoutError::invalid(format!(
                "quantity for {} must be positive, got {}",
                product_id, quantity
            )));
        }

        let token = match &self.locks {
            Some(locks) => match locks.acquire(product_id, holder_id).await {
                Ok(Some(token)) => Some(token),
                Ok(None) => {
                    return Err(CheckoutError::LockContention {
                        product_id: product_id.to_string(),
                    })
                }
                Err(e) => {
                    warn!(product_id, error = %e, "Lock store unavailable, reserving without lock");
                    None
                }
            },
            None => None,
        };

        let expires_at = Utc::now() + self.reservation_ttl;
        let outcome = self
            .ledger
            .reserve(product_id, quantity, cart_id, expires_at)
            .await;

        if let (Some(locks), Some(token)) = (&self.locks, &token) {
            locks.release(token).await;
        }

        match outcome {
            Ok(ReserveOutcome::Reserved(reservation)) => {
                debug!(
                    product_id,
                    quantity,
                    reservation_id = %reservation.id,
                    "Stock reserved"
                );
                Ok(reservation)
            }
            Ok(ReserveOutcome::Rejected { available }) => {
                debug!(product_id, quantity, available, "Reservation rejected");
                Err(CheckoutError::InsufficientStock {
                    product_id: product_id.to_string(),
                    requested: quantity,
                    available,
                })
            }
            // Never stocked
            Err(CheckoutError::NotFound { .. }) => Err(CheckoutError::InsufficientStock {
                product_id: product_id.to_string(),
                requested: quantity,
                available: 0,
            }),
            Err(e) => Err(e),
        }
    }

    /// Gives the reserved units back.
    pub async fn release(&self, reservation: &Reservation) -> CheckoutResult<bool> {
        self.ledger.release(&reservation.id).await
    }

    /// Makes the reservation permanent.
    pub async fn commit(&self, reservation: &Reservation) -> CheckoutResult<bool> {
        self.ledger.commit(&reservation.id).await
    }

    /// Reclaims reservations left behind by attempts that never finished.
    pub async fn release_expired(&self, now: DateTime<Utc>) -> CheckoutResult<Vec<Reservation>> {
        let released = self.ledger.release_expired(now).await?;
        if !released.is_empty() {
            info!(count = released.len(), "Expired reservations released");
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
    use crate::error::LockError;
    use crate::lock::{InMemoryKeyValueStore, KeyValueStore, LockSettings};
    use async_trait::async_trait;
    use bazaar_core::Product;
    use bazaar_db::{Database, DbConfig};

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn set_nx_px(
            &self,
            _key: &str,
            _value: &str,
            _ttl: std::time::Duration,
        ) -> Result<bool, LockError> {
            Err(LockError::Connection("refused".into()))
        }

        async fn del(&self, _key: &str) -> Result<bool, LockError> {
            Err(LockError::Connection("refused".into()))
        }
    }

    async fn stocked(quantity: i64) -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products()
            .insert(&Product {
                id: "p-1".into(),
                shop_id: "shop-1".into(),
                name: "Lamp".into(),
                price_cents: 1_000,
                is_active: true,
            })
            .await
            .unwrap();
        db.inventory()
            .add_stock("p-1", "shop-1", quantity, None)
            .await
            .unwrap();
        db
    }

    /// available + held for p-1
    async fn ledger_total(ledger: &Arc<dyn StockLedger>) -> i64 {
        let available = ledger.available("p-1").await.unwrap().unwrap();
        let held: i64 = ledger
            .active_reservations("p-1")
            .await
            .unwrap()
            .iter()
            .map(|r| r.quantity)
            .sum();
        available + held
    }

    fn locked(db: &Database, store: Arc<dyn KeyValueStore>) -> StockReserver {
        StockReserver::new(
            Arc::new(db.inventory()),
            Some(LockManager::new(store, LockSettings::default())),
        )
    }

    #[tokio::test]
    async fn test_reserve_release_commit_conserve_stock() {
        let db = stocked(10).await;
        let stock = locked(&db, Arc::new(InMemoryKeyValueStore::new()));
        let ledger = stock.ledger();

        let a = stock.reserve("p-1", 3, "cart-1", "attempt-1").await.unwrap();
        assert_eq!(ledger_total(ledger).await, 10);
        let b = stock.reserve("p-1", 4, "cart-2", "attempt-2").await.unwrap();
        assert_eq!(ledger_total(ledger).await, 10);

        assert!(stock.release(&a).await.unwrap());
        assert!(!stock.release(&a).await.unwrap());
        assert_eq!(ledger_total(ledger).await, 10);

        // Committed units leave the ledger for good
        assert!(stock.commit(&b).await.unwrap());
        assert_eq!(ledger_total(ledger).await, 6);
        assert_eq!(ledger.available("p-1").await.unwrap(), Some(6));
    }

    #[tokio::test]
    async fn test_rejection_and_invalid_quantity() {
        let db = stocked(2).await;
        let stock = locked(&db, Arc::new(InMemoryKeyValueStore::new()));

        let err = stock.reserve("p-1", 3, "cart-1", "a-1").await.unwrap_err();
        assert_eq!(
            err,
            CheckoutError::InsufficientStock {
                product_id: "p-1".into(),
                requested: 3,
                available: 2,
            }
        );
        assert!(err.is_retryable());

        assert!(matches!(
            stock.reserve("p-1", 0, "cart-1", "a-1").await,
            Err(CheckoutError::InvalidInput { .. })
        ));
        assert!(matches!(
            stock.reserve("never-stocked", 1, "cart-1", "a-1").await,
            Err(CheckoutError::InsufficientStock { available: 0, .. })
        ));
    }

    #[tokio::test]
    async fn test_held_lock_reports_contention() {
        let db = stocked(5).await;
        let store = Arc::new(InMemoryKeyValueStore::new());
        let stock = locked(&db, store.clone());

        store
            .set_nx_px("checkout:lock:p-1", "someone-else", std::time::Duration::from_secs(60))
            .await
            .unwrap();

        let err = stock.reserve("p-1", 1, "cart-1", "a-1").await.unwrap_err();
        assert_eq!(err, CheckoutError::LockContention { product_id: "p-1".into() });
        assert_eq!(db.inventory().available("p-1").await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn test_broken_lock_store_degrades_to_ledger_only() {
        let db = stocked(5).await;
        let stock = locked(&db, Arc::new(BrokenStore));

        stock.reserve("p-1", 5, "cart-1", "a-1").await.unwrap();
        assert!(matches!(
            stock.reserve("p-1", 1, "cart-2", "a-2").await,
            Err(CheckoutError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_ledger_only_mode() {
        let db = stocked(1).await;
        let stock = StockReserver::new(Arc::new(db.inventory()), None);

        let r = stock.reserve("p-1", 1, "cart-1", "a-1").await.unwrap();
        assert!(r.expires_at > Utc::now() + Duration::minutes(14));
    }

    #[tokio::test]
    async fn test_sweep_reclaims_expired_reservations() {
        let db = stocked(4).await;
        let stock = StockReserver::new(Arc::new(db.inventory()), None)
            .with_reservation_ttl(Duration::seconds(30));

        stock.reserve("p-1", 3, "cart-1", "a-1").await.unwrap();
        assert!(stock.release_expired(Utc::now()).await.unwrap().is_empty());

        let swept = stock
            .release_expired(Utc::now() + Duration::minutes(1))
            .await
            .unwrap();
        assert_eq!(swept.len(), 1);
        assert_eq!(swept[0].quantity, 3);
        assert_eq!(db.inventory().available("p-1").await.unwrap(), Some(4));
    }
}
