//! # Checkout Context
//!
//! Everything a process needs to run checkouts, opened once at start-up and
//! closed at shutdown.
//!
//! ```text
//! CheckoutConfig ──connect()──► CheckoutContext
//!                                 ├─ Database (SQLite pool)
//!                                 └─ KeyValueStore (Redis | in-memory)
//!                                        │
//!                        orchestrator() ▼
//!                                 CheckoutOrchestrator
//! ```
//!
//! A Redis URL that cannot be reached is not fatal: the context falls back to
//! the in-process store and says so in the log.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::CheckoutConfig;
use crate::discount::DiscountEvaluator;
use crate::error::CheckoutResult;
use crate::lock::{InMemoryKeyValueStore, KeyValueStore, LockManager};
use crate::orchestrator::CheckoutOrchestrator;
use crate::redis_store::RedisKeyValueStore;
use crate::stock::StockReserver;
use bazaar_db::Database;

#[derive(Clone)]
pub struct CheckoutContext {
    db: Database,
    locks: Option<LockManager>,
    config: CheckoutConfig,
}

impl CheckoutContext {
    /// Opens the database (running migrations) and the lock store.
    pub async fn connect(config: CheckoutConfig) -> CheckoutResult<Self> {
        let db = Database::new(config.db_config()).await?;

        let locks = if config.lock.enabled {
            let store = lock_store(&config).await;
            Some(LockManager::new(store, config.lock_settings()))
        } else {
            info!("Product locks disabled, reservations rely on the ledger");
            None
        };

        Ok(CheckoutContext { db, locks, config })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn evaluator(&self) -> DiscountEvaluator {
        DiscountEvaluator::new(Arc::new(self.db.discounts()))
    }

    pub fn stock(&self) -> StockReserver {
        StockReserver::new(Arc::new(self.db.inventory()), self.locks.clone())
            .with_reservation_ttl(self.config.reservation_ttl())
    }

    pub fn orchestrator(&self) -> CheckoutOrchestrator {
        CheckoutOrchestrator::new(
            Arc::new(self.db.products()),
            Arc::new(self.db.carts()),
            Arc::new(self.db.orders()),
            self.evaluator(),
            self.stock(),
        )
    }

    pub async fn close(self) {
        self.db.close().await;
        info!("Checkout context closed");
    }
}

async fn lock_store(config: &CheckoutConfig) -> Arc<dyn KeyValueStore> {
    match &config.lock.redis_url {
        Some(url) => match RedisKeyValueStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, using in-process lock store");
                Arc::new(InMemoryKeyValueStore::new())
            }
        },
        None => {
            info!("No Redis URL configured, using in-process lock store");
            Arc::new(InMemoryKeyValueStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{CheckoutRequest, LineRequest, ShopGroupRequest};
    use bazaar_db::seed::{seed_demo, DEMO_BUYER_ID};
    use std::path::PathBuf;

    fn memory_config() -> CheckoutConfig {
        let mut config = CheckoutConfig::default();
        config.database.path = PathBuf::from(":memory:");
        config
    }

    #[tokio::test]
    async fn test_connect_and_checkout_seeded_cart() {
        let ctx = CheckoutContext::connect(memory_config()).await.unwrap();
        let summary = seed_demo(ctx.database(), 2, 3).await.unwrap();
        let cart_id = summary.cart_id.unwrap();

        let request = CheckoutRequest {
            buyer_id: DEMO_BUYER_ID.to_string(),
            cart_id,
            shop_groups: vec![ShopGroupRequest {
                shop_id: "shop-1".to_string(),
                discount: None,
                shipping_fee_cents: 0,
                items: vec![LineRequest {
                    product_id: "shop-1-p-01".to_string(),
                    quantity: 1,
                }],
            }],
        };

        let receipt = ctx.orchestrator().execute_checkout(&request).await.unwrap();
        assert_eq!(receipt.orders.len(), 1);
        ctx.close().await;
    }

    #[tokio::test]
    async fn test_disabled_locks() {
        let mut config = memory_config();
        config.lock.enabled = false;

        let ctx = CheckoutContext::connect(config).await.unwrap();
        assert!(ctx.locks.is_none());
    }
}
