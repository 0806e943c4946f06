//! # bazaar-checkout: Reservation and Checkout Engine
//!
//! Turns a buyer's multi-shop cart into priced orders while many buyers race
//! for the same stock.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Engine                                   │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CheckoutOrchestrator                             │  │
//! │  │  review_checkout  (pure pricing)                                 │  │
//! │  │  execute_checkout (reserve ─► orders ─► redemptions ─► commit)   │  │
//! │  └────────────┬──────────────────────┬──────────────────────┬──────┘  │
//! │               ▼                      ▼                      ▼          │
//! │  ┌────────────────────┐  ┌────────────────────┐  ┌──────────────────┐  │
//! │  │ DiscountEvaluator  │  │  StockReserver     │  │ Catalog          │  │
//! │  │                    │  │                    │  │ CartStore        │  │
//! │  │ validate, compute, │  │ LockManager (opt.) │  │ OrderStore       │  │
//! │  │ record / revert    │  │ + StockLedger      │  │                  │  │
//! │  └─────────┬──────────┘  └─────────┬──────────┘  └────────┬─────────┘  │
//! │            ▼                       ▼                      ▼            │
//! │       DiscountStore         KeyValueStore            bazaar-db         │
//! │                            (Redis | memory)          repositories      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`orchestrator`] - Review and execute, with rollback
//! - [`discount`] - Discount lookup, validation and redemption booking
//! - [`stock`] - Lock + ledger reservation
//! - [`lock`] - Advisory product locks and the in-memory key-value store
//! - [`redis_store`] - Redis key-value store
//! - [`ports`] - Collaborator traits
//! - [`sqlite`] - Collaborator traits for the `bazaar-db` repositories
//! - [`config`] - `checkout.toml` + `BAZAAR_*` environment
//! - [`context`] - Database and lock store opened once per process
//! - [`error`] - Checkout, lock and config errors
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_checkout::{CheckoutConfig, CheckoutContext};
//!
//! let config = CheckoutConfig::load(None)?;
//! let ctx = CheckoutContext::connect(config).await?;
//!
//! let quote = ctx.orchestrator().review_checkout(&request).await?;
//! let receipt = ctx.orchestrator().execute_checkout(&request).await?;
//!
//! ctx.close().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod discount;
pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod ports;
pub mod redis_store;
pub mod sqlite;
pub mod stock;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{
    CheckoutConfig, DatabaseSettings, LockConfig, ReservationSettings, MAX_RESERVATION_TTL_SECS,
};
pub use context::CheckoutContext;
pub use discount::{DiscountEvaluator, DiscountView};
pub use error::{CheckoutError, CheckoutResult, ConfigError, LockError};
pub use lock::{InMemoryKeyValueStore, KeyValueStore, LockManager, LockSettings, LockToken};
pub use orchestrator::{CheckoutOrchestrator, CheckoutPhase};
pub use ports::{CartStore, Catalog, DiscountStore, OrderStore, StockLedger};
pub use redis_store::RedisKeyValueStore;
pub use stock::{StockReserver, DEFAULT_RESERVATION_TTL_SECS};
