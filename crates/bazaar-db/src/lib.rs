//! # bazaar-db: Database Layer for Bazaar Checkout
//!
//! SQLite persistence for the checkout engine, using sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Bazaar Checkout Data Flow                         │
//! │                                                                         │
//! │  CheckoutOrchestrator (bazaar-checkout)                                │
//! │       │  via Catalog / StockLedger / DiscountStore / OrderStore        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bazaar-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ Product        │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ Inventory      │    │ 001_checkout │  │   │
//! │  │   │ WAL, FKs on   │    │ Cart / Order   │    │ _schema.sql  │  │   │
//! │  │   │               │    │ Discount       │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (or :memory: in tests)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`seed`] - Demo marketplace data
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("checkout.db")).await?;
//!
//! let outcome = db.inventory().reserve("p-1", 2, "cart-1", expires_at).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::cart::CartRepository;
pub use repository::discount::{DiscountRepository, RedemptionOutcome};
pub use repository::inventory::{InventoryRepository, ReserveOutcome};
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
