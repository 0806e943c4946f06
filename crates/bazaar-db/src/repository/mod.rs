//! # Repository Module
//!
//! Data access layer for checkout entities.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Repository Pattern                                 │
//! │                                                                         │
//! │  Checkout engine (via its store traits)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Repository Layer                              │   │
//! │  │                                                                  │   │
//! │  │  ProductRepository    ──► catalog lookups                       │   │
//! │  │  InventoryRepository  ──► reserve / release / commit / restock  │   │
//! │  │  CartRepository       ──► active cart, completion               │   │
//! │  │  OrderRepository      ──► create with lines, cancel             │   │
//! │  │  DiscountRepository   ──► rules, conditional redemption         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every multi-statement write runs inside one sqlx transaction; a dropped
//! transaction rolls back.

pub mod cart;
pub mod discount;
pub mod inventory;
pub mod order;
pub mod product;

/// Generates a new entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
