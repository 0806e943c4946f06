//! # bazaar-core: Pure Checkout Logic for the Bazaar Marketplace
//!
//! This crate holds the parts of checkout that are plain arithmetic and
//! rule checking: money, discount eligibility, discount amounts and the
//! per-shop pricing of a checkout request.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Checkout Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    checkout-cli (apps/)                         │   │
//! │  │          review  ──►  execute  ──►  sweep                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         bazaar-checkout (locks, reservations, orchestrator)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ discount  │  │  pricing  │  │   │
//! │  │   │  Cart     │  │   Money   │  │ eligibil. │  │ ShopQuote │  │   │
//! │  │   │  Discount │  │  percent  │  │  amounts  │  │  totals   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  │       stock ledger, discount counters, carts, orders            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Cart, Reservation, Discount, Order, requests, quotes)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input and discount-definition validation
//! - [`discount`] - Discount eligibility and amount computation
//! - [`pricing`] - Line pricing, shop-group quotes and checkout totals
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::Money;
//!
//! let cart_total = Money::from_cents(15000); // $150.00
//! let discount = cart_total.percent_of(10);
//! assert_eq!(discount.cents(), 1500);
//! assert_eq!((cart_total - discount).cents(), 13500);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use discount::{DiscountComputation, DiscountRejection};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single product in one checkout line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Maximum number of lines across all shop-groups of one checkout.
pub const MAX_CHECKOUT_LINES: usize = 100;

/// Largest priced line total, in cents. With at most `MAX_CHECKOUT_LINES`
/// lines every checkout sum stays far inside i64.
pub const MAX_LINE_TOTAL_CENTS: i64 = 100_000_000_000_000;

/// Largest shipping fee a shop-group may carry, in cents ($1,000,000.00).
pub const MAX_SHIPPING_FEE_CENTS: i64 = 100_000_000;

/// Discount codes are between these lengths (inclusive).
pub const DISCOUNT_CODE_MIN_LEN: usize = 3;
pub const DISCOUNT_CODE_MAX_LEN: usize = 20;
