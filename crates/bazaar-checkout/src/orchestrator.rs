//! # Checkout Orchestrator
//!
//! Drives one checkout from request to orders.
//!
//! ## Phases
//! ```text
//! ┌───────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐
//! │ Reviewing │──►│ Reserving │──►│ Committing │──►│ Completed │
//! └───────────┘   └─────┬─────┘   └─────┬──────┘   └───────────┘
//!       │               │               │
//!       │               ▼               ▼
//!       │         release what   ┌─────────────┐
//!       │         was reserved   │ RollingBack │
//!       │               │        └──────┬──────┘
//!       ▼               ▼               ▼
//!  ┌────────────────────────────────────────┐
//!  │                 Failed                 │
//!  └────────────────────────────────────────┘
//! ```
//!
//! ## Committing
//! 1. create one order per shop-group
//! 2. record each applied discount's redemption
//! 3. commit every reservation
//! 4. clear the buyer's cart
//!
//! A failure in 1 or 2 reverts redemptions, cancels orders and releases
//! reservations (newest first). After step 2 the checkout has succeeded;
//! failures in 3 and 4 are logged and the receipt is still returned.
//!
//! Reservations are taken in product-id order so two attempts over the same
//! products always contend for locks in the same sequence.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::discount::DiscountEvaluator;
use crate::error::{CheckoutError, CheckoutResult};
use crate::ports::{CartStore, Catalog, OrderStore};
use crate::stock::StockReserver;
use bazaar_core::pricing::{applied, checkout_totals, order_for, price_line, shop_quote};
use bazaar_core::validation::validate_checkout_request;
use bazaar_core::{
    CheckoutQuote, CheckoutReceipt, CheckoutRequest, Discount, LineRequest, Money, Order,
    Reservation,
};

/// Where a checkout attempt is; carried in every phase log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutPhase {
    Reviewing,
    Reserving,
    Committing,
    RollingBack,
    Completed,
    Failed,
}

impl fmt::Display for CheckoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutPhase::Reviewing => "reviewing",
            CheckoutPhase::Reserving => "reserving",
            CheckoutPhase::Committing => "committing",
            CheckoutPhase::RollingBack => "rolling_back",
            CheckoutPhase::Completed => "completed",
            CheckoutPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A reviewed checkout plus the validated discount behind each shop quote.
struct Priced {
    quote: CheckoutQuote,
    discounts: Vec<Option<Discount>>,
}

#[derive(Clone)]
pub struct CheckoutOrchestrator {
    catalog: Arc<dyn Catalog>,
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    discounts: DiscountEvaluator,
    stock: StockReserver,
}

impl CheckoutOrchestrator {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        discounts: DiscountEvaluator,
        stock: StockReserver,
    ) -> Self {
        CheckoutOrchestrator {
            catalog,
            carts,
            orders,
            discounts,
            stock,
        }
    }

    pub fn discounts(&self) -> &DiscountEvaluator {
        &self.discounts
    }

    pub fn stock(&self) -> &StockReserver {
        &self.stock
    }

    // =========================================================================
    // Review
    // =========================================================================

    /// Prices a checkout without changing anything.
    ///
    /// Calling it twice with unchanged data gives the same quote.
    pub async fn review_checkout(&self, request: &CheckoutRequest) -> CheckoutResult<CheckoutQuote> {
        Ok(self.price(request).await?.quote)
    }

    async fn price(&self, request: &CheckoutRequest) -> CheckoutResult<Priced> {
        validate_checkout_request(request)?;

        match self.carts.load(&request.buyer_id).await? {
            Some(cart) if cart.id == request.cart_id && cart.is_active() => {}
            _ => return Err(CheckoutError::not_found("Cart", &request.cart_id)),
        }

        let mut shops = Vec::with_capacity(request.shop_groups.len());
        let mut discounts = Vec::with_capacity(request.shop_groups.len());

        for group in &request.shop_groups {
            let mut lines = Vec::with_capacity(group.items.len());
            for item in &group.items {
                let product = self
                    .catalog
                    .get_product(&item.product_id)
                    .await?
                    .ok_or_else(|| CheckoutError::not_found("Product", &item.product_id))?;
                lines.push(price_line(&product, &group.shop_id, item.quantity)?);
            }

            let (applied_discount, discount) = match &group.discount {
                Some(reference) => {
                    let discount = self
                        .discounts
                        .validate(reference, &group.shop_id, Some(&request.buyer_id))
                        .await?;
                    let computation = self.discounts.compute(&discount, &lines)?;
                    (Some(applied(&discount, &computation)), Some(discount))
                }
                None => (None, None),
            };

            shops.push(shop_quote(
                &group.shop_id,
                lines,
                Money::from_cents(group.shipping_fee_cents),
                applied_discount,
            )?);
            discounts.push(discount);
        }

        let totals = checkout_totals(&shops)?;
        debug!(
            buyer_id = %request.buyer_id,
            shops = shops.len(),
            total_checkout_cents = totals.total_checkout_cents,
            "Checkout priced"
        );

        Ok(Priced {
            quote: CheckoutQuote {
                buyer_id: request.buyer_id.clone(),
                cart_id: request.cart_id.clone(),
                shops,
                totals,
            },
            discounts,
        })
    }

    // =========================================================================
    // Execute
    // =========================================================================

    /// Reviews, reserves stock and persists one order per shop-group.
    ///
    /// ## Errors
    /// * Any review error, before anything is reserved
    /// * `InsufficientStock` / `LockContention` from reservation (retryable)
    /// * `DiscountRejected` when a cap was reached after review
    /// * `Persistence` when an order could not be stored
    ///
    /// On every error the stock ledger and discount counters are as they were.
    pub async fn execute_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> CheckoutResult<CheckoutReceipt> {
        let attempt_id = Uuid::new_v4().to_string();
        info!(
            %attempt_id,
            buyer_id = %request.buyer_id,
            cart_id = %request.cart_id,
            phase = %CheckoutPhase::Reviewing,
            "Checkout started"
        );

        let priced = match self.price(request).await {
            Ok(priced) => priced,
            Err(e) => return Err(failed(&attempt_id, e)),
        };

        info!(%attempt_id, phase = %CheckoutPhase::Reserving, "Reserving stock");
        let reservations = match self.reserve_all(&attempt_id, request).await {
            Ok(reservations) => reservations,
            Err(e) => return Err(failed(&attempt_id, e)),
        };

        info!(%attempt_id, phase = %CheckoutPhase::Committing, "Creating orders");
        let mut orders = Vec::with_capacity(priced.quote.shops.len());
        let mut redeemed = Vec::new();

        if let Err(e) = self
            .persist(&priced, request, &mut orders, &mut redeemed)
            .await
        {
            warn!(%attempt_id, phase = %CheckoutPhase::RollingBack, error = %e, "Rolling back checkout");
            self.roll_back(&attempt_id, &request.buyer_id, &redeemed, &orders, &reservations)
                .await;
            return Err(failed(&attempt_id, e));
        }

        for reservation in &reservations {
            match self.stock.commit(reservation).await {
                Ok(true) => {}
                Ok(false) => warn!(
                    %attempt_id,
                    reservation_id = %reservation.id,
                    "Reservation already gone at commit"
                ),
                Err(e) => error!(
                    %attempt_id,
                    reservation_id = %reservation.id,
                    error = %e,
                    "Reservation commit failed, record left for the sweep"
                ),
            }
        }

        if let Err(e) = self.carts.clear(&request.buyer_id).await {
            warn!(%attempt_id, buyer_id = %request.buyer_id, error = %e, "Cart not cleared");
        }

        info!(
            %attempt_id,
            phase = %CheckoutPhase::Completed,
            orders = orders.len(),
            total_checkout_cents = priced.quote.totals.total_checkout_cents,
            "Checkout completed"
        );

        Ok(CheckoutReceipt {
            orders,
            totals: priced.quote.totals,
        })
    }

    /// Reserves every line in product-id order; on failure releases what it
    /// already holds.
    async fn reserve_all(
        &self,
        attempt_id: &str,
        request: &CheckoutRequest,
    ) -> CheckoutResult<Vec<Reservation>> {
        let mut lines: Vec<&LineRequest> = request.lines().map(|(_, line)| line).collect();
        lines.sort_by(|a, b| a.product_id.cmp(&b.product_id));

        let mut reserved = Vec::with_capacity(lines.len());
        for line in lines {
            match self
                .stock
                .reserve(&line.product_id, line.quantity, &request.cart_id, attempt_id)
                .await
            {
                Ok(reservation) => reserved.push(reservation),
                Err(e) => {
                    debug!(
                        attempt_id,
                        product_id = %line.product_id,
                        held = reserved.len(),
                        "Reservation failed, releasing held stock"
                    );
                    self.release_all(attempt_id, &reserved).await;
                    return Err(e);
                }
            }
        }

        Ok(reserved)
    }

    /// Steps 1 and 2 of committing. Pushes into `orders` and `redeemed` as it
    /// goes so a failure can be undone precisely.
    async fn persist<'a>(
        &self,
        priced: &'a Priced,
        request: &CheckoutRequest,
        orders: &mut Vec<Order>,
        redeemed: &mut Vec<&'a Discount>,
    ) -> CheckoutResult<()> {
        for shop in &priced.quote.shops {
            let order = self
                .orders
                .create(&order_for(shop, &request.buyer_id, &request.cart_id))
                .await?;
            debug!(order_id = %order.id, shop_id = %order.shop_id, "Order created");
            orders.push(order);
        }

        for discount in priced.discounts.iter().flatten() {
            self.discounts
                .record_redemption(discount, &request.buyer_id)
                .await?;
            redeemed.push(discount);
        }

        Ok(())
    }

    /// Best effort: every step runs even if an earlier one failed.
    async fn roll_back(
        &self,
        attempt_id: &str,
        buyer_id: &str,
        redeemed: &[&Discount],
        orders: &[Order],
        reservations: &[Reservation],
    ) {
        for discount in redeemed.iter().rev() {
            match self.discounts.revert_redemption(&discount.id, buyer_id).await {
                Ok(true) => {}
                Ok(false) => warn!(attempt_id, discount_id = %discount.id, "No redemption to revert"),
                Err(e) => error!(
                    attempt_id,
                    discount_id = %discount.id,
                    error = %e,
                    "Failed to revert redemption"
                ),
            }
        }

        for order in orders.iter().rev() {
            if let Err(e) = self.orders.cancel(&order.id).await {
                error!(attempt_id, order_id = %order.id, error = %e, "Failed to cancel order");
            }
        }

        self.release_all(attempt_id, reservations).await;
    }

    async fn release_all(&self, attempt_id: &str, reservations: &[Reservation]) {
        for reservation in reservations.iter().rev() {
            if let Err(e) = self.stock.release(reservation).await {
                error!(
                    attempt_id,
                    reservation_id = %reservation.id,
                    product_id = %reservation.product_id,
                    error = %e,
                    "Failed to release reservation"
                );
            }
        }
    }
}

fn failed(attempt_id: &str, error: CheckoutError) -> CheckoutError {
    info!(
        attempt_id,
        phase = %CheckoutPhase::Failed,
        retryable = error.is_retryable(),
        error = %error,
        "Checkout failed"
    );
    error
}

// =============================================================================
// Unit Tests
// =============================================================================
