//! # Pricing
//!
//! Turns catalog products and discount results into shop-group quotes and
//! checkout totals.
//!
//! ```text
//! Product (catalog) ──price_line()──► PricedLine
//!                                        │
//! DiscountComputation ──applied()──► AppliedDiscount
//!                                        │
//!                           shop_quote() ▼
//!                                    ShopQuote ──checkout_totals()──► CheckoutTotals
//! ```

use crate::discount::DiscountComputation;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::MAX_LINE_TOTAL_CENTS;
use crate::types::{
    AppliedDiscount, CheckoutTotals, Discount, NewOrder, OrderLine, PricedLine, Product, ShopQuote,
};

/// Prices one requested line from the catalog product.
///
/// Rejects products that are unpublished or that belong to a different
/// shop than the shop-group claiming them.
pub fn price_line(product: &Product, claimed_shop_id: &str, quantity: i64) -> CoreResult<PricedLine> {
    if product.shop_id != claimed_shop_id {
        return Err(CoreError::ShopMismatch {
            product_id: product.id.clone(),
            shop_id: claimed_shop_id.to_string(),
        });
    }

    if !product.is_active {
        return Err(CoreError::ProductInactive(product.id.clone()));
    }

    let line_total = product
        .price()
        .checked_multiply_quantity(quantity)
        .filter(|total| total.cents() <= MAX_LINE_TOTAL_CENTS)
        .ok_or_else(|| CoreError::AmountOverflow(product.id.clone()))?;

    Ok(PricedLine {
        product_id: product.id.clone(),
        shop_id: product.shop_id.clone(),
        name: product.name.clone(),
        unit_price_cents: product.price_cents,
        quantity,
        line_total_cents: line_total.cents(),
    })
}

/// Builds the applied-discount record for a shop quote.
pub fn applied(discount: &Discount, computation: &DiscountComputation) -> AppliedDiscount {
    AppliedDiscount {
        discount_id: discount.id.clone(),
        code: discount.code.clone(),
        kind: discount.kind,
        amount_cents: computation.amount.cents(),
        waives_shipping: computation.waives_shipping,
    }
}

/// Prices a shop-group.
///
/// A free-shipping discount zeroes the shipping fee; every other kind
/// reduces the goods total. Fails with `AmountOverflow` instead of wrapping.
pub fn shop_quote(
    shop_id: &str,
    lines: Vec<PricedLine>,
    shipping_fee: Money,
    discount: Option<AppliedDiscount>,
) -> CoreResult<ShopQuote> {
    let overflow = || CoreError::AmountOverflow(format!("shop {}", shop_id));

    let raw_total =
        Money::checked_sum(lines.iter().map(PricedLine::line_total)).ok_or_else(overflow)?;

    let (shipping, discount_amount) = match &discount {
        Some(applied) if applied.waives_shipping => (Money::zero(), Money::zero()),
        Some(applied) => (shipping_fee, Money::from_cents(applied.amount_cents)),
        None => (shipping_fee, Money::zero()),
    };

    let total = raw_total
        .checked_add(shipping)
        .and_then(|t| t.checked_sub(discount_amount))
        .ok_or_else(overflow)?;

    Ok(ShopQuote {
        shop_id: shop_id.to_string(),
        lines,
        raw_total_cents: raw_total.cents(),
        shipping_fee_cents: shipping.cents(),
        discount_cents: discount_amount.cents(),
        total_cents: total.cents(),
        discount,
    })
}

/// Sums shop quotes into the checkout totals.
///
/// `total_checkout = total_price + fee_ship - total_discount`
pub fn checkout_totals(shops: &[ShopQuote]) -> CoreResult<CheckoutTotals> {
    let overflow = || CoreError::AmountOverflow("checkout totals".to_string());
    let sum = |cents: fn(&ShopQuote) -> i64| {
        Money::checked_sum(shops.iter().map(|s| Money::from_cents(cents(s)))).ok_or_else(overflow)
    };

    let total_price = sum(|s| s.raw_total_cents)?;
    let fee_ship = sum(|s| s.shipping_fee_cents)?;
    let total_discount = sum(|s| s.discount_cents)?;
    let total_checkout = total_price
        .checked_add(fee_ship)
        .and_then(|t| t.checked_sub(total_discount))
        .ok_or_else(overflow)?;

    Ok(CheckoutTotals {
        total_price_cents: total_price.cents(),
        fee_ship_cents: fee_ship.cents(),
        total_discount_cents: total_discount.cents(),
        total_checkout_cents: total_checkout.cents(),
    })
}

/// Freezes a shop quote into the order the store will persist.
pub fn order_for(quote: &ShopQuote, buyer_id: &str, cart_id: &str) -> NewOrder {
    NewOrder {
        user_id: buyer_id.to_string(),
        shop_id: quote.shop_id.clone(),
        cart_id: cart_id.to_string(),
        lines: quote.lines.iter().map(OrderLine::from).collect(),
        total_price_cents: quote.raw_total_cents,
        fee_ship_cents: quote.shipping_fee_cents,
        total_discount_cents: quote.discount_cents,
        total_checkout_cents: quote.total_cents,
        discount_id: quote.discount.as_ref().map(|d| d.discount_id.clone()),
        discount_code: quote.discount.as_ref().map(|d| d.code.clone()),
    }
}

/// Short human-facing order reference: `#` + first 8 hex digits of the id.
pub fn tracking_number(order_id: &str) -> String {
    let hex: String = order_id
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect();
    format!("#{}", hex.to_ascii_uppercase())
}

// =============================================================================
// Unit Tests
// =============================================================================
