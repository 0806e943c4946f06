//! # Demo Data
//!
//! Populates an empty database with a small marketplace: a few shops, their
//! products and stock, one `SAVE10` code per shop and an active cart for a
//! demo buyer. Used by the `seed` binary and the CLI's `seed-demo` command.
//!
//! Ids are deterministic (`shop-1`, `shop-1-p-01`, ...) so hand-written
//! checkout requests keep working after a reseed.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::error::DbResult;
use crate::pool::Database;
use bazaar_core::{CartLine, DiscountKind, DiscountScope, NewDiscount, Product};

/// Buyer that owns the seeded cart.
pub const DEMO_BUYER_ID: &str = "buyer-demo";

/// Code seeded for every shop.
pub const DEMO_DISCOUNT_CODE: &str = "SAVE10";

const PRODUCT_NAMES: &[&str] = &[
    "Desk Lamp",
    "Ceramic Mug",
    "Linen Tote",
    "Notebook",
    "Wool Socks",
    "Candle",
    "Tea Sampler",
    "Phone Stand",
    "Plant Pot",
    "Water Bottle",
];

/// What a seeding run wrote.
#[derive(Debug, Clone, Default)]
pub struct SeedSummary {
    /// True when the database already had products and nothing was written.
    pub skipped: bool,
    pub shops: usize,
    pub products: usize,
    pub discounts: usize,
    pub cart_id: Option<String>,
}

/// Seeds `shops` shops with `products_per_shop` products each.
pub async fn seed_demo(
    db: &Database,
    shops: usize,
    products_per_shop: usize,
) -> DbResult<SeedSummary> {
    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(SeedSummary {
            skipped: true,
            ..SeedSummary::default()
        });
    }

    let now = Utc::now();
    let mut summary = SeedSummary {
        shops,
        ..SeedSummary::default()
    };
    let mut cart_lines = Vec::new();

    for s in 1..=shops {
        let shop_id = format!("shop-{}", s);

        for p in 1..=products_per_shop {
            let seed = s * 100 + p;
            let product = Product {
                id: format!("{}-p-{:02}", shop_id, p),
                shop_id: shop_id.clone(),
                name: PRODUCT_NAMES[(seed - 1) % PRODUCT_NAMES.len()].to_string(),
                // 4.99 .. 59.99
                price_cents: 499 + ((seed * 37) % 56) as i64 * 100,
                is_active: true,
            };
            db.products().insert(&product).await?;

            let stock = 5 + (seed % 46) as i64;
            db.inventory()
                .add_stock(&product.id, &shop_id, stock, Some("main"))
                .await?;

            if p == 1 {
                cart_lines.push(CartLine {
                    product_id: product.id.clone(),
                    shop_id: shop_id.clone(),
                    name: product.name.clone(),
                    price_cents: product.price_cents,
                    quantity: 1,
                });
            }
            summary.products += 1;
        }

        let save10 = NewDiscount {
            shop_id: shop_id.clone(),
            code: DEMO_DISCOUNT_CODE.to_string(),
            name: "10% off".to_string(),
            description: Some("Demo discount".to_string()),
            kind: DiscountKind::Percentage { percent: 10 },
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(30),
            max_uses: Some(100),
            max_uses_per_user: 1,
            min_order_value_cents: 0,
            max_discount_amount_cents: None,
            scope: DiscountScope::All,
            product_ids: Vec::new(),
        };
        db.discounts().create(&save10, DEMO_DISCOUNT_CODE).await?;
        summary.discounts += 1;
    }

    if !cart_lines.is_empty() {
        let cart = db.carts().create(DEMO_BUYER_ID).await?;
        for line in &cart_lines {
            db.carts().add_line(&cart.id, line).await?;
        }
        summary.cart_id = Some(cart.id);
    }

    info!(
        shops = summary.shops,
        products = summary.products,
        discounts = summary.discounts,
        "Demo data seeded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;

    #[tokio::test]
    async fn test_seed_once() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let first = seed_demo(&db, 2, 3).await.unwrap();
        assert!(!first.skipped);
        assert_eq!(first.products, 6);
        assert_eq!(first.discounts, 2);

        let cart = db.carts().get_active(DEMO_BUYER_ID).await.unwrap().unwrap();
        assert_eq!(cart.lines.len(), 2);
        assert!(db.inventory().available("shop-2-p-03").await.unwrap().unwrap() >= 5);
        assert!(db
            .discounts()
            .find_by_code("shop-1", DEMO_DISCOUNT_CODE)
            .await
            .unwrap()
            .is_some());

        let second = seed_demo(&db, 2, 3).await.unwrap();
        assert!(second.skipped);
        assert_eq!(db.products().count().await.unwrap(), 6);
    }
}
