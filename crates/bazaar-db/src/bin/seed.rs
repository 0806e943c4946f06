//! # Seed Data Generator
//!
//! Populates a checkout database with a demo marketplace.
//!
//! ## Usage
//! ```bash
//! # Three shops with eight products each (default)
//! cargo run -p bazaar-db --bin seed
//!
//! # Custom layout and path
//! cargo run -p bazaar-db --bin seed -- --shops 5 --products 20 --db ./data/checkout.db
//! ```
//!
//! Each shop gets stocked products and a `SAVE10` code; the demo buyer gets
//! an active cart with one product from every shop.

use std::path::PathBuf;

use bazaar_db::seed::{seed_demo, DEMO_BUYER_ID, DEMO_DISCOUNT_CODE};
use bazaar_db::{Database, DbConfig};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Bazaar checkout demo data generator")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./bazaar_dev.db")]
    db: PathBuf,

    /// Number of shops
    #[arg(short, long, default_value_t = 3)]
    shops: usize,

    /// Products per shop
    #[arg(short, long, default_value_t = 8)]
    products: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("🌱 Bazaar Seed Data Generator");
    println!("=============================");
    println!("Database: {}", args.db.display());
    println!("Shops:    {}", args.shops);
    println!("Products: {} per shop", args.products);
    println!();

    let db = Database::new(DbConfig::new(args.db.clone())).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let start = std::time::Instant::now();
    let summary = seed_demo(&db, args.shops, args.products).await?;

    if summary.skipped {
        println!("⚠ Database already has products");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
    } else {
        println!();
        println!(
            "✓ Generated {} products across {} shops in {:?}",
            summary.products,
            summary.shops,
            start.elapsed()
        );
        println!("✓ {} discount codes ({})", summary.discounts, DEMO_DISCOUNT_CODE);
        if let Some(cart_id) = &summary.cart_id {
            println!("✓ Cart {} for {}", cart_id, DEMO_BUYER_ID);
        }
    }

    db.close().await;
    Ok(())
}
