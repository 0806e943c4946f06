//! # Checkout CLI
//!
//! Runs the checkout engine against the configured database and lock store.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CheckoutConfig::load ──► CheckoutContext::connect ──► command         │
//! │        │                        │                          │            │
//! │   toml + BAZAAR_*        SQLite pool + Redis        JSON on stdout      │
//! │                          (or in-process locks)      logs on stderr      │
//! │                                                                         │
//! │                         CheckoutContext::close ◄────────┘              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```bash
//! checkout seed-demo
//! checkout review demos/checkout-request.json
//! cat demos/checkout-request.json | checkout execute -
//! RUST_LOG=debug checkout sweep
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use bazaar_checkout::{CheckoutConfig, CheckoutContext, CheckoutError};
use bazaar_core::CheckoutRequest;
use bazaar_db::seed::seed_demo;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,bazaar_checkout=debug";

#[derive(Debug, Parser)]
#[command(name = "checkout", about = "Bazaar checkout engine", version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "BAZAAR_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Price a checkout request without reserving anything
    Review {
        /// Request JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        request: String,
    },

    /// Reserve stock and create one order per shop
    Execute {
        /// Request JSON file, or `-` for stdin
        #[arg(default_value = "-")]
        request: String,
    },

    /// Release reservations whose expiry has passed
    Sweep,

    /// List a shop's discount codes
    Discounts {
        #[arg(long)]
        shop: String,

        /// Include switched-off discounts
        #[arg(long)]
        all: bool,
    },

    /// Seed demo shops, stock, discount codes and a buyer cart
    SeedDemo {
        #[arg(long, default_value_t = 3)]
        shops: usize,

        #[arg(long, default_value_t = 8)]
        products: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = CheckoutConfig::load(cli.config).context("loading checkout config")?;
    info!(
        database = %config.database.path.display(),
        locks = config.lock.enabled,
        redis = config.lock.redis_url.is_some(),
        "Configuration loaded"
    );

    let ctx = CheckoutContext::connect(config)
        .await
        .context("opening checkout context")?;

    let outcome = run(&ctx, cli.command).await;
    ctx.close().await;
    outcome
}

async fn run(ctx: &CheckoutContext, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Review { request } => {
            let request = read_request(&request)?;
            let quote = ctx.orchestrator().review_checkout(&request).await;
            report(quote)
        }
        Command::Execute { request } => {
            let request = read_request(&request)?;
            let receipt = ctx.orchestrator().execute_checkout(&request).await;
            report(receipt)
        }
        Command::Sweep => {
            let released = ctx.stock().release_expired(chrono::Utc::now()).await?;
            print_json(&json!({
                "released": released.len(),
                "reservations": released,
            }))
        }
        Command::Discounts { shop, all } => {
            let discounts = ctx.evaluator().list_for_shop(&shop, !all).await?;
            print_json(&discounts)
        }
        Command::SeedDemo { shops, products } => {
            let summary = seed_demo(ctx.database(), shops, products).await?;
            print_json(&json!({
                "skipped": summary.skipped,
                "shops": summary.shops,
                "products": summary.products,
                "discounts": summary.discounts,
                "cart_id": summary.cart_id,
            }))
        }
    }
}

/// Prints the value, or the error as `{"error": {...}}`, and fails the
/// process on error.
fn report<T: Serialize>(result: Result<T, CheckoutError>) -> anyhow::Result<()> {
    match result {
        Ok(value) => print_json(&value),
        Err(e) => {
            print_json(&json!({ "error": &e, "retryable": e.is_retryable() }))?;
            bail!(e)
        }
    }
}

fn read_request(source: &str) -> anyhow::Result<CheckoutRequest> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading request from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source))?
    };

    serde_json::from_str(&raw).context("parsing checkout request")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
