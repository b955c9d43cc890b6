//! # Seed Data Generator
//!
//! Populates a store database with a demo catalogue, customers and the
//! standard discount rules for development.
//!
//! ## Usage
//! ```bash
//! # Use pos.toml / GROCER_DB_PATH
//! cargo run -p grocer-db --bin seed
//!
//! # Specify database path
//! cargo run -p grocer-db --bin seed -- --db ./data/grocer.db
//! ```
//!
//! ## Generated Data
//! - Products across Rice, Sugar, Dairy, Beverages and Snacks, priced at
//!   all four tiers
//! - A handful of loyalty customers
//! - Discount rules: bulk rice (5% from 10 units), wholesale sugar
//!   (LKR 50 off per unit from 20 units), and a capped 2% line discount
//!   from 5 units

use chrono::Utc;
use std::env;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use grocer_core::discount::{DiscountMechanism, DiscountScope, NewDiscountRule};
use grocer_core::loyalty::{tier_for, TierThresholds};
use grocer_core::{Customer, PriceTier, Product};
use grocer_db::{Database, PosConfig};

/// (category, sku prefix, unit, weighed, [(name, retail price in cents)])
const CATALOGUE: &[(&str, &str, &str, bool, &[(&str, i64)])] = &[
    (
        "Rice",
        "RICE",
        "kg",
        true,
        &[
            ("Nadu Rice", 22000),
            ("Samba Rice", 26000),
            ("Keeri Samba", 34000),
            ("Red Raw Rice", 21000),
            ("Basmati Rice", 78000),
        ],
    ),
    (
        "Sugar",
        "SUGAR",
        "kg",
        true,
        &[("White Sugar", 27000), ("Brown Sugar", 36000)],
    ),
    (
        "Dairy",
        "DAIRY",
        "pcs",
        false,
        &[
            ("Fresh Milk 1L", 52000),
            ("Milk Powder 400g", 107000),
            ("Set Yoghurt", 9000),
            ("Butter 200g", 95000),
            ("Processed Cheese 200g", 120000),
        ],
    ),
    (
        "Beverages",
        "BEV",
        "pcs",
        false,
        &[
            ("Ceylon Black Tea 200g", 68000),
            ("Ginger Beer 1.5L", 45000),
            ("Orange Barley 750ml", 62000),
            ("Mineral Water 1.5L", 13000),
        ],
    ),
    (
        "Snacks",
        "SNK",
        "pcs",
        false,
        &[
            ("Cream Crackers 490g", 58000),
            ("Chocolate Biscuits 100g", 21000),
            ("Murukku 200g", 32000),
            ("Cashew Mix 100g", 85000),
        ],
    ),
];

/// (name, phone, price tier, lifetime points)
const CUSTOMERS: &[(&str, &str, PriceTier, f64)] = &[
    ("Kamala Perera", "0771234567", PriceTier::Retail, 0.0),
    ("Nimal Fernando", "0712345678", PriceTier::Retail, 1250.0),
    ("Saman Stores", "0812233445", PriceTier::Wholesale, 6200.0),
    ("Fathima Rizwan", "0759876543", PriceTier::Credit, 320.0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut db_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Grocer POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: from pos.toml)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let mut config = PosConfig::load(None)?;
    if let Some(path) = db_path {
        config.database.path = path;
    }

    info!(path = ?config.database.path, store = %config.store.name, "Seeding database");

    let db = Database::new(config.db_config()).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();

    let mut products = 0;
    for (cat_idx, (category, prefix, unit, weighed, items)) in CATALOGUE.iter().enumerate() {
        for (idx, (name, price)) in items.iter().enumerate() {
            let product = demo_product(category, prefix, unit, *weighed, (cat_idx, idx), name, *price);
            match db.products().insert(&product).await {
                Ok(_) => products += 1,
                Err(e) => warn!(sku = %product.sku, error = %e, "Failed to insert product"),
            }
        }
    }

    for (name, phone, tier, lifetime) in CUSTOMERS {
        db.customers()
            .insert(&demo_customer(name, phone, *tier, *lifetime))
            .await?;
    }

    for rule in demo_rules() {
        db.discount_rules().create(rule).await?;
    }

    info!(
        products,
        customers = CUSTOMERS.len(),
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,grocer=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn demo_product(
    category: &str,
    prefix: &str,
    unit: &str,
    weighed: bool,
    (cat_idx, idx): (usize, usize),
    name: &str,
    retail_cents: i64,
) -> Product {
    let now = Utc::now();
    let seed = cat_idx * 100 + idx + 1;

    Product {
        id: Uuid::new_v4().to_string(),
        sku: format!("{}-{:03}", prefix, idx + 1),
        // EAN-13 shaped, checksum not computed
        barcodes: vec![format!("479{:010}", seed * 7919)],
        name_en: name.to_string(),
        name_si: None,
        name_ta: None,
        unit: unit.to_string(),
        category: Some(category.to_string()),
        price_retail_cents: retail_cents,
        // Wholesale ~8% under retail, credit ~5% over, rounded to whole rupees
        price_wholesale_cents: retail_cents * 92 / 100 / 100 * 100,
        price_credit_cents: retail_cents * 105 / 100 / 100 * 100,
        price_other_cents: retail_cents,
        stock: (20 + (seed * 37) % 180) as f64,
        reorder_level: if weighed { 25.0 } else { 12.0 },
        weight_based: weighed,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn demo_customer(name: &str, phone: &str, tier: PriceTier, lifetime: f64) -> Customer {
    Customer {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        phone: Some(phone.to_string()),
        email: None,
        price_tier: tier,
        loyalty_points: lifetime,
        lifetime_loyalty_points: lifetime,
        loyalty_tier: tier_for(lifetime, &TierThresholds::default()),
        is_active: true,
        created_at: Utc::now(),
    }
}

fn demo_rules() -> Vec<NewDiscountRule> {
    vec![
        NewDiscountRule {
            name: "Bulk Rice Discount".to_string(),
            scope: DiscountScope::Category("Rice".to_string()),
            mechanism: DiscountMechanism::Percent { bps: 500 },
            max_discount_cents: 0,
            min_quantity: 10.0,
            max_quantity: 0.0,
            auto_apply: true,
        },
        NewDiscountRule {
            name: "Wholesale Sugar Special".to_string(),
            scope: DiscountScope::Category("Sugar".to_string()),
            mechanism: DiscountMechanism::Fixed { per_unit_cents: 5000 },
            max_discount_cents: 0,
            min_quantity: 20.0,
            max_quantity: 0.0,
            auto_apply: true,
        },
        NewDiscountRule {
            name: "General Line Item Discount".to_string(),
            scope: DiscountScope::LineItem,
            mechanism: DiscountMechanism::Percent { bps: 200 },
            max_discount_cents: 10000,
            min_quantity: 5.0,
            max_quantity: 0.0,
            auto_apply: true,
        },
    ]
}
