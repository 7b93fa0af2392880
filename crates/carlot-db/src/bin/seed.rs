//! # Seed Data Generator
//!
//! Populates a development database with a car-parts catalog and stock.
//!
//! ## Usage
//! ```bash
//! # Full catalog into ./carlot_dev.db
//! cargo run -p carlot-db --bin seed
//!
//! # Fewer parts, custom path, print stock levels as JSON
//! cargo run -p carlot-db --bin seed -- --products 20 --db ./data/carlot.db --json
//!
//! # Settings (currency, pool, sale policy) from a config file
//! cargo run -p carlot-db --bin seed -- --config ./carlot.toml
//! ```
//!
//! Lots and demo sales use `sales.default_currency`.
//!
//! ## Generated Data
//! - Categories → subcategories → parts with SKU `{SUB}-{INDEX:03}`
//! - A salvage lot (unknown cost) for every third part, received first
//! - Two procurement lots per part at different unit costs
//! - One demo sale per ten parts, so analytics has something to show

use std::env;
use std::path::PathBuf;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use carlot_core::sale::CartLine;
use carlot_core::{LotSource, NewLot, NewProduct};
use carlot_db::{CarlotConfig, Database};

/// Category → (subcategory code, subcategory name, parts)
const CATALOG: &[(&str, &[(&str, &str, &[&str])])] = &[
    (
        "Brakes",
        &[
            ("PAD", "Brake pads", &["Front pads ceramic", "Rear pads ceramic", "Front pads sport"]),
            ("DSC", "Brake discs", &["Front disc 280mm", "Rear disc 260mm"]),
            ("CAL", "Calipers", &["Front caliper left", "Front caliper right"]),
        ],
    ),
    (
        "Engine",
        &[
            ("FLT", "Filters", &["Oil filter", "Air filter", "Fuel filter", "Cabin filter"]),
            ("IGN", "Ignition", &["Spark plug iridium", "Ignition coil", "Glow plug"]),
            ("BLT", "Belts", &["Timing belt kit", "Serpentine belt"]),
        ],
    ),
    (
        "Electrical",
        &[
            ("BAT", "Batteries", &["Battery 60Ah", "Battery 74Ah"]),
            ("LMP", "Lighting", &["Headlamp H7", "Tail lamp assembly", "Fog lamp"]),
            ("ALT", "Charging", &["Alternator 120A", "Starter motor"]),
        ],
    ),
    (
        "Body",
        &[
            ("MIR", "Mirrors", &["Door mirror left", "Door mirror right"]),
            ("PNL", "Panels", &["Front bumper", "Bonnet", "Front wing left"]),
        ],
    ),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,carlot=debug,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut limit: usize = usize::MAX;
    let mut db_path: Option<PathBuf> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut json = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--products" | "-p" => {
                if i + 1 < args.len() {
                    limit = args[i + 1].parse().unwrap_or(usize::MAX);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--json" => json = true,
            "--help" | "-h" => {
                println!("Carlot Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -p, --products <N>  Maximum number of parts to create (default: all)");
                println!("  -d, --db <PATH>     Database file path (default: ./carlot_dev.db)");
                println!("                      Overrides database.path from the config");
                println!("  -c, --config <PATH> carlot.toml to read settings from");
                println!("      --json          Print resulting stock levels as JSON");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            other => warn!(argument = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let explicit_config = config_path.is_some();
    let mut config = CarlotConfig::load(config_path)?;
    match db_path {
        Some(path) => config.database.path = path,
        None if !explicit_config => config.database.path = PathBuf::from("./carlot_dev.db"),
        None => {}
    }
    let currency = config.sales.default_currency.clone();

    let db = Database::from_config(&config).await?;
    info!(path = %config.database.path.display(), %currency, "Connected, migrations applied");

    let existing = db.catalog().count_products().await?;
    if existing > 0 {
        warn!(existing, "Database already has products, skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let now = Utc::now();
    let mut created = Vec::new();

    'catalog: for (category_name, subcategories) in CATALOG {
        let category = db.catalog().insert_category(category_name).await?;

        for (code, sub_name, parts) in subcategories.iter() {
            let subcategory = db.catalog().insert_subcategory(&category.id, sub_name).await?;

            for (idx, part) in parts.iter().enumerate() {
                if created.len() >= limit {
                    break 'catalog;
                }
                let seed = created.len() as i64;

                let product = db
                    .catalog()
                    .insert_product(&NewProduct {
                        subcategory_id: subcategory.id.clone(),
                        sku: format!("{}-{:03}", code, idx + 1),
                        name: part.to_string(),
                        min_stock: 2 + seed % 4,
                    })
                    .await?;

                let base_cost = 800 + (seed * 370) % 9000;

                let mut lots = Vec::new();
                if seed % 3 == 0 {
                    lots.push((LotSource::Salvage, 1 + seed % 2, None, 60));
                }
                lots.push((LotSource::Procurement, 3 + seed % 5, Some(base_cost), 30));
                lots.push((LotSource::Procurement, 4, Some(base_cost + base_cost / 10), 5));

                for (source, quantity, unit_cost_cents, days_ago) in lots {
                    let new = NewLot {
                        product_id: product.id.clone(),
                        source,
                        source_ref: match source {
                            LotSource::Procurement => Some("PO-SEED".to_string()),
                            LotSource::Salvage => Some("VIN-SEED".to_string()),
                        },
                        quantity,
                        unit_cost_cents,
                        sale_price_cents: unit_cost_cents.map(|c| c * 2),
                        currency: currency.clone(),
                        received_at: Some(now - Duration::days(days_ago)),
                        location: Some("A1".to_string()),
                    };
                    db.inventory().receive_lot(&new).await?;
                }

                created.push((product, base_cost));
            }
        }
    }

    info!(products = created.len(), elapsed = ?start.elapsed(), "Catalog and lots created");

    let mut sales = 0;
    for (product, base_cost) in created.iter().step_by(10) {
        let price = base_cost * 2;
        let request = config
            .sales
            .sale_request("seed-operator", vec![CartLine::new(&product.id, 2, price)]);
        match db.sales().complete_sale(&request).await {
            Ok(details) => {
                sales += 1;
                info!(receipt = %details.receipt.receipt_number, sku = %product.sku, "Demo sale");
            }
            Err(e) => warn!(sku = %product.sku, error = %e, "Demo sale failed"),
        }
    }

    let levels = db.inventory().stock_levels().await?;
    let low = levels.iter().filter(|l| l.below_minimum).count();
    info!(products = levels.len(), below_minimum = low, demo_sales = sales, "Seed complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&levels)?);
    }

    db.close().await;
    Ok(())
}
