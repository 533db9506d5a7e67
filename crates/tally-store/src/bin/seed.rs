//! # Seed Data Generator
//!
//! Populates a store namespace with demo catalog items for development.
//!
//! ## Usage
//! ```bash
//! # Generate 1,000 items (default) for store "Demo Shop"
//! cargo run -p tally-store --bin seed
//!
//! # Generate custom amount
//! cargo run -p tally-store --bin seed -- --count 5000
//!
//! # Specify database path and store name
//! cargo run -p tally-store --bin seed -- --db ./data/tally.db --store "Mama Put"
//! ```
//!
//! ## Generated Items
//! - Names from a grocery list crossed with pack sizes
//! - Price: ₦100 - ₦12,000 depending on base item and size
//! - Cost price: 60-80% of price
//! - Barcode: `590` + 10 digits
//!
//! Items are committed in chunks of the default batch budget (450), so a
//! large seed exercises the same chunking path as the bulk tools.

use chrono::Utc;
use serde_json::Value;
use std::env;
use tally_core::{CatalogItem, ItemDraft, Money, StoreNamespace, DEFAULT_BATCH_BUDGET};
use tally_store::{CollectionPath, DocumentStore, SqliteStore, SqliteStoreConfig, WriteBatch};
use uuid::Uuid;

/// Categories with base items and base prices in naira.
const CATEGORIES: &[(&str, &[(&str, i64)])] = &[
    (
        "Grains",
        &[
            ("Rice", 1800),
            ("Beans", 1500),
            ("Garri", 900),
            ("Semovita", 1400),
            ("Spaghetti", 750),
            ("Macaroni", 700),
            ("Oats", 1600),
            ("Corn Flakes", 2200),
        ],
    ),
    (
        "Drinks",
        &[
            ("Coca-Cola", 300),
            ("Fanta", 300),
            ("Malt", 450),
            ("Bottled Water", 150),
            ("Orange Juice", 1200),
            ("Energy Drink", 600),
            ("Peak Milk", 550),
            ("Milo", 1900),
        ],
    ),
    (
        "Provisions",
        &[
            ("Sugar", 900),
            ("Salt", 250),
            ("Vegetable Oil", 2500),
            ("Palm Oil", 2200),
            ("Tomato Paste", 400),
            ("Seasoning Cubes", 100),
            ("Sardines", 800),
            ("Corned Beef", 1700),
        ],
    ),
    (
        "Household",
        &[
            ("Detergent", 1100),
            ("Bar Soap", 350),
            ("Tissue Roll", 250),
            ("Toothpaste", 700),
            ("Insecticide", 1800),
            ("Candle", 150),
            ("Matches", 100),
            ("Sponge", 200),
        ],
    ),
];

/// Pack sizes as (label, price multiplier in percent).
const SIZES: &[(&str, i64)] = &[
    ("Small", 100),
    ("Medium", 180),
    ("Large", 320),
    ("Family Pack", 500),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 1000;
    let mut db_path = String::from("./tally_dev.db");
    let mut store_name = String::from("Demo Shop");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(1000);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--store" | "-s" => {
                if i + 1 < args.len() {
                    store_name = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Tally POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>      Number of items to generate (default: 1000)");
                println!("  -d, --db <PATH>      Database file path (default: ./tally_dev.db)");
                println!("  -s, --store <NAME>   Store name (default: Demo Shop)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let namespace = StoreNamespace::from_store_name(&store_name)?;
    let items_path = CollectionPath::items(&namespace);

    println!("🌱 Tally POS Seed Data Generator");
    println!("================================");
    println!("Database:  {}", db_path);
    println!("Namespace: {}", namespace);
    println!("Items:     {}", count);
    println!();

    let store = SqliteStore::connect(SqliteStoreConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = store.count(&items_path).await?;
    if existing > 0 {
        println!("⚠ Namespace already has {} documents", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Generating items...");

    let start = std::time::Instant::now();
    let items = generate_items(count);

    let mut committed = 0;
    for (chunk_index, chunk) in items.chunks(DEFAULT_BATCH_BUDGET).enumerate() {
        let mut batch = WriteBatch::new();
        for item in chunk {
            let mut data = serde_json::to_value(item)?;
            if let Value::Object(map) = &mut data {
                map.remove("id");
            }
            batch.create(&items_path, item.id.clone(), data);
        }

        match store.commit(batch).await {
            Ok(receipt) => {
                committed += receipt.len();
                println!("  Chunk {}: {} items", chunk_index + 1, receipt.len());
            }
            Err(e) => eprintln!("  Chunk {} failed: {}", chunk_index + 1, e),
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} items in {:?}", committed, elapsed);
    println!(
        "  Rate: {:.0} items/second",
        committed as f64 / elapsed.as_secs_f64()
    );
    println!();
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates up to `count` items by walking categories × items × sizes.
fn generate_items(count: usize) -> Vec<CatalogItem> {
    let now = Utc::now();
    let mut items = Vec::with_capacity(count);
    let mut seed = 0usize;

    'outer: loop {
        for (category, bases) in CATEGORIES {
            for (base_name, base_price) in bases.iter() {
                for (size, multiplier) in SIZES {
                    if items.len() >= count {
                        break 'outer;
                    }

                    let round = seed / (CATEGORIES.len() * bases.len() * SIZES.len());
                    let name = if round == 0 {
                        format!("{} {}", base_name, size)
                    } else {
                        format!("{} {} #{}", base_name, size, round + 1)
                    };

                    let price_major = base_price * multiplier / 100;
                    let cost_pct = 60 + (seed % 20) as i64;

                    let draft = ItemDraft {
                        name,
                        price: Money::from_major(price_major),
                        category: Some(category.to_string()),
                        barcode: format!("590{:010}", seed),
                        cost_price: Some(Money::from_major(price_major * cost_pct / 100)),
                        bulk_price: Some(Money::from_major(price_major * 95 / 100)),
                    };
                    items.push(CatalogItem::from_draft(Uuid::new_v4().to_string(), draft, now));
                    seed += 1;
                }
            }
        }
    }

    items
}
