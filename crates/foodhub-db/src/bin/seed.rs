//! # Seed Data Generator
//!
//! Populates the database with a demo restaurant, a demo customer and a
//! menu of dishes for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 dishes (default)
//! cargo run -p foodhub-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p foodhub-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p foodhub-db --bin seed -- --db ./data/foodhub.db
//! ```
//!
//! ## Generated Dishes
//! Each dish is a base dish combined with a style, e.g. "Smoky Margherita
//! Pizza". Prices run from $4.50 to $24.25 and every dish carries one to
//! three categories from the base dish's cuisine.

use std::env;

use foodhub_core::{DishQuery, Filters, Money, NewDish, Role, User};
use foodhub_db::{Database, DbConfig, DbError};
use tracing_subscriber::EnvFilter;

const RESTAURANT_EMAIL: &str = "kitchen@foodhub.dev";
const CUSTOMER_EMAIL: &str = "guest@foodhub.dev";

/// Base dishes with the categories they belong to.
const BASE_DISHES: &[(&str, &[&str])] = &[
    ("Margherita Pizza", &["pizza", "italian", "vegetarian"]),
    ("Pepperoni Pizza", &["pizza", "italian"]),
    ("Carbonara", &["pasta", "italian"]),
    ("Lasagne", &["pasta", "italian"]),
    ("Pad Thai", &["noodles", "thai"]),
    ("Green Curry", &["curry", "thai", "spicy"]),
    ("Chicken Tikka Masala", &["curry", "indian"]),
    ("Chana Masala", &["curry", "indian", "vegan"]),
    ("Cheeseburger", &["burger", "american"]),
    ("Veggie Burger", &["burger", "american", "vegetarian"]),
    ("Caesar Salad", &["salad"]),
    ("Falafel Wrap", &["wrap", "middle eastern", "vegan"]),
    ("Salmon Nigiri", &["sushi", "japanese"]),
    ("Ramen", &["noodles", "japanese"]),
    ("Fish Tacos", &["tacos", "mexican"]),
    ("Beef Burrito", &["mexican"]),
];

/// Styles prefixed to base dish names.
const STYLES: &[&str] = &[
    "Classic", "Smoky", "Spicy", "Garden", "Truffle", "Double", "Homestyle", "Lemon", "Crispy",
    "Chef's",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./foodhub_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Foodhub Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of dishes to generate (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./foodhub_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Foodhub Seed Data Generator");
    println!("==============================");
    println!("Database: {}", db_path);
    println!("Dishes: {}", count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let restaurant = ensure_account(&db, "Demo Kitchen", RESTAURANT_EMAIL, Role::Restaurant).await?;
    let customer = ensure_account(&db, "Demo Guest", CUSTOMER_EMAIL, Role::Customer).await?;
    println!("✓ Restaurant account: {} (id {})", restaurant.email, restaurant.id);
    println!("✓ Customer account: {} (id {})", customer.email, customer.id);

    let existing = db.dishes().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} dishes", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating dishes...");

    let mut generated = 0;
    let start = std::time::Instant::now();

    'outer: for (style_idx, style) in STYLES.iter().enumerate() {
        for (base_idx, (base, categories)) in BASE_DISHES.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let seed = style_idx * BASE_DISHES.len() + base_idx;
            let mut dish = generate_dish(style, base, categories, seed).into_dish(restaurant.id);

            if let Err(e) = db.dishes().insert(&mut dish).await {
                eprintln!("Failed to insert {}: {}", dish.name, e);
                continue;
            }

            generated += 1;

            if generated % 50 == 0 {
                println!("  Generated {} dishes...", generated);
            }
        }
    }

    // Past the style table, repeat names with a numbered suffix
    let mut round = 2;
    while generated < count {
        for (base_idx, (base, categories)) in BASE_DISHES.iter().enumerate() {
            if generated >= count {
                break;
            }

            let style = format!("No. {}", round);
            let seed = round * 31 + base_idx;
            let mut dish = generate_dish(&style, base, categories, seed).into_dish(restaurant.id);

            if let Err(e) = db.dishes().insert(&mut dish).await {
                eprintln!("Failed to insert {}: {}", dish.name, e);
                continue;
            }

            generated += 1;
        }
        round += 1;
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} dishes in {:?}", generated, elapsed);
    println!(
        "  Rate: {:.0} dishes/second",
        generated as f64 / elapsed.as_secs_f64()
    );

    // Verify FTS
    println!();
    println!("Verifying FTS index...");
    let filters = Filters::for_dishes();
    for term in ["pizza", "curry"] {
        let query = DishQuery {
            name: term.to_string(),
            ..DishQuery::default()
        };
        let (_, metadata) = db.dishes().list_all(&query, &filters).await?;
        println!("  Search '{}': {} results", term, metadata.total_records);
    }

    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Fetches the account for `email`, creating it on first run.
async fn ensure_account(
    db: &Database,
    name: &str,
    email: &str,
    role: Role,
) -> Result<User, DbError> {
    match db.users().get_by_email(email).await {
        Ok(user) => Ok(user),
        Err(e) if e.is_not_found() => {
            let mut user = User::new(name, email, b"seeded-account".to_vec(), role);
            user.activated = true;
            db.users().insert(&mut user).await?;
            Ok(user)
        }
        Err(e) => Err(e),
    }
}

/// Builds one dish, deriving price and categories from `seed`.
fn generate_dish(style: &str, base: &str, categories: &[&str], seed: usize) -> NewDish {
    let name = format!("{} {}", style, base);

    // $4.50 - $24.25 in quarter steps
    let price = 4.5 + ((seed * 7) % 80) as f64 * 0.25;

    // At least one category, at most all of the base dish's
    let take = 1 + seed % categories.len();
    let categories = categories[..take].iter().map(|c| c.to_string()).collect();

    NewDish {
        description: format!("{} made to order by the demo kitchen.", name),
        name,
        price: Money::new(price),
        categories,
    }
}
