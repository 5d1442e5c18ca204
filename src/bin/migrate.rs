//! Applies the schema to DATABASE_URL and exits.
//!
//! Usage: cargo run --bin migrate

use mindcare_backend::db::{self, DbConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL must be set to run migrations");
        std::process::exit(1);
    }

    let config = DbConfig::default();
    println!("Migrating {}", db::redact_url(&config.url));

    let pool = match db::init_pool(Some(config)).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Could not connect to the database: {}", e);
            std::process::exit(1);
        }
    };

    match db::run_migrations(&pool).await {
        Ok(()) => println!("Schema is up to date"),
        Err(e) => {
            eprintln!("Migration failed: {}", e);
            std::process::exit(1);
        }
    }
}
