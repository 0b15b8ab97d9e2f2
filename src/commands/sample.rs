//! Sample database for trying the crawler

use crate::error::{Error, Result};
use anyhow::Context;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE customers (
    customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    phone TEXT,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE products (
    product_id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_name TEXT NOT NULL,
    description TEXT,
    category TEXT,
    price REAL NOT NULL,
    stock_quantity INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE orders (
    order_id INTEGER PRIMARY KEY AUTOINCREMENT,
    customer_id INTEGER NOT NULL,
    order_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    total_amount REAL NOT NULL,
    status TEXT CHECK(status IN ('pending', 'processing', 'shipped', 'delivered', 'cancelled')),
    shipping_address TEXT,
    FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
);

CREATE TABLE order_items (
    order_item_id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id INTEGER NOT NULL,
    product_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL,
    unit_price REAL NOT NULL,
    subtotal REAL NOT NULL,
    FOREIGN KEY (order_id) REFERENCES orders(order_id),
    FOREIGN KEY (product_id) REFERENCES products(product_id)
);

CREATE TABLE reviews (
    review_id INTEGER PRIMARY KEY AUTOINCREMENT,
    product_id INTEGER NOT NULL,
    customer_id INTEGER NOT NULL,
    rating INTEGER CHECK(rating BETWEEN 1 AND 5),
    review_text TEXT,
    review_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (product_id) REFERENCES products(product_id),
    FOREIGN KEY (customer_id) REFERENCES customers(customer_id)
);

CREATE INDEX idx_customer_email ON customers(email);
CREATE INDEX idx_order_customer ON orders(customer_id);
CREATE INDEX idx_order_items_order ON order_items(order_id);
CREATE INDEX idx_reviews_product ON reviews(product_id);
"#;

pub const SAMPLE_TABLES: &[&str] = &["customers", "products", "orders", "order_items", "reviews"];

const CUSTOMERS: &[(&str, &str, &str, &str)] = &[
    ("John", "Doe", "john.doe@email.com", "555-0101"),
    ("Jane", "Smith", "jane.smith@email.com", "555-0102"),
    ("Bob", "Johnson", "bob.johnson@email.com", "555-0103"),
    ("Alice", "Williams", "alice.williams@email.com", "555-0104"),
    ("Charlie", "Brown", "charlie.brown@email.com", "555-0105"),
];

const PRODUCTS: &[(&str, &str, &str, f64, i64)] = &[
    ("Laptop Pro 15", "High-performance laptop", "Electronics", 1299.99, 50),
    ("Wireless Mouse", "Ergonomic wireless mouse", "Electronics", 29.99, 200),
    ("USB-C Cable", "Fast charging cable", "Accessories", 19.99, 500),
    ("Laptop Bag", "Durable laptop carrying bag", "Accessories", 49.99, 100),
    ("External SSD 1TB", "Portable storage device", "Electronics", 149.99, 75),
];

const ORDERS: &[(i64, f64, &str, &str)] = &[
    (1, 1329.98, "delivered", "123 Main St, City, State 12345"),
    (2, 199.98, "shipped", "456 Oak Ave, Town, State 67890"),
    (3, 49.99, "processing", "789 Pine Rd, Village, State 11111"),
    (1, 29.99, "delivered", "123 Main St, City, State 12345"),
    (4, 1499.97, "pending", "321 Elm St, Borough, State 22222"),
];

const ORDER_ITEMS: &[(i64, i64, i64, f64, f64)] = &[
    (1, 1, 1, 1299.99, 1299.99),
    (1, 3, 1, 19.99, 19.99),
    (2, 5, 1, 149.99, 149.99),
    (2, 4, 1, 49.99, 49.99),
    (3, 4, 1, 49.99, 49.99),
    (4, 2, 1, 29.99, 29.99),
    (5, 1, 1, 1299.99, 1299.99),
    (5, 2, 2, 29.99, 59.98),
    (5, 5, 1, 149.99, 149.99),
];

const REVIEWS: &[(i64, i64, i64, &str)] = &[
    (1, 1, 5, "Excellent laptop, very fast!"),
    (1, 3, 4, "Great performance, slightly heavy"),
    (2, 1, 5, "Perfect mouse, very comfortable"),
    (5, 2, 5, "Super fast storage device"),
    (4, 3, 4, "Good quality bag, fits my laptop perfectly"),
];

#[derive(Debug, Clone, Serialize)]
pub struct SampleDbSummary {
    pub path: PathBuf,
    pub url: String,
    pub tables: Vec<String>,
    pub rows: usize,
}

/// Create the sample SQLite database at `path`
pub async fn cmd_sample_db(path: &Path, force: bool) -> Result<SampleDbSummary> {
    if path.exists() {
        if !force {
            return Err(Error::InvalidPath(format!(
                "{} already exists. Use --force to replace it.",
                path.display()
            )));
        }
        std::fs::remove_file(path)?;
    }

    Ok(create_sample_db(path).await?)
}

async fn create_sample_db(path: &Path) -> anyhow::Result<SampleDbSummary> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true),
        )
        .await
        .with_context(|| format!("Failed to create database at {}", path.display()))?;

    let mut tx = pool.begin().await?;
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(&mut *tx)
        .await
        .context("Failed to create sample schema")?;

    let mut rows = 0;
    for &(first, last, email, phone) in CUSTOMERS {
        sqlx::query("INSERT INTO customers (first_name, last_name, email, phone) VALUES (?1, ?2, ?3, ?4)")
            .bind(first)
            .bind(last)
            .bind(email)
            .bind(phone)
            .execute(&mut *tx)
            .await
            .context("Failed to insert customers")?;
        rows += 1;
    }
    for &(name, description, category, price, stock) in PRODUCTS {
        sqlx::query(
            "INSERT INTO products (product_name, description, category, price, stock_quantity) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(name)
        .bind(description)
        .bind(category)
        .bind(price)
        .bind(stock)
        .execute(&mut *tx)
        .await
        .context("Failed to insert products")?;
        rows += 1;
    }
    for &(customer_id, total, status, address) in ORDERS {
        sqlx::query(
            "INSERT INTO orders (customer_id, total_amount, status, shipping_address) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(customer_id)
        .bind(total)
        .bind(status)
        .bind(address)
        .execute(&mut *tx)
        .await
        .context("Failed to insert orders")?;
        rows += 1;
    }
    for &(order_id, product_id, quantity, unit_price, subtotal) in ORDER_ITEMS {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, quantity, unit_price, subtotal) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(subtotal)
        .execute(&mut *tx)
        .await
        .context("Failed to insert order items")?;
        rows += 1;
    }
    for &(product_id, customer_id, rating, text) in REVIEWS {
        sqlx::query(
            "INSERT INTO reviews (product_id, customer_id, rating, review_text) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(product_id)
        .bind(customer_id)
        .bind(rating)
        .bind(text)
        .execute(&mut *tx)
        .await
        .context("Failed to insert reviews")?;
        rows += 1;
    }

    tx.commit().await.context("Failed to commit sample data")?;
    pool.close().await;

    info!("Created sample database at {} ({} rows)", path.display(), rows);
    Ok(SampleDbSummary {
        path: path.to_path_buf(),
        url: format!("sqlite://{}", path.display()),
        tables: SAMPLE_TABLES.iter().map(|t| t.to_string()).collect(),
        rows,
    })
}

pub fn print_sample_db_summary(summary: &SampleDbSummary) {
    println!("✓ Sample database created: {}", summary.path.display());
    println!("  Tables: {}", summary.tables.join(", "));
    println!("  Rows: {}", summary.rows);
    println!("\nTry: metacrawl crawl --db {}", summary.url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::config::Config;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sample_db_crawls() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sample_data.db");

        let summary = cmd_sample_db(&path, false).await.unwrap();
        assert_eq!(summary.rows, 29);

        let mut catalog = Catalog::new(Config::default());
        let status = catalog.crawl_database(&summary.url, None).await;
        assert_eq!(status.message, "Successfully crawled 5 tables");

        // order_items and reviews each reference two tables, orders one
        assert_eq!(catalog.lineage().edge_count(), 5);
        assert!(catalog.data_dictionary().contains_key("reviews.rating"));
    }

    #[tokio::test]
    async fn test_existing_file_requires_force() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sample.db");
        std::fs::write(&path, b"not a database").unwrap();

        assert!(matches!(
            cmd_sample_db(&path, false).await,
            Err(Error::InvalidPath(_))
        ));
        assert!(cmd_sample_db(&path, true).await.is_ok());
    }
}
