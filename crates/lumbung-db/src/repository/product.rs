//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Upsert keyed on SKU (create-or-update in one call)
//! - Lookup and substring search
//! - Inventory summary and low-stock listing
//! - Transaction-scoped stock/price mutation helpers used by the
//!   stock-in and sale paths
//!
//! ## Mutation Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Who may touch which product fields                         │
//! │                                                                         │
//! │  upsert (this file)          name, unit, retail/reseller price,        │
//! │                              min_level, notes                          │
//! │                                                                         │
//! │  stock-in (stock.rs)         stock_qty += qty                          │
//! │                              cost_cents ← resolved cost (latest wins)  │
//! │                              retail/reseller ← only if override given  │
//! │                                                                         │
//! │  sale line (sale.rs)         stock_qty -= qty, nothing else            │
//! │                                                                         │
//! │  Stock and cost never move through upsert; they are side effects of   │
//! │  recorded events only.                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreResult};
use lumbung_core::types::{Product, ProductUpsert};
use lumbung_core::validation::{validate_price_cents, validate_product_name, validate_sku};

const PRODUCT_COLUMNS: &str = "id, sku, name, unit, stock_qty, cost_cents, retail_cents, \
                               reseller_cents, min_level, notes, created_at, updated_at";

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let product = repo.upsert(&input).await?;
/// let found = repo.get_by_sku("KOPI-250").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

/// Aggregate figures for the inventory dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct InventorySummary {
    pub product_count: i64,
    pub total_qty: i64,
    /// Σ stock_qty × retail price, in cents.
    pub total_value_cents: i64,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates or updates a product, keyed on SKU.
    ///
    /// An existing product keeps its stock and cost untouched; only the
    /// descriptive fields and sale prices are overwritten. A new product
    /// starts with zero stock and zero cost until its first stock-in.
    pub async fn upsert(&self, input: &ProductUpsert) -> StoreResult<Product> {
        validate_sku(&input.sku)?;
        validate_product_name(&input.name)?;
        validate_price_cents(input.retail_price.cents())?;
        validate_price_cents(input.reseller_price.cents())?;

        let sku = input.sku.trim();
        let name = input.name.trim();
        let now = Utc::now();

        debug!(sku = %sku, "Upserting product");

        let mut tx = self.pool.begin().await?;

        let existing = fetch_by_sku(&mut tx, sku).await?;

        let product = match existing {
            Some(mut product) => {
                sqlx::query(
                    r#"
                    UPDATE products SET
                        name = ?2,
                        unit = ?3,
                        retail_cents = ?4,
                        reseller_cents = ?5,
                        min_level = ?6,
                        notes = ?7,
                        updated_at = ?8
                    WHERE id = ?1
                    "#,
                )
                .bind(&product.id)
                .bind(name)
                .bind(&input.unit)
                .bind(input.retail_price.cents())
                .bind(input.reseller_price.cents())
                .bind(input.min_level)
                .bind(&input.notes)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                product.name = name.to_string();
                product.unit = input.unit.clone();
                product.retail_cents = input.retail_price.cents();
                product.reseller_cents = input.reseller_price.cents();
                product.min_level = input.min_level;
                product.notes = input.notes.clone();
                product.updated_at = now;
                product
            }
            None => {
                let product = Product {
                    id: Uuid::new_v4().to_string(),
                    sku: sku.to_string(),
                    name: name.to_string(),
                    unit: input.unit.clone(),
                    stock_qty: 0,
                    cost_cents: 0,
                    retail_cents: input.retail_price.cents(),
                    reseller_cents: input.reseller_price.cents(),
                    min_level: input.min_level,
                    notes: input.notes.clone(),
                    created_at: now,
                    updated_at: now,
                };

                sqlx::query(
                    r#"
                    INSERT INTO products (
                        id, sku, name, unit, stock_qty, cost_cents,
                        retail_cents, reseller_cents, min_level, notes,
                        created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                    "#,
                )
                .bind(&product.id)
                .bind(&product.sku)
                .bind(&product.name)
                .bind(&product.unit)
                .bind(product.stock_qty)
                .bind(product.cost_cents)
                .bind(product.retail_cents)
                .bind(product.reseller_cents)
                .bind(product.min_level)
                .bind(&product.notes)
                .bind(product.created_at)
                .bind(product.updated_at)
                .execute(&mut *tx)
                .await?;

                product
            }
        };

        tx.commit().await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_sku(&mut conn, sku).await
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Searches products by case-insensitive substring on SKU or name.
    ///
    /// An empty query returns products sorted by name, like the dashboard
    /// with no search box input.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list(limit).await;
        }

        let pattern = format!("%{query}%");
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE sku LIKE ?1 OR name LIKE ?1
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists products sorted by name.
    pub async fn list(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Lists products at or below their reorder threshold.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE stock_qty <= min_level
            ORDER BY name
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Aggregate inventory figures (count, units on hand, retail value).
    pub async fn summary(&self) -> DbResult<InventorySummary> {
        let summary = sqlx::query_as::<_, InventorySummary>(
            r#"
            SELECT
                COUNT(*) AS product_count,
                COALESCE(SUM(stock_qty), 0) AS total_qty,
                COALESCE(SUM(stock_qty * retail_cents), 0) AS total_value_cents
            FROM products
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    /// Counts total products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction-Scoped Helpers
// =============================================================================
// The mutating operations (stock-in, sale, checkout) run read-validate-write
// inside one transaction. These helpers take the transaction's connection
// explicitly; there is no ambient session.

/// Fetches a product by SKU on the given connection.
pub(crate) async fn fetch_by_sku(
    conn: &mut SqliteConnection,
    sku: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = ?1"
    ))
    .bind(sku.trim())
    .fetch_optional(conn)
    .await?;

    Ok(product)
}

/// Applies a stock receipt to the product row: raises stock, overwrites
/// cost with the resolved per-unit cost (latest purchase wins, never a
/// weighted average), and overwrites a sale price only when an override
/// was supplied (COALESCE keeps the current value otherwise).
pub(crate) async fn apply_receipt(
    conn: &mut SqliteConnection,
    product_id: &str,
    qty: i64,
    cost_cents: i64,
    new_retail_cents: Option<i64>,
    new_reseller_cents: Option<i64>,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock_qty = stock_qty + ?2,
            cost_cents = ?3,
            retail_cents = COALESCE(?4, retail_cents),
            reseller_cents = COALESCE(?5, reseller_cents),
            updated_at = ?6
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .bind(qty)
    .bind(cost_cents)
    .bind(new_retail_cents)
    .bind(new_reseller_cents)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    Ok(())
}

/// Deducts sold units from the product row.
///
/// Relative update (`stock_qty - ?`) rather than an absolute write, so a
/// concurrent transaction on the same row cannot be silently overwritten.
/// Availability has already been validated against a read inside the same
/// transaction.
pub(crate) async fn deduct_stock(
    conn: &mut SqliteConnection,
    product_id: &str,
    qty: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        UPDATE products SET
            stock_qty = stock_qty - ?2,
            updated_at = ?3
        WHERE id = ?1
        "#,
    )
    .bind(product_id)
    .bind(qty)
    .bind(now)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Product", product_id));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
