//! # Sale Repository
//!
//! The checkout / sale recorder: turns a cart or a manually entered line
//! into a committed Sale with snapshot items, or into nothing at all.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │        checkout(cart)                record_manual_sale(line)           │
//! │             │                                 │                         │
//! │             └────────────┬────────────────────┘                         │
//! │                          ▼                                              │
//! │  BEGIN TRANSACTION                                                     │
//! │       │                                                                 │
//! │       ├── INSERT sale header (ref code, channel, total = 0)            │
//! │       │                                                                 │
//! │       ├── per line, in stable order:                                   │
//! │       │      apply_sale_line                                           │
//! │       │      ├── product exists?        no → ROLLBACK, NotFound        │
//! │       │      ├── stock_qty >= qty?      no → ROLLBACK, Insufficient    │
//! │       │      ├── stock_qty -= qty                                      │
//! │       │      └── INSERT snapshot item (price frozen)                   │
//! │       │                                                                 │
//! │       ├── UPDATE sale total (written once, Σ line totals)              │
//! │       │                                                                 │
//! │  COMMIT — all lines or none; the first failing line short-circuits     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use crate::repository::product;
use lumbung_core::types::{ManualSaleInput, Sale, SaleChannel, SaleItem};
use lumbung_core::validation::{validate_price_cents, validate_quantity};
use lumbung_core::{Cart, CoreError, Money};

const SALE_COLUMNS: &str = "id, ref_code, channel, total_cents, created_at";
const SALE_ITEM_COLUMNS: &str =
    "id, sale_id, product_id, sku_snapshot, name_snapshot, qty, unit_price_cents, created_at";

/// Reference prefix for cart-based store checkouts.
const REF_PREFIX_STORE: &str = "STORE";
/// Reference prefix for manually entered offline sales.
const REF_PREFIX_MANUAL: &str = "OFF";

/// One requested sale line before resolution against the product table.
#[derive(Debug, Clone)]
struct SaleLine {
    sku: String,
    qty: i64,
    /// Omitted → the product's current retail price.
    unit_price: Option<Money>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a store checkout from a session cart.
    ///
    /// Lines are processed in the cart's stable (SKU-sorted) order; the
    /// first line that fails aborts the whole checkout. The caller clears
    /// its cart after a successful return.
    pub async fn checkout(&self, cart: &Cart) -> StoreResult<Sale> {
        let lines: Vec<SaleLine> = cart
            .lines()
            .map(|(sku, qty)| SaleLine {
                sku: sku.to_string(),
                qty,
                unit_price: None,
            })
            .collect();

        self.record_sale(SaleChannel::Store, REF_PREFIX_STORE, &lines)
            .await
    }

    /// Records a manually entered offline sale (single line).
    pub async fn record_manual_sale(&self, input: &ManualSaleInput) -> StoreResult<Sale> {
        let lines = [SaleLine {
            sku: input.sku.clone(),
            qty: input.qty,
            unit_price: input.unit_price,
        }];

        self.record_sale(SaleChannel::Manual, REF_PREFIX_MANUAL, &lines)
            .await
    }

    /// Shared commit path for both entry points.
    async fn record_sale(
        &self,
        channel: SaleChannel,
        ref_prefix: &str,
        lines: &[SaleLine],
    ) -> StoreResult<Sale> {
        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let mut sale = Sale {
            id: Uuid::new_v4().to_string(),
            ref_code: generate_ref_code(ref_prefix),
            channel,
            total_cents: 0,
            created_at: Utc::now(),
        };

        debug!(ref_code = %sale.ref_code, lines = lines.len(), "Recording sale");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO sales (id, ref_code, channel, total_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.ref_code)
        .bind(sale.channel)
        .bind(sale.total_cents)
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        let mut total = Money::zero();
        for line in lines {
            let item =
                apply_sale_line(&mut tx, &sale.id, &line.sku, line.qty, line.unit_price).await?;
            total += item.line_total();
        }

        // The total is written exactly once; it is never recomputed from
        // items after this point.
        sqlx::query("UPDATE sales SET total_cents = ?2 WHERE id = ?1")
            .bind(&sale.id)
            .bind(total.cents())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        sale.total_cents = total.cents();

        info!(
            ref_code = %sale.ref_code,
            channel = %sale.channel.as_str(),
            total = %sale.total(),
            "Sale recorded"
        );

        Ok(sale)
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Gets all items for a sale, in insertion order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(&format!(
            "SELECT {SALE_ITEM_COLUMNS} FROM sale_items WHERE sale_id = ?1 ORDER BY created_at"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Lists sales, most recent first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// All-time sale income: Σ total_cents over every sale header.
    ///
    /// Sale totals are trusted as authoritative here; they are not
    /// recomputed from items.
    pub async fn total_income_cents(&self) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(total_cents), 0) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }
}

// =============================================================================
// Sale Line Mutator
// =============================================================================

/// Applies one sale line inside the caller's transaction.
///
/// ## Preconditions
/// - `qty > 0`
/// - Product exists
/// - `stock_qty >= qty`, else `InsufficientStock` carrying the current
///   stock level for the error message
///
/// Decrements stock and inserts the snapshot item. Touches neither cost
/// nor prices on the product.
pub async fn apply_sale_line(
    conn: &mut SqliteConnection,
    sale_id: &str,
    sku: &str,
    qty: i64,
    unit_price: Option<Money>,
) -> StoreResult<SaleItem> {
    validate_quantity(qty)?;

    let product = product::fetch_by_sku(conn, sku)
        .await?
        .ok_or_else(|| CoreError::ProductNotFound(sku.trim().to_string()))?;

    if !product.can_sell(qty) {
        return Err(CoreError::InsufficientStock {
            sku: product.sku.clone(),
            requested: qty,
            available: product.stock_qty,
        }
        .into());
    }

    let unit_price = unit_price.unwrap_or_else(|| product.retail_price());
    validate_price_cents(unit_price.cents())?;

    product::deduct_stock(conn, &product.id, qty).await?;

    let item = SaleItem {
        id: Uuid::new_v4().to_string(),
        sale_id: sale_id.to_string(),
        product_id: product.id,
        sku_snapshot: product.sku,
        name_snapshot: product.name,
        qty,
        unit_price_cents: unit_price.cents(),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO sale_items (
            id, sale_id, product_id, sku_snapshot, name_snapshot,
            qty, unit_price_cents, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.sale_id)
    .bind(&item.product_id)
    .bind(&item.sku_snapshot)
    .bind(&item.name_snapshot)
    .bind(item.qty)
    .bind(item.unit_price_cents)
    .bind(item.created_at)
    .execute(conn)
    .await?;

    Ok(item)
}

/// Generates a human-readable sale reference: `PREFIX-yymmdd-XXXXXX`.
///
/// For tracing on receipts and in the cash-flow view; uniqueness is not
/// load-bearing (the UUID primary key is).
fn generate_ref_code(prefix: &str) -> String {
    let date = Utc::now().format("%y%m%d");
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(6)
        .collect::<String>()
        .to_uppercase();
    format!("{prefix}-{date}-{suffix}")
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testutil::{product_input, stock_in, test_db};

    async fn count(db: &crate::Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_checkout_snapshots_retail_price() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 10, Some(500)))
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add("SKU-1", 3).unwrap();

        let sale = db.sales().checkout(&cart).await.unwrap();

        assert_eq!(sale.channel, SaleChannel::Store);
        assert!(sale.ref_code.starts_with("STORE-"));
        assert_eq!(sale.total_cents, 3000);

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.total_cents, 3000);

        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].qty, 3);
        assert_eq!(items[0].unit_price_cents, 1000);
        assert_eq!(items[0].sku_snapshot, "SKU-1");

        let product = db.products().get_by_sku("SKU-1").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 7);
    }

    #[tokio::test]
    async fn test_manual_sale_defaults_to_retail_price() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1250))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 5, Some(600)))
            .await
            .unwrap();

        let sale = db
            .sales()
            .record_manual_sale(&ManualSaleInput {
                sku: "SKU-1".to_string(),
                qty: 2,
                unit_price: None,
            })
            .await
            .unwrap();

        assert_eq!(sale.channel, SaleChannel::Manual);
        assert!(sale.ref_code.starts_with("OFF-"));
        assert_eq!(sale.total_cents, 2500);

        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items[0].unit_price_cents, 1250);
    }

    #[tokio::test]
    async fn test_manual_sale_with_explicit_price() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1250))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 5, Some(600)))
            .await
            .unwrap();

        let sale = db
            .sales()
            .record_manual_sale(&ManualSaleInput {
                sku: "SKU-1".to_string(),
                qty: 2,
                unit_price: Some(Money::from_cents(999)),
            })
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 1998);

        // The snapshot holds the negotiated price; the product keeps its
        // retail price.
        let product = db.products().get_by_sku("SKU-1").await.unwrap().unwrap();
        assert_eq!(product.retail_cents, 1250);
    }

    #[tokio::test]
    async fn test_insufficient_stock_leaves_state_untouched() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 10, Some(500)))
            .await
            .unwrap();

        let err = db
            .sales()
            .record_manual_sale(&ManualSaleInput {
                sku: "SKU-1".to_string(),
                qty: 11,
                unit_price: None,
            })
            .await
            .unwrap_err();

        match err {
            StoreError::Core(CoreError::InsufficientStock {
                sku,
                requested,
                available,
            }) => {
                assert_eq!(sku, "SKU-1");
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        let product = db.products().get_by_sku("SKU-1").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 10);
        assert_eq!(count(&db, "sales").await, 0);
        assert_eq!(count(&db, "sale_items").await, 0);
    }

    #[tokio::test]
    async fn test_checkout_is_all_or_nothing() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("AAA-1", "Alpha", 1000))
            .await
            .unwrap();
        db.products()
            .upsert(&product_input("BBB-1", "Beta", 2000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("AAA-1", 10, Some(500)))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("BBB-1", 2, Some(900)))
            .await
            .unwrap();

        // AAA-1 processes first (stable SKU order) and would succeed;
        // BBB-1 is short and must drag the whole checkout down.
        let mut cart = Cart::new();
        cart.add("AAA-1", 3).unwrap();
        cart.add("BBB-1", 5).unwrap();

        let err = db.sales().checkout(&cart).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InsufficientStock { ref sku, .. }) if sku == "BBB-1"
        ));

        // Both lines' stock is unmutated, including the one that had
        // already been applied inside the aborted transaction.
        let alpha = db.products().get_by_sku("AAA-1").await.unwrap().unwrap();
        let beta = db.products().get_by_sku("BBB-1").await.unwrap().unwrap();
        assert_eq!(alpha.stock_qty, 10);
        assert_eq!(beta.stock_qty, 2);
        assert_eq!(count(&db, "sales").await, 0);
        assert_eq!(count(&db, "sale_items").await, 0);
    }

    #[tokio::test]
    async fn test_unknown_sku_aborts_checkout() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("AAA-1", "Alpha", 1000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("AAA-1", 10, Some(500)))
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add("AAA-1", 1).unwrap();
        cart.add("GHOST", 1).unwrap();

        let err = db.sales().checkout(&cart).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::ProductNotFound(ref sku)) if sku == "GHOST"
        ));

        let alpha = db.products().get_by_sku("AAA-1").await.unwrap().unwrap();
        assert_eq!(alpha.stock_qty, 10);
        assert_eq!(count(&db, "sales").await, 0);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let db = test_db().await;
        let err = db.sales().checkout(&Cart::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_total_income_uses_sale_headers() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 10, Some(500)))
            .await
            .unwrap();

        let mut cart = Cart::new();
        cart.add("SKU-1", 2).unwrap();
        db.sales().checkout(&cart).await.unwrap();

        db.sales()
            .record_manual_sale(&ManualSaleInput {
                sku: "SKU-1".to_string(),
                qty: 1,
                unit_price: Some(Money::from_cents(900)),
            })
            .await
            .unwrap();

        assert_eq!(db.sales().total_income_cents().await.unwrap(), 2900);
        assert_eq!(db.sales().list_recent(10).await.unwrap().len(), 2);
    }

    #[test]
    fn test_ref_code_shape() {
        let code = generate_ref_code("STORE");
        let parts: Vec<&str> = code.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "STORE");
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
