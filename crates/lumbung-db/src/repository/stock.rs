//! # Stock Receipt Repository
//!
//! The stock & pricing mutator: records goods received and applies their
//! side effects to the product row, atomically.
//!
//! ## Receipt Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   apply_stock_in(sku, qty, cost?, prices?)              │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │       │                                                                 │
//! │       ├── fetch product by SKU ──► unknown? NotFound, ROLLBACK         │
//! │       │                                                                 │
//! │       ├── resolve cost: given, or carry forward the stored cost        │
//! │       │                                                                 │
//! │       ├── INSERT stock_in row (immutable receipt, frozen cost)         │
//! │       │                                                                 │
//! │       ├── UPDATE product:                                              │
//! │       │      stock_qty += qty                                          │
//! │       │      cost_cents ← resolved cost   (latest purchase wins)       │
//! │       │      retail/reseller ← only supplied overrides                 │
//! │       │                                                                 │
//! │  COMMIT — receipt, stock and prices persist together or not at all    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use crate::repository::product;
use lumbung_core::types::{StockIn, StockInInput};
use lumbung_core::validation::{validate_price_cents, validate_quantity, validate_sku};
use lumbung_core::CoreError;

const STOCK_IN_COLUMNS: &str =
    "id, product_id, qty, cost_cents, new_retail_cents, new_reseller_cents, created_at";

/// Repository for stock receipts.
#[derive(Debug, Clone)]
pub struct StockInRepository {
    pool: SqlitePool,
}

impl StockInRepository {
    /// Creates a new StockInRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockInRepository { pool }
    }

    /// Records a stock receipt and applies it to the product.
    ///
    /// ## Preconditions
    /// - `qty > 0`
    /// - The product must already exist; stock-in never auto-creates it
    ///
    /// ## Carry-Forward Cost
    /// When `cost_per_unit` is omitted the product's stored cost is reused,
    /// so a known cost doesn't have to be re-typed on every delivery. The
    /// receipt row freezes whichever cost was resolved.
    pub async fn apply_stock_in(&self, input: &StockInInput) -> StoreResult<StockIn> {
        validate_sku(&input.sku)?;
        validate_quantity(input.qty)?;
        if let Some(cost) = input.cost_per_unit {
            validate_price_cents(cost.cents())?;
        }
        if let Some(price) = input.new_retail_price {
            validate_price_cents(price.cents())?;
        }
        if let Some(price) = input.new_reseller_price {
            validate_price_cents(price.cents())?;
        }

        let mut tx = self.pool.begin().await?;

        let product = product::fetch_by_sku(&mut tx, &input.sku)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(input.sku.trim().to_string()))?;

        let cost_cents = input
            .cost_per_unit
            .map(|m| m.cents())
            .unwrap_or(product.cost_cents);

        let receipt = StockIn {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            qty: input.qty,
            cost_cents,
            new_retail_cents: input.new_retail_price.map(|m| m.cents()),
            new_reseller_cents: input.new_reseller_price.map(|m| m.cents()),
            created_at: Utc::now(),
        };

        debug!(sku = %product.sku, qty = receipt.qty, cost = receipt.cost_cents, "Recording stock receipt");

        sqlx::query(
            r#"
            INSERT INTO stock_in (
                id, product_id, qty, cost_cents,
                new_retail_cents, new_reseller_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&receipt.id)
        .bind(&receipt.product_id)
        .bind(receipt.qty)
        .bind(receipt.cost_cents)
        .bind(receipt.new_retail_cents)
        .bind(receipt.new_reseller_cents)
        .bind(receipt.created_at)
        .execute(&mut *tx)
        .await?;

        product::apply_receipt(
            &mut tx,
            &product.id,
            receipt.qty,
            receipt.cost_cents,
            receipt.new_retail_cents,
            receipt.new_reseller_cents,
        )
        .await?;

        tx.commit().await?;

        info!(
            sku = %product.sku,
            qty = receipt.qty,
            spent = %receipt.amount_spent(),
            "Stock receipt recorded"
        );

        Ok(receipt)
    }

    /// Lists receipts, most recent first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<StockIn>> {
        let receipts = sqlx::query_as::<_, StockIn>(&format!(
            "SELECT {STOCK_IN_COLUMNS} FROM stock_in ORDER BY created_at DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }

    /// All-time purchase spend: Σ qty × cost over every receipt.
    pub async fn total_spent_cents(&self) -> DbResult<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(qty * cost_cents), 0) FROM stock_in")
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testutil::{product_input, stock_in, test_db};
    use lumbung_core::Money;

    #[tokio::test]
    async fn test_receipt_raises_stock_and_overwrites_cost() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();

        let receipt = db
            .stock()
            .apply_stock_in(&stock_in("KOPI-250", 20, Some(450)))
            .await
            .unwrap();

        assert_eq!(receipt.qty, 20);
        assert_eq!(receipt.cost_cents, 450);
        assert_eq!(receipt.amount_spent().cents(), 9000);

        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 20);
        assert_eq!(product.cost_cents, 450);
    }

    #[tokio::test]
    async fn test_cost_tracks_latest_purchase_not_average() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();

        db.stock()
            .apply_stock_in(&stock_in("KOPI-250", 10, Some(500)))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("KOPI-250", 10, Some(700)))
            .await
            .unwrap();

        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 20);
        // 700, not the weighted average 600.
        assert_eq!(product.cost_cents, 700);
    }

    #[tokio::test]
    async fn test_omitted_cost_carries_forward() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("SKU-1", "Widget", 1000))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("SKU-1", 10, Some(500)))
            .await
            .unwrap();

        let receipt = db
            .stock()
            .apply_stock_in(&stock_in("SKU-1", 20, None))
            .await
            .unwrap();

        // The receipt froze the carried-forward cost.
        assert_eq!(receipt.cost_cents, 500);

        let product = db.products().get_by_sku("SKU-1").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 30);
        assert_eq!(product.cost_cents, 500);
    }

    #[tokio::test]
    async fn test_price_overrides_apply_only_when_supplied() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();

        // No overrides: prices untouched.
        db.stock()
            .apply_stock_in(&stock_in("KOPI-250", 5, Some(450)))
            .await
            .unwrap();
        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.retail_cents, 1000);

        // Retail override only: reseller price keeps its value.
        let mut input = stock_in("KOPI-250", 5, Some(450));
        input.new_retail_price = Some(Money::from_cents(1250));
        db.stock().apply_stock_in(&input).await.unwrap();

        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.retail_cents, 1250);
        assert_eq!(product.reseller_cents, 800);

        // Both overrides.
        let mut input = stock_in("KOPI-250", 5, Some(450));
        input.new_retail_price = Some(Money::from_cents(1300));
        input.new_reseller_price = Some(Money::from_cents(1100));
        db.stock().apply_stock_in(&input).await.unwrap();

        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.retail_cents, 1300);
        assert_eq!(product.reseller_cents, 1100);
    }

    #[tokio::test]
    async fn test_unknown_sku_is_not_found() {
        let db = test_db().await;

        let err = db
            .stock()
            .apply_stock_in(&stock_in("GHOST", 5, Some(100)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Core(CoreError::ProductNotFound(ref sku)) if sku == "GHOST"
        ));
    }

    #[tokio::test]
    async fn test_non_positive_qty_rejected_without_side_effects() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();

        assert!(db
            .stock()
            .apply_stock_in(&stock_in("KOPI-250", 0, Some(100)))
            .await
            .is_err());
        assert!(db
            .stock()
            .apply_stock_in(&stock_in("KOPI-250", -5, Some(100)))
            .await
            .is_err());

        let product = db.products().get_by_sku("KOPI-250").await.unwrap().unwrap();
        assert_eq!(product.stock_qty, 0);
        assert!(db.stock().list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receipts_are_append_only_history() {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi 250g", 1000))
            .await
            .unwrap();

        db.stock()
            .apply_stock_in(&stock_in("KOPI-250", 10, Some(500)))
            .await
            .unwrap();
        db.stock()
            .apply_stock_in(&stock_in("KOPI-250", 4, Some(550)))
            .await
            .unwrap();

        let receipts = db.stock().list_recent(10).await.unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(
            db.stock().total_spent_cents().await.unwrap(),
            10 * 500 + 4 * 550
        );
    }
}
