//! # Ledger Query Engine
//!
//! Builds the merged cash-flow view: sales (money in) against stock
//! receipts (money out), over an optional date window and text filter.
//!
//! ## Query Plan
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      build_ledger(filter)                               │
//! │                                                                         │
//! │  ┌──────────────────────────┐   ┌──────────────────────────┐           │
//! │  │ SALE half                │   │ STOCKIN half             │           │
//! │  │ sale_items ⋈ sales       │   │ stock_in ⋈ products      │           │
//! │  │            ⋈ products    │   │                          │           │
//! │  │ WHERE date/text filter   │   │ WHERE identical filter   │           │
//! │  │ ORDER BY time DESC       │   │ ORDER BY time DESC       │           │
//! │  └────────────┬─────────────┘   └────────────┬─────────────┘           │
//! │               └───────────┬─────────────────┘                          │
//! │                           ▼                                             │
//! │     in-memory merge of two pre-sorted streams (lumbung-core)           │
//! │                           │                                             │
//! │        ┌──────────────────┼──────────────────────┐                      │
//! │        ▼                  ▼                      ▼                      │
//! │  balance_range       rows (≤500 cap)       top_sellers (≤20)           │
//! │  over FULL set       display only          filtered sale lines         │
//! │                                                                         │
//! │  balance_all_time = Σ sales.total_cents − Σ stock_in.qty×cost          │
//! │  (separate unfiltered queries; sale headers are authoritative)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both halves are filtered BEFORE the merge, never after, so the balance
//! and the row list always describe the same event set.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbResult, StoreResult};
use lumbung_core::ledger::{merge_by_time_desc, sum_signed_cents, top_sellers};
use lumbung_core::types::SaleChannel;
use lumbung_core::{LedgerEntry, LedgerEventKind, LedgerFilter, LedgerView};
use lumbung_core::{MAX_LEDGER_ROWS, TOP_SELLERS_LIMIT};

/// The ledger query engine.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

/// Row shape of the SALE half query.
#[derive(Debug, sqlx::FromRow)]
struct SaleEventRow {
    time: DateTime<Utc>,
    reference: String,
    channel: SaleChannel,
    sku: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
}

/// Row shape of the STOCKIN half query.
#[derive(Debug, sqlx::FromRow)]
struct StockEventRow {
    time: DateTime<Utc>,
    stockin_id: String,
    sku: String,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Builds the ledger from raw request inputs.
    ///
    /// Date strings must be `YYYY-MM-DD`; a malformed date fails the whole
    /// query before anything is fetched. No partial results.
    pub async fn query(
        &self,
        date_from: Option<&str>,
        date_to: Option<&str>,
        text: Option<&str>,
    ) -> StoreResult<LedgerView> {
        let filter = LedgerFilter::parse(date_from, date_to, text)?;
        self.build_ledger(&filter).await
    }

    /// Builds the ledger view for an already-parsed filter.
    pub async fn build_ledger(&self, filter: &LedgerFilter) -> StoreResult<LedgerView> {
        self.build_with_cap(filter, MAX_LEDGER_ROWS).await
    }

    /// The cap is a display concern only; balances are computed before it
    /// applies, so any cap value yields the same figures.
    async fn build_with_cap(
        &self,
        filter: &LedgerFilter,
        cap: usize,
    ) -> StoreResult<LedgerView> {
        let sale_entries = self.sale_entries(filter).await?;
        let stockin_entries = self.stockin_entries(filter).await?;

        debug!(
            sales = sale_entries.len(),
            stockins = stockin_entries.len(),
            "Merging ledger event streams"
        );

        let mut rows = merge_by_time_desc(sale_entries, stockin_entries);

        let balance_range_cents = sum_signed_cents(&rows);
        let sellers = top_sellers(&rows, TOP_SELLERS_LIMIT);
        rows.truncate(cap);

        let total_in_all_cents = self.total_in_all_cents().await?;
        let total_out_all_cents = self.total_out_all_cents().await?;

        Ok(LedgerView {
            rows,
            balance_range_cents,
            balance_all_time_cents: total_in_all_cents - total_out_all_cents,
            total_in_all_cents,
            total_out_all_cents,
            top_sellers: sellers,
        })
    }

    /// SALE half: one entry per sale line, joined to its header and
    /// product, filtered and pre-sorted in SQL.
    async fn sale_entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, SaleEventRow>(
            r#"
            SELECT
                s.created_at        AS time,
                s.ref_code          AS reference,
                s.channel           AS channel,
                p.sku               AS sku,
                p.name              AS product_name,
                si.qty              AS quantity,
                si.unit_price_cents AS unit_price_cents
            FROM sale_items si
            JOIN sales s    ON s.id = si.sale_id
            JOIN products p ON p.id = si.product_id
            WHERE (?1 IS NULL OR s.created_at >= ?1)
              AND (?2 IS NULL OR s.created_at < ?2)
              AND (?3 IS NULL OR p.sku LIKE ?3 OR p.name LIKE ?3)
            ORDER BY s.created_at DESC
            "#,
        )
        .bind(filter.from_bound())
        .bind(filter.to_bound_exclusive())
        .bind(like_pattern(filter))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LedgerEntry {
                time: row.time,
                reference: row.reference,
                kind: LedgerEventKind::Sale(row.channel),
                sku: row.sku,
                product_name: row.product_name,
                quantity: row.quantity,
                unit_price_cents: row.unit_price_cents,
            })
            .collect())
    }

    /// STOCKIN half: one entry per receipt, joined to its product,
    /// identically filtered and pre-sorted.
    async fn stockin_entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, StockEventRow>(
            r#"
            SELECT
                si.created_at AS time,
                si.id         AS stockin_id,
                p.sku         AS sku,
                p.name        AS product_name,
                si.qty        AS quantity,
                si.cost_cents AS unit_price_cents
            FROM stock_in si
            JOIN products p ON p.id = si.product_id
            WHERE (?1 IS NULL OR si.created_at >= ?1)
              AND (?2 IS NULL OR si.created_at < ?2)
              AND (?3 IS NULL OR p.sku LIKE ?3 OR p.name LIKE ?3)
            ORDER BY si.created_at DESC
            "#,
        )
        .bind(filter.from_bound())
        .bind(filter.to_bound_exclusive())
        .bind(like_pattern(filter))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LedgerEntry {
                time: row.time,
                reference: LedgerEntry::stockin_reference(&row.stockin_id),
                kind: LedgerEventKind::StockIn,
                sku: row.sku,
                product_name: row.product_name,
                quantity: row.quantity,
                unit_price_cents: row.unit_price_cents,
            })
            .collect())
    }

    /// All-time income: Σ sale header totals, ignoring every filter.
    async fn total_in_all_cents(&self) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(total_cents), 0) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(total)
    }

    /// All-time spend: Σ qty × cost over every receipt, ignoring every
    /// filter.
    async fn total_out_all_cents(&self) -> DbResult<i64> {
        let total: i64 =
            sqlx::query_scalar("SELECT COALESCE(SUM(qty * cost_cents), 0) FROM stock_in")
                .fetch_one(&self.pool)
                .await?;

        Ok(total)
    }
}

/// SQL LIKE pattern for the text filter; None when no filter is set.
/// SQLite's LIKE is case-insensitive for ASCII, matching the in-memory
/// reference semantics in lumbung-core.
fn like_pattern(filter: &LedgerFilter) -> Option<String> {
    filter.text.as_ref().map(|t| format!("%{t}%"))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::testutil::{product_input, test_db};
    use crate::Database;
    use chrono::TimeZone;
    use lumbung_core::{CoreError, ValidationError};
    use uuid::Uuid;

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, min, sec).unwrap()
    }

    async fn product_id(db: &Database, sku: &str) -> String {
        db.products().get_by_sku(sku).await.unwrap().unwrap().id
    }

    /// Inserts a one-line sale at an explicit timestamp.
    async fn seed_sale(db: &Database, sku: &str, time: DateTime<Utc>, qty: i64, price: i64) {
        let pid = product_id(db, sku).await;
        let sale_id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO sales (id, ref_code, channel, total_cents, created_at) \
             VALUES (?1, ?2, 'store', ?3, ?4)",
        )
        .bind(&sale_id)
        .bind(format!("STORE-TEST-{}", &sale_id[..6]))
        .bind(qty * price)
        .bind(time)
        .execute(db.pool())
        .await
        .unwrap();

        sqlx::query(
            "INSERT INTO sale_items \
             (id, sale_id, product_id, sku_snapshot, name_snapshot, qty, unit_price_cents, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&sale_id)
        .bind(&pid)
        .bind(sku)
        .bind(format!("Product {sku}"))
        .bind(qty)
        .bind(price)
        .bind(time)
        .execute(db.pool())
        .await
        .unwrap();
    }

    /// Inserts a stock receipt at an explicit timestamp.
    async fn seed_stockin(db: &Database, sku: &str, time: DateTime<Utc>, qty: i64, cost: i64) {
        let pid = product_id(db, sku).await;

        sqlx::query(
            "INSERT INTO stock_in (id, product_id, qty, cost_cents, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&pid)
        .bind(qty)
        .bind(cost)
        .bind(time)
        .execute(db.pool())
        .await
        .unwrap();
    }

    async fn seeded_db() -> Database {
        let db = test_db().await;
        db.products()
            .upsert(&product_input("KOPI-250", "Kopi Susu", 1000))
            .await
            .unwrap();
        db.products()
            .upsert(&product_input("TEH-100", "Teh Celup", 500))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_merged_view_sorts_desc_and_signs_amounts() {
        let db = seeded_db().await;
        seed_stockin(&db, "KOPI-250", at(1, 9, 0, 0), 10, 500).await; // -5000
        seed_sale(&db, "KOPI-250", at(2, 10, 0, 0), 3, 1000).await; // +3000
        seed_sale(&db, "TEH-100", at(3, 11, 0, 0), 2, 500).await; // +1000

        let view = db.ledger().build_ledger(&LedgerFilter::default()).await.unwrap();

        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.rows[0].sku, "TEH-100");
        assert_eq!(view.rows[2].sku, "KOPI-250");
        assert!(matches!(view.rows[2].kind, LedgerEventKind::StockIn));
        assert!(view.rows[2].reference.starts_with("IN-"));
        assert_eq!(view.rows[0].signed_cents(), 1000);
        assert_eq!(view.rows[2].signed_cents(), -5000);

        assert_eq!(view.balance_range_cents, 3000 + 1000 - 5000);
        assert_eq!(view.total_in_all_cents, 4000);
        assert_eq!(view.total_out_all_cents, 5000);
        assert_eq!(view.balance_all_time_cents, -1000);
    }

    #[tokio::test]
    async fn test_date_window_is_day_granular() {
        let db = seeded_db().await;
        seed_sale(&db, "KOPI-250", at(1, 0, 0, 0), 1, 1000).await; // Jan 1 midnight
        seed_sale(&db, "KOPI-250", at(1, 23, 59, 59), 1, 1000).await; // Jan 1 last second
        seed_sale(&db, "KOPI-250", at(2, 0, 0, 0), 1, 1000).await; // Jan 2 exactly

        let view = db
            .ledger()
            .query(Some("2024-01-01"), Some("2024-01-01"), None)
            .await
            .unwrap();

        // The whole of Jan 1, and not one second of Jan 2.
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.balance_range_cents, 2000);
        // All-time figures ignore the window.
        assert_eq!(view.balance_all_time_cents, 3000);
    }

    #[tokio::test]
    async fn test_text_filter_applies_to_both_halves_before_merge() {
        let db = seeded_db().await;
        seed_sale(&db, "KOPI-250", at(1, 9, 0, 0), 2, 1000).await; // +2000
        seed_stockin(&db, "KOPI-250", at(2, 9, 0, 0), 5, 500).await; // -2500
        seed_sale(&db, "TEH-100", at(3, 9, 0, 0), 4, 500).await;
        seed_stockin(&db, "TEH-100", at(4, 9, 0, 0), 10, 200).await;

        let view = db.ledger().query(None, None, Some("kopi")).await.unwrap();

        assert_eq!(view.rows.len(), 2);
        assert!(view.rows.iter().all(|r| r.sku == "KOPI-250"));
        // Balance covers exactly the filtered rows - both halves filtered.
        assert_eq!(view.balance_range_cents, 2000 - 2500);
        // The product-name side of the match works too.
        let by_name = db.ledger().query(None, None, Some("susu")).await.unwrap();
        assert_eq!(by_name.rows.len(), 2);
    }

    #[tokio::test]
    async fn test_row_cap_never_changes_balances() {
        let db = seeded_db().await;
        for day in 1..=5 {
            seed_sale(&db, "KOPI-250", at(day, 9, 0, 0), 1, 1000).await;
        }

        let filter = LedgerFilter::default();
        let full = db.ledger().build_ledger(&filter).await.unwrap();
        let capped = db.ledger().build_with_cap(&filter, 2).await.unwrap();

        assert_eq!(full.rows.len(), 5);
        assert_eq!(capped.rows.len(), 2);
        assert_eq!(capped.balance_range_cents, full.balance_range_cents);
        assert_eq!(capped.balance_all_time_cents, full.balance_all_time_cents);
        assert_eq!(capped.top_sellers.len(), full.top_sellers.len());
        assert_eq!(capped.top_sellers[0].total_qty, 5);
    }

    #[tokio::test]
    async fn test_top_sellers_respect_the_filter_window() {
        let db = seeded_db().await;
        seed_sale(&db, "KOPI-250", at(1, 9, 0, 0), 10, 1000).await;
        seed_sale(&db, "TEH-100", at(5, 9, 0, 0), 3, 500).await;

        let view = db
            .ledger()
            .query(Some("2024-01-04"), Some("2024-01-06"), None)
            .await
            .unwrap();

        assert_eq!(view.top_sellers.len(), 1);
        assert_eq!(view.top_sellers[0].sku, "TEH-100");
        assert_eq!(view.top_sellers[0].total_qty, 3);
        assert_eq!(view.top_sellers[0].revenue_cents, 1500);
    }

    #[tokio::test]
    async fn test_malformed_date_fails_whole_query() {
        let db = seeded_db().await;
        seed_sale(&db, "KOPI-250", at(1, 9, 0, 0), 1, 1000).await;

        let err = db
            .ledger()
            .query(Some("15-01-2024"), None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Core(CoreError::Validation(ValidationError::InvalidFormat { .. }))
        ));
    }

    #[tokio::test]
    async fn test_sale_headers_are_authoritative_for_all_time_balance() {
        let db = seeded_db().await;
        seed_sale(&db, "KOPI-250", at(1, 9, 0, 0), 2, 1000).await;

        // Drift the header away from its items. The range balance follows
        // the items; the all-time balance trusts the header. This is the
        // documented reconciliation risk, preserved on purpose.
        sqlx::query("UPDATE sales SET total_cents = 9999")
            .execute(db.pool())
            .await
            .unwrap();

        let view = db.ledger().build_ledger(&LedgerFilter::default()).await.unwrap();
        assert_eq!(view.balance_range_cents, 2000);
        assert_eq!(view.balance_all_time_cents, 9999);
    }

    #[tokio::test]
    async fn test_empty_ledger() {
        let db = test_db().await;
        let view = db.ledger().build_ledger(&LedgerFilter::default()).await.unwrap();

        assert!(view.rows.is_empty());
        assert_eq!(view.balance_range_cents, 0);
        assert_eq!(view.balance_all_time_cents, 0);
        assert!(view.top_sellers.is_empty());
    }
}
