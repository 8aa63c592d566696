//! # lumbung-db: Database Layer for the lumbung Ledger
//!
//! This crate provides storage for the lumbung inventory and cash-flow
//! ledger. It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        lumbung Data Flow                                │
//! │                                                                         │
//! │  Request handler (stock-in form, checkout, cash-flow page)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    lumbung-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  product/sale │    │  (embedded)  │  │   │
//! │  │   │               │◄───│  stock/ledger │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │  reseller     │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │                     SQLite Database (WAL mode)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database and operation error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use lumbung_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/lumbung.db")).await?;
//!
//! let receipt = db.stock().apply_stock_in(&input).await?;
//! let sale = db.sales().checkout(&cart).await?;
//! let ledger = db.ledger().query(Some("2024-01-01"), None, None).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, StoreError, StoreResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::reseller::ResellerRepository;
pub use repository::sale::SaleRepository;
pub use repository::stock::StockInRepository;

// =============================================================================
// Test Utilities
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    //! Shared fixtures for repository tests. Everything runs against an
    //! in-memory database with migrations applied.

    use crate::{Database, DbConfig};
    use lumbung_core::types::{ProductUpsert, StockInInput};
    use lumbung_core::Money;

    /// Fresh isolated in-memory database.
    pub async fn test_db() -> Database {
        init_tracing();
        Database::new(DbConfig::in_memory())
            .await
            .expect("in-memory database")
    }

    /// Opt-in log output when debugging test failures: RUST_LOG=debug.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    /// Upsert input for a product with the given retail price in cents.
    /// Reseller price defaults to 80% of retail.
    pub fn product_input(sku: &str, name: &str, retail_cents: i64) -> ProductUpsert {
        ProductUpsert {
            sku: sku.to_string(),
            name: name.to_string(),
            unit: "pcs".to_string(),
            retail_price: Money::from_cents(retail_cents),
            reseller_price: Money::from_cents(retail_cents * 8 / 10),
            min_level: 0,
            notes: None,
        }
    }

    /// Stock receipt input; `cost_cents = None` exercises carry-forward.
    pub fn stock_in(sku: &str, qty: i64, cost_cents: Option<i64>) -> StockInInput {
        StockInInput {
            sku: sku.to_string(),
            qty,
            cost_per_unit: cost_cents.map(Money::from_cents),
            new_retail_price: None,
            new_reseller_price: None,
        }
    }
}
