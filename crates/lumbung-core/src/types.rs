//! # Domain Types
//!
//! Core domain types for the lumbung inventory and cash-flow ledger.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     StockIn     │   │      Sale       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  product_id(FK) │   │  ref_code       │       │
//! │  │  stock_qty      │   │  qty, cost      │   │  channel        │       │
//! │  │  cost/prices    │   │  price override │   │  total_cents    │       │
//! │  └─────────────────┘   └─────────────────┘   └────────┬────────┘       │
//! │                                                       │                 │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌────────▼────────┐       │
//! │  │    Reseller     │   │ResellerInventory│   │    SaleItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  unique name    │   │ (reseller,      │   │  sale_id (FK)   │       │
//! │  │                 │   │  product) pair  │   │  qty, snapshot  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where applicable: SKU, sale reference code, reseller name
//!
//! ## Snapshot Invariant
//! Monetary values stored on StockIn / Sale / SaleItem are frozen at the
//! moment the event is recorded. Later product price changes never alter
//! recorded history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Sale Channel
// =============================================================================

/// The origin of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum SaleChannel {
    /// Cart-based store checkout.
    Store,
    /// Sale to a registered reseller.
    Reseller,
    /// Manually entered offline sale.
    Manual,
}

impl SaleChannel {
    /// Stable lowercase tag, as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleChannel::Store => "store",
            SaleChannel::Reseller => "reseller",
            SaleChannel::Manual => "manual",
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product tracked in inventory.
///
/// `stock_qty` and `cost_cents` are mutated only as side effects of recorded
/// business events: stock-in receipts raise quantity and overwrite cost
/// (latest purchase wins), sales lower quantity. The upsert path touches
/// neither.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    /// Unit label shown next to quantities ("pcs", "kg", ...).
    pub unit: String,

    /// Current on-hand quantity.
    pub stock_qty: i64,

    /// Last known cost per unit, in cents. Tracks the latest purchase.
    pub cost_cents: i64,

    /// Retail price per unit, in cents.
    pub retail_cents: i64,

    /// Reseller price per unit, in cents.
    pub reseller_cents: i64,

    /// Reorder threshold; at or below this the product counts as low stock.
    pub min_level: i64,

    /// Free-text notes.
    pub notes: Option<String>,

    /// When the product was created.
    pub created_at: DateTime<Utc>,

    /// When the product was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the last known cost as Money.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Returns the retail price as Money.
    #[inline]
    pub fn retail_price(&self) -> Money {
        Money::from_cents(self.retail_cents)
    }

    /// Returns the reseller price as Money.
    #[inline]
    pub fn reseller_price(&self) -> Money {
        Money::from_cents(self.reseller_cents)
    }

    /// Whether on-hand quantity has reached the reorder threshold.
    pub fn is_low_stock(&self) -> bool {
        self.stock_qty <= self.min_level
    }

    /// Checks availability for a sale of `quantity` units.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.stock_qty >= quantity
    }
}

// =============================================================================
// Stock-In Receipt
// =============================================================================

/// An immutable stock receipt: goods in, money out.
///
/// Append-only; never updated or deleted. The resolved cost and the optional
/// price overrides are frozen here even though they also overwrite the
/// product's live fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockIn {
    pub id: String,
    pub product_id: String,
    /// Quantity received.
    pub qty: i64,
    /// Cost per unit actually paid, in cents.
    pub cost_cents: i64,
    /// New retail price, if the receipt updated it.
    pub new_retail_cents: Option<i64>,
    /// New reseller price, if the receipt updated it.
    pub new_reseller_cents: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl StockIn {
    /// Cash outflow represented by this receipt: `qty × cost`.
    #[inline]
    pub fn amount_spent(&self) -> Money {
        Money::from_cents(self.cost_cents).multiply_quantity(self.qty)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction header.
///
/// `total_cents` is computed and written once when the sale commits; it is
/// never recomputed from items afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: String,
    /// Human-readable reference code, e.g. `STORE-240115-3FA9C1`.
    /// For tracing only; not a dedup key.
    pub ref_code: String,
    pub channel: SaleChannel,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    /// Quantity sold.
    pub qty: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the unit price as Money.
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    /// Cash inflow represented by this line: `qty × unit price`.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.qty)
    }
}

// =============================================================================
// Reseller
// =============================================================================

/// A reseller with a unique name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Reseller {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

/// Per-reseller inventory row: an overridden price and quantity for one
/// (reseller, product) pair, unique per pair.
///
/// A pure override table; the sale/checkout/ledger paths do not consult it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ResellerInventory {
    pub id: String,
    pub reseller_id: String,
    pub product_id: String,
    pub qty: i64,
    pub price_cents: i64,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Operation Inputs
// =============================================================================

/// Input for recording a stock receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInInput {
    pub sku: String,
    pub qty: i64,
    /// Omitted → carry forward the product's stored cost.
    pub cost_per_unit: Option<Money>,
    /// Supplied → overwrite the product's retail price.
    pub new_retail_price: Option<Money>,
    /// Supplied → overwrite the product's reseller price.
    pub new_reseller_price: Option<Money>,
}

/// Input for recording a manual (offline) sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualSaleInput {
    pub sku: String,
    pub qty: i64,
    /// Omitted → the product's current retail price.
    pub unit_price: Option<Money>,
}

/// Input for creating or updating a product, keyed on SKU.
///
/// Deliberately has no stock or cost fields: those mutate only through
/// stock-in and sale events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductUpsert {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub retail_price: Money,
    pub reseller_price: Money,
    pub min_level: i64,
    pub notes: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================
