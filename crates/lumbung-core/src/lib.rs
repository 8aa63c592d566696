//! # lumbung-core: Pure Business Logic for the lumbung Ledger
//!
//! This crate is the **heart** of lumbung, a small-business inventory and
//! point-of-sale cash-flow ledger. It contains all business logic as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       lumbung Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               Request layer (not in this workspace)             │   │
//! │  │    product upsert ─► stock-in ─► checkout ─► cash-flow view    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ lumbung-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │   cart    │  │   │
//! │  │   │  Product  │  │   Money   │  │  merge &  │  │   Cart    │  │   │
//! │  │   │ Sale/Item │  │  parsing  │  │ balances  │  │ SKU→qty   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  lumbung-db (Storage Layer)                     │   │
//! │  │        SQLite queries, migrations, transactional mutators       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockIn, Sale, SaleItem, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`ledger`] - The two-stream cash-flow event model and its aggregation
//! - [`cart`] - Session-held cart value type
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod ledger;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use lumbung_core::Money` instead of
// `use lumbung_core::money::Money`

pub use cart::Cart;
pub use error::{CoreError, CoreResult, ValidationError};
pub use ledger::{
    LedgerEntry, LedgerEventKind, LedgerFilter, LedgerView, TopSeller,
};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Hard cap on ledger rows returned for display.
///
/// This is a cap, not a pagination mechanism: balances are always computed
/// over the full filtered event set before the cap applies.
pub const MAX_LEDGER_ROWS: usize = 500;

/// Number of products reported in the top-seller statistics.
pub const TOP_SELLERS_LIMIT: usize = 20;

/// Maximum quantity on a single stock-in or sale line.
///
/// Catches accidental over-entry (typing 1000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 99_999;
