//! # Repository Module
//!
//! Database repository implementations for the lumbung ledger.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Request handler                                                       │
//! │       │                                                                 │
//! │       │  db.stock().apply_stock_in(&input)                             │
//! │       │  db.sales().checkout(&cart)                                    │
//! │       │  db.ledger().build_ledger(&filter)                             │
//! │       ▼                                                                 │
//! │  Repository ── SQL, transaction scope, rollback on failure             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Mutating operations own their transaction: read current state,       │
//! │  validate, write all resulting rows, commit - or roll back fully.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product upsert, lookup, search, summaries
//! - [`stock::StockInRepository`] - Stock receipts (the stock & pricing mutator)
//! - [`sale::SaleRepository`] - Checkout and manual sale recording
//! - [`reseller::ResellerRepository`] - Resellers and inventory overrides
//! - [`ledger::LedgerRepository`] - The merged cash-flow query engine

pub mod ledger;
pub mod product;
pub mod reseller;
pub mod sale;
pub mod stock;
