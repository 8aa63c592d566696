//! # Ledger Event Model
//!
//! The cash-flow ledger merges two heterogeneous event streams into one
//! time-ordered view:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Construction                                │
//! │                                                                         │
//! │  sale_items ⋈ sales ⋈ products          stock_in ⋈ products             │
//! │       │                                      │                          │
//! │       │ filter (date range, text)            │ identical filter         │
//! │       │ sort time DESC                       │ sort time DESC           │
//! │       ▼                                      ▼                          │
//! │  SALE entries (+qty × price)          STOCKIN entries (−qty × cost)     │
//! │       │                                      │                          │
//! │       └──────────────┬───────────────────────┘                          │
//! │                      ▼                                                  │
//! │         merge_by_time_desc (merge-sort step)                            │
//! │                      │                                                  │
//! │        ┌─────────────┼──────────────────┐                               │
//! │        ▼             ▼                  ▼                               │
//! │   rows (≤500)   balance_range      top_sellers (≤20)                    │
//! │   display cap   over FULL set      filtered sale lines                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries are a query-time projection; nothing in this module is persisted.
//! Both halves must be filtered identically BEFORE the merge so the balance
//! and the row list describe the same event set.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::SaleChannel;

/// Calendar-date filter strings must look like this.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// =============================================================================
// Ledger Entry
// =============================================================================

/// Discriminant of the ledger event union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "channel", rename_all = "snake_case")]
pub enum LedgerEventKind {
    /// Money received: a sale line.
    Sale(SaleChannel),
    /// Money spent: a stock receipt.
    StockIn,
}

/// One event in the merged cash-flow ledger.
///
/// Both event kinds project into this common shape. The monetary sign
/// convention lives in [`LedgerEntry::signed_cents`], not in the stored
/// `unit_price_cents` (which is always the positive per-unit figure).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub time: DateTime<Utc>,
    /// Sale ref code, or `IN-<stockin id>` for receipts.
    pub reference: String,
    pub kind: LedgerEventKind,
    pub sku: String,
    pub product_name: String,
    pub quantity: i64,
    /// Per-unit price (sale) or per-unit cost (stock-in), in cents.
    pub unit_price_cents: i64,
}

impl LedgerEntry {
    /// Signed amount of this event: positive for sales (money in),
    /// negative for stock receipts (money out).
    #[inline]
    pub fn signed_cents(&self) -> i64 {
        let magnitude = self.quantity * self.unit_price_cents;
        match self.kind {
            LedgerEventKind::Sale(_) => magnitude,
            LedgerEventKind::StockIn => -magnitude,
        }
    }

    /// Signed amount as Money.
    #[inline]
    pub fn signed_amount(&self) -> Money {
        Money::from_cents(self.signed_cents())
    }

    /// Synthesizes the display reference for a stock receipt.
    pub fn stockin_reference(stockin_id: &str) -> String {
        format!("IN-{stockin_id}")
    }
}

// =============================================================================
// Ledger Filter
// =============================================================================

/// Date-range and text filter for the ledger query.
///
/// Date bounds are day-granular: the lower bound is inclusive at midnight
/// UTC, the upper bound is **exclusive** at midnight of the following day,
/// so `to = 2024-01-01` captures every event during Jan 1 and nothing from
/// Jan 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    /// Case-insensitive substring matched against SKU or product name.
    pub text: Option<String>,
}

impl LedgerFilter {
    /// Parses filter inputs as received from the request layer.
    ///
    /// A malformed date fails the whole query up front; no partial
    /// filtering is ever applied.
    pub fn parse(
        date_from: Option<&str>,
        date_to: Option<&str>,
        text: Option<&str>,
    ) -> Result<LedgerFilter, ValidationError> {
        let date_from = date_from.map(|s| parse_date("date_from", s)).transpose()?;
        let date_to = date_to.map(|s| parse_date("date_to", s)).transpose()?;
        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(LedgerFilter {
            date_from,
            date_to,
            text,
        })
    }

    /// Inclusive lower bound: `date_from` at midnight UTC.
    pub fn from_bound(&self) -> Option<DateTime<Utc>> {
        self.date_from.map(day_start)
    }

    /// Exclusive upper bound: midnight UTC of the day after `date_to`.
    ///
    /// Returns None when `date_to` is unset (or sits at the calendar's
    /// edge, where no representable event can exceed it).
    pub fn to_bound_exclusive(&self) -> Option<DateTime<Utc>> {
        self.date_to
            .and_then(|d| d.checked_add_days(Days::new(1)))
            .map(day_start)
    }

    /// Whether an entry falls inside this filter.
    ///
    /// The storage layer applies the same predicate in SQL to each half
    /// before merging; this in-memory form is the reference semantics.
    pub fn matches(&self, entry: &LedgerEntry) -> bool {
        if let Some(from) = self.from_bound() {
            if entry.time < from {
                return false;
            }
        }
        if let Some(to) = self.to_bound_exclusive() {
            if entry.time >= to {
                return false;
            }
        }
        if let Some(text) = &self.text {
            return matches_text(text, &entry.sku, &entry.product_name);
        }
        true
    }
}

/// Case-insensitive substring match against SKU or product name.
pub fn matches_text(needle: &str, sku: &str, name: &str) -> bool {
    let needle = needle.to_lowercase();
    sku.to_lowercase().contains(&needle) || name.to_lowercase().contains(&needle)
}

fn parse_date(field: &str, input: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "expected a date in YYYY-MM-DD format".to_string(),
        }
    })
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

// =============================================================================
// Merge & Aggregation
// =============================================================================

/// Merges two already time-descending entry streams into one
/// time-descending stream.
///
/// This is the merge step of a merge sort: each source query arrives
/// pre-sorted, so the union costs a single linear pass instead of a
/// re-sort. Ties take from `a` first, keeping the merge stable.
pub fn merge_by_time_desc(a: Vec<LedgerEntry>, b: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
    let mut merged = Vec::with_capacity(a.len() + b.len());
    let mut a = a.into_iter().peekable();
    let mut b = b.into_iter().peekable();

    loop {
        let take_a = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) => x.time >= y.time,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_a { a.next() } else { b.next() };
        if let Some(entry) = next {
            merged.push(entry);
        }
    }

    merged
}

/// Sums signed amounts over an event set.
///
/// Callers must pass the FULL filtered set, never a display-capped slice.
pub fn sum_signed_cents(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(LedgerEntry::signed_cents).sum()
}

/// Aggregated sale statistics for one product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopSeller {
    pub sku: String,
    pub product_name: String,
    pub total_qty: i64,
    pub revenue_cents: i64,
}

/// Groups sale entries by product and returns the best sellers by
/// quantity (revenue, then SKU, as tiebreaks). Stock-in entries are
/// ignored; they are not sales.
pub fn top_sellers(entries: &[LedgerEntry], limit: usize) -> Vec<TopSeller> {
    let mut by_sku: HashMap<&str, TopSeller> = HashMap::new();

    for entry in entries {
        if !matches!(entry.kind, LedgerEventKind::Sale(_)) {
            continue;
        }
        let stat = by_sku.entry(&entry.sku).or_insert_with(|| TopSeller {
            sku: entry.sku.clone(),
            product_name: entry.product_name.clone(),
            total_qty: 0,
            revenue_cents: 0,
        });
        stat.total_qty += entry.quantity;
        stat.revenue_cents += entry.signed_cents();
    }

    let mut stats: Vec<TopSeller> = by_sku.into_values().collect();
    stats.sort_by(|a, b| {
        b.total_qty
            .cmp(&a.total_qty)
            .then(b.revenue_cents.cmp(&a.revenue_cents))
            .then(a.sku.cmp(&b.sku))
    });
    stats.truncate(limit);
    stats
}

// =============================================================================
// Ledger View
// =============================================================================

/// The displayable result of a ledger query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerView {
    /// Merged events, newest first, capped for display.
    pub rows: Vec<LedgerEntry>,
    /// Signed sum over every event matching the filter (not just `rows`).
    pub balance_range_cents: i64,
    /// All-time money in minus money out, ignoring every filter.
    pub balance_all_time_cents: i64,
    /// All-time Σ sale totals.
    pub total_in_all_cents: i64,
    /// All-time Σ stock-in spend.
    pub total_out_all_cents: i64,
    /// Best sellers within the filtered window.
    pub top_sellers: Vec<TopSeller>,
}

impl LedgerView {
    /// Range balance as Money.
    #[inline]
    pub fn balance_range(&self) -> Money {
        Money::from_cents(self.balance_range_cents)
    }

    /// All-time balance as Money.
    #[inline]
    pub fn balance_all_time(&self) -> Money {
        Money::from_cents(self.balance_all_time_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
