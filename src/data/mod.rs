//! Core data models for the GOG catalog mirror
//!
//! This module contains the data types shared across the store, the refresher
//! and the query engine: products, cached pages and the catalog-wide metadata
//! record.

pub mod gog;

pub use gog::{GogClient, GogError, RawPage};

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// A single catalog entry.
///
/// Products are immutable once fetched; identity is the `slug`. Remote
/// responses carry many more fields per product; everything not modelled
/// here is dropped at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique stable identifier, e.g. `"the_witcher_3"`
    pub slug: String,
    /// Display title, e.g. `"The Witcher 3"`
    pub title: String,
    /// Current price and discount
    pub price: Price,
    /// Aggregate user rating
    pub rating: f64,
}

/// Price information for a product.
///
/// `amount` stays a decimal string exactly as the feed delivers it; all
/// amounts share the same two-digit precision, which is what makes the
/// digits-only price sort in [`crate::query`] order correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    /// Decimal amount as a string, e.g. `"29.99"`
    pub amount: String,
    /// Discount in whole percent, `0` when not discounted
    pub discount: i64,
}

/// One unit of remote pagination, as persisted in the page cache.
///
/// `time` is the fetch time of the whole page, not a per-product timestamp.
/// It is serialized as integer seconds since the epoch to keep the on-disk
/// format readable and diff-friendly. Raw feed fields that only matter for
/// deriving [`CatalogMeta`] (`totalGamesFound` and friends) are never part of
/// a persisted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Page number within the remote feed, starting at 1
    pub page: u32,
    /// When this page was fetched
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    /// Products on this page, in feed order
    pub products: Vec<Product>,
}

/// Singleton record describing the whole catalog.
///
/// Derived from page 1 of the remote feed, created on the first successful
/// bootstrap and overwritten wholesale on each refresh, never partially
/// updated. Field names serialize camelCase to match the persisted
/// `meta.json` layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogMeta {
    /// Timestamp of the last successful full or partial refresh
    #[serde(with = "chrono::serde::ts_seconds")]
    pub time: DateTime<Utc>,
    /// Total games in the catalog
    pub total_games: u64,
    /// Total movies in the catalog
    pub total_movies: u64,
    /// Total pages in the paginated feed
    pub total_pages: u32,
    /// Total products (games + movies + everything else)
    pub total_products: u64,
}

/// Current time truncated to whole seconds.
///
/// Record times serialize as epoch seconds, so they are stamped at that
/// precision; a fresh record and its stored copy then compare equal.
pub(crate) fn current_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
