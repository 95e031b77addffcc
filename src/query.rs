//! Sort and search over the consolidated product list
//!
//! All views are computed in memory from the stored product list. Sorts are
//! stable, so products that compare equal keep their stored order.

use std::cmp::Reverse;

use crate::data::Product;

/// Supported orderings for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Deepest discount first
    Discount,
    /// Cheapest first, comparing prices in minor units
    Price,
    /// Highest rating first
    Rating,
    /// Alphabetical by title with spaces ignored
    #[default]
    Title,
}

impl SortKey {
    /// Parses a sort key name, falling back to [`SortKey::Title`] for
    /// anything unrecognized.
    pub fn parse(value: &str) -> Self {
        match value {
            "discount" => Self::Discount,
            "price" => Self::Price,
            "rating" => Self::Rating,
            _ => Self::Title,
        }
    }
}

/// Sorts products in place by the given key.
pub fn sort_products(products: &mut [Product], key: SortKey) {
    match key {
        SortKey::Discount => {
            products.sort_by_key(|p| Reverse(p.price.discount));
        }
        SortKey::Price => {
            // "29.99" compares as 2999, so "100.00" sorts above "99.99"
            products.sort_by_cached_key(|p| price_minor_units(p));
        }
        SortKey::Rating => {
            products.sort_by(|a, b| b.rating.total_cmp(&a.rating));
        }
        SortKey::Title => {
            products.sort_by_cached_key(|p| p.title.replace(' ', ""));
        }
    }
}

/// Returns the products whose title contains the query, case-insensitively.
///
/// An empty query matches every product.
pub fn search_products(products: &[Product], query: &str) -> Vec<Product> {
    let needle = query.to_lowercase();
    products
        .iter()
        .filter(|p| p.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// Interprets a decimal price string as an integer count of minor units.
///
/// Amounts that do not parse sort as zero, ahead of every real price.
fn price_minor_units(product: &Product) -> i64 {
    product.price.amount.replace('.', "").parse().unwrap_or(0)
}
