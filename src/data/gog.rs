//! GOG.com storefront API client
//!
//! This module provides functionality to fetch single pages from the
//! paginated `ajax/filtered` catalog endpoint and to normalize the raw
//! responses into the persisted page and metadata models.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT_LANGUAGE, COOKIE};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{CatalogMeta, Page, Product};
use crate::config::CatalogConfig;

/// Errors that can occur when fetching a catalog page
#[derive(Debug, Error)]
pub enum GogError {
    /// Transport-level failure: connection, DNS, timeout, body read
    #[error("request failed: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("unexpected HTTP status: {0}")]
    BadStatus(reqwest::StatusCode),

    /// The body did not parse as the expected page schema
    #[error("malformed response body: {0}")]
    MalformedBody(#[from] serde_json::Error),
}

/// Raw page response from the storefront API.
///
/// Catalog-wide totals ride along on feed responses but are only trusted on
/// page 1, where they seed [`CatalogMeta`]. The transport timestamp `ts` and
/// all other unmodelled fields are dropped by serde on parse.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPage {
    /// Products on this page, in feed order
    pub products: Vec<Product>,
    /// Total pages in the feed, when present
    #[serde(default)]
    pub total_pages: Option<u32>,
    /// Total results across the catalog, when present
    #[serde(default)]
    pub total_results: Option<u64>,
    /// Total games across the catalog, when present
    #[serde(default)]
    pub total_games_found: Option<u64>,
    /// Total movies across the catalog, when present
    #[serde(default)]
    pub total_movies_found: Option<u64>,
}

impl RawPage {
    /// Normalizes this response into the persisted page model, attaching the
    /// requested page number and the fetch time and shedding the feed-only
    /// totals fields.
    pub fn into_page(self, page: u32, time: DateTime<Utc>) -> Page {
        Page {
            page,
            time,
            products: self.products,
        }
    }

    /// Derives the catalog metadata record from this response's totals.
    ///
    /// Returns `None` when any totals field is missing. A bootstrap cannot
    /// proceed without the full set, so callers treat `None` on page 1 as a
    /// failed bootstrap.
    pub fn catalog_meta(&self, time: DateTime<Utc>) -> Option<CatalogMeta> {
        Some(CatalogMeta {
            time,
            total_games: self.total_games_found?,
            total_movies: self.total_movies_found?,
            total_pages: self.total_pages?,
            total_products: self.total_results?,
        })
    }
}

/// Client for the paginated storefront feed.
///
/// Performs exactly one request per call with the locale pinned through a
/// fixed cookie and accept-language header. Retry policy belongs to callers.
#[derive(Debug, Clone)]
pub struct GogClient {
    client: Client,
    base_url: String,
    locale_cookie: String,
    accept_language: String,
}

impl GogClient {
    /// Creates a new client from the catalog configuration.
    pub fn new(config: &CatalogConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_url.clone(),
            locale_cookie: config.locale_cookie.clone(),
            accept_language: config.accept_language.clone(),
        }
    }

    /// Creates a client pointed at a custom endpoint (for tests).
    #[cfg(test)]
    pub(crate) fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            locale_cookie: "gog_lc=US_USD_en-US".to_string(),
            accept_language: "en-US".to_string(),
        }
    }

    /// Fetches one page of the catalog feed.
    ///
    /// Builds `{base_url}?page={n}` and performs a single request.
    ///
    /// # Returns
    /// * `Ok(RawPage)` - The parsed raw response
    /// * `Err(GogError)` - Transport failure, non-success status, or a body
    ///   that does not match the page schema
    pub async fn fetch_page(&self, page: u32) -> Result<RawPage, GogError> {
        let url = format!("{}?page={}", self.base_url, page);

        let response = self
            .client
            .get(&url)
            .header(COOKIE, &self.locale_cookie)
            .header(ACCEPT_LANGUAGE, &self.accept_language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GogError::BadStatus(status));
        }

        let text = response.text().await?;
        let raw: RawPage = serde_json::from_str(&text)?;
        Ok(raw)
    }
}
