//! Catalog configuration
//!
//! This module provides the configuration shared by the remote client, the
//! page store and the refresher, along with the platform default for the
//! data directory.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

/// Live storefront feed endpoint
pub const DEFAULT_API_URL: &str = "https://www.gog.com/games/ajax/filtered";

/// Cookie pinning the store region, currency and language
pub const DEFAULT_LOCALE_COOKIE: &str = "gog_lc=US_USD_en-US";

/// Accept-language header value matching the locale cookie
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US";

/// How long a fetched page stays fresh, in seconds
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Pause bounds between page fetches during a refresh, in milliseconds
pub const DEFAULT_PAGE_DELAY_MS: (u64, u64) = (1100, 1900);

/// Configuration for the catalog mirror
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Directory holding the persisted pages, metadata and product list
    pub data_dir: PathBuf,
    /// Age at which a persisted page or metadata record counts as stale
    pub refresh_interval: Duration,
    /// Base URL of the paginated feed endpoint
    pub api_url: String,
    /// Cookie sent with every feed request to pin the locale
    pub locale_cookie: String,
    /// Accept-language header sent with every feed request
    pub accept_language: String,
    /// Extra attempts per page during a refresh before the page is skipped
    pub page_retries: u32,
    /// Inclusive bounds for the randomized pause between page fetches
    pub page_delay_ms: (u64, u64),
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().unwrap_or_else(|| PathBuf::from("data")),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            api_url: DEFAULT_API_URL.to_string(),
            locale_cookie: DEFAULT_LOCALE_COOKIE.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            page_retries: 0,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
        }
    }
}

impl CatalogConfig {
    /// Creates a configuration rooted at the given data directory, keeping
    /// the defaults for everything else.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }
}

/// Returns the platform-appropriate data directory for the catalog mirror,
/// or `None` when no home directory can be determined.
pub fn default_data_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "gogcat", "gogcat").map(|dirs| dirs.data_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = CatalogConfig::default();

        assert_eq!(config.api_url, "https://www.gog.com/games/ajax/filtered");
        assert_eq!(config.locale_cookie, "gog_lc=US_USD_en-US");
        assert_eq!(config.accept_language, "en-US");
        assert_eq!(config.refresh_interval, Duration::from_secs(3600));
        assert_eq!(config.page_retries, 0);
        assert_eq!(config.page_delay_ms, (1100, 1900));
    }

    #[test]
    fn test_with_data_dir_keeps_defaults() {
        let config = CatalogConfig::with_data_dir(PathBuf::from("/tmp/catalog"));

        assert_eq!(config.data_dir, PathBuf::from("/tmp/catalog"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.refresh_interval.as_secs(), DEFAULT_REFRESH_INTERVAL_SECS);
    }
}
