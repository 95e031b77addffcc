//! Full-catalog refresh orchestration
//!
//! A refresh walks the paginated feed from page 1 to the last known page,
//! persisting each page as it arrives and publishing the consolidated
//! product list and catalog metadata only once the walk finishes. Pages
//! that fail to fetch or arrive empty are skipped, so one bad response
//! cannot sink an otherwise good refresh.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::catalog::CatalogError;
use crate::config::CatalogConfig;
use crate::data::{current_time, CatalogMeta, GogClient, GogError, Product, RawPage};
use crate::store::PageStore;

/// How a refresh run ended
#[derive(Debug)]
pub enum RefreshOutcome {
    /// Every page was attempted and the consolidated list was published
    Completed { pages_fetched: u32, total_pages: u32 },
    /// Cancellation was requested mid-walk; nothing was published
    Cancelled { pages_fetched: u32, total_pages: u32 },
    /// Metadata could not be seeded; previously published state is untouched
    Aborted(AbortReason),
    /// Another refresh already held the refresh slot
    AlreadyRunning,
}

/// Why a refresh ended before walking the feed
#[derive(Debug)]
pub enum AbortReason {
    /// Page 1 could not be fetched or parsed
    BootstrapFetch(GogError),
    /// Page 1 parsed but carried no products
    NoProducts,
    /// Page 1 parsed but carried an incomplete set of catalog totals
    MissingTotals,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BootstrapFetch(e) => write!(f, "page 1 fetch failed: {}", e),
            Self::NoProducts => write!(f, "page 1 arrived without products"),
            Self::MissingTotals => write!(f, "page 1 carried no catalog totals"),
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                pages_fetched,
                total_pages,
            } => write!(f, "refreshed {}/{} pages", pages_fetched, total_pages),
            Self::Cancelled {
                pages_fetched,
                total_pages,
            } => write!(f, "cancelled after {}/{} pages", pages_fetched, total_pages),
            Self::Aborted(reason) => write!(f, "aborted: {}", reason),
            Self::AlreadyRunning => write!(f, "a refresh is already running"),
        }
    }
}

/// Runs one full refresh against the feed.
///
/// The page count comes from the stored metadata; when none exists yet, page
/// 1 is fetched once to seed it, and that page and the seeded metadata are
/// persisted before the walk begins. The walk then revisits every page
/// including page 1, bypassing the staleness check, and the consolidated
/// list publishes only at the end. The cancel flag is checked before each
/// page fetch. Store failures propagate; fetch failures become part of the
/// outcome.
pub(crate) async fn run(
    remote: &GogClient,
    store: &PageStore,
    config: &CatalogConfig,
    cancel: &AtomicBool,
) -> Result<RefreshOutcome, CatalogError> {
    let mut meta = match store.load_meta()? {
        Some(meta) => {
            debug!(total_pages = meta.total_pages, "reusing stored catalog meta");
            meta
        }
        None => match fetch_bootstrap_meta(remote).await {
            Ok((raw, meta)) => {
                store.save_page(&raw.into_page(1, meta.time))?;
                store.save_meta(&meta)?;
                info!(total_pages = meta.total_pages, "seeded catalog meta from page 1");
                meta
            }
            Err(reason) => {
                warn!(%reason, "refresh aborted");
                return Ok(RefreshOutcome::Aborted(reason));
            }
        },
    };

    let total_pages = meta.total_pages;
    info!(total_pages, "starting catalog refresh");

    let mut products: Vec<Product> = Vec::new();
    let mut pages_fetched = 0u32;

    for page_number in 1..=total_pages {
        if page_number > 1 {
            pause_between_fetches(config).await;
        }
        if cancel.load(Ordering::SeqCst) {
            info!(pages_fetched, total_pages, "refresh cancelled");
            return Ok(RefreshOutcome::Cancelled {
                pages_fetched,
                total_pages,
            });
        }

        let raw = match fetch_with_retries(remote, page_number, config).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(page = page_number, error = %e, "skipping page");
                continue;
            }
        };
        if raw.products.is_empty() {
            warn!(page = page_number, "page arrived empty, skipping");
            continue;
        }

        let page = raw.into_page(page_number, current_time());
        store.save_page(&page)?;
        products.extend(page.products);
        pages_fetched += 1;
    }

    products.sort_by(|a, b| a.slug.cmp(&b.slug));
    meta.time = current_time();

    store.save_products(&products)?;
    store.save_meta(&meta)?;

    info!(
        pages_fetched,
        total_pages,
        products = products.len(),
        "catalog refresh published"
    );
    Ok(RefreshOutcome::Completed {
        pages_fetched,
        total_pages,
    })
}

/// Fetches page 1 and derives the catalog metadata from its totals.
///
/// Nothing is persisted here; the caller commits the page and the metadata
/// together once both exist.
async fn fetch_bootstrap_meta(remote: &GogClient) -> Result<(RawPage, CatalogMeta), AbortReason> {
    let raw = remote
        .fetch_page(1)
        .await
        .map_err(AbortReason::BootstrapFetch)?;
    if raw.products.is_empty() {
        return Err(AbortReason::NoProducts);
    }
    let meta = raw
        .catalog_meta(current_time())
        .ok_or(AbortReason::MissingTotals)?;
    Ok((raw, meta))
}

/// Fetches one page, retrying up to the configured number of extra attempts
/// with a pacing pause before each retry
async fn fetch_with_retries(
    remote: &GogClient,
    page: u32,
    config: &CatalogConfig,
) -> Result<RawPage, GogError> {
    let mut attempt = 0;
    loop {
        match remote.fetch_page(page).await {
            Ok(raw) => return Ok(raw),
            Err(e) if attempt < config.page_retries => {
                attempt += 1;
                warn!(page, attempt, error = %e, "page fetch failed, retrying");
                pause_between_fetches(config).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Sleeps a randomized interval so the walk does not hammer the feed
async fn pause_between_fetches(config: &CatalogConfig) {
    let (min_ms, max_ms) = config.page_delay_ms;
    let upper = max_ms.max(min_ms);
    if upper == 0 {
        return;
    }

    // ThreadRng is not Send, so the pause is drawn before the await
    let pause_ms = rand::thread_rng().gen_range(min_ms..=upper);
    sleep(Duration::from_millis(pause_ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Price;
    use chrono::Utc;
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn product_json(slug: &str) -> String {
        format!(
            r#"{{"slug":"{slug}","title":"{slug}","price":{{"amount":"9.99","baseAmount":"9.99","discount":0}},"rating":40}}"#
        )
    }

    fn page_body(slugs: &[&str], total_pages: u32) -> String {
        let products: Vec<String> = slugs.iter().map(|s| product_json(s)).collect();
        format!(
            r#"{{"products":[{}],"ts":1690000123,"totalPages":{},"totalResults":6,"totalGamesFound":5,"totalMoviesFound":1}}"#,
            products.join(","),
            total_pages
        )
    }

    fn sample_product(slug: &str) -> Product {
        Product {
            slug: slug.to_string(),
            title: slug.replace('_', " "),
            price: Price {
                amount: "9.99".to_string(),
                discount: 0,
            },
            rating: 40.0,
        }
    }

    fn sample_meta(total_pages: u32) -> CatalogMeta {
        CatalogMeta {
            time: Utc::now(),
            total_games: 5,
            total_movies: 1,
            total_pages,
            total_products: 6,
        }
    }

    fn test_setup(server: &MockServer) -> (CatalogConfig, GogClient, PageStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = CatalogConfig {
            data_dir: temp_dir.path().to_path_buf(),
            api_url: server.url("/games/ajax/filtered"),
            page_delay_ms: (0, 0),
            ..CatalogConfig::default()
        };
        let remote = GogClient::new(&config);
        let store = PageStore::new(config.data_dir.clone());
        (config, remote, store, temp_dir)
    }

    fn mock_page<'a>(server: &'a MockServer, page: u32, body: String) -> httpmock::Mock<'a> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/games/ajax/filtered")
                .query_param("page", page.to_string());
            then.status(200)
                .header("content-type", "application/json")
                .body(body);
        })
    }

    fn mock_failing_page<'a>(server: &'a MockServer, page: u32) -> httpmock::Mock<'a> {
        server.mock(|when, then| {
            when.method(GET)
                .path("/games/ajax/filtered")
                .query_param("page", page.to_string());
            then.status(500);
        })
    }

    #[tokio::test]
    async fn test_first_refresh_seeds_meta_and_walks_all_pages() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        let page1 = mock_page(&server, 1, page_body(&["witcher", "cyberpunk"], 3));
        mock_page(&server, 2, page_body(&["baldur", "outer_wilds"], 3));
        mock_page(&server, 3, page_body(&["alan_wake", "zort"], 3));

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Refresh should succeed");

        match outcome {
            RefreshOutcome::Completed {
                pages_fetched,
                total_pages,
            } => {
                assert_eq!(pages_fetched, 3);
                assert_eq!(total_pages, 3);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }

        // Page 1 serves the metadata seed and its own walk step
        assert_eq!(page1.hits(), 2);

        let products = store
            .load_products()
            .expect("Load should succeed")
            .expect("Products should be published");
        let slugs: Vec<&str> = products.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec!["alan_wake", "baldur", "cyberpunk", "outer_wilds", "witcher", "zort"],
            "Consolidated list should be slug-sorted across pages"
        );

        let meta = store
            .load_meta()
            .expect("Load should succeed")
            .expect("Meta should be published");
        assert_eq!(meta.total_pages, 3);
        assert_eq!(meta.total_products, 6);

        for page_number in 1..=3 {
            assert!(
                store
                    .load_page(page_number)
                    .expect("Load should succeed")
                    .is_some(),
                "Page {} should be on disk",
                page_number
            );
        }
    }

    #[tokio::test]
    async fn test_refresh_reuses_stored_meta_without_reseeding() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);
        store.save_meta(&sample_meta(2)).expect("Save should succeed");

        // The walk pages carry no totals; only a seed would need them
        let page1 = mock_page(&server, 1, r#"{"products":[{"slug":"witcher","title":"witcher","price":{"amount":"9.99","discount":0},"rating":40}]}"#.to_string());
        mock_page(&server, 2, r#"{"products":[{"slug":"zort","title":"zort","price":{"amount":"9.99","discount":0},"rating":40}]}"#.to_string());

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Refresh should succeed");

        assert!(matches!(
            outcome,
            RefreshOutcome::Completed {
                pages_fetched: 2,
                total_pages: 2
            }
        ));
        assert_eq!(page1.hits(), 1, "Stored meta makes the seed fetch unnecessary");

        let meta = store
            .load_meta()
            .expect("Load should succeed")
            .expect("Meta should exist");
        assert_eq!(meta.total_pages, 2, "Totals carry over from the stored meta");
    }

    #[tokio::test]
    async fn test_refresh_skips_failed_pages() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        mock_page(&server, 1, page_body(&["witcher"], 3));
        mock_failing_page(&server, 2);
        mock_page(&server, 3, page_body(&["zort"], 3));

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Refresh should succeed");

        match outcome {
            RefreshOutcome::Completed {
                pages_fetched,
                total_pages,
            } => {
                assert_eq!(pages_fetched, 2, "The failed page does not count");
                assert_eq!(total_pages, 3);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }

        let products = store
            .load_products()
            .expect("Load should succeed")
            .expect("Products should be published");
        let slugs: Vec<&str> = products.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["witcher", "zort"]);

        assert!(
            store.load_page(2).expect("Load should succeed").is_none(),
            "The skipped page should not be on disk"
        );
    }

    #[tokio::test]
    async fn test_refresh_skips_empty_pages() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);
        store.save_meta(&sample_meta(2)).expect("Save should succeed");

        mock_page(&server, 1, page_body(&["witcher"], 2));
        mock_page(&server, 2, r#"{"products":[]}"#.to_string());

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Refresh should succeed");

        assert!(matches!(
            outcome,
            RefreshOutcome::Completed {
                pages_fetched: 1,
                total_pages: 2
            }
        ));
        assert!(
            store.load_page(2).expect("Load should succeed").is_none(),
            "An empty page is never persisted"
        );
    }

    #[tokio::test]
    async fn test_refresh_aborts_when_bootstrap_fails() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        mock_failing_page(&server, 1);

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Abort is an outcome, not an error");

        match outcome {
            RefreshOutcome::Aborted(AbortReason::BootstrapFetch(GogError::BadStatus(status))) => {
                assert_eq!(status.as_u16(), 500);
            }
            other => panic!("Expected BootstrapFetch abort, got {:?}", other),
        }

        assert!(store.load_meta().expect("Load should succeed").is_none());
        assert!(store.load_products().expect("Load should succeed").is_none());
        assert!(store.load_page(1).expect("Load should succeed").is_none());
    }

    #[tokio::test]
    async fn test_refresh_aborts_when_bootstrap_page_is_empty() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        mock_page(&server, 1, r#"{"products":[],"totalPages":3}"#.to_string());

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Abort is an outcome, not an error");

        assert!(matches!(
            outcome,
            RefreshOutcome::Aborted(AbortReason::NoProducts)
        ));
        assert!(store.load_meta().expect("Load should succeed").is_none());
    }

    #[tokio::test]
    async fn test_refresh_aborts_when_totals_missing() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        mock_page(
            &server,
            1,
            format!(r#"{{"products":[{}]}}"#, product_json("witcher")),
        );

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Abort is an outcome, not an error");

        assert!(matches!(
            outcome,
            RefreshOutcome::Aborted(AbortReason::MissingTotals)
        ));
        assert!(store.load_meta().expect("Load should succeed").is_none());
        assert!(
            store.load_page(1).expect("Load should succeed").is_none(),
            "No partial seed state is committed"
        );
    }

    #[tokio::test]
    async fn test_bootstrap_abort_preserves_previous_products() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);

        // A published list without meta: only the seed path can run, and fails
        store
            .save_products(&[sample_product("witcher")])
            .expect("Save should succeed");
        mock_failing_page(&server, 1);

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Abort is an outcome, not an error");

        assert!(matches!(outcome, RefreshOutcome::Aborted(_)));

        let products = store
            .load_products()
            .expect("Load should succeed")
            .expect("Previous list should survive");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].slug, "witcher");
    }

    #[tokio::test]
    async fn test_refresh_retries_failed_pages() {
        let server = MockServer::start();
        let (mut config, remote, store, _temp_dir) = test_setup(&server);
        config.page_retries = 2;

        mock_page(&server, 1, page_body(&["witcher"], 2));
        let failing = mock_failing_page(&server, 2);

        let cancel = AtomicBool::new(false);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Refresh should succeed");

        assert!(matches!(
            outcome,
            RefreshOutcome::Completed {
                pages_fetched: 1,
                total_pages: 2
            }
        ));
        assert_eq!(failing.hits(), 3, "One initial attempt plus two retries");
    }

    #[tokio::test]
    async fn test_cancel_requested_before_walk_publishes_nothing() {
        let server = MockServer::start();
        let (config, remote, store, _temp_dir) = test_setup(&server);
        store.save_meta(&sample_meta(3)).expect("Save should succeed");

        let page1 = mock_page(&server, 1, page_body(&["witcher"], 3));

        let cancel = AtomicBool::new(true);
        let outcome = run(&remote, &store, &config, &cancel)
            .await
            .expect("Cancel is an outcome, not an error");

        match outcome {
            RefreshOutcome::Cancelled {
                pages_fetched,
                total_pages,
            } => {
                assert_eq!(pages_fetched, 0);
                assert_eq!(total_pages, 3);
            }
            other => panic!("Expected Cancelled, got {:?}", other),
        }

        assert_eq!(page1.hits(), 0, "The walk never starts");
        assert!(store.load_products().expect("Load should succeed").is_none());
    }
}
