//! Catalog handle tying the remote client, the page store and the refresher
//! together
//!
//! All reads prefer the on-disk mirror and only touch the network when a
//! document is missing or has outlived the refresh interval. At most one
//! full refresh runs at a time; triggers that arrive while one is in flight
//! are ignored rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::CatalogConfig;
use crate::data::{current_time, CatalogMeta, GogClient, Page, Product};
use crate::query::{self, SortKey};
use crate::refresh::{self, RefreshOutcome};
use crate::store::{PageStore, StoreError};

/// Errors surfaced by catalog operations
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The on-disk store failed underneath a read or a publish
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Releases the refresh slot when dropped, so the slot frees on every exit
/// path out of a refresh, panics included.
struct RefreshSlot {
    flag: Arc<AtomicBool>,
}

impl Drop for RefreshSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Local mirror of the storefront catalog.
///
/// Wraps the feed client and the page store behind a read surface that
/// favors disk, plus refresh orchestration. Clone-free sharing happens
/// through `Arc<Catalog>`; the refresh slot and the cancel flag are the
/// only mutable state.
pub struct Catalog {
    config: CatalogConfig,
    remote: GogClient,
    store: PageStore,
    refresh_inflight: Arc<AtomicBool>,
    cancel_requested: Arc<AtomicBool>,
}

impl Catalog {
    /// Creates a catalog handle from the given configuration.
    pub fn new(config: CatalogConfig) -> Self {
        let remote = GogClient::new(&config);
        let store = PageStore::new(config.data_dir.clone());
        Self {
            config,
            remote,
            store,
            refresh_inflight: Arc::new(AtomicBool::new(false)),
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the configuration this catalog was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Whether a stored timestamp has outlived the refresh interval.
    ///
    /// A document exactly as old as the interval counts as stale.
    fn is_stale(&self, time: DateTime<Utc>) -> bool {
        let age = Utc::now().signed_duration_since(time);
        age.num_seconds() >= self.config.refresh_interval.as_secs() as i64
    }

    /// Returns one catalog page, serving from disk while fresh.
    ///
    /// A missing, corrupt or stale copy triggers a single live fetch whose
    /// result is persisted before it is returned. When that fetch fails or
    /// arrives without products there is nothing current to serve, so
    /// whatever copy is on disk stays there unserved.
    ///
    /// # Returns
    /// * `Ok(Some(Page))` - A fresh page, from disk or just fetched
    /// * `Ok(None)` - No fresh page; the live fetch failed or was empty
    /// * `Err(CatalogError)` - The store itself failed
    pub async fn get_page(&self, page: u32) -> Result<Option<Page>, CatalogError> {
        let stored = match self.store.load_page(page) {
            Ok(stored) => stored,
            Err(StoreError::Malformed(e)) => {
                warn!(page, error = %e, "corrupt stored page, treating as missing");
                None
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(stored) = stored {
            if !self.is_stale(stored.time) {
                return Ok(Some(stored));
            }
            debug!(page, "stored page is stale, refetching");
        }

        match self.remote.fetch_page(page).await {
            Ok(raw) if raw.products.is_empty() => {
                warn!(page, "page arrived empty, nothing fresh to serve");
                Ok(None)
            }
            Ok(raw) => {
                let fresh = raw.into_page(page, current_time());
                self.store.save_page(&fresh)?;
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!(page, error = %e, "page fetch failed, nothing fresh to serve");
                Ok(None)
            }
        }
    }

    /// Returns the consolidated product list.
    ///
    /// The list is slug-ordered once a full refresh has published it. When
    /// none exists yet, page 1 is read through the staleness path and its
    /// products, still in feed order, seed the list so first-time reads
    /// have something to show before the first full refresh.
    pub async fn get_products(&self) -> Result<Option<Vec<Product>>, CatalogError> {
        if let Some(products) = self.store.load_products()? {
            return Ok(Some(products));
        }

        debug!("no product list yet, seeding from page 1");
        let page = match self.get_page(1).await? {
            Some(page) => page,
            None => return Ok(None),
        };

        self.store.save_products(&page.products)?;
        Ok(Some(page.products))
    }

    /// Returns the products whose title matches the query,
    /// case-insensitively, in the published list's order.
    pub async fn search_products(&self, query: &str) -> Result<Option<Vec<Product>>, CatalogError> {
        let products = match self.get_products().await? {
            Some(products) => products,
            None => return Ok(None),
        };
        Ok(Some(query::search_products(&products, query)))
    }

    /// Returns the consolidated product list ordered by the given key.
    pub async fn get_sorted_products(
        &self,
        key: SortKey,
    ) -> Result<Option<Vec<Product>>, CatalogError> {
        let mut products = match self.get_products().await? {
            Some(products) => products,
            None => return Ok(None),
        };
        query::sort_products(&mut products, key);
        Ok(Some(products))
    }

    /// Looks one product up by slug in the published list.
    ///
    /// Reads the store only; an unpublished list or an unknown slug both
    /// read as absence.
    pub fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, CatalogError> {
        let products = match self.store.load_products()? {
            Some(products) => products,
            None => return Ok(None),
        };
        Ok(products.into_iter().find(|p| p.slug == slug))
    }

    /// Returns the published catalog metadata, if any refresh has completed.
    pub fn get_meta(&self) -> Result<Option<CatalogMeta>, CatalogError> {
        Ok(self.store.load_meta()?)
    }

    /// Whether a full refresh is currently in flight.
    pub fn is_refreshing(&self) -> bool {
        self.refresh_inflight.load(Ordering::SeqCst)
    }

    /// Asks the in-flight refresh to stop before its next page fetch.
    ///
    /// Has no lasting effect when nothing is running: claiming the slot
    /// clears any leftover request.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Runs a full refresh on the current task.
    ///
    /// Returns [`RefreshOutcome::AlreadyRunning`] without touching the
    /// network when another refresh holds the slot.
    pub async fn refresh_all(&self) -> Result<RefreshOutcome, CatalogError> {
        let _slot = match self.claim_refresh_slot() {
            Some(slot) => slot,
            None => return Ok(RefreshOutcome::AlreadyRunning),
        };
        refresh::run(&self.remote, &self.store, &self.config, &self.cancel_requested).await
    }

    /// Starts a full refresh on a background task.
    ///
    /// The slot is claimed before this returns, so two callers racing here
    /// see exactly one `Some`. `None` means a refresh was already in
    /// flight and no work was scheduled.
    pub fn enqueue_refresh(
        self: &Arc<Self>,
    ) -> Option<JoinHandle<Result<RefreshOutcome, CatalogError>>> {
        let slot = self.claim_refresh_slot()?;
        let catalog = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _slot = slot;
            refresh::run(
                &catalog.remote,
                &catalog.store,
                &catalog.config,
                &catalog.cancel_requested,
            )
            .await
        }))
    }

    /// Claims the single refresh slot, or returns `None` if it is taken.
    ///
    /// Claiming also clears any cancel request left over from a previous
    /// run, so stale requests cannot kill a new refresh.
    fn claim_refresh_slot(&self) -> Option<RefreshSlot> {
        self.refresh_inflight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.cancel_requested.store(false, Ordering::SeqCst);
        Some(RefreshSlot {
            flag: Arc::clone(&self.refresh_inflight),
        })
    }
}
