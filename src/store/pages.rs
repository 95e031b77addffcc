//! Page store for persisting catalog documents to disk
//!
//! Provides a `PageStore` that keeps each catalog page, the catalog metadata
//! and the consolidated product list as JSON files under a single data
//! directory. Every write lands in a temporary file first and is renamed
//! into place, so readers only ever see complete documents.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::data::{CatalogMeta, Page, Product};

/// Subdirectory holding the per-page documents
const PAGES_DIR: &str = "pages";

/// File holding the catalog metadata record
const META_FILE: &str = "meta.json";

/// File holding the consolidated product list
const PRODUCTS_FILE: &str = "products.json";

/// Errors that can occur when reading or writing store documents
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem failure while reading or writing a document
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A document exists on disk but does not parse as its expected shape
    #[error("stored document is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Manages the on-disk layout of the catalog mirror.
///
/// The layout under the data directory is fixed: `pages/{n}.json` for each
/// fetched page, `meta.json` for the catalog metadata and `products.json`
/// for the consolidated product list. A missing document reads as
/// `Ok(None)`; a document that exists but cannot be parsed is an error.
#[derive(Debug, Clone)]
pub struct PageStore {
    /// Directory where the catalog documents are stored
    data_dir: PathBuf,
}

impl PageStore {
    /// Creates a new PageStore rooted at the given data directory.
    ///
    /// The directory is created lazily on first write, not here.
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Returns the path of the document for the given page number
    fn page_path(&self, page: u32) -> PathBuf {
        self.data_dir.join(PAGES_DIR).join(format!("{}.json", page))
    }

    /// Loads one page document.
    ///
    /// # Returns
    /// * `Ok(Some(Page))` if the page exists on disk and parses
    /// * `Ok(None)` if the page has never been stored
    /// * `Err(StoreError)` on I/O failure or a corrupt document
    pub fn load_page(&self, page: u32) -> Result<Option<Page>, StoreError> {
        self.read_json(&self.page_path(page))
    }

    /// Writes one page document, replacing any previous version atomically.
    pub fn save_page(&self, page: &Page) -> Result<(), StoreError> {
        self.write_json(&self.data_dir.join(PAGES_DIR), &format!("{}.json", page.page), page)
    }

    /// Loads the catalog metadata record, or `Ok(None)` if none exists yet.
    pub fn load_meta(&self) -> Result<Option<CatalogMeta>, StoreError> {
        self.read_json(&self.data_dir.join(META_FILE))
    }

    /// Writes the catalog metadata record atomically.
    pub fn save_meta(&self, meta: &CatalogMeta) -> Result<(), StoreError> {
        self.write_json(&self.data_dir, META_FILE, meta)
    }

    /// Loads the consolidated product list, or `Ok(None)` if none exists yet.
    pub fn load_products(&self) -> Result<Option<Vec<Product>>, StoreError> {
        self.read_json(&self.data_dir.join(PRODUCTS_FILE))
    }

    /// Writes the consolidated product list atomically.
    pub fn save_products(&self, products: &[Product]) -> Result<(), StoreError> {
        self.write_json(&self.data_dir, PRODUCTS_FILE, &products)
    }

    /// Reads and parses one JSON document, mapping a missing file to `None`
    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        let value = serde_json::from_str(&content)?;
        Ok(Some(value))
    }

    /// Serializes a document into a temporary file in the target directory
    /// and renames it over the final path, so a crash mid-write never leaves
    /// a truncated document behind.
    fn write_json<T: Serialize>(
        &self,
        dir: &Path,
        file_name: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        fs::create_dir_all(dir)?;

        let json = serde_json::to_string_pretty(value)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.persist(dir.join(file_name)).map_err(|e| e.error)?;

        Ok(())
    }
}
