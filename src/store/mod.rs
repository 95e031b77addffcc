//! On-disk persistence for catalog pages, metadata and the product list

pub mod pages;

pub use pages::{PageStore, StoreError};
