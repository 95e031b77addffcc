//! GOG Catalog Mirror Library
//!
//! This module exposes the catalog, query and store modules for use by the
//! CLI binary and the integration tests.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod query;
pub mod refresh;
pub mod store;
