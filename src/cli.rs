//! Command-line interface parsing for the catalog mirror
//!
//! This module handles parsing of CLI arguments using clap: one subcommand
//! per catalog view plus the refresh trigger, with shared options for the
//! data directory and the refresh interval.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::CatalogConfig;

/// GOG catalog mirror - browse and refresh a local copy of the storefront
#[derive(Parser, Debug)]
#[command(name = "gogcat")]
#[command(about = "Local mirror of the GOG.com product catalog")]
#[command(version)]
pub struct Cli {
    /// Directory for the persisted catalog (defaults to the platform data dir)
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Seconds a fetched page stays fresh
    #[arg(long, value_name = "SECONDS", global = true)]
    pub interval: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Catalog operations
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every product in the published catalog
    Products {
        /// Ordering: discount, price, rating or title
        #[arg(long, value_name = "KEY", default_value = "title")]
        sort: String,
    },
    /// List products whose title contains the query
    Search {
        /// Case-insensitive title substring
        query: String,
        /// Ordering: discount, price, rating or title
        #[arg(long, value_name = "KEY", default_value = "title")]
        sort: String,
    },
    /// Show one product by its slug
    Show {
        /// Product slug, e.g. the_witcher_3
        slug: String,
    },
    /// Show one catalog page, fetching it if missing or stale
    Page {
        /// Page number, starting at 1
        number: u32,
    },
    /// Show the published catalog metadata
    Meta,
    /// Walk the whole feed and republish the catalog
    Refresh,
}

impl Cli {
    /// Builds the catalog configuration from the shared options.
    ///
    /// Options not given on the command line keep their defaults, including
    /// the platform data directory.
    pub fn catalog_config(&self) -> CatalogConfig {
        let mut config = match &self.data_dir {
            Some(dir) => CatalogConfig::with_data_dir(dir.clone()),
            None => CatalogConfig::default(),
        };
        if let Some(secs) = self.interval {
            config.refresh_interval = Duration::from_secs(secs);
        }
        config
    }
}
