//! GOG Catalog Mirror - browse a local copy of the storefront catalog
//!
//! Reads serve from the on-disk mirror and only touch the network when a
//! document is missing or stale. The refresh subcommand walks the whole
//! feed and republishes the consolidated product list.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gogcat::catalog::Catalog;
use gogcat::cli::{Cli, Command};
use gogcat::data::{CatalogMeta, Product};
use gogcat::query::{self, SortKey};
use gogcat::refresh::RefreshOutcome;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let catalog = Catalog::new(cli.catalog_config());

    match cli.command {
        Command::Products { sort } => {
            let key = SortKey::parse(&sort);
            match catalog.get_sorted_products(key).await? {
                Some(products) => print_products(&products),
                None => println!("no catalog data yet; run `gogcat refresh` first"),
            }
        }
        Command::Search { query, sort } => {
            let key = SortKey::parse(&sort);
            match catalog.search_products(&query).await? {
                Some(hits) if hits.is_empty() => println!("no products match '{}'", query),
                Some(mut hits) => {
                    query::sort_products(&mut hits, key);
                    print_products(&hits);
                }
                None => println!("no catalog data yet; run `gogcat refresh` first"),
            }
        }
        Command::Show { slug } => match catalog.get_product_by_slug(&slug)? {
            Some(product) => println!("{}", serde_json::to_string_pretty(&product)?),
            None => println!("no product with slug '{}'", slug),
        },
        Command::Page { number } => match catalog.get_page(number).await? {
            Some(page) => println!("{}", serde_json::to_string_pretty(&page)?),
            None => println!("page {} is unavailable", number),
        },
        Command::Meta => match catalog.get_meta()? {
            Some(meta) => print_meta(&meta),
            None => println!("no catalog metadata yet; run `gogcat refresh` first"),
        },
        Command::Refresh => run_refresh(catalog).await?,
    }

    Ok(())
}

/// Runs a foreground refresh, turning ctrl-c into a cancel request so the
/// walk stops before its next page instead of dying mid-write.
async fn run_refresh(catalog: Catalog) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(catalog);
    let mut handle = match catalog.enqueue_refresh() {
        Some(handle) => handle,
        None => {
            println!("{}", RefreshOutcome::AlreadyRunning);
            return Ok(());
        }
    };
    println!("refreshing catalog in {}", catalog.config().data_dir.display());

    let outcome = tokio::select! {
        joined = &mut handle => joined??,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("stopping after the current page...");
            catalog.request_cancel();
            handle.await??
        }
    };

    println!("{}", outcome);
    Ok(())
}

/// Prints one product per line with price, discount and rating columns
fn print_products(products: &[Product]) {
    for product in products {
        println!(
            "{:<45} {:>9} {:>4}%  {:>5.1}  {}",
            truncate(&product.title, 45),
            product.price.amount,
            product.price.discount,
            product.rating,
            product.slug
        );
    }
    println!("({} products)", products.len());
}

fn print_meta(meta: &CatalogMeta) {
    println!("published:      {}", meta.time);
    println!("total products: {}", meta.total_products);
    println!("total games:    {}", meta.total_games);
    println!("total movies:   {}", meta.total_movies);
    println!("total pages:    {}", meta.total_pages);
}

/// Clips long titles so the table columns stay aligned
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let clipped: String = text.chars().take(max - 3).collect();
        format!("{}...", clipped)
    }
}
