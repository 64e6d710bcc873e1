use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use listing_scout::models::ListingSummary;
use listing_scout::{
    logging, Config, FilterPatch, FilterStore, HttpListingService, ResourceKind, SearchCache,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "listing-scout", about = "Search and browse real-estate listings")]
struct Args {
    /// Configuration file (extension selects the format)
    #[arg(short, long, default_value = "listing-scout")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search listings with the saved filters plus any given here
    Search {
        /// Free-text query
        query: Option<String>,

        /// Filter as `field=value`, e.g. `minPrice=2000000` or `parks=true`
        #[arg(short, long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        #[arg(short, long)]
        page: Option<usize>,

        /// Results per page
        #[arg(short, long)]
        limit: Option<usize>,

        /// Start from the default filters instead of the saved ones
        #[arg(long)]
        reset: bool,

        /// Also write every result to this JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Curated landing page sections
    Sections,
    /// Residential complexes
    Complexes,
    /// Listing categories
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config).context("Failed to load configuration")?;
    logging::init(&config.log)?;

    info!("🏠 Listing Scout");
    info!("Backend: {}", config.api.base_url);

    let service = HttpListingService::new(&config.api)?;
    let mut cache = SearchCache::with_config(service, &config.cache);
    if !config.storage.disabled {
        cache = cache.with_store(FilterStore::new(&config.storage.filters_path));
    }

    match args.command {
        Command::Search {
            query,
            filters,
            page,
            limit,
            reset,
            output,
        } => {
            if reset {
                cache.reset_filters();
            }
            let mut pairs = Vec::new();
            for filter in &filters {
                let Some(pair) = filter.split_once('=') else {
                    bail!("Filter '{}' is not of the form field=value", filter);
                };
                pairs.push(pair);
            }
            if let Some(query) = &query {
                pairs.push(("query", query.as_str()));
            }
            let patch = FilterPatch::from_form(pairs);
            if !patch.is_empty() {
                cache.set_filters(patch);
            }
            if let Some(limit) = limit {
                cache.set_limit(limit);
            }

            cache.search(page).await;
            if let Some(error) = cache.search_error() {
                bail!("Search failed: {}", error);
            }

            let view = cache.view();
            if view.total_results == 0 {
                println!("No listings match the current filters.");
            }
            let offset = (view.current_page - 1) * view.limit;
            for (i, listing) in view.results.iter().enumerate() {
                print_listing(offset + i + 1, listing);
            }
            println!(
                "Page {}/{} ({} listings)",
                view.current_page, view.total_pages, view.total_results
            );

            if let Some(path) = output {
                let json = serde_json::to_string_pretty(&cache.all_results())?;
                tokio::fs::write(&path, json).await?;
                info!("💾 Saved {} listings to {}", view.total_results, path.display());
            }
        }
        Command::Sections => {
            cache.load_resource(ResourceKind::CuratedSections, true).await;
            fail_on_load_error(&cache)?;
            for section in cache.sections() {
                println!("== {} ({} listings)", section.category.name, section.listings.len());
                for (i, listing) in section.listings.iter().enumerate() {
                    print_listing(i + 1, listing);
                }
            }
        }
        Command::Complexes => {
            cache.load_resource(ResourceKind::Complexes, true).await;
            fail_on_load_error(&cache)?;
            for complex in cache.complexes() {
                println!("{} ({})", complex.name, complex.id);
                if let Some(address) = &complex.address {
                    println!("   {}", address);
                }
            }
        }
        Command::Categories => {
            cache.load_resource(ResourceKind::Categories, true).await;
            fail_on_load_error(&cache)?;
            for category in cache.categories() {
                let marker = if category.show_on_home { " *" } else { "" };
                println!("{} ({}){}", category.name, category.id, marker);
            }
        }
    }

    Ok(())
}

fn fail_on_load_error(cache: &SearchCache<HttpListingService>) -> anyhow::Result<()> {
    match cache.error() {
        Some(error) => bail!("Loading failed: {}", error),
        None => Ok(()),
    }
}

fn print_listing(position: usize, listing: &ListingSummary) {
    let price = listing
        .price
        .map(|p| format!("{p:.0}"))
        .unwrap_or_else(|| "price on request".to_string());
    println!("{}. {} ({})", position, listing.title, price);
    let rooms = listing.rooms.map(|r| r.to_string()).unwrap_or_else(|| "?".into());
    let area = listing.area.map(|a| format!("{a:.0}")).unwrap_or_else(|| "?".into());
    println!("   {} rooms, {} m²", rooms, area);
    if let Some(complex) = &listing.complex {
        println!("   Complex: {}", complex.name.as_deref().unwrap_or(&complex.id));
    }
    println!("   ID: {}", listing.id);
    if let Some(image) = listing.images.first() {
        println!("   Image: {}", image);
    }
    println!();
}
