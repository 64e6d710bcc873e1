use crate::models::{Category, Complex, FilterCriteria, ListingSummary};
use anyhow::Result;
use async_trait::async_trait;

/// Backend the search cache reads listings from.
/// Lets the cache run against the REST API or an in-process stand-in.
#[async_trait]
pub trait ListingQueryService: Send + Sync {
    /// Run a search. The backend returns every match; paging is done client side.
    async fn search(&self, criteria: &FilterCriteria) -> Result<Vec<ListingSummary>>;

    /// Unfiltered listing collection
    async fn listings(&self) -> Result<Vec<ListingSummary>>;

    async fn complexes(&self) -> Result<Vec<Complex>>;

    async fn categories(&self) -> Result<Vec<Category>>;

    /// Listings filed under one curated category
    async fn listings_in_category(&self, category_id: &str) -> Result<Vec<ListingSummary>>;

    /// Whether requests are made on behalf of a signed-in user
    fn is_authenticated(&self) -> bool;
}
