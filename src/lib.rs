//! Client side search, filtering, paging and caching of real-estate
//! listings served by a REST backend.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use api::{HttpListingService, ListingQueryService};
pub use cache::{ResourceKind, SearchCache, SearchView};
pub use config::Config;
pub use error::ApiError;
pub use models::{FilterCriteria, FilterPatch, ListingSummary};
pub use storage::FilterStore;
