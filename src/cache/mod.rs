pub mod entry;
pub mod pagination;
pub mod search;

pub use entry::{CacheEntry, Clock, ResourceKind, SystemClock, DEFAULT_TTL};
pub use pagination::Pagination;
pub use search::{SearchCache, SearchView};
