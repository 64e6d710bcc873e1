use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// How long a fetched collection stays fresh
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Collections the search cache keeps locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Listings,
    Complexes,
    Categories,
    /// Landing page sections built from curated categories
    CuratedSections,
}

impl ResourceKind {
    pub const ALL: [Self; 4] = [
        Self::Listings,
        Self::Complexes,
        Self::Categories,
        Self::CuratedSections,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Listings => "listings",
            Self::Complexes => "complexes",
            Self::Categories => "categories",
            Self::CuratedSections => "curated sections",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fetch timestamp of one cached resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry<K = ResourceKind> {
    pub kind: K,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl<K> CacheEntry<K> {
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            last_fetched_at: None,
        }
    }

    /// An entry is stale when it was never fetched, or strictly more than
    /// `ttl` has passed since the last fetch.
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let Some(fetched_at) = self.last_fetched_at else {
            return true;
        };
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now - fetched_at > ttl,
            // a TTL too large for chrono never expires
            Err(_) => false,
        }
    }

    pub fn stamp(&mut self, at: DateTime<Utc>) {
        self.last_fetched_at = Some(at);
    }

    pub fn invalidate(&mut self) {
        self.last_fetched_at = None;
    }
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
