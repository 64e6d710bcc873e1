use crate::api::ListingQueryService;
use crate::cache::entry::{CacheEntry, Clock, ResourceKind, SystemClock};
use crate::cache::pagination::Pagination;
use crate::config::CacheConfig;
use crate::models::{
    visible, Category, Complex, CuratedSection, FilterCriteria, FilterPatch, ListingSummary,
};
use crate::storage::{FilterStore, SavedFilters};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Snapshot of the search state a UI renders from
#[derive(Debug, Clone, PartialEq)]
pub struct SearchView {
    /// Results on the current page
    pub results: Vec<ListingSummary>,
    pub is_searching: bool,
    pub search_error: Option<String>,
    pub has_searched: bool,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_results: usize,
    pub limit: usize,
    /// Last collection load failure
    pub error: Option<String>,
}

struct State {
    criteria: FilterCriteria,
    results: Vec<ListingSummary>,
    pagination: Pagination,
    is_searching: bool,
    search_error: Option<String>,
    has_searched: bool,
    listings: Vec<ListingSummary>,
    complexes: Vec<Complex>,
    categories: Vec<Category>,
    sections: Vec<CuratedSection>,
    entries: HashMap<ResourceKind, CacheEntry>,
    /// Bumped by every invalidation; a load only stamps its entry when the
    /// generation is unchanged since the fetch started.
    generations: HashMap<ResourceKind, u64>,
    load_error: Option<(ResourceKind, String)>,
}

impl State {
    fn new(limit: usize) -> Self {
        Self {
            criteria: FilterCriteria::baseline(),
            results: Vec::new(),
            pagination: Pagination::new(limit),
            is_searching: false,
            search_error: None,
            has_searched: false,
            listings: Vec::new(),
            complexes: Vec::new(),
            categories: Vec::new(),
            sections: Vec::new(),
            entries: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, CacheEntry::new(kind)))
                .collect(),
            generations: HashMap::new(),
            load_error: None,
        }
    }

    fn entry(&self, kind: ResourceKind) -> CacheEntry {
        self.entries
            .get(&kind)
            .copied()
            .unwrap_or_else(|| CacheEntry::new(kind))
    }

    fn generation(&self, kind: ResourceKind) -> u64 {
        self.generations.get(&kind).copied().unwrap_or_default()
    }

    fn view(&self) -> SearchView {
        SearchView {
            results: self.pagination.slice(&self.results).to_vec(),
            is_searching: self.is_searching,
            search_error: self.search_error.clone(),
            has_searched: self.has_searched,
            current_page: self.pagination.page(),
            total_pages: self.pagination.total_pages(),
            total_results: self.pagination.total_results(),
            limit: self.pagination.limit(),
            error: self.load_error.as_ref().map(|(_, message)| message.clone()),
        }
    }
}

enum Loaded {
    Listings(Vec<ListingSummary>),
    Complexes(Vec<Complex>),
    Categories(Vec<Category>),
    Sections(Vec<(Category, Vec<ListingSummary>)>),
}

/// Filter state, search results and TTL-cached collections backed by a
/// [`ListingQueryService`].
///
/// Service failures never escape: they are stored as `search_error` /
/// `error` strings and previously loaded data is kept. Every state change
/// is broadcast as a [`SearchView`] to [`subscribe`](Self::subscribe)rs.
pub struct SearchCache<S> {
    service: S,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    request_timeout: Duration,
    store: Option<FilterStore>,
    state: Mutex<State>,
    latest_search: AtomicU64,
    updates: watch::Sender<SearchView>,
}

impl<S: ListingQueryService> SearchCache<S> {
    pub fn new(service: S) -> Self {
        Self::with_config(service, &CacheConfig::default())
    }

    pub fn with_config(service: S, config: &CacheConfig) -> Self {
        let state = State::new(config.page_size);
        let (updates, _) = watch::channel(state.view());
        Self {
            service,
            clock: Arc::new(SystemClock),
            ttl: config.ttl,
            request_timeout: config.request_timeout,
            store: None,
            state: Mutex::new(state),
            latest_search: AtomicU64::new(0),
            updates,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attaches persistent storage for criteria and page size, restoring
    /// whatever was saved there before.
    pub fn with_store(mut self, store: FilterStore) -> Self {
        {
            let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
            match store.load() {
                Ok(Some(saved)) => {
                    debug!("Restored search filters from {}", store.path().display());
                    state.criteria = saved.criteria;
                    state.pagination.set_limit(saved.limit);
                }
                Ok(None) => {}
                Err(e) => warn!("Ignoring saved search filters: {:#}", e),
            }
        }
        self.store = Some(store);
        let view = self.lock().view();
        self.updates.send_replace(view);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Receiver of state snapshots
    pub fn subscribe(&self) -> watch::Receiver<SearchView> {
        self.updates.subscribe()
    }

    pub fn view(&self) -> SearchView {
        self.lock().view()
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.lock().criteria.clone()
    }

    /// Results on the current page
    pub fn search_results(&self) -> Vec<ListingSummary> {
        let state = self.lock();
        state.pagination.slice(&state.results).to_vec()
    }

    /// Every visible result of the last successful search
    pub fn all_results(&self) -> Vec<ListingSummary> {
        self.lock().results.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.lock().is_searching
    }

    pub fn search_error(&self) -> Option<String> {
        self.lock().search_error.clone()
    }

    pub fn has_searched(&self) -> bool {
        self.lock().has_searched
    }

    pub fn current_page(&self) -> usize {
        self.lock().pagination.page()
    }

    pub fn total_pages(&self) -> usize {
        self.lock().pagination.total_pages()
    }

    pub fn total_results(&self) -> usize {
        self.lock().pagination.total_results()
    }

    pub fn limit(&self) -> usize {
        self.lock().pagination.limit()
    }

    pub fn listings(&self) -> Vec<ListingSummary> {
        self.lock().listings.clone()
    }

    pub fn complexes(&self) -> Vec<Complex> {
        self.lock().complexes.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock().categories.clone()
    }

    pub fn sections(&self) -> Vec<CuratedSection> {
        self.lock().sections.clone()
    }

    /// Last collection load failure. A later successful load of the same
    /// kind clears it; loads of other kinds leave it in place.
    pub fn error(&self) -> Option<String> {
        self.lock().load_error.as_ref().map(|(_, message)| message.clone())
    }

    pub fn cache_entry(&self, kind: ResourceKind) -> CacheEntry {
        self.lock().entry(kind)
    }

    /// Merges `patch` into the criteria and goes back to the first page.
    pub fn set_filters(&self, patch: FilterPatch) {
        let mut state = self.lock();
        state.criteria.merge(patch);
        state.pagination.set_page(1);
        self.persist(&state);
        self.publish(&state);
    }

    /// Restores the baseline criteria and forgets the current results.
    /// A search still in flight will not repopulate them.
    pub fn reset_filters(&self) {
        let mut state = self.lock();
        self.latest_search.fetch_add(1, Ordering::SeqCst);
        state.criteria = FilterCriteria::baseline();
        state.results.clear();
        state.pagination.set_total(0);
        state.pagination.set_page(1);
        state.has_searched = false;
        state.is_searching = false;
        state.search_error = None;
        self.persist(&state);
        self.publish(&state);
    }

    pub fn set_page(&self, page: usize) {
        let mut state = self.lock();
        state.pagination.set_page(page);
        self.publish(&state);
    }

    pub fn set_limit(&self, limit: usize) {
        let mut state = self.lock();
        state.pagination.set_limit(limit);
        self.persist(&state);
        self.publish(&state);
    }

    /// Runs a search with the current criteria and lands on `page`
    /// (clamped, first page when `None`).
    ///
    /// Overlapping calls are ordered by issue: only the response to the most
    /// recently started search is applied, older ones are dropped.
    pub async fn search(&self, page: Option<usize>) {
        let (seq, criteria) = {
            let mut state = self.lock();
            let seq = self.latest_search.fetch_add(1, Ordering::SeqCst) + 1;
            state.is_searching = true;
            state.search_error = None;
            self.publish(&state);
            (seq, state.criteria.clone())
        };

        info!(seq, "Searching listings");
        let outcome = self.bounded(self.service.search(&criteria)).await;
        let authenticated = self.service.is_authenticated();

        let mut state = self.lock();
        if self.latest_search.load(Ordering::SeqCst) != seq {
            debug!(seq, "Discarding superseded search response");
            return;
        }

        state.is_searching = false;
        match outcome {
            Ok(listings) => {
                let listings = visible(listings, authenticated);
                state.pagination.set_total(listings.len());
                state.pagination.set_page(page.unwrap_or(1));
                state.results = listings;
                state.has_searched = true;
                info!(
                    seq,
                    "Search found {} listings over {} pages",
                    state.pagination.total_results(),
                    state.pagination.total_pages()
                );
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(seq, "Search failed: {}", message);
                state.search_error = Some(message);
            }
        }
        self.publish(&state);
    }

    /// Fetches the `kind` collection unless the cached copy is still fresh.
    /// `force` fetches regardless of age.
    pub async fn load_resource(&self, kind: ResourceKind, force: bool) {
        let generation = {
            let state = self.lock();
            if !force && !state.entry(kind).is_stale(self.clock.now(), self.ttl) {
                debug!(%kind, "Cache is fresh, skipping fetch");
                return;
            }
            state.generation(kind)
        };

        info!(%kind, force, "Loading resource");
        let result = match kind {
            ResourceKind::Listings => {
                self.bounded(self.service.listings()).await.map(Loaded::Listings)
            }
            ResourceKind::Complexes => {
                self.bounded(self.service.complexes()).await.map(Loaded::Complexes)
            }
            ResourceKind::Categories => {
                self.bounded(self.service.categories()).await.map(Loaded::Categories)
            }
            ResourceKind::CuratedSections => {
                self.bounded(self.curated_sections()).await.map(Loaded::Sections)
            }
        };
        let authenticated = self.service.is_authenticated();

        let mut state = self.lock();
        match result {
            Ok(loaded) => {
                match loaded {
                    Loaded::Listings(items) => state.listings = visible(items, authenticated),
                    Loaded::Complexes(items) => state.complexes = visible(items, authenticated),
                    Loaded::Categories(items) => state.categories = items,
                    Loaded::Sections(sections) => {
                        state.sections = sections
                            .into_iter()
                            .map(|(category, listings)| CuratedSection {
                                category,
                                listings: visible(listings, authenticated),
                            })
                            .collect();
                    }
                }
                if state.generation(kind) == generation {
                    let now = self.clock.now();
                    state
                        .entries
                        .entry(kind)
                        .or_insert_with(|| CacheEntry::new(kind))
                        .stamp(now);
                } else {
                    debug!(%kind, "Invalidated while loading, leaving entry stale");
                }
                if matches!(&state.load_error, Some((failed, _)) if *failed == kind) {
                    state.load_error = None;
                }
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(%kind, "Loading failed: {}", message);
                state.load_error = Some((kind, message));
            }
        }
        self.publish(&state);
    }

    /// Marks one collection, or all of them, as needing a re-fetch.
    pub fn invalidate(&self, kind: Option<ResourceKind>) {
        let mut state = self.lock();
        match kind {
            Some(kind) => {
                debug!(%kind, "Invalidating cache");
                *state.generations.entry(kind).or_default() += 1;
                state
                    .entries
                    .entry(kind)
                    .or_insert_with(|| CacheEntry::new(kind))
                    .invalidate();
            }
            None => {
                debug!("Invalidating all caches");
                for kind in ResourceKind::ALL {
                    *state.generations.entry(kind).or_default() += 1;
                }
                state.entries.values_mut().for_each(CacheEntry::invalidate);
            }
        }
    }

    /// Home page categories with their unfiltered listings
    async fn curated_sections(&self) -> Result<Vec<(Category, Vec<ListingSummary>)>> {
        let categories = self.service.categories().await?;
        let mut sections = Vec::new();
        for category in categories.into_iter().filter(|c| c.show_on_home) {
            let listings = self.service.listings_in_category(&category.id).await?;
            sections.push((category, listings));
        }
        Ok(sections)
    }

    async fn bounded<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("request timed out after {:?}", self.request_timeout)),
        }
    }

    fn persist(&self, state: &State) {
        let Some(store) = &self.store else {
            return;
        };
        let saved = SavedFilters {
            criteria: state.criteria.clone(),
            limit: state.pagination.limit(),
        };
        if let Err(e) = store.save(&saved) {
            warn!("Failed to persist search filters: {:#}", e);
        }
    }

    fn publish(&self, state: &State) {
        self.updates.send_replace(state.view());
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> std::fmt::Debug for SearchCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchCache")
            .field("ttl", &self.ttl)
            .field("request_timeout", &self.request_timeout)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
