use std::ops::Range;

/// Client side paging over an in-memory result list.
///
/// `page` is 1-based and always lies in `1..=total_pages()`; there is at
/// least one page even when there are no results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: usize,
    limit: usize,
    total: usize,
}

impl Pagination {
    pub fn new(limit: usize) -> Self {
        Self {
            page: 1,
            limit: limit.max(1),
            total: 0,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn total_results(&self) -> usize {
        self.total
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.limit).max(1)
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.clamp(1, self.total_pages());
    }

    /// A zero limit is treated as one.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.max(1);
        self.set_page(self.page);
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
        self.set_page(self.page);
    }

    /// Index range of the current page within `len` items
    pub fn range(&self, len: usize) -> Range<usize> {
        let start = (self.page - 1).saturating_mul(self.limit).min(len);
        let end = start.saturating_add(self.limit).min(len);
        start..end
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range(items.len())]
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(20)
    }
}
