//! Options accepted by `Repository::list`

use crate::filter::ResourceFilter;

/// Page returned when the caller does not ask for one
pub const FIRST_PAGE: usize = 0;

/// Page length used when the caller does not set one
pub const MAX_PAGE_SIZE: usize = 500;

/// Filter and pagination request for a list call
///
/// Pages are 0-based. A page past the last one yields an empty list on every
/// backend, indistinguishable from a legitimately empty result. The page size
/// is never below one; backends read it through [`ListOptions::page_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions<F> {
    filter: F,
    page: usize,
    size: usize,
}

impl<F: ResourceFilter> Default for ListOptions<F> {
    fn default() -> Self {
        Self {
            filter: F::default(),
            page: FIRST_PAGE,
            size: MAX_PAGE_SIZE,
        }
    }
}

impl<F: ResourceFilter> ListOptions<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the filter
    pub fn filter(mut self, filter: F) -> Self {
        self.filter = filter;
        self
    }

    /// Set the 0-based page number
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Set the page length. Zero is raised to one.
    pub fn size(mut self, size: usize) -> Self {
        self.size = size.max(1);
        self
    }

    pub fn active_filter(&self) -> &F {
        &self.filter
    }

    pub fn page_number(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.size
    }

    /// Index of the first item of the requested page in the full result set
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}
