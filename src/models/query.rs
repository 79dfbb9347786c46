//! Search query builder.
//!
//! A [`SearchQuery`] is a value: every builder call returns a new query and
//! leaves the receiver untouched, so a base query can be shared and refined
//! in several directions.
//!
//! ```rust
//! use trove_master::models::{Category, SearchQuery, SortBy};
//!
//! let base = SearchQuery::new().category(Category::Newspaper);
//! let wrecks = base.text("shipwreck").sort(SortBy::DateAsc);
//! let nsw = wrecks.filter("state", "New South Wales");
//!
//! assert!(base.text_term().is_none());
//! assert_eq!(wrecks.filters().len(), 0);
//! assert_eq!(nsw.filters().len(), 1);
//! ```
//!
//! Queries do nothing until executed against a [`Client`](crate::Client)
//! with [`count`](SearchQuery::count), [`pages`](SearchQuery::pages),
//! [`first_page`](SearchQuery::first_page) or
//! [`page_at`](SearchQuery::page_at).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::{Category, Page, SortBy};
use crate::client::{Client, Pages};
use crate::error::{ArchiveError, Result};
use crate::transport::{ApiRequest, RequestKind};
use crate::utils::validate_query_text;

/// Default number of records per category per page
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size the upstream accepts
pub const MAX_PAGE_SIZE: u32 = 100;

/// Cursor that starts a result set
pub const INITIAL_CURSOR: &str = "*";

/// An immutable search description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    text: Option<String>,
    categories: BTreeSet<Category>,
    sort: SortBy,
    page_size: u32,
    filters: BTreeMap<String, BTreeSet<String>>,
    bulk_harvest: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            categories: BTreeSet::new(),
            sort: SortBy::Relevance,
            page_size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
            bulk_harvest: false,
        }
    }
}

impl SearchQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the free-text term
    pub fn text(&self, text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..self.clone()
        }
    }

    /// Add a category to search
    pub fn category(&self, category: Category) -> Self {
        let mut next = self.clone();
        next.categories.insert(category);
        next
    }

    /// Add several categories
    pub fn categories(&self, categories: impl IntoIterator<Item = Category>) -> Self {
        let mut next = self.clone();
        next.categories.extend(categories);
        next
    }

    /// Set the sort order
    pub fn sort(&self, sort: SortBy) -> Self {
        Self {
            sort,
            ..self.clone()
        }
    }

    /// Set the number of records per category per page
    pub fn page_size(&self, page_size: u32) -> Self {
        Self {
            page_size,
            ..self.clone()
        }
    }

    /// Add a facet limit, sent as `l-<name>=<value>`.
    ///
    /// A leading `l-` on the name is accepted and dropped. Repeating a name
    /// with different values narrows on all of them.
    pub fn filter(&self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let name = name.as_ref().trim();
        let name = name.strip_prefix("l-").unwrap_or(name).to_string();
        let mut next = self.clone();
        next.filters.entry(name).or_default().insert(value.into());
        next
    }

    /// Ask for a stable, identifier-ordered result set suited to harvesting
    pub fn bulk_harvest(&self, enabled: bool) -> Self {
        Self {
            bulk_harvest: enabled,
            ..self.clone()
        }
    }

    pub fn text_term(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn selected_categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    pub fn sort_order(&self) -> SortBy {
        self.sort
    }

    pub fn size(&self) -> u32 {
        self.page_size
    }

    pub fn filters(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.filters
    }

    pub fn is_bulk_harvest(&self) -> bool {
        self.bulk_harvest
    }

    /// Check the query can be executed.
    ///
    /// A query needs a non-blank text term or at least one filter, at least
    /// one category, and a page size within `1..=100`.
    pub fn validate(&self) -> Result<()> {
        let text = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty());

        if text.is_none() && self.filters.is_empty() {
            return Err(ArchiveError::InvalidQuery(
                "query has neither a search term nor a filter".to_string(),
            ));
        }
        if let Some(text) = text {
            validate_query_text(text).map_err(|e| ArchiveError::InvalidQuery(e.to_string()))?;
        }
        if self.categories.is_empty() {
            return Err(ArchiveError::InvalidQuery(
                "no category selected".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ArchiveError::InvalidQuery(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        for (name, values) in &self.filters {
            let valid_name = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid_name {
                return Err(ArchiveError::InvalidQuery(format!(
                    "invalid filter name '{}'",
                    name
                )));
            }
            if values.iter().any(|v| v.trim().is_empty()) {
                return Err(ArchiveError::InvalidQuery(format!(
                    "filter '{}' has an empty value",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Build the `result` request for `categories` starting at `cursor`
    pub(crate) fn request(
        &self,
        kind: RequestKind,
        categories: &[Category],
        cursor: &str,
        page_size: u32,
    ) -> ApiRequest {
        let mut request = ApiRequest::new(kind, "result")
            .param("n", page_size.to_string())
            .param("s", cursor)
            .param("sortby", self.sort.as_param());

        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            request = request.param("q", text);
        }
        for category in categories {
            request = request.param("category", category.code());
        }
        for (name, values) in &self.filters {
            for value in values {
                request = request.param(format!("l-{}", name), value.trim());
            }
        }
        if self.bulk_harvest {
            request = request.param("bulkHarvest", "true");
        }
        request
    }

    fn all_categories(&self) -> Vec<Category> {
        self.categories.iter().copied().collect()
    }

    /// Total number of matching records across the selected categories.
    ///
    /// Issues one request with `n=0`.
    pub async fn count(&self, client: &Client) -> Result<u64> {
        Ok(self.count_page(client).await?.total())
    }

    /// Matching records per selected category, from the same single request
    /// as [`count`](Self::count)
    pub async fn count_by_category(&self, client: &Client) -> Result<BTreeMap<Category, u64>> {
        let page = self.count_page(client).await?;
        Ok(page
            .categories()
            .iter()
            .map(|(category, group)| (*category, group.total()))
            .collect())
    }

    async fn count_page(&self, client: &Client) -> Result<Page> {
        self.validate()?;
        let request = self.request(RequestKind::Count, &self.all_categories(), INITIAL_CURSOR, 0);
        let body = client.dispatch(request).await?;
        Page::from_response(&body)
    }

    /// Lazy page sequence over the full result set
    pub fn pages(&self, client: &Client) -> Result<Pages> {
        self.validate()?;
        Ok(Pages::new(client.clone(), self.clone()))
    }

    /// Fetch exactly one page from the start of the result set
    pub async fn first_page(&self, client: &Client) -> Result<Page> {
        self.validate()?;
        let request =
            self.request(RequestKind::Search, &self.all_categories(), INITIAL_CURSOR, self.page_size);
        let body = client.dispatch(request).await?;
        Page::from_response(&body)
    }

    /// Fetch one page resuming from `cursor`.
    ///
    /// Cursors belong to a single category, so the query must select exactly one.
    pub async fn page_at(&self, client: &Client, cursor: &str) -> Result<Page> {
        self.validate()?;
        if self.categories.len() != 1 {
            return Err(ArchiveError::InvalidQuery(format!(
                "resuming from a cursor needs exactly one category, {} selected",
                self.categories.len()
            )));
        }
        let cursor = cursor.trim();
        if cursor.is_empty() {
            return Err(ArchiveError::InvalidArgument("empty cursor".to_string()));
        }
        let request = self.request(RequestKind::Search, &self.all_categories(), cursor, self.page_size);
        let body = client.dispatch(request).await?;
        Page::from_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_value_semantics() {
        let base = SearchQuery::new().text("gold").category(Category::Newspaper);
        let refined = base.page_size(50).filter("decade", "185");
        let resorted = base.sort(SortBy::DateDesc);

        assert_eq!(base.size(), DEFAULT_PAGE_SIZE);
        assert!(base.filters().is_empty());
        assert_eq!(base.sort_order(), SortBy::Relevance);

        assert_eq!(refined.size(), 50);
        assert_eq!(refined.filters()["decade"].len(), 1);
        assert_eq!(resorted.sort_order(), SortBy::DateDesc);
        assert_eq!(resorted.size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_filter_prefix_and_multivalue() {
        let query = SearchQuery::new()
            .filter("l-state", "Victoria")
            .filter("state", "Tasmania");
        let values: Vec<_> = query.filters()["state"].iter().cloned().collect();
        assert_eq!(values, vec!["Tasmania", "Victoria"]);
    }

    #[test]
    fn test_validation() {
        let empty = SearchQuery::new().category(Category::Book);
        assert!(matches!(empty.validate(), Err(ArchiveError::InvalidQuery(_))));

        let blank = empty.text("   ");
        assert!(blank.validate().is_err());

        let filter_only = empty.filter("decade", "190");
        assert!(filter_only.validate().is_ok());

        let no_category = SearchQuery::new().text("kelly");
        assert!(no_category.validate().is_err());

        let ok = no_category.category(Category::People);
        assert!(ok.validate().is_ok());
        assert!(ok.page_size(0).validate().is_err());
        assert!(ok.page_size(101).validate().is_err());
        assert!(ok.page_size(100).validate().is_ok());

        assert!(ok.filter("bad name", "x").validate().is_err());
        assert!(ok.filter("decade", " ").validate().is_err());
        assert!(ok.text("a\u{0}b").validate().is_err());
    }

    #[test]
    fn test_request_parameters() {
        let query = SearchQuery::new()
            .text(" bushranger ")
            .categories([Category::Newspaper, Category::Book])
            .sort(SortBy::DateAsc)
            .filter("decade", "186")
            .bulk_harvest(true);
        let request = query.request(
            RequestKind::Search,
            &[Category::Newspaper, Category::Book],
            INITIAL_CURSOR,
            20,
        );

        assert_eq!(request.path(), "result");
        assert_eq!(request.get("q"), Some("bushranger"));
        assert_eq!(request.get("s"), Some("*"));
        assert_eq!(request.get("n"), Some("20"));
        assert_eq!(request.get("sortby"), Some("dateasc"));
        assert_eq!(request.get("l-decade"), Some("186"));
        assert_eq!(request.get("bulkHarvest"), Some("true"));
        assert_eq!(request.get_all("category"), vec!["book", "newspaper"]);
    }

    #[test]
    fn test_filter_only_request_has_no_q() {
        let query = SearchQuery::new()
            .category(Category::Image)
            .filter("format", "Photograph");
        let request = query.request(RequestKind::Count, &[Category::Image], INITIAL_CURSOR, 0);
        assert_eq!(request.get("q"), None);
        assert_eq!(request.get("n"), Some("0"));
    }
}
