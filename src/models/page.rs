//! One page of search results, grouped by category.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{Category, Record};
use crate::error::Result;
use crate::transport::TransportError;

/// Results for one category within a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryPage {
    total: u64,
    records: Vec<Record>,
    next_cursor: Option<String>,
}

impl CategoryPage {
    pub fn new(total: u64, records: Vec<Record>, next_cursor: Option<String>) -> Self {
        Self {
            total,
            records,
            next_cursor,
        }
    }

    /// Total matches in this category across all pages
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Cursor for the following page, if the upstream offered one
    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Whether this category has no further pages after one requested with `sent`
    pub fn is_exhausted(&self, sent: &str) -> bool {
        match self.next_cursor.as_deref() {
            None => true,
            Some(next) => next.is_empty() || next == sent,
        }
    }
}

/// A page of results: per-category groups plus the overall total
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    total: u64,
    categories: BTreeMap<Category, CategoryPage>,
}

impl Page {
    pub fn new(categories: BTreeMap<Category, CategoryPage>) -> Self {
        let total = categories.values().map(CategoryPage::total).sum();
        Self { total, categories }
    }

    /// Parse a `result` response body.
    ///
    /// Groups for category codes this crate does not know are skipped.
    pub fn from_response(body: &Value) -> Result<Self> {
        let groups = body
            .get("category")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                TransportError::Decode("search response has no 'category' array".to_string())
            })?;

        let mut categories = BTreeMap::new();
        for group in groups {
            let Some(code) = group.get("code").and_then(Value::as_str) else {
                continue;
            };
            let category = match code.parse::<Category>() {
                Ok(category) => category,
                Err(_) => {
                    tracing::debug!("Skipping unknown category group: {}", code);
                    continue;
                }
            };

            let empty = Value::Null;
            let block = group.get("records").unwrap_or(&empty);
            let total = block.get("total").and_then(as_count).unwrap_or(0);
            let next_cursor = block
                .get("nextStart")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            let records = block
                .get(category.group_key())
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .cloned()
                        .map(|item| Record::from_value(category, item))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?
                .unwrap_or_default();

            categories.insert(category, CategoryPage::new(total, records, next_cursor));
        }

        Ok(Self::new(categories))
    }

    /// Sum of the category totals
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn categories(&self) -> &BTreeMap<Category, CategoryPage> {
        &self.categories
    }

    pub fn category(&self, category: Category) -> Option<&CategoryPage> {
        self.categories.get(&category)
    }

    /// All records on this page, in category order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.categories.values().flat_map(|c| c.records.iter())
    }

    /// Number of records on this page
    pub fn len(&self) -> usize {
        self.categories.values().map(|c| c.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-category cursors for the following page
    pub fn cursors(&self) -> BTreeMap<Category, String> {
        self.categories
            .iter()
            .filter_map(|(cat, page)| page.next_cursor.clone().map(|c| (*cat, c)))
            .collect()
    }

    /// Combine per-category pages fetched separately into one page
    pub(crate) fn merge(pages: impl IntoIterator<Item = Page>) -> Self {
        let categories = pages
            .into_iter()
            .flat_map(|page| page.categories.into_iter())
            .collect();
        Self::new(categories)
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::search_body;
    use serde_json::json;

    #[test]
    fn test_parse_search_response() {
        let body = search_body(
            Category::Newspaper,
            120,
            Some("AoE"),
            vec![json!({"id": "1", "heading": "A"}), json!({"id": "2", "heading": "B"})],
        );
        let page = Page::from_response(&body).unwrap();

        assert_eq!(page.total(), 120);
        assert_eq!(page.len(), 2);
        let news = page.category(Category::Newspaper).unwrap();
        assert_eq!(news.next_cursor(), Some("AoE"));
        assert!(!news.is_exhausted("*"));
        assert!(news.is_exhausted("AoE"));
        assert_eq!(page.cursors().get(&Category::Newspaper).unwrap(), "AoE");
    }

    #[test]
    fn test_parse_multiple_groups_and_totals() {
        let body = json!({
            "category": [
                {"code": "book", "records": {"total": "30", "work": [{"id": 5}]}},
                {"code": "people", "records": {"total": 12}},
                {"code": "website", "records": {"total": 99}},
            ]
        });
        let page = Page::from_response(&body).unwrap();

        assert_eq!(page.total(), 42);
        assert_eq!(page.categories().len(), 2);
        assert!(page.category(Category::People).unwrap().records().is_empty());
        assert!(page.category(Category::People).unwrap().is_exhausted("*"));
        assert_eq!(page.records().next().unwrap().id(), "5");
    }

    #[test]
    fn test_missing_category_array() {
        assert!(Page::from_response(&json!({"error": "x"})).is_err());
    }

    #[test]
    fn test_merge() {
        let a = Page::from_response(&search_body(Category::Book, 3, None, vec![])).unwrap();
        let b = Page::from_response(&search_body(Category::Image, 4, Some("x"), vec![])).unwrap();
        let merged = Page::merge([a, b]);
        assert_eq!(merged.total(), 7);
        assert_eq!(merged.categories().len(), 2);
    }
}
