//! Transport-level request description.

use serde::{Deserialize, Serialize};

use crate::cache::CacheKey;
use crate::models::Category;

/// What an [`ApiRequest`] asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// One page of search results
    Search,
    /// Result totals only (`n=0`)
    Count,
    /// A single record
    Record,
    /// A record's derived full text
    FullText,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Search => "search",
            RequestKind::Count => "count",
            RequestKind::Record => "record",
            RequestKind::FullText => "full_text",
        }
    }
}

/// A GET request relative to the configured base URL.
///
/// Parameters form a multiset: their order carries no meaning, and
/// [`ApiRequest::normalized_params`] is what the cache fingerprint and the
/// HTTP transport both see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    kind: RequestKind,
    path: String,
    params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(kind: RequestKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            params: Vec::new(),
        }
    }

    /// Request for one record
    pub fn record(category: Category, id: &str) -> Self {
        Self::new(
            RequestKind::Record,
            format!("{}/{}", category.record_path(), id),
        )
    }

    /// Request for a record's full text
    pub fn full_text(category: Category, id: &str) -> Self {
        Self::new(
            RequestKind::FullText,
            format!("{}/{}", category.record_path(), id),
        )
        .param("include", "articletext")
    }

    /// Append a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parameters in insertion order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, sorted
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        let mut values: Vec<&str> = self
            .params
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect();
        values.sort_unstable();
        values
    }

    /// Parameters sorted by key, then value
    pub fn normalized_params(&self) -> Vec<(String, String)> {
        let mut params = self.params.clone();
        params.sort();
        params.dedup();
        params
    }

    /// Content-addressed cache key for this request
    pub fn fingerprint(&self) -> CacheKey {
        CacheKey::fingerprint(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_requests() {
        let record = ApiRequest::record(Category::Newspaper, "18342701");
        assert_eq!(record.kind(), RequestKind::Record);
        assert_eq!(record.path(), "newspaper/18342701");
        assert!(record.params().is_empty());

        let work = ApiRequest::record(Category::Book, "12345");
        assert_eq!(work.path(), "work/12345");

        let text = ApiRequest::full_text(Category::Newspaper, "18342701");
        assert_eq!(text.kind(), RequestKind::FullText);
        assert_eq!(text.get("include"), Some("articletext"));
        assert_ne!(record.fingerprint(), text.fingerprint());
    }

    #[test]
    fn test_params_lookup() {
        let request = ApiRequest::new(RequestKind::Search, "result")
            .param("category", "newspaper")
            .param("q", "wreck")
            .param("category", "book");

        assert_eq!(request.get("q"), Some("wreck"));
        assert_eq!(request.get("missing"), None);
        assert_eq!(request.get_all("category"), vec!["book", "newspaper"]);
        assert_eq!(
            request.normalized_params(),
            vec![
                ("category".to_string(), "book".to_string()),
                ("category".to_string(), "newspaper".to_string()),
                ("q".to_string(), "wreck".to_string()),
            ]
        );
    }
}
