//! Tool results and tool errors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{ArchiveError, ErrorKind};
use crate::models::{Category, CategoryPage, Page, Record, RecordKind, ResolvedIdentifier};

/// Result of any tool, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultEnvelope {
    Search(SearchResult),
    Record(RecordResult),
    Citation(CitationResult),
    IdentifierResolution(ResolvedIdentifier),
    ServerCapability(CapabilityResult),
}

impl ResultEnvelope {
    pub fn kind(&self) -> &'static str {
        match self {
            ResultEnvelope::Search(_) => "search",
            ResultEnvelope::Record(_) => "record",
            ResultEnvelope::Citation(_) => "citation",
            ResultEnvelope::IdentifierResolution(_) => "identifier_resolution",
            ResultEnvelope::ServerCapability(_) => "server_capability",
        }
    }
}

/// Search or count output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Arguments the tool was called with
    pub query: Value,
    pub total: u64,
    /// Per-category groups (no records for `count`)
    pub categories: BTreeMap<Category, CategoryPage>,
    /// Cursor to pass back for each category's next page
    pub cursors: BTreeMap<Category, String>,
}

impl SearchResult {
    pub fn from_page(query: Value, page: Page) -> Self {
        let cursors = page.cursors();
        let total = page.total();
        Self {
            query,
            total,
            categories: page.categories().clone(),
            cursors,
        }
    }

    pub fn from_counts(query: Value, counts: BTreeMap<Category, u64>) -> Self {
        let total = counts.values().sum();
        let categories = counts
            .into_iter()
            .map(|(category, total)| (category, CategoryPage::new(total, Vec::new(), None)))
            .collect();
        Self {
            query,
            total,
            categories,
            cursors: BTreeMap::new(),
        }
    }
}

/// A single record, optionally with its full text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub record_type: RecordKind,
    pub category: Category,
    pub record_id: String,
    pub record: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
}

impl RecordResult {
    pub fn new(record: Record, full_text: Option<String>) -> Self {
        Self {
            record_type: record.kind(),
            category: record.category(),
            record_id: record.id().to_string(),
            record: record.into_raw(),
            full_text,
        }
    }
}

/// Citation fields for a record. Formatting is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationResult {
    pub category: Category,
    pub id: String,
    pub title: Option<String>,
    pub date: Option<String>,
    /// Persistent or canonical URL
    pub url: String,
    pub trove_url: Option<String>,
}

impl CitationResult {
    pub fn from_record(record: &Record) -> Self {
        Self {
            category: record.category(),
            id: record.id().to_string(),
            title: record.title().map(str::to_string),
            date: record.date(),
            url: ResolvedIdentifier::canonical_url(record.category(), record.id()),
            trove_url: record.trove_url().map(str::to_string),
        }
    }
}

/// What a category supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub code: String,
    pub name: String,
    pub capabilities: Vec<String>,
}

/// Server self-description returned by `list_capabilities`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub server: String,
    pub version: String,
    pub tools: Vec<String>,
    pub categories: Vec<CategoryInfo>,
    pub rate_limit: f64,
    pub burst_limit: u32,
    pub max_concurrency: usize,
    pub cache_backend: String,
}

/// A failed tool invocation
#[derive(Debug, thiserror::Error)]
#[error("{tool}: {source}")]
pub struct ToolError {
    pub tool: String,
    #[source]
    pub source: ArchiveError,
}

impl ToolError {
    pub fn new(tool: impl Into<String>, source: ArchiveError) -> Self {
        Self {
            tool: tool.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// JSON form: `{"tool", "kind", "message"}` plus the field and
    /// constraint for schema errors
    pub fn to_json(&self) -> Value {
        let mut value = serde_json::json!({
            "tool": self.tool,
            "kind": self.kind(),
            "message": self.source.to_string(),
        });
        if let ArchiveError::SchemaValidation {
            field, constraint, ..
        } = &self.source
        {
            value["field"] = Value::from(field.as_str());
            value["constraint"] = Value::from(constraint.as_str());
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_tags() {
        let resolved = ResultEnvelope::IdentifierResolution(ResolvedIdentifier {
            input: "people:1".to_string(),
            category: Category::People,
            id: "1".to_string(),
            url: "https://nla.gov.au/nla.party-1".to_string(),
        });
        let value = serde_json::to_value(&resolved).unwrap();
        assert_eq!(value["kind"], "identifier_resolution");
        assert_eq!(value["category"], "people");
        assert_eq!(resolved.kind(), "identifier_resolution");

        let counts = SearchResult::from_counts(
            json!({"query": "x"}),
            BTreeMap::from([(Category::Book, 3), (Category::Image, 4)]),
        );
        let value = serde_json::to_value(ResultEnvelope::Search(counts)).unwrap();
        assert_eq!(value["kind"], "search");
        assert_eq!(value["total"], 7);
        assert_eq!(value["categories"]["book"]["total"], 3);
    }

    #[test]
    fn test_citation_fields() {
        let record = Record::from_value(
            Category::Newspaper,
            json!({"id": "18342701", "heading": "WRECK", "date": "1857-08-22"}),
        )
        .unwrap();
        let citation = CitationResult::from_record(&record);
        assert_eq!(citation.title.as_deref(), Some("WRECK"));
        assert_eq!(citation.url, "https://nla.gov.au/nla.news-article18342701");
        assert_eq!(citation.trove_url, None);
    }

    #[test]
    fn test_tool_error_json() {
        let err = ToolError::new(
            "search",
            ArchiveError::SchemaValidation {
                field: "/page_size".to_string(),
                constraint: "maximum".to_string(),
                message: "500 is greater than the maximum of 100".to_string(),
            },
        );
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
        let value = err.to_json();
        assert_eq!(value["kind"], "schema_validation");
        assert_eq!(value["field"], "/page_size");
        assert_eq!(value["constraint"], "maximum");
    }
}
