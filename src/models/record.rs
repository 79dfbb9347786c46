//! Records returned by search and record endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Category;
use crate::error::{ArchiveError, Result};

/// Record shape, derived from its category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Newspaper or gazette article
    Article,
    /// Book, image, music, diary, magazine or research work
    Work,
    /// Person or organisation
    People,
    /// User-curated list
    List,
}

impl RecordKind {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Newspaper => RecordKind::Article,
            Category::People => RecordKind::People,
            Category::List => RecordKind::List,
            _ => RecordKind::Work,
        }
    }
}

/// A single record.
///
/// Typed accessors cover the fields every caller needs. Anything else is
/// reachable through [`Record::field`] or the untouched payload in
/// [`Record::raw`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: String,
    category: Category,
    kind: RecordKind,
    #[serde(rename = "data")]
    raw: Value,
}

impl Record {
    /// Build a record from an upstream object. The `id` may be a string or a number.
    pub fn from_value(category: Category, raw: Value) -> Result<Self> {
        let id = match raw.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(ArchiveError::Transport(
                    crate::transport::TransportError::Decode(format!(
                        "{} record without an id",
                        category
                    )),
                ))
            }
        };

        Ok(Self {
            id,
            category,
            kind: RecordKind::for_category(category),
            raw,
        })
    }

    /// Build a record from a single-record endpoint body.
    ///
    /// Bodies may arrive bare or wrapped under the category's group key
    /// (`{"article": {...}}`). A null or empty body is `NotFound`.
    pub fn from_record_body(category: Category, id: &str, body: Value) -> Result<Self> {
        let body = match body {
            Value::Object(mut map) => {
                if map.len() == 1 && map.get(category.group_key()).is_some_and(Value::is_object) {
                    map.remove(category.group_key()).unwrap_or(Value::Null)
                } else {
                    Value::Object(map)
                }
            }
            other => other,
        };

        let empty = match &body {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return Err(ArchiveError::NotFound(format!("{}/{}", category, id)));
        }

        Self::from_value(category, body)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Headline for articles, display name for people, title otherwise
    pub fn title(&self) -> Option<&str> {
        let keys: &[&str] = match self.kind {
            RecordKind::Article => &["heading", "title"],
            RecordKind::People => &["primaryDisplayName", "primaryName", "title"],
            RecordKind::Work | RecordKind::List => &["title"],
        };
        keys.iter()
            .find_map(|key| self.raw.get(*key).and_then(Value::as_str))
    }

    /// Publication, issue or creation date as supplied upstream
    pub fn date(&self) -> Option<String> {
        let value = match self.kind {
            RecordKind::Article => self.raw.get("date"),
            RecordKind::Work => self.raw.get("issued"),
            RecordKind::List => self
                .raw
                .get("date")
                .and_then(|d| d.get("created").or(Some(d))),
            RecordKind::People => None,
        }?;

        match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Link to the record's page on the Trove website
    pub fn trove_url(&self) -> Option<&str> {
        self.raw.get("troveUrl").and_then(Value::as_str)
    }

    /// Any other upstream field
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.raw.get(name)
    }

    /// The full upstream payload
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_article_accessors() {
        let record = Record::from_value(
            Category::Newspaper,
            json!({
                "id": "18342701",
                "heading": "WRECK OF THE DUNBAR.",
                "date": "1857-08-22",
                "troveUrl": "https://trove.nla.gov.au/newspaper/article/18342701",
                "page": 5,
            }),
        )
        .unwrap();

        assert_eq!(record.id(), "18342701");
        assert_eq!(record.kind(), RecordKind::Article);
        assert_eq!(record.title(), Some("WRECK OF THE DUNBAR."));
        assert_eq!(record.date().as_deref(), Some("1857-08-22"));
        assert!(record.trove_url().unwrap().ends_with("18342701"));
        assert_eq!(record.field("page"), Some(&json!(5)));
        assert_eq!(record.field("missing"), None);
    }

    #[test]
    fn test_numeric_id_and_work_date() {
        let record =
            Record::from_value(Category::Book, json!({"id": 12345, "title": "Robbery Under Arms", "issued": 1888}))
                .unwrap();
        assert_eq!(record.id(), "12345");
        assert_eq!(record.kind(), RecordKind::Work);
        assert_eq!(record.date().as_deref(), Some("1888"));
    }

    #[test]
    fn test_people_title() {
        let record = Record::from_value(
            Category::People,
            json!({"id": "1478423", "primaryName": "Kelly, Ned", "primaryDisplayName": "Ned Kelly"}),
        )
        .unwrap();
        assert_eq!(record.title(), Some("Ned Kelly"));
        assert_eq!(record.date(), None);
    }

    #[test]
    fn test_missing_id_is_decode_error() {
        let err = Record::from_value(Category::Book, json!({"title": "x"})).unwrap_err();
        assert!(matches!(err, ArchiveError::Transport(_)));
    }

    #[test]
    fn test_record_body_unwrapping() {
        let wrapped = json!({"article": {"id": "7", "heading": "H"}});
        let record = Record::from_record_body(Category::Newspaper, "7", wrapped).unwrap();
        assert_eq!(record.title(), Some("H"));

        let bare = json!({"id": "8", "title": "T"});
        assert_eq!(
            Record::from_record_body(Category::Book, "8", bare).unwrap().id(),
            "8"
        );

        let empty = Record::from_record_body(Category::Book, "9", json!({})).unwrap_err();
        assert!(matches!(empty, ArchiveError::NotFound(_)));
        let null = Record::from_record_body(Category::Book, "9", Value::Null).unwrap_err();
        assert!(matches!(null, ArchiveError::NotFound(_)));
    }
}
