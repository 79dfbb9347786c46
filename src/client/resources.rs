//! Single-record and full-text accessors.

use serde_json::Value;

use super::Client;
use crate::error::{ArchiveError, Result};
use crate::models::{Category, CategoryCapabilities, Record};
use crate::transport::{ApiRequest, TransportError};
use crate::utils::validate_record_id;

impl Client {
    /// Fetch one record.
    ///
    /// The identifier is validated before anything else happens. A 404 or an
    /// empty body is [`ArchiveError::NotFound`].
    pub async fn get_record(&self, category: Category, id: &str) -> Result<Record> {
        self.ensure_open()?;
        let id = validate_record_id(category, id)?;
        if !category.supports(CategoryCapabilities::RECORD) {
            return Err(ArchiveError::InvalidArgument(format!(
                "{} records cannot be fetched individually",
                category
            )));
        }

        let body = self
            .dispatch(ApiRequest::record(category, &id))
            .await
            .map_err(|e| not_found(e, category, &id))?;
        Record::from_record_body(category, &id, body)
    }

    /// Fetch a record's derived full text (OCR text for newspaper articles).
    ///
    /// Categories without full text return `Ok(None)` without a request, as
    /// do records that exist but carry no text.
    pub async fn get_derived_text(&self, category: Category, id: &str) -> Result<Option<String>> {
        self.ensure_open()?;
        let id = validate_record_id(category, id)?;
        if !category.supports(CategoryCapabilities::FULL_TEXT) {
            tracing::debug!("{} has no derived text", category);
            return Ok(None);
        }
        let (_, text) = self.get_record_with_text(category, &id).await?;
        Ok(text)
    }

    /// Fetch a record together with its derived text in one request.
    ///
    /// For categories without full text this is [`get_record`](Self::get_record)
    /// paired with `None`.
    pub async fn get_record_with_text(
        &self,
        category: Category,
        id: &str,
    ) -> Result<(Record, Option<String>)> {
        self.ensure_open()?;
        let id = validate_record_id(category, id)?;
        if !category.supports(CategoryCapabilities::FULL_TEXT) {
            return Ok((self.get_record(category, &id).await?, None));
        }

        let body = self
            .dispatch(ApiRequest::full_text(category, &id))
            .await
            .map_err(|e| not_found(e, category, &id))?;
        let record = Record::from_record_body(category, &id, body)?;
        let text = record
            .field("articleText")
            .and_then(Value::as_str)
            .filter(|text| !text.trim().is_empty())
            .map(str::to_string);

        Ok((record, text))
    }
}

fn not_found(err: ArchiveError, category: Category, id: &str) -> ArchiveError {
    match err {
        ArchiveError::Transport(TransportError::Status { status: 404, .. }) => {
            ArchiveError::NotFound(format!("{}/{}", category, id))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::Config;
    use crate::transport::{MockConnector, MockTransport, RequestKind};
    use serde_json::json;
    use std::sync::Arc;

    fn client(mock: Arc<MockTransport>) -> Client {
        let config = Config::builder("test-key")
            .rate_limit(1000.0)
            .burst_limit(100)
            .build()
            .unwrap();
        Client::builder(config)
            .connector(Arc::new(MockConnector::new(mock)))
            .cache(Arc::new(MemoryCache::new(100)))
            .build()
            .unwrap()
    }

    fn archive() -> MockTransport {
        MockTransport::new(|request: &ApiRequest| match request.path() {
            "newspaper/18342701" if request.get("include") == Some("articletext") => Ok(json!({
                "id": "18342701",
                "heading": "WRECK OF THE DUNBAR.",
                "articleText": "<p>The Dunbar struck the rocks...</p>",
            })),
            "newspaper/18342701" => Ok(json!({"id": "18342701", "heading": "WRECK OF THE DUNBAR."})),
            "newspaper/2" => Ok(json!({"id": "2", "heading": "Untitled"})),
            "work/404" => Ok(json!({})),
            _ => Err(TransportError::status_code(404, "not found")),
        })
    }

    #[tokio::test]
    async fn test_get_record() {
        let mock = Arc::new(archive());
        let client = client(mock.clone());
        let _session = client.open().unwrap();

        let record = client
            .get_record(Category::Newspaper, "18342701")
            .await
            .unwrap();
        assert_eq!(record.title(), Some("WRECK OF THE DUNBAR."));
        assert_eq!(mock.requests()[0].kind(), RequestKind::Record);
    }

    #[tokio::test]
    async fn test_not_found() {
        let mock = Arc::new(archive());
        let client = client(mock);
        let _session = client.open().unwrap();

        let missing = client.get_record(Category::Book, "1").await.unwrap_err();
        assert!(matches!(missing, ArchiveError::NotFound(_)));

        let empty = client.get_record(Category::Book, "404").await.unwrap_err();
        assert!(matches!(empty, ArchiveError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_malformed_id_makes_no_request() {
        let mock = Arc::new(archive());
        let client = client(mock.clone());
        let _session = client.open().unwrap();

        let err = client
            .get_record(Category::Newspaper, "../../etc")
            .await
            .unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidArgument(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_derived_text() {
        let mock = Arc::new(archive());
        let client = client(mock.clone());
        let _session = client.open().unwrap();

        let text = client
            .get_derived_text(Category::Newspaper, "18342701")
            .await
            .unwrap();
        assert!(text.unwrap().contains("Dunbar"));

        // cached independently of the plain record
        client
            .get_record(Category::Newspaper, "18342701")
            .await
            .unwrap();
        assert_eq!(mock.calls(), 2);

        assert_eq!(
            client.get_derived_text(Category::Newspaper, "2").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_derived_text_unsupported_category() {
        let mock = Arc::new(archive());
        let client = client(mock.clone());
        let _session = client.open().unwrap();

        assert_eq!(
            client.get_derived_text(Category::Book, "123").await.unwrap(),
            None
        );
        assert_eq!(mock.calls(), 0);
    }
}
