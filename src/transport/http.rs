//! HTTP transport over a shared reqwest connection pool.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use super::{ApiRequest, Connector, Transport, TransportError};
use crate::config::Config;
use crate::error::ArchiveError;

/// Header carrying the API credential
const API_KEY_HEADER: &str = "X-API-KEY";

/// Longest upstream error body kept in error messages
const MAX_ERROR_BODY: usize = 200;

/// Transport issuing GET requests against the configured base URL.
///
/// Each `execute` is exactly one HTTP request; the client retries.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpTransport {
    /// Build the connection pool from the configuration
    pub fn new(config: &Config) -> Result<Self, ArchiveError> {
        let client = Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                ArchiveError::Configuration(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(self.url(request.path()))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("encoding", "json")])
            .query(&request.normalized_params())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut end = MAX_ERROR_BODY;
                while !message.is_char_boundary(end) {
                    end -= 1;
                }
                message.truncate(end);
            }
            if message.trim().is_empty() {
                message = status
                    .canonical_reason()
                    .unwrap_or("unknown status")
                    .to_string();
            }

            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
                retry_after,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        tracing::debug!(
            kind = request.kind().as_str(),
            path = request.path(),
            "Sending request"
        );
        self.send(request).await
    }
}

/// Connector creating one [`HttpTransport`] (and so one pool) per scope
#[derive(Debug, Clone, Default)]
pub struct HttpConnector;

impl Connector for HttpConnector {
    fn connect(&self, config: &Config) -> Result<Arc<dyn Transport>, ArchiveError> {
        let transport = HttpTransport::new(config)?;
        tracing::debug!(base_url = config.base_url(), "HTTP connection pool created");
        Ok(Arc::new(transport))
    }

    fn release(&self, transport: Arc<dyn Transport>) {
        // Idle connections close once the last in-flight request drops its handle.
        drop(transport);
        tracing::debug!("HTTP connection pool released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::transport::RequestKind;
    use mockito::Matcher;

    fn test_config(base_url: &str) -> Config {
        Config::builder("test-key").base_url(base_url).build().unwrap()
    }

    #[tokio::test]
    async fn test_search_request_encoding() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/result")
            .match_header("x-api-key", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("encoding".into(), "json".into()),
                Matcher::UrlEncoded("q".into(), "shipwreck bay".into()),
                Matcher::UrlEncoded("category".into(), "newspaper".into()),
                Matcher::UrlEncoded("n".into(), "20".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"category":[]}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
        let request = ApiRequest::new(RequestKind::Search, "result")
            .param("q", "shipwreck bay")
            .param("category", "newspaper")
            .param("n", "20");

        let body = transport.execute(&request).await.unwrap();
        assert_eq!(body, serde_json::json!({"category": []}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_not_found_is_permanent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/newspaper/999")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("no such article")
            .expect(1)
            .create_async()
            .await;

        let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
        let err = transport
            .execute(&ApiRequest::record(Category::Newspaper, "999"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(!err.is_transient());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_transient_and_sent_once() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/work/1")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;

        let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
        let err = transport
            .execute(&ApiRequest::record(Category::Book, "1"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(503));
        assert!(err.is_transient());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_retry_after_header_is_parsed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/work/2")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "0")
            .create_async()
            .await;

        let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
        let err = transport
            .execute(&ApiRequest::record(Category::Book, "2"))
            .await
            .unwrap_err();

        assert_eq!(err.retry_after(), Some(Duration::from_secs(0)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/people/3")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let transport = HttpTransport::new(&test_config(&server.url())).unwrap();
        let err = transport
            .execute(&ApiRequest::record(Category::People, "3"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Decode(_)));
    }
}
