//! Mock transport for testing purposes.
//!
//! [`MockTransport`] answers requests through a caller-supplied responder and
//! records what it saw: how many calls were made, which requests, and the
//! highest number of calls that were in flight at once.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ApiRequest, Connector, Transport, TransportError};
use crate::config::Config;
use crate::error::ArchiveError;

type Responder = dyn Fn(&ApiRequest) -> Result<Value, TransportError> + Send + Sync;

/// A transport that returns scripted responses.
pub struct MockTransport {
    responder: Box<Responder>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    requests: Mutex<Vec<ApiRequest>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("delay", &self.delay)
            .field("calls", &self.calls())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a mock answering every request with `responder`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns the same payload for every request.
    pub fn fixed(payload: Value) -> Self {
        Self::new(move |_| Ok(payload.clone()))
    }

    /// Hold every call for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of calls that reached the transport
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently in progress
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest concurrency observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Every request received, in arrival order
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().clone()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &ApiRequest) -> Result<Value, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        (self.responder)(request)
    }
}

/// Connector that hands out one shared [`MockTransport`] and counts scope
/// acquisitions and releases.
#[derive(Debug)]
pub struct MockConnector {
    transport: Arc<MockTransport>,
    connects: AtomicUsize,
    releases: AtomicUsize,
}

impl MockConnector {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        Self {
            transport,
            connects: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        }
    }

    /// The transport every scope receives
    pub fn transport(&self) -> &Arc<MockTransport> {
        &self.transport
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    fn connect(&self, _config: &Config) -> Result<Arc<dyn Transport>, ArchiveError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.transport.clone())
    }

    fn release(&self, transport: Arc<dyn Transport>) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        drop(transport);
    }
}

/// Build a search response body with one category group.
///
/// `records` are placed under the group key that matches the category
/// (`article` for newspapers, `work` for books and so on).
pub fn search_body(
    category: crate::models::Category,
    total: u64,
    next_start: Option<&str>,
    records: Vec<Value>,
) -> Value {
    let mut group = serde_json::Map::new();
    group.insert("s".into(), Value::from("*"));
    group.insert("n".into(), Value::from(records.len()));
    group.insert("total".into(), Value::from(total));
    if let Some(cursor) = next_start {
        group.insert("nextStart".into(), Value::from(cursor));
    }
    group.insert(category.group_key().into(), Value::Array(records));

    serde_json::json!({
        "category": [{
            "code": category.code(),
            "name": category.name(),
            "records": group,
        }]
    })
}
