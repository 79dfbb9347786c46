//! # Trove Master
//!
//! A rate-limited, cached client for the Trove archive search API, with an
//! MCP tool layer on top.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`]: Configuration (builder, environment, TOML file)
//! - [`client`]: The [`Client`], its usage scope, page iteration and record accessors
//! - [`models`]: Query builder, categories, pages and records
//! - [`cache`]: Response cache backends
//! - [`transport`]: The seam to the upstream API (HTTP and mock)
//! - [`mcp`]: Schema-validated tools and the MCP server
//! - [`utils`]: Rate limiter, concurrency gate, retry and validation
//!
//! ## Example
//!
//! ```rust,no_run
//! use trove_master::models::{Category, SearchQuery, SortBy};
//! use trove_master::Client;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::from_env()?;
//! let _session = client.open()?;
//!
//! let query = SearchQuery::new()
//!     .text("bushranger")
//!     .category(Category::Newspaper)
//!     .filter("decade", "186")
//!     .sort(SortBy::DateAsc);
//!
//! let mut pages = query.pages(&client)?;
//! while let Some(page) = pages.next().await {
//!     for record in page?.records() {
//!         println!("{} {:?}", record.id(), record.title());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mcp;
pub mod models;
pub mod transport;
pub mod utils;

// Re-export commonly used types
pub use client::{Client, ClientBuilder, ClientStats, Pages, Session};
pub use config::{CacheBackend, Config, ConfigBuilder};
pub use error::{ArchiveError, ErrorKind, Result};
pub use models::{Category, Page, Record, SearchQuery};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
