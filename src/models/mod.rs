//! Core data models for queries, pages and records.

mod category;
mod identifier;
mod page;
mod query;
mod record;

pub use category::{Category, CategoryCapabilities, SortBy};
pub use identifier::{resolve_identifier, ResolvedIdentifier};
pub use page::{CategoryPage, Page};
pub use query::{SearchQuery, DEFAULT_PAGE_SIZE, INITIAL_CURSOR, MAX_PAGE_SIZE};
pub use record::{Record, RecordKind};
