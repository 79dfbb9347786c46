//! MCP (Model Context Protocol) implementation.
//!
//! [`ToolRegistry`] is usable on its own: it validates arguments and returns
//! a [`ResultEnvelope`]. [`McpServer`] puts the same registry behind pmcp.

mod envelope;
pub mod server;
mod tools;

pub use envelope::{
    CapabilityResult, CategoryInfo, CitationResult, RecordResult, ResultEnvelope, SearchResult,
    ToolError,
};
pub use server::McpServer;
pub use tools::{Tool, ToolDescriptor, ToolKind, ToolRegistry};
