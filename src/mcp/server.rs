//! MCP server implementation using pmcp (Pragmatic AI's rust-mcp-sdk).
//!
//! Every tool in the [`ToolRegistry`] is exposed over stdio or streamable
//! HTTP. Input errors (schema, argument, query, unknown tool) are reported
//! as invalid params; everything else is an internal error. Both carry the
//! error kind in the message.

use async_trait::async_trait;
use pmcp::{
    server::streamable_http_server::StreamableHttpServer, Error, RequestHandlerExtra, Server,
    ServerCapabilities, ToolHandler, ToolInfo,
};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::envelope::ToolError;
use super::tools::ToolRegistry;
use crate::error::ErrorKind;

/// The MCP server for the archive tools
#[derive(Debug, Clone)]
pub struct McpServer {
    server: Arc<Mutex<Server>>,
    registry: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a server exposing every tool in `registry`
    pub fn new(registry: Arc<ToolRegistry>) -> Result<Self, pmcp::Error> {
        let server = Self::build_server_impl(&registry)?;
        Ok(Self {
            server: Arc::new(Mutex::new(server)),
            registry,
        })
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    fn build_server_impl(registry: &Arc<ToolRegistry>) -> Result<Server, pmcp::Error> {
        let mut builder = Server::builder()
            .name(env!("CARGO_PKG_NAME"))
            .version(env!("CARGO_PKG_VERSION"))
            .capabilities(ServerCapabilities::default());

        for tool in registry.all() {
            let handler = ToolWrapper {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                input_schema: tool.input_schema.clone(),
                registry: Arc::clone(registry),
            };
            builder = builder.tool(tool.name.clone(), handler);
        }

        builder.build()
    }

    /// Serve over stdio until the peer disconnects.
    ///
    /// Fails if a clone of this server is still alive, since stdio serving
    /// needs sole ownership of the underlying pmcp server.
    pub async fn run(self) -> Result<(), pmcp::Error> {
        tracing::info!("Starting MCP server in stdio mode");

        let server = Arc::try_unwrap(self.server)
            .map_err(|_| Error::internal("MCP server is shared and cannot run over stdio"))?
            .into_inner();

        server.run_stdio().await
    }

    /// Serve streamable HTTP on `addr`
    pub async fn run_http(&self, addr: &str) -> Result<(SocketAddr, JoinHandle<()>), pmcp::Error> {
        tracing::info!("Starting MCP server in HTTP mode on {}", addr);

        let socket_addr: SocketAddr = addr
            .parse()
            .map_err(|e| Error::invalid_params(format!("Invalid address: {}", e)))?;

        let http_server = StreamableHttpServer::new(socket_addr, self.server.clone());
        http_server.start().await
    }
}

/// Adapts a registered tool to pmcp's ToolHandler
#[derive(Clone)]
struct ToolWrapper {
    name: String,
    description: Option<String>,
    input_schema: Value,
    registry: Arc<ToolRegistry>,
}

#[async_trait]
impl ToolHandler for ToolWrapper {
    async fn handle(&self, args: Value, _extra: RequestHandlerExtra) -> Result<Value, Error> {
        let envelope = self
            .registry
            .execute(&self.name, args)
            .await
            .map_err(to_protocol_error)?;
        serde_json::to_value(envelope).map_err(|e| Error::internal(&e.to_string()))
    }

    fn metadata(&self) -> Option<ToolInfo> {
        Some(ToolInfo::new(
            self.name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        ))
    }
}

/// Map a tool failure onto a protocol error
fn to_protocol_error(err: ToolError) -> Error {
    let message = format!("[{}] {}", err.kind(), err);
    match err.kind() {
        ErrorKind::SchemaValidation
        | ErrorKind::InvalidArgument
        | ErrorKind::InvalidQuery
        | ErrorKind::UnknownTool => Error::invalid_params(message),
        _ => {
            tracing::warn!("Tool {} failed: {}", err.tool, err);
            Error::internal(&message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::Config;
    use crate::error::ArchiveError;

    fn registry() -> Arc<ToolRegistry> {
        let client = Client::new(Config::new("test-key").unwrap()).unwrap();
        Arc::new(ToolRegistry::new(client).unwrap())
    }

    #[test]
    fn test_server_builds_with_all_tools() {
        let server = McpServer::new(registry()).unwrap();
        assert_eq!(server.registry().names().len(), 7);
    }

    #[test]
    fn test_error_mapping_keeps_kind() {
        let invalid = to_protocol_error(ToolError::new(
            "search",
            ArchiveError::InvalidQuery("no category selected".to_string()),
        ));
        assert!(invalid.to_string().contains("invalid_query"));

        let internal = to_protocol_error(ToolError::new(
            "get_record",
            ArchiveError::Lifecycle("no open client scope".to_string()),
        ));
        assert!(internal.to_string().contains("lifecycle"));
    }
}
