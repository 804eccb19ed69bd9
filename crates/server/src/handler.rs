//! MCP server handler implementation.
//!
//! Each tool delivers one worker event or inspects the cache storage.
use std::sync::Arc;

use crate::host::ClientRegistry;
use crate::tools::cache::{CacheDeleteParams, CacheListParams, delete_impl, list_impl};
use crate::tools::fetch::{WorkerFetchParams, fetch_impl};
use crate::tools::lifecycle::{activate_impl, install_impl};

use precache_client::Worker;
use precache_core::CacheStore;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for precache.
#[derive(Clone)]
pub struct PrecacheServer {
    tool_router: ToolRouter<Self>,
    worker: Arc<Worker>,
    store: Arc<dyn CacheStore>,
    host: Arc<ClientRegistry>,
}

#[tool_router]
impl PrecacheServer {
    pub fn new(worker: Arc<Worker>, store: Arc<dyn CacheStore>, host: Arc<ClientRegistry>) -> Self {
        Self { tool_router: Self::tool_router(), worker, store, host }
    }

    #[tool(
        description = "Install the worker: fetch every manifest asset and store it in the current cache generation. Activates immediately when the worker skips waiting."
    )]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.worker, &self.host).await
    }

    #[tool(description = "Activate the installed worker: delete every cache generation except the current one and claim clients.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.worker).await
    }

    /// Intercept a request the way a controlled page would issue it.
    #[tool(
        description = "Fetch a URL through the worker. Documents are network-first, other assets cache-first. Relative URLs resolve against the worker scope."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.worker, params.0).await
    }

    #[tool(description = "List cache generations, or the entry URLs of one generation when cache_name is given.")]
    async fn cache_list(&self, params: Parameters<CacheListParams>) -> Result<CallToolResult, McpError> {
        list_impl(self.store.as_ref(), params.0).await
    }

    #[tool(description = "Delete a cache generation and all of its entries.")]
    async fn cache_delete(&self, params: Parameters<CacheDeleteParams>) -> Result<CallToolResult, McpError> {
        delete_impl(self.store.as_ref(), params.0).await
    }
}

impl ServerHandler for PrecacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "precache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
