//! cache_delete tool implementation.
//!
//! Removes one cache generation with all its entries.

use precache_core::{CacheStore, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteParams {
    /// Name of the generation to delete.
    pub cache_name: String,
}

/// Output from the cache_delete tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDeleteOutput {
    pub cache_name: String,
    /// False when no generation had that name.
    pub deleted: bool,
}

/// Implementation of the cache_delete tool.
pub async fn delete_impl(store: &dyn CacheStore, params: CacheDeleteParams) -> Result<CallToolResult, McpError> {
    if params.cache_name.trim().is_empty() {
        return Err(Error::InvalidInput("cache_name cannot be empty".to_string()).into());
    }

    let deleted = store.delete_cache(&params.cache_name).await?;
    tracing::info!(cache = %params.cache_name, deleted, "cache generation delete requested");

    json_result(&CacheDeleteOutput { cache_name: params.cache_name, deleted })
}
