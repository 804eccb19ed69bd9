//! cache_list tool implementation.
//!
//! Lists cache generations, or the entries of one generation.

use precache_core::{CacheStore, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_list tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheListParams {
    /// List the entry URLs of this generation instead of the generation names.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CacheListOutput {
    Generations { caches: Vec<String> },
    Entries { cache_name: String, urls: Vec<String> },
}

/// Implementation of the cache_list tool.
pub async fn list_impl(store: &dyn CacheStore, params: CacheListParams) -> Result<CallToolResult, McpError> {
    let output = match params.cache_name {
        None => CacheListOutput::Generations { caches: store.cache_names().await? },
        Some(name) => {
            if !store.cache_names().await?.contains(&name) {
                return Err(Error::CacheMiss(format!("no cache named {name}")).into());
            }
            let urls = store.keys(&name).await?;
            CacheListOutput::Entries { cache_name: name, urls }
        }
    };

    json_result(&output)
}
