//! worker_fetch tool implementation.
//!
//! Delivers a fetch event to the worker and reports which source answered.

use std::collections::BTreeMap;

use precache_client::fetch::resolve;
use precache_client::{Worker, classify};
use precache_core::{Error, Request};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// The URL to fetch. Relative URLs resolve against the worker scope.
    pub url: String,

    /// HTTP method (default: GET). Only GET responses are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers forwarded to the network.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// The request URL after resolution.
    pub url: String,
    /// The URL of the returned response.
    pub response_url: String,
    /// "document" or "asset".
    pub kind: String,
    /// Strategy applied; absent while no cache generation controls clients.
    pub strategy: Option<String>,
    /// Cache generation that handled the request, if any.
    pub cache_name: Option<String>,
    /// "network" or "cache".
    pub source: String,
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as text, when it is textual and valid UTF-8.
    pub body: Option<String>,
    pub body_len: usize,
}

fn is_textual(content_type: Option<&str>) -> bool {
    let Some(content_type) = content_type else {
        return true;
    };
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("json")
        || mime.ends_with("xml")
        || mime.ends_with("javascript")
        || mime == "image/svg+xml"
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(worker: &Worker, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let config = worker.config();
    let url = resolve(&params.url, &config.scope).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let request = params
        .headers
        .iter()
        .fold(Request::new(params.method.trim(), url), |request, (name, value)| request.with_header(name, value));

    let kind = classify(&request.url, config);
    let cache_name = worker.serving_cache().await;
    let strategy = cache_name.as_ref().map(|_| kind.strategy().to_string());

    let resolved = worker
        .fetch(&request)
        .await?
        .ok_or_else(|| Error::NoResponse(request.url.to_string()))?;

    let response = resolved.response;
    let content_type = response.content_type().map(str::to_string);
    let body = if is_textual(content_type.as_deref()) {
        std::str::from_utf8(&response.body).ok().map(str::to_string)
    } else {
        None
    };

    let output = WorkerFetchOutput {
        url: request.url.to_string(),
        response_url: response.url.to_string(),
        kind: kind.to_string(),
        strategy,
        cache_name,
        source: resolved.source.to_string(),
        status: response.status,
        status_text: response.status_text,
        content_type,
        body_len: response.body.len(),
        headers: response.headers,
        body,
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::lifecycle::install_impl;
    use crate::tools::testing::{fixture, output_text};
    use precache_client::Worker;

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams { url: url.to_string(), method: default_method(), headers: BTreeMap::new() }
    }

    fn parse(result: &CallToolResult) -> WorkerFetchOutput {
        serde_json::from_str(&output_text(result)).unwrap()
    }

    #[tokio::test]
    async fn test_document_served_from_cache_when_offline() {
        let fx = fixture().await;
        install_impl(&fx.worker, &fx.host).await.unwrap();

        let online = parse(&fetch_impl(&fx.worker, params("index.html")).await.unwrap());
        assert_eq!(online.kind, "document");
        assert_eq!(online.strategy.as_deref(), Some("network-first"));
        assert_eq!(online.source, "network");
        assert_eq!(online.body.as_deref(), Some("A"));

        fx.site.set_offline(true);
        let offline = parse(&fetch_impl(&fx.worker, params("index.html")).await.unwrap());
        assert_eq!(offline.source, "cache");
        assert_eq!(offline.body.as_deref(), Some("A"));
        assert_eq!(offline.url, "https://app.example.com/index.html");
    }

    #[tokio::test]
    async fn test_asset_with_query_hits_cache() {
        let fx = fixture().await;
        install_impl(&fx.worker, &fx.host).await.unwrap();
        fx.site.set_offline(true);

        let output = parse(&fetch_impl(&fx.worker, params("icon-192x192.png?cb=123")).await.unwrap());
        assert_eq!(output.kind, "asset");
        assert_eq!(output.strategy.as_deref(), Some("cache-first"));
        assert_eq!(output.source, "cache");
        assert_eq!(output.body_len, 6);
    }

    #[tokio::test]
    async fn test_unresolved_request_is_no_response() {
        let fx = fixture().await;
        install_impl(&fx.worker, &fx.host).await.unwrap();
        fx.site.set_offline(true);

        let err = fetch_impl(&fx.worker, params("https://cdn.example.com/lib.js")).await.unwrap_err();
        assert_eq!(err.code.0, -32014);
    }

    #[tokio::test]
    async fn test_before_install_goes_to_network() {
        let fx = fixture().await;

        let output = parse(&fetch_impl(&fx.worker, params("index.html")).await.unwrap());
        assert_eq!(output.source, "network");
        assert_eq!(output.strategy, None);
    }

    #[tokio::test]
    async fn test_invalid_input() {
        let fx = fixture().await;
        assert_eq!(fetch_impl(&fx.worker, params("  ")).await.unwrap_err().code.0, -32602);
        assert_eq!(fetch_impl(&fx.worker, params("ftp://example.com/x")).await.unwrap_err().code.0, -32003);
    }

    #[tokio::test]
    async fn test_headers_are_forwarded() {
        let fx = fixture().await;
        let mut input = params("index.html");
        input.headers.insert("accept".into(), "text/html".into());

        fetch_impl(&fx.worker, input).await.unwrap();
        assert_eq!(fx.site.last_headers(), vec![("accept".to_string(), "text/html".to_string())]);
    }

    #[tokio::test]
    async fn test_restarted_server_serves_offline() {
        let fx = fixture().await;
        install_impl(&fx.worker, &fx.host).await.unwrap();
        fx.site.set_offline(true);

        let restarted = Worker::restore(fx.worker.config().clone(), fx.store.clone(), fx.site.clone(), fx.host.clone())
            .await
            .unwrap();
        let output = parse(&fetch_impl(&restarted, params("index.html")).await.unwrap());
        assert_eq!(output.source, "cache");
        assert_eq!(output.cache_name.as_deref(), Some("precache-v1"));
        assert_eq!(output.strategy.as_deref(), Some("network-first"));
        assert_eq!(output.body.as_deref(), Some("A"));
    }

    #[test]
    fn test_is_textual() {
        assert!(is_textual(Some("text/html; charset=utf-8")));
        assert!(is_textual(Some("application/manifest+json")));
        assert!(is_textual(None));
        assert!(!is_textual(Some("image/png")));
    }
}
