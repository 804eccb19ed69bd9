//! Request classification and dispatch to a fetch strategy.

use std::fmt;
use std::sync::Arc;

use precache_core::{CacheHandle, CacheStore, Error, Request, WorkerConfig};
use url::Url;

use crate::fetch::Fetcher;
use crate::strategy::{CacheFirst, NetworkFirst, Resolved, Strategy, WritePolicy};

/// What an intercepted request is for, derived from its URL alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// The application's top-level page.
    Document,
    /// Anything else: icons, manifest, styles, cross-origin resources.
    Asset,
}

impl RequestKind {
    pub fn strategy(self) -> Strategy {
        match self {
            RequestKind::Document => Strategy::NetworkFirst,
            RequestKind::Asset => Strategy::CacheFirst,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Document => f.write_str("document"),
            RequestKind::Asset => f.write_str("asset"),
        }
    }
}

/// Same-origin URLs whose path is a directory or ends in the main document
/// are documents; everything else is an asset.
pub fn classify(url: &Url, config: &WorkerConfig) -> RequestKind {
    let path = url.path();
    let same_origin = url.origin() == config.scope.origin();

    if same_origin && (path.ends_with('/') || path.ends_with(config.main_document.as_str())) {
        RequestKind::Document
    } else {
        RequestKind::Asset
    }
}

/// Routes each request to network-first or cache-first.
pub struct Interceptor {
    config: Arc<WorkerConfig>,
    network_first: NetworkFirst,
    cache_first: CacheFirst,
}

impl Interceptor {
    pub fn new(config: Arc<WorkerConfig>, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        let cache = CacheHandle::new(store, config.cache_name.clone());
        let network_first = NetworkFirst::new(cache.clone(), fetcher.clone(), config.cache_writes);
        let cache_first = CacheFirst::new(cache, fetcher, config.ignore_search, WritePolicy::from_config(&config));

        Self { config, network_first, cache_first }
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        classify(&request.url, &self.config)
    }

    /// Resolve a request. `Ok(None)` means neither source had a response.
    pub async fn handle(&self, request: &Request) -> Result<Option<Resolved>, Error> {
        let kind = self.classify(request);
        tracing::debug!(url = %request.url, ?kind, strategy = %kind.strategy(), "intercepted request");

        match kind.strategy() {
            Strategy::NetworkFirst => self.network_first.fetch(request).await,
            Strategy::CacheFirst => self.cache_first.fetch(request).await,
        }
    }
}
