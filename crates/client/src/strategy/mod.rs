//! The two fetch strategies.
//!
//! | Strategy      | First source | Fallback       | Cache write              |
//! |---------------|--------------|----------------|--------------------------|
//! | Network-first | network      | cache on error | every successful fetch   |
//! | Cache-first   | cache        | network on miss | on miss, extension-gated |
//!
//! Both return `Ok(None)` when neither source produced a response. Errors
//! are reserved for cache store failures.

pub mod cache_first;
pub mod network_first;

use std::fmt;

use precache_core::{CacheHandle, CacheWriteMode, Error, Request, Response, WorkerConfig};
use url::Url;

use crate::fetch::extension;

pub use cache_first::CacheFirst;
pub use network_first::NetworkFirst;

/// Which source a strategy consults first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    NetworkFirst,
    CacheFirst,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::NetworkFirst => f.write_str("network-first"),
            Strategy::CacheFirst => f.write_str("cache-first"),
        }
    }
}

/// Where a returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Network,
    Cache,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Network => f.write_str("network"),
            Source::Cache => f.write_str("cache"),
        }
    }
}

/// A response together with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub response: Response,
    pub source: Source,
}

impl Resolved {
    pub fn network(response: Response) -> Self {
        Self { response, source: Source::Network }
    }

    pub fn cache(response: Response) -> Self {
        Self { response, source: Source::Cache }
    }
}

/// Rules for writing fetched responses back into the generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePolicy {
    /// Lower-cased extensions eligible for back-fill; None admits everything.
    pub extensions: Option<Vec<String>>,
    pub mode: CacheWriteMode,
}

impl WritePolicy {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self { extensions: config.cache_extensions.clone(), mode: config.cache_writes }
    }

    /// Whether the extension gate lets this URL into the cache.
    pub fn admits(&self, url: &Url) -> bool {
        match &self.extensions {
            None => true,
            Some(allowed) => extension(url).is_some_and(|ext| allowed.iter().any(|a| *a == ext)),
        }
    }
}

/// Write `response` into the generation according to `mode`.
///
/// Detached writes run on their own task so they finish even if the caller
/// is dropped; their failures are logged rather than returned.
pub(crate) async fn persist(
    cache: &CacheHandle, mode: CacheWriteMode, request: Request, response: Response,
) -> Result<(), Error> {
    match mode {
        CacheWriteMode::Await => cache.put(&request, &response).await,
        CacheWriteMode::Detached => {
            let cache = cache.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.put(&request, &response).await {
                    tracing::warn!(url = %request.url, cache = cache.name(), error = %e, "detached cache write failed");
                }
            });
            Ok(())
        }
    }
}
