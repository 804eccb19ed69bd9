//! Network-first: live content whenever the network answers.
//!
//! Used for documents, which must reflect the latest deployment while online
//! and still open offline from the last copy seen.

use std::sync::Arc;

use precache_core::{CacheHandle, CacheWriteMode, Error, MatchOptions, Request};

use super::{Resolved, persist};
use crate::fetch::Fetcher;

pub struct NetworkFirst {
    cache: CacheHandle,
    fetcher: Arc<dyn Fetcher>,
    writes: CacheWriteMode,
}

impl NetworkFirst {
    pub fn new(cache: CacheHandle, fetcher: Arc<dyn Fetcher>, writes: CacheWriteMode) -> Self {
        Self { cache, fetcher, writes }
    }

    /// Fetch from the network, refreshing the cache; fall back to the cached
    /// entry (exact URL match) when the network fails. Errors that are not
    /// network failures are returned as-is.
    pub async fn fetch(&self, request: &Request) -> Result<Option<Resolved>, Error> {
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if !request.is_cacheable() {
                    return Ok(Some(Resolved::network(response)));
                }

                let (returned, stored) = response.fork();
                persist(&self.cache, self.writes, request.clone(), stored).await?;
                tracing::debug!(url = %request.url, cache = self.cache.name(), "network-first refreshed cache");
                Ok(Some(Resolved::network(returned)))
            }
            Err(err) if !err.is_network() => Err(err),
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "network request failed, looking up cache");

                let cached = self.cache.match_request(request, MatchOptions::default()).await?;
                if cached.is_none() {
                    tracing::error!(url = %request.url, "no response from network or cache");
                }
                Ok(cached.map(Resolved::cache))
            }
        }
    }
}
