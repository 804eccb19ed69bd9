//! Cache-first: instant loads for static assets.
//!
//! A hit never touches the network. A miss is fetched and, if the write
//! policy admits the URL, back-filled.

use std::sync::Arc;

use precache_core::{CacheHandle, Error, MatchOptions, Request};

use super::{Resolved, WritePolicy, persist};
use crate::fetch::Fetcher;

pub struct CacheFirst {
    cache: CacheHandle,
    fetcher: Arc<dyn Fetcher>,
    match_options: MatchOptions,
    policy: WritePolicy,
}

impl CacheFirst {
    pub fn new(cache: CacheHandle, fetcher: Arc<dyn Fetcher>, ignore_search: bool, policy: WritePolicy) -> Self {
        let match_options = MatchOptions { ignore_search, ..Default::default() };
        Self { cache, fetcher, match_options, policy }
    }

    pub async fn fetch(&self, request: &Request) -> Result<Option<Resolved>, Error> {
        if let Some(hit) = self.cache.match_request(request, self.match_options).await? {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(Some(Resolved::cache(hit)));
        }

        tracing::debug!(url = %request.url, "cache miss, fetching");

        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(err) if !err.is_network() => return Err(err),
            Err(err) => {
                tracing::error!(url = %request.url, error = %err, "no response from cache or network");
                return Ok(None);
            }
        };

        if !request.is_cacheable() || !self.policy.admits(&request.url) {
            return Ok(Some(Resolved::network(response)));
        }

        let (returned, stored) = response.fork();
        persist(&self.cache, self.policy.mode, request.clone(), stored).await?;
        Ok(Some(Resolved::network(returned)))
    }
}
