//! Scripted network, store and host doubles for strategy, lifecycle and worker tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use precache_core::{AppConfig, CacheStore, Error, MatchOptions, MemoryStore, Request, Response, WorkerConfig};
use url::Url;

use crate::fetch::Fetcher;
use crate::lifecycle::WorkerHost;

pub(crate) fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub(crate) fn worker_config() -> WorkerConfig {
    AppConfig { scope: "https://app.example.com/".into(), ..Default::default() }
        .worker()
        .unwrap()
}

/// Wait up to a second for `name` to hold `count` entries.
pub(crate) async fn wait_for_keys(store: &dyn CacheStore, name: &str, count: usize) -> bool {
    for _ in 0..100 {
        if store.keys(name).await.unwrap().len() == count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Serves canned bodies by URL and counts every call.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    routes: Mutex<HashMap<String, (u16, Bytes)>>,
    sequences: Mutex<HashMap<String, VecDeque<&'static str>>>,
    offline: AtomicBool,
    malformed: AtomicBool,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, status: u16, body: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), (status, Bytes::from_static(body.as_bytes())));
    }

    /// Answer successive calls for `url` with `bodies` in order, then fall
    /// back to the fixed route.
    pub(crate) fn route_sequence(&self, url: &str, bodies: &[&'static str]) {
        self.sequences
            .lock()
            .unwrap()
            .insert(url.to_string(), bodies.iter().copied().collect());
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Reject every request as malformed rather than unreachable.
    pub(crate) fn set_malformed(&self, malformed: bool) {
        self.malformed.store(malformed, Ordering::SeqCst);
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.malformed.load(Ordering::SeqCst) {
            return Err(Error::InvalidInput(format!("malformed request for {}", request.url)));
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let next = self
            .sequences
            .lock()
            .unwrap()
            .get_mut(request.url.as_str())
            .and_then(VecDeque::pop_front);
        if let Some(body) = next {
            return Ok(Response::new(request.url.clone(), 200, body));
        }

        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, body) = route.unwrap_or((404, Bytes::from_static(b"not found")));
        Ok(Response::new(request.url.clone(), status, body))
    }
}

/// A [`MemoryStore`] whose writes take a while to land.
pub(crate) struct SlowStore {
    pub(crate) inner: MemoryStore,
    put_delay: Duration,
}

impl SlowStore {
    pub(crate) fn new(put_delay: Duration) -> Self {
        Self { inner: MemoryStore::new(), put_delay }
    }
}

#[async_trait::async_trait]
impl CacheStore for SlowStore {
    async fn open(&self, name: &str) -> Result<(), Error> {
        self.inner.open(name).await
    }

    async fn put(&self, name: &str, request: &Request, response: &Response) -> Result<(), Error> {
        tokio::time::sleep(self.put_delay).await;
        self.inner.put(name, request, response).await
    }

    async fn match_request(
        &self, name: &str, request: &Request, opts: MatchOptions,
    ) -> Result<Option<Response>, Error> {
        self.inner.match_request(name, request, opts).await
    }

    async fn keys(&self, name: &str) -> Result<Vec<String>, Error> {
        self.inner.keys(name).await
    }

    async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.inner.cache_names().await
    }

    async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        self.inner.delete_cache(name).await
    }

    async fn mark_active(&self, name: &str) -> Result<(), Error> {
        self.inner.mark_active(name).await
    }

    async fn active_cache(&self) -> Result<Option<String>, Error> {
        self.inner.active_cache().await
    }
}

/// Records lifecycle hook calls.
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) skipped: AtomicBool,
    pub(crate) claims: AtomicUsize,
}

#[async_trait::async_trait]
impl WorkerHost for RecordingHost {
    fn skip_waiting(&self) {
        self.skipped.store(true, Ordering::SeqCst);
    }

    async fn claim_clients(&self) -> Result<usize, Error> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    }
}
