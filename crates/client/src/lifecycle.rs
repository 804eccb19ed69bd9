//! Install and activate: populating and pruning cache generations.

use std::sync::Arc;

use futures_util::future::try_join_all;
use precache_core::{CacheHandle, CacheStore, Error, Request, Response, WorkerConfig};
use serde::Serialize;

use crate::fetch::Fetcher;

/// Hooks the hosting runtime exposes to lifecycle handlers.
#[async_trait::async_trait]
pub trait WorkerHost: Send + Sync {
    /// The installed worker is ready to activate without waiting for
    /// existing clients to close.
    fn skip_waiting(&self);

    /// Take control of already-open clients. Returns how many were claimed.
    async fn claim_clients(&self) -> Result<usize, Error>;
}

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub cache_name: String,
    /// Manifest URLs written into the generation, in manifest order.
    pub cached: Vec<String>,
    pub skip_waiting: bool,
    pub installed_at: String,
}

/// Outcome of a successful activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub cache_name: String,
    /// Generations removed because their name differs from the current one.
    pub deleted: Vec<String>,
    pub claimed_clients: usize,
}

pub struct Lifecycle {
    config: Arc<WorkerConfig>,
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
}

impl Lifecycle {
    pub fn new(config: Arc<WorkerConfig>, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { config, store, fetcher }
    }

    /// Populate the current generation with every manifest asset.
    ///
    /// All assets are fetched before anything is written: a single failed
    /// fetch or non-2xx status aborts the install with
    /// [`Error::InstallFailed`] and leaves the store untouched. Not retried.
    pub async fn install(&self, host: &dyn WorkerHost) -> Result<InstallReport, Error> {
        tracing::info!(cache = %self.config.cache_name, assets = self.config.manifest.len(), "install started");

        let fetched: Vec<(Request, Response)> =
            try_join_all(self.config.manifest.iter().map(|url| self.fetch_asset(Request::get(url.clone())))).await?;

        let cache = CacheHandle::open(self.store.clone(), self.config.cache_name.clone()).await?;
        for (request, response) in &fetched {
            cache.put(request, response).await?;
        }

        host.skip_waiting();

        let cached: Vec<String> = fetched.iter().map(|(req, _)| req.url.to_string()).collect();
        tracing::info!(cache = %self.config.cache_name, cached = cached.len(), "install complete");

        Ok(InstallReport {
            cache_name: self.config.cache_name.clone(),
            cached,
            skip_waiting: true,
            installed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    async fn fetch_asset(&self, request: Request) -> Result<(Request, Response), Error> {
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed { url: request.url.to_string(), reason: e.to_string() })?;

        if !response.ok() {
            tracing::error!(url = %request.url, status = response.status, "manifest asset unavailable");
            return Err(Error::InstallFailed {
                url: request.url.to_string(),
                reason: format!("status {}", response.status),
            });
        }

        Ok((request, response))
    }

    /// Delete every generation other than the current one, record the current
    /// one as active so it keeps serving after a restart, then claim clients.
    pub async fn activate(&self, host: &dyn WorkerHost) -> Result<ActivateReport, Error> {
        tracing::info!(cache = %self.config.cache_name, "activation started");

        let mut deleted = Vec::new();
        for name in self.store.cache_names().await? {
            if name != self.config.cache_name {
                tracing::info!(cache = %name, "deleting stale cache generation");
                if self.store.delete_cache(&name).await? {
                    deleted.push(name);
                }
            }
        }

        self.store.mark_active(&self.config.cache_name).await?;

        let claimed_clients = host.claim_clients().await?;
        tracing::info!(cache = %self.config.cache_name, claimed_clients, "activation complete");

        Ok(ActivateReport { cache_name: self.config.cache_name.clone(), deleted, claimed_clients })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHost, ScriptedFetcher, worker_config};
    use precache_core::MemoryStore;
    use std::sync::atomic::Ordering;

    fn routed_fetcher() -> Arc<ScriptedFetcher> {
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route("https://app.example.com/", 200, "<html>root</html>");
        fetcher.route("https://app.example.com/index.html", 200, "<html>index</html>");
        fetcher.route("https://app.example.com/manifest.json", 200, "{}");
        fetcher.route("https://app.example.com/icon-192x192.png", 200, "png192");
        fetcher.route("https://app.example.com/icon-512x512.png", 200, "png512");
        fetcher
    }

    #[tokio::test]
    async fn test_install_caches_every_manifest_url() {
        let config = Arc::new(worker_config());
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(config.clone(), store.clone(), routed_fetcher());
        let host = RecordingHost::default();

        let report = lifecycle.install(&host).await.unwrap();

        let expected: Vec<String> = config.manifest.iter().map(|u| u.to_string()).collect();
        assert_eq!(report.cached, expected);
        assert_eq!(store.keys(&config.cache_name).await.unwrap(), expected);
        assert!(report.skip_waiting);
        assert!(host.skipped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_install_is_idempotent() {
        let config = Arc::new(worker_config());
        let store = Arc::new(MemoryStore::new());
        let lifecycle = Lifecycle::new(config.clone(), store.clone(), routed_fetcher());
        let host = RecordingHost::default();

        lifecycle.install(&host).await.unwrap();
        let first = store.keys(&config.cache_name).await.unwrap();
        lifecycle.install(&host).await.unwrap();
        let second = store.keys(&config.cache_name).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.cache_names().await.unwrap(), vec![config.cache_name.clone()]);
    }

    #[tokio::test]
    async fn test_install_fails_on_missing_asset_and_writes_nothing() {
        let config = Arc::new(worker_config());
        let store = Arc::new(MemoryStore::new());
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.route("https://app.example.com/", 200, "root");
        fetcher.route("https://app.example.com/index.html", 200, "index");
        let lifecycle = Lifecycle::new(config, store.clone(), fetcher);
        let host = RecordingHost::default();

        let err = lifecycle.install(&host).await.unwrap_err();
        assert!(matches!(&err, Error::InstallFailed { reason, .. } if reason == "status 404"));
        assert!(store.cache_names().await.unwrap().is_empty());
        assert!(!host.skipped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_install_fails_offline() {
        let config = Arc::new(worker_config());
        let store = Arc::new(MemoryStore::new());
        let fetcher = routed_fetcher();
        fetcher.set_offline(true);
        let lifecycle = Lifecycle::new(config, store.clone(), fetcher);

        let err = lifecycle.install(&RecordingHost::default()).await.unwrap_err();
        assert!(matches!(err, Error::InstallFailed { .. }));
        assert!(store.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_activate_prunes_old_generations() {
        let config = Arc::new(precache_core::AppConfig {
            cache_prefix: "tkp".into(),
            cache_version: "v5".into(),
            scope: "https://app.example.com/".into(),
            ..Default::default()
        }
        .worker()
        .unwrap());
        let store = Arc::new(MemoryStore::new());
        store.open("tkp-v4").await.unwrap();
        store.open("tkp-v5").await.unwrap();
        let lifecycle = Lifecycle::new(config, store.clone(), Arc::new(ScriptedFetcher::new()));
        let host = RecordingHost::default();

        let report = lifecycle.activate(&host).await.unwrap();

        assert_eq!(report.deleted, vec!["tkp-v4".to_string()]);
        assert_eq!(report.claimed_clients, 1);
        assert_eq!(store.cache_names().await.unwrap(), vec!["tkp-v5".to_string()]);
        assert_eq!(host.claims.load(Ordering::SeqCst), 1);
        assert_eq!(store.active_cache().await.unwrap().as_deref(), Some("tkp-v5"));
    }
}
