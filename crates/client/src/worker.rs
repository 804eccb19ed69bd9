//! Typed event dispatch for one worker version.
//!
//! ```text
//! Parsed ──install──▶ Installing ──ok──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                         │
//!                         └──err──▶ Redundant
//! ```
//!
//! Fetch events before activation are served by the generation a previous
//! run left active, if any, and otherwise bypass the cache entirely, the same
//! as a page with no controlling worker.
//!
//! Install and activate run on their own tasks. Dropping the caller does not
//! interrupt them, so the state always settles.

use std::sync::Arc;

use precache_core::{CacheStore, Error, Request, WorkerConfig};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::fetch::Fetcher;
use crate::interceptor::Interceptor;
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, WorkerHost};
use crate::strategy::Resolved;

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    /// Install failed; this worker never serves requests.
    Redundant,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        }
    }
}

/// Events delivered by the hosting runtime.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
}

/// Result of handling one event.
#[derive(Debug, Clone)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    /// `None` when neither network nor cache produced a response.
    Fetched(Option<Resolved>),
}

pub struct Worker {
    config: Arc<WorkerConfig>,
    lifecycle: Arc<Lifecycle>,
    interceptor: Interceptor,
    /// Serves clients on behalf of the generation active before this worker.
    previous: Option<(String, Interceptor)>,
    fetcher: Arc<dyn Fetcher>,
    host: Arc<dyn WorkerHost>,
    state: Arc<RwLock<WorkerState>>,
}

impl Worker {
    /// A worker with no prior history. Does no I/O.
    pub fn new(
        config: WorkerConfig, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, host: Arc<dyn WorkerHost>,
    ) -> Self {
        Self::build(Arc::new(config), store, fetcher, host, WorkerState::Parsed, None)
    }

    /// A worker that picks up where the last run left off.
    ///
    /// If the store records this worker's generation as active, the worker
    /// starts `Activated` and serves from it immediately. If another
    /// generation is active, that generation keeps serving until this worker
    /// activates.
    pub async fn restore(
        config: WorkerConfig, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, host: Arc<dyn WorkerHost>,
    ) -> Result<Self, Error> {
        let config = Arc::new(config);

        let (state, previous) = match store.active_cache().await? {
            Some(active) if active == config.cache_name => {
                tracing::info!(cache = %active, "resuming active cache generation");
                (WorkerState::Activated, None)
            }
            Some(active) => {
                tracing::info!(cache = %active, next = %config.cache_name, "previous generation keeps serving");
                let previous_config = Arc::new(WorkerConfig { cache_name: active.clone(), ..(*config).clone() });
                let interceptor = Interceptor::new(previous_config, store.clone(), fetcher.clone());
                (WorkerState::Parsed, Some((active, interceptor)))
            }
            None => (WorkerState::Parsed, None),
        };

        Ok(Self::build(config, store, fetcher, host, state, previous))
    }

    fn build(
        config: Arc<WorkerConfig>, store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>, host: Arc<dyn WorkerHost>,
        state: WorkerState, previous: Option<(String, Interceptor)>,
    ) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(config.clone(), store.clone(), fetcher.clone()));
        let interceptor = Interceptor::new(config.clone(), store, fetcher.clone());

        Self { config, lifecycle, interceptor, previous, fetcher, host, state: Arc::new(RwLock::new(state)) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Name of the generation fetch events are served from, if any.
    pub async fn serving_cache(&self) -> Option<String> {
        if self.state().await == WorkerState::Activated {
            return Some(self.config.cache_name.clone());
        }
        self.previous.as_ref().map(|(name, _)| name.clone())
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        match event {
            WorkerEvent::Install => self.install().await.map(EventOutcome::Installed),
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.fetch(&request).await.map(EventOutcome::Fetched),
        }
    }

    /// Run the install handler.
    ///
    /// A fresh worker that fails to install becomes redundant. Re-installing
    /// an installed or active worker keeps its state either way, so a failed
    /// refresh leaves the previous generation serving.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            match previous {
                WorkerState::Redundant => return Err(Error::InvalidState("worker is redundant".into())),
                WorkerState::Installing | WorkerState::Activating => {
                    return Err(Error::InvalidState(format!("worker is {}", previous.as_str())));
                }
                WorkerState::Parsed => *state = WorkerState::Installing,
                WorkerState::Installed | WorkerState::Activated => {}
            }
            previous
        };

        let lifecycle = self.lifecycle.clone();
        let host = self.host.clone();
        let state = self.state.clone();
        let cache_name = self.config.cache_name.clone();
        let task = tokio::spawn(async move {
            let result = lifecycle.install(host.as_ref()).await;

            if previous == WorkerState::Parsed {
                let mut state = state.write().await;
                *state = if result.is_ok() { WorkerState::Installed } else { WorkerState::Redundant };
                if result.is_err() {
                    tracing::error!(cache = %cache_name, "install failed, worker discarded");
                }
            }
            result
        });

        let fallback = if previous == WorkerState::Parsed { WorkerState::Redundant } else { previous };
        self.settle(task, fallback, "install").await
    }

    /// Run the activate handler. Legal once installed; repeating it on an
    /// active worker prunes again.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let previous = {
            let mut state = self.state.write().await;
            let previous = *state;
            match previous {
                WorkerState::Installed | WorkerState::Activated => *state = WorkerState::Activating,
                other => return Err(Error::InvalidState(format!("cannot activate a worker that is {}", other.as_str()))),
            }
            previous
        };

        let lifecycle = self.lifecycle.clone();
        let host = self.host.clone();
        let state = self.state.clone();
        let task = tokio::spawn(async move {
            let result = lifecycle.activate(host.as_ref()).await;
            *state.write().await = if result.is_ok() { WorkerState::Activated } else { previous };
            result
        });

        self.settle(task, previous, "activate").await
    }

    /// Wait for a lifecycle task. A task that panicked leaves `fallback` as
    /// the state.
    async fn settle<T>(
        &self, task: JoinHandle<Result<T, Error>>, fallback: WorkerState, event: &str,
    ) -> Result<T, Error> {
        match task.await {
            Ok(result) => result,
            Err(err) => {
                *self.state.write().await = fallback;
                tracing::error!(event, error = %err, "lifecycle task did not complete");
                Err(Error::Interrupted(format!("{event}: {err}")))
            }
        }
    }

    /// Handle an intercepted request.
    pub async fn fetch(&self, request: &Request) -> Result<Option<Resolved>, Error> {
        if self.state().await == WorkerState::Activated {
            return self.interceptor.handle(request).await;
        }

        if let Some((_, interceptor)) = &self.previous {
            return interceptor.handle(request).await;
        }

        tracing::debug!(url = %request.url, "no active worker, passing request to network");
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(Some(Resolved::network(response))),
            Err(err) if !err.is_network() => Err(err),
            Err(err) => {
                tracing::warn!(url = %request.url, error = %err, "network request failed");
                Ok(None)
            }
        }
    }
}
