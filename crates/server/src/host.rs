//! Host side of the lifecycle hooks.
//!
//! Each MCP session is one client. The registry remembers whether the
//! installed worker asked to skip waiting and which clients it controls.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use precache_client::WorkerHost;
use precache_core::Error;

#[derive(Debug, Default)]
pub struct ClientRegistry {
    connected: AtomicUsize,
    controlled: AtomicUsize,
    waiting_skipped: AtomicBool,
}

impl ClientRegistry {
    pub fn with_clients(connected: usize) -> Self {
        Self { connected: AtomicUsize::new(connected), ..Default::default() }
    }

    /// Whether the last install asked to activate immediately.
    pub fn waiting_skipped(&self) -> bool {
        self.waiting_skipped.load(Ordering::SeqCst)
    }

    pub fn controlled(&self) -> usize {
        self.controlled.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WorkerHost for ClientRegistry {
    fn skip_waiting(&self) {
        tracing::debug!("worker requested skip waiting");
        self.waiting_skipped.store(true, Ordering::SeqCst);
    }

    async fn claim_clients(&self) -> Result<usize, Error> {
        let connected = self.connected.load(Ordering::SeqCst);
        let previous = self.controlled.swap(connected, Ordering::SeqCst);
        tracing::debug!(connected, newly_claimed = connected.saturating_sub(previous), "claimed clients");
        Ok(connected)
    }
}
