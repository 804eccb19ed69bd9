//! worker_install and worker_activate tool implementations.

use precache_client::{ActivateReport, InstallReport, Worker};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use super::json_result;
use crate::host::ClientRegistry;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerInstallOutput {
    pub install: InstallReport,
    /// Present when the worker skipped waiting and was activated right away.
    pub activation: Option<ActivateReport>,
    pub state: String,
    /// Clients now controlled by this worker.
    pub controlled_clients: usize,
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerActivateOutput {
    pub activation: ActivateReport,
    pub state: String,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(worker: &Worker, host: &ClientRegistry) -> Result<CallToolResult, McpError> {
    let install = worker.install().await?;

    let activation = if host.waiting_skipped() { Some(worker.activate().await?) } else { None };

    let output = WorkerInstallOutput {
        install,
        activation,
        state: worker.state().await.as_str().to_string(),
        controlled_clients: host.controlled(),
    };
    json_result(&output)
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(worker: &Worker) -> Result<CallToolResult, McpError> {
    let activation = worker.activate().await?;

    let output = WorkerActivateOutput { activation, state: worker.state().await.as_str().to_string() };
    json_result(&output)
}
