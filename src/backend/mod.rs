//! External analysis backend: a supervised long-running process plus a completion API client.
//!
//! The two collaborators are independent. The spawned process only matters for its
//! lifecycle (its output is logged, never parsed); answers come from the HTTP completion
//! client. [`AnalysisBackend`] puts both behind `ensure_connected` + `call`.

pub mod client;
pub mod process;
pub mod supervisor;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use client::{
    AzureOpenAiClient, AzureOpenAiSettings, ChatMessage, CompletionClient, CompletionRequest,
    ContentPart, ImageUrl, MessageContent, Role,
};
pub use process::{
    CommandLauncher, LaunchedProcess, ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher,
    ProcessMonitor, process_channel,
};
pub use supervisor::{BackendStatus, BackendSupervisor, ConnectionState, SupervisorPolicy};

/// Errors raised while talking to the analysis backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The supervisor could not bring the backend up.
    #[error("analysis backend is unavailable")]
    Unavailable,
    /// The completion call exceeded its deadline.
    #[error("analysis backend call timed out after {0:?}")]
    Timeout(Duration),
    /// The completion endpoint returned an error or an unusable response.
    #[error("analysis backend call failed: {detail}")]
    CallFailed {
        /// Diagnostic detail from the provider.
        detail: String,
    },
    /// The backend process could not be spawned.
    #[error("failed to launch backend process: {0}")]
    Launch(String),
}

/// Connection-guarded access to the completion API.
#[derive(Clone)]
pub struct AnalysisBackend {
    supervisor: BackendSupervisor,
    client: Arc<dyn CompletionClient>,
    request_timeout: Duration,
}

impl AnalysisBackend {
    /// Combine a supervisor and a completion client; every call is bounded by `request_timeout`.
    pub fn new(
        supervisor: BackendSupervisor,
        client: Arc<dyn CompletionClient>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            supervisor,
            client,
            request_timeout,
        }
    }

    /// The underlying supervisor, for status and lifecycle operations.
    pub fn supervisor(&self) -> &BackendSupervisor {
        &self.supervisor
    }

    /// See [`BackendSupervisor::ensure_connected`].
    pub async fn ensure_connected(&self) -> bool {
        self.supervisor.ensure_connected().await
    }

    /// Issue one completion request once the backend is ready.
    ///
    /// Timed-out calls are not retried: the content has already been sent once.
    pub async fn call(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        if !self.ensure_connected().await {
            tracing::warn!("Analysis backend not ready; rejecting call");
            return Err(BackendError::Unavailable);
        }

        tracing::debug!(
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );
        match tokio::time::timeout(self.request_timeout, self.client.complete(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(error)) => {
                tracing::error!(error = %error, "Completion request failed");
                Err(error)
            }
            Err(_) => {
                tracing::error!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "Completion request timed out"
                );
                Err(BackendError::Timeout(self.request_timeout))
            }
        }
    }
}
