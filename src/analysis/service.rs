//! The analysis service and the `AnalysisApi` seam the HTTP router is generic over.

use async_trait::async_trait;
use futures_util::future::join_all;
use std::sync::Arc;

use crate::backend::{
    AnalysisBackend, AzureOpenAiClient, BackendError, BackendStatus, BackendSupervisor,
    CommandLauncher, CompletionRequest,
};
use crate::config::Config;
use crate::extraction::{self, ArtifactRef, ExtractionResult, ExtractionStatus, Payload};
use crate::metrics::{AnalysisMetrics, MetricsSnapshot};
use crate::storage::{ArtifactStore, LocalArtifactStore};

use super::batch::BatchLimits;
use super::prompts;
use super::types::{AnalysisEntry, AnalysisError, AnalysisRequest};

/// Operations exposed to the HTTP surface. Implemented by [`AnalysisService`]; tests substitute
/// stubs.
#[async_trait]
pub trait AnalysisApi: Send + Sync {
    /// Answer `query` about one artifact.
    async fn analyze_one(&self, artifact: &ArtifactRef, query: &str)
    -> Result<String, AnalysisError>;
    /// Answer `query` about several artifacts in one backend call.
    async fn analyze_many(
        &self,
        artifacts: &[ArtifactRef],
        query: &str,
    ) -> Result<String, AnalysisError>;
    /// Summarize one artifact.
    async fn summarize(&self, artifact: &ArtifactRef) -> Result<String, AnalysisError>;
    /// Current backend connection status.
    async fn backend_status(&self) -> BackendStatus;
    /// Manually restart the backend; `true` once it is connected again.
    async fn restart_backend(&self) -> bool;
    /// Counters accumulated since startup.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates artifact loading, extraction, prompt assembly, and the backend call.
///
/// The service holds no per-request state, so any number of analyses may run concurrently.
/// Dropping an in-flight analysis future abandons it: pending backend calls are cancelled with
/// the future and results of extraction already running on the blocking pool are discarded.
/// Construct it once near process start and share it through an `Arc`.
pub struct AnalysisService {
    store: Arc<dyn ArtifactStore>,
    backend: AnalysisBackend,
    limits: BatchLimits,
    metrics: Arc<AnalysisMetrics>,
}

impl AnalysisService {
    /// Assemble a service from its collaborators.
    pub fn new(store: Arc<dyn ArtifactStore>, backend: AnalysisBackend, limits: BatchLimits) -> Self {
        Self {
            store,
            backend,
            limits,
            metrics: Arc::new(AnalysisMetrics::new()),
        }
    }

    /// Wire the production collaborators described by `config`: a local artifact store, the
    /// configured backend command, and the Azure OpenAI client.
    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let store = Arc::new(LocalArtifactStore::new(config.storage_root.clone()));
        let launcher = Arc::new(CommandLauncher::new(config.process_command()));
        let supervisor = BackendSupervisor::new(launcher, config.supervisor_policy());
        let client = Arc::new(AzureOpenAiClient::new(config.openai_settings())?);
        let backend = AnalysisBackend::new(supervisor, client, config.backend_request_timeout);
        Ok(Self::new(store, backend, config.batch_limits()))
    }

    /// Bring the backend up ahead of the first request. Failure is logged, not fatal; the
    /// supervisor keeps retrying on its own schedule.
    pub async fn start(&self) -> bool {
        let connected = self.backend.ensure_connected().await;
        if connected {
            tracing::info!("Analysis backend ready");
        } else {
            tracing::warn!("Analysis backend unavailable at startup");
        }
        connected
    }

    /// Terminate the backend process.
    pub async fn shutdown(&self) {
        self.backend.supervisor().shutdown().await;
    }

    /// Fetch bytes and run the registry on the blocking pool.
    async fn load_and_extract(&self, artifact: &ArtifactRef) -> Result<ExtractionResult, AnalysisError> {
        let bytes = match self.store.get_bytes(artifact).await {
            Ok(bytes) => bytes,
            Err(error) => {
                self.metrics.record_extraction(false);
                return Err(error.into());
            }
        };
        let source = artifact.clone();
        let result = tokio::task::spawn_blocking(move || extraction::extract(&source, &bytes))
            .await
            .map_err(|error| AnalysisError::Extraction {
                kind: artifact.kind,
                reason: format!("extraction task failed: {error}"),
            })?;
        self.metrics.record_extraction(result.is_ok());
        Ok(result)
    }

    async fn load_payload(&self, artifact: &ArtifactRef) -> Result<Payload, AnalysisError> {
        let result = self.load_and_extract(artifact).await?;
        match result.status {
            ExtractionStatus::Ok(payload) => Ok(payload),
            ExtractionStatus::Failed(reason) => Err(AnalysisError::Extraction {
                kind: result.kind,
                reason,
            }),
        }
    }

    /// Extract one batch member; any failure becomes a placeholder entry.
    async fn batch_entry(&self, artifact: &ArtifactRef) -> AnalysisEntry {
        match self.load_and_extract(artifact).await {
            Ok(result) => AnalysisEntry::from_extraction(result),
            Err(error) => {
                tracing::warn!(artifact = %artifact.key, error = %error, "Batch member failed to load");
                AnalysisEntry::placeholder(artifact, error.to_string())
            }
        }
    }

    /// Extract every artifact concurrently and assemble the batch request in caller order.
    pub async fn prepare_batch(&self, artifacts: &[ArtifactRef], query: &str) -> AnalysisRequest {
        let entries = join_all(artifacts.iter().map(|artifact| self.batch_entry(artifact))).await;
        AnalysisRequest::batch(entries, query, self.limits)
    }

    async fn call(&self, request: &CompletionRequest) -> Result<String, AnalysisError> {
        self.backend.call(request).await.map_err(|error| {
            self.metrics.record_backend_failure();
            AnalysisError::from(error)
        })
    }
}

#[async_trait]
impl AnalysisApi for AnalysisService {
    async fn analyze_one(
        &self,
        artifact: &ArtifactRef,
        query: &str,
    ) -> Result<String, AnalysisError> {
        tracing::info!(artifact = %artifact.key, kind = %artifact.kind, "Analyzing file");
        let request = match self.load_payload(artifact).await? {
            Payload::Image { base64, mime_type } => {
                prompts::vision_request(&base64, mime_type, query)
            }
            Payload::Text(text) => {
                prompts::text_request(&artifact.display_name, artifact.kind, &text, query)
            }
        };
        let answer = self.call(&request).await?;
        self.metrics.record_single();
        Ok(answer)
    }

    async fn analyze_many(
        &self,
        artifacts: &[ArtifactRef],
        query: &str,
    ) -> Result<String, AnalysisError> {
        if artifacts.is_empty() {
            return Err(AnalysisError::EmptyBatch);
        }
        tracing::info!(files = artifacts.len(), "Analyzing files together");
        let request = self.prepare_batch(artifacts, query).await;
        let placeholders = request
            .entries
            .iter()
            .filter(|entry| entry.is_placeholder())
            .count();
        if placeholders > 0 {
            tracing::warn!(placeholders, "Batch continues with failed files");
        }
        let answer = self.call(&prompts::batch_request(&request)).await?;
        self.metrics.record_batch();
        Ok(answer)
    }

    async fn summarize(&self, artifact: &ArtifactRef) -> Result<String, AnalysisError> {
        tracing::info!(artifact = %artifact.key, kind = %artifact.kind, "Summarizing file");
        let request = match self.load_payload(artifact).await? {
            Payload::Image { base64, mime_type } => {
                prompts::vision_request(&base64, mime_type, prompts::IMAGE_SUMMARY_QUESTION)
            }
            Payload::Text(text) => prompts::summary_request(artifact.kind, &text),
        };
        let summary = self.call(&request).await?;
        self.metrics.record_summary();
        Ok(summary)
    }

    async fn backend_status(&self) -> BackendStatus {
        self.backend.supervisor().status().await
    }

    async fn restart_backend(&self) -> bool {
        self.backend.supervisor().restart().await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
