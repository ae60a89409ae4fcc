//! HTTP surface for DocQuery.
//!
//! This module exposes a compact Axum router over the analysis orchestrator:
//!
//! - `POST /analyze` – Answer a question about one stored file.
//! - `POST /analyze-multiple` – Answer a question across several stored files in one backend call.
//! - `POST /summarize` – Summarize one stored file.
//! - `GET /backend-status` – Report the analysis backend's connection state.
//! - `POST /backend/restart` – Manually restart the analysis backend.
//! - `GET /metrics` – Observe analysis counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.
//!
//! File names are owner-scoped storage keys (`<user>/<file>`). The caller is identified by the
//! `x-user-id` header and may only reference keys under their own prefix.

use crate::analysis::{AnalysisApi, AnalysisError};
use crate::backend::BackendStatus;
use crate::extraction::ArtifactRef;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Header carrying the authenticated caller's identifier.
pub const USER_HEADER: &str = "x-user-id";

/// Build the HTTP router exposing the analysis API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: AnalysisApi + 'static,
{
    Router::new()
        .route("/analyze", post(analyze::<S>))
        .route("/analyze-multiple", post(analyze_multiple::<S>))
        .route("/summarize", post(summarize::<S>))
        .route("/backend-status", get(backend_status::<S>))
        .route("/backend/restart", post(restart_backend::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Request body for `POST /analyze`.
#[derive(Deserialize)]
struct AnalyzeRequest {
    /// Storage key of the file to analyze.
    file_name: String,
    /// Question about the file.
    query: String,
}

/// Request body for `POST /analyze-multiple`.
#[derive(Deserialize)]
struct AnalyzeMultipleRequest {
    /// Storage keys, analyzed in this order.
    file_names: Vec<String>,
    /// Question about the files.
    query: String,
}

/// Request body for `POST /summarize`.
#[derive(Deserialize)]
struct SummarizeRequest {
    file_name: String,
}

#[derive(Serialize)]
struct AnalysisResponse {
    request_id: Uuid,
    file_names: Vec<String>,
    analysis: String,
    timestamp: String,
}

#[derive(Serialize)]
struct SummaryResponse {
    request_id: Uuid,
    file_name: String,
    summary: String,
    timestamp: String,
}

#[derive(Serialize)]
struct BackendStatusResponse {
    #[serde(flatten)]
    status: BackendStatus,
    timestamp: String,
}

/// Answer a question about one file.
async fn analyze<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResponse>, AppError>
where
    S: AnalysisApi,
{
    let user = caller(&headers)?;
    require_query(&request.query)?;
    let artifact = owned_artifact(user, &request.file_name)?;
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, artifact = %artifact.key, "Analyze request received");

    let analysis = service.analyze_one(&artifact, &request.query).await?;
    Ok(Json(AnalysisResponse {
        request_id,
        file_names: vec![request.file_name],
        analysis,
        timestamp: timestamp(),
    }))
}

/// Answer a question across several files with a single backend call.
async fn analyze_multiple<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    Json(request): Json<AnalyzeMultipleRequest>,
) -> Result<Json<AnalysisResponse>, AppError>
where
    S: AnalysisApi,
{
    let user = caller(&headers)?;
    require_query(&request.query)?;
    if request.file_names.is_empty() {
        return Err(AppError::BadRequest("at least one file name is required".into()));
    }
    let artifacts = request
        .file_names
        .iter()
        .map(|name| owned_artifact(user, name))
        .collect::<Result<Vec<_>, _>>()?;
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, files = artifacts.len(), "Multi-file analyze request received");

    let analysis = service.analyze_many(&artifacts, &request.query).await?;
    Ok(Json(AnalysisResponse {
        request_id,
        file_names: request.file_names,
        analysis,
        timestamp: timestamp(),
    }))
}

/// Summarize one file.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    headers: HeaderMap,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummaryResponse>, AppError>
where
    S: AnalysisApi,
{
    let user = caller(&headers)?;
    let artifact = owned_artifact(user, &request.file_name)?;
    let request_id = Uuid::new_v4();
    tracing::info!(%request_id, artifact = %artifact.key, "Summarize request received");

    let summary = service.summarize(&artifact).await?;
    Ok(Json(SummaryResponse {
        request_id,
        file_name: request.file_name,
        summary,
        timestamp: timestamp(),
    }))
}

async fn backend_status<S>(State(service): State<Arc<S>>) -> Json<BackendStatusResponse>
where
    S: AnalysisApi,
{
    Json(BackendStatusResponse {
        status: service.backend_status().await,
        timestamp: timestamp(),
    })
}

/// Stop the backend, forget past failures, and connect again.
async fn restart_backend<S>(State(service): State<Arc<S>>) -> Response
where
    S: AnalysisApi,
{
    let connected = service.restart_backend().await;
    let status = service.backend_status().await;
    let code = if connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(BackendStatusResponse {
            status,
            timestamp: timestamp(),
        }),
    )
        .into_response()
}

/// Return the analysis counters accumulated since startup.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Response
where
    S: AnalysisApi,
{
    Json(service.metrics_snapshot()).into_response()
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "analyze",
                method: "POST",
                path: "/analyze",
                description: "Answer a question about one uploaded file (image, PDF, text, CSV, or Word document).",
                request_example: Some(json!({
                    "file_name": "user-1/report.pdf",
                    "query": "What are the key findings?"
                })),
            },
            CommandDescriptor {
                name: "analyze_multiple",
                method: "POST",
                path: "/analyze-multiple",
                description: "Compare several uploaded files in one request. Files that fail to extract are reported inline instead of failing the batch.",
                request_example: Some(json!({
                    "file_names": ["user-1/q1.csv", "user-1/q2.csv"],
                    "query": "How did revenue change?"
                })),
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Produce a concise summary of one uploaded file.",
                request_example: Some(json!({ "file_name": "user-1/notes.txt" })),
            },
            CommandDescriptor {
                name: "backend_status",
                method: "GET",
                path: "/backend-status",
                description: "Report the analysis backend's connection state and retry counter.",
                request_example: None,
            },
            CommandDescriptor {
                name: "restart_backend",
                method: "POST",
                path: "/backend/restart",
                description: "Restart the analysis backend and reset its retry counter.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return analysis counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

fn caller(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .ok_or(AppError::Unauthenticated)
}

fn require_query(query: &str) -> Result<(), AppError> {
    if query.trim().is_empty() {
        return Err(AppError::BadRequest("query is required".into()));
    }
    Ok(())
}

/// Resolve a storage key, rejecting keys outside the caller's prefix.
fn owned_artifact(user: &str, file_name: &str) -> Result<ArtifactRef, AppError> {
    let artifact = ArtifactRef::from_key(file_name);
    match artifact.owner() {
        Some(owner) if owner == user && !artifact.display_name.is_empty() => Ok(artifact),
        _ => {
            tracing::warn!(user, key = file_name, "Rejected access to foreign artifact");
            Err(AppError::Forbidden)
        }
    }
}

enum AppError {
    Unauthenticated,
    Forbidden,
    BadRequest(String),
    Analysis(AnalysisError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                format!("missing {USER_HEADER} header"),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "access denied: file does not belong to the caller".to_owned(),
            ),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            Self::Analysis(error) => {
                let status = match &error {
                    AnalysisError::Extraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                    AnalysisError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
                    AnalysisError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    AnalysisError::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    AnalysisError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
                    AnalysisError::BackendCallFailed { .. } => StatusCode::BAD_GATEWAY,
                    AnalysisError::EmptyBatch => StatusCode::BAD_REQUEST,
                };
                (status, error.to_string())
            }
        };
        let body = Json(json!({ "error": message, "timestamp": timestamp() }));
        (status, body).into_response()
    }
}

impl From<AnalysisError> for AppError {
    fn from(inner: AnalysisError) -> Self {
        Self::Analysis(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::analysis::{AnalysisApi, AnalysisError};
    use crate::backend::{BackendStatus, ConnectionState};
    use crate::extraction::{ArtifactRef, Kind};
    use crate::metrics::MetricsSnapshot;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_analysis_endpoints() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let analyze = commands
            .iter()
            .find(|cmd| cmd.name == "analyze_multiple")
            .expect("analyze_multiple command present");

        assert_eq!(analyze.method, "POST");
        assert_eq!(analyze.path, "/analyze-multiple");
        assert!(commands.iter().any(|cmd| cmd.path == "/backend-status"));
    }

    #[tokio::test]
    async fn analyze_route_forwards_owned_artifact() {
        let service = Arc::new(StubAnalysisService::answering("it says hello"));
        let response = send(
            service.clone(),
            "/analyze",
            Some("u1"),
            json!({ "file_name": "u1/notes.txt", "query": "what does this say?" }),
        )
        .await;

        assert_eq!(response.0, StatusCode::OK);
        assert_eq!(response.1["analysis"], "it says hello");
        assert_eq!(response.1["file_names"], json!(["u1/notes.txt"]));
        assert!(response.1["timestamp"].as_str().unwrap().contains('T'));

        let calls = service.calls.lock().await.clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0[0].display_name, "notes.txt");
        assert_eq!(calls[0].0[0].kind, Kind::PlainText);
        assert_eq!(calls[0].1, "what does this say?");
    }

    #[tokio::test]
    async fn foreign_keys_are_forbidden_before_reaching_core() {
        let service = Arc::new(StubAnalysisService::answering("unused"));
        let response = send(
            service.clone(),
            "/analyze-multiple",
            Some("u1"),
            json!({ "file_names": ["u1/a.txt", "u2/b.txt"], "query": "compare" }),
        )
        .await;

        assert_eq!(response.0, StatusCode::FORBIDDEN);
        assert!(service.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn missing_identity_is_unauthorized() {
        let service = Arc::new(StubAnalysisService::answering("unused"));
        let response = send(
            service,
            "/summarize",
            None,
            json!({ "file_name": "u1/a.txt" }),
        )
        .await;
        assert_eq!(response.0, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_query_is_a_validation_error() {
        let service = Arc::new(StubAnalysisService::answering("unused"));
        let response = send(
            service,
            "/analyze",
            Some("u1"),
            json!({ "file_name": "u1/a.txt", "query": "   " }),
        )
        .await;
        assert_eq!(response.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn analysis_errors_map_to_status_codes() {
        let cases = [
            (
                AnalysisError::Extraction {
                    kind: Kind::Pdf,
                    reason: "bad".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AnalysisError::ArtifactNotFound("u1/a.pdf".into()),
                StatusCode::NOT_FOUND,
            ),
            (AnalysisError::BackendUnavailable, StatusCode::SERVICE_UNAVAILABLE),
            (
                AnalysisError::BackendTimeout(Duration::from_secs(60)),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                AnalysisError::BackendCallFailed {
                    detail: "quota".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (error, expected) in cases {
            let service = Arc::new(StubAnalysisService::failing(error));
            let response = send(
                service,
                "/analyze",
                Some("u1"),
                json!({ "file_name": "u1/a.pdf", "query": "q" }),
            )
            .await;
            assert_eq!(response.0, expected);
            assert!(response.1["error"].is_string());
        }
    }

    #[tokio::test]
    async fn backend_status_reports_state() {
        let service = Arc::new(StubAnalysisService::answering("unused"));
        let app = create_router(service);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/backend-status")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["state"], "reconnecting");
        assert_eq!(json["connected"], false);
        assert_eq!(json["reconnect_attempts"], 2);
    }

    async fn send(
        service: Arc<StubAnalysisService>,
        uri: &str,
        user: Option<&str>,
        payload: Value,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        let response = create_router(service)
            .oneshot(builder.body(Body::from(payload.to_string())).expect("request"))
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    type AnalyzeCall = (Vec<ArtifactRef>, String);

    struct StubAnalysisService {
        calls: Mutex<Vec<AnalyzeCall>>,
        answer: String,
        failure: Mutex<Option<AnalysisError>>,
    }

    impl StubAnalysisService {
        fn answering(answer: &str) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                answer: answer.to_owned(),
                failure: Mutex::new(None),
            }
        }

        fn failing(error: AnalysisError) -> Self {
            Self {
                failure: Mutex::new(Some(error)),
                ..Self::answering("")
            }
        }

        async fn respond(&self, artifacts: &[ArtifactRef], query: &str) -> Result<String, AnalysisError> {
            self.calls
                .lock()
                .await
                .push((artifacts.to_vec(), query.to_owned()));
            match self.failure.lock().await.take() {
                Some(error) => Err(error),
                None => Ok(self.answer.clone()),
            }
        }
    }

    #[async_trait]
    impl AnalysisApi for StubAnalysisService {
        async fn analyze_one(
            &self,
            artifact: &ArtifactRef,
            query: &str,
        ) -> Result<String, AnalysisError> {
            self.respond(std::slice::from_ref(artifact), query).await
        }

        async fn analyze_many(
            &self,
            artifacts: &[ArtifactRef],
            query: &str,
        ) -> Result<String, AnalysisError> {
            self.respond(artifacts, query).await
        }

        async fn summarize(&self, artifact: &ArtifactRef) -> Result<String, AnalysisError> {
            self.respond(std::slice::from_ref(artifact), "").await
        }

        async fn backend_status(&self) -> BackendStatus {
            BackendStatus {
                state: ConnectionState::Reconnecting,
                connected: false,
                reconnect_attempts: 2,
                process_alive: false,
            }
        }

        async fn restart_backend(&self) -> bool {
            true
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot::default()
        }
    }
}
