//! HTTP API server.
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `GET` | `/health` | Liveness and version |
//! | `POST` | `/ingest` | Enqueue an ingestion job, returns `202` with the job id |
//! | `GET` | `/jobs/{id}` | Job status record |
//! | `POST` | `/query` | Answer a question, optionally within a session |
//! | `GET` | `/sessions/{id}` | Session with its full history |
//! | `DELETE` | `/sessions/{id}` | Drop a session |
//! | `GET` | `/repositories/{repo}/stats` | Aggregate index counts |
//! | `DELETE` | `/repositories/{repo}` | Remove every document of a repository |
//!
//! Errors use a single body shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Rejected input maps to `400`, unknown jobs and sessions to `404`, and
//! everything else to `500`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use code_rag_core::models::{JobRecord, Session};
use code_rag_core::store::IndexStats;
use code_rag_core::ValidationError;

use crate::answer::{answer, AnswerResponse};
use crate::queue::{IngestRequest, JobQueue};
use crate::services::Services;
use crate::stats::{delete_repository, repository_stats};

/// Shared state passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub queue: JobQueue,
}

/// Build the router without binding. Used by [`run_server`] and tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest", post(handle_ingest))
        .route("/jobs/{id}", get(handle_get_job))
        .route("/query", post(handle_query))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/repositories/{repo}/stats", get(handle_stats))
        .route("/repositories/{repo}", axum::routing::delete(handle_delete_repository))
        .layer(cors)
        .with_state(state)
}

/// Start the job queue and serve on `[server].bind` until the process exits.
pub async fn run_server(services: Services) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let queue = JobQueue::start(services.clone());
    let app = router(AppState { services, queue });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "code-rag server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (`"bad_request"`, `"not_found"`, `"internal"`).
    code: String,
    message: String,
}

pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        if err.is_not_found() {
            AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                message: err.to_string(),
            }
        } else {
            AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request",
                message: err.to_string(),
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(validation) = err.downcast_ref::<ValidationError>() {
            return validation.clone().into();
        }
        let message = format!("{err:#}");
        tracing::error!(error = %message, "request failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message,
        }
    }
}

type ApiResult<T> = Result<T, AppError>;

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct IngestAccepted {
    job_id: String,
    status: &'static str,
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> ApiResult<(StatusCode, Json<IngestAccepted>)> {
    let job_id = state.queue.submit(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(IngestAccepted {
            job_id,
            status: "pending",
        }),
    ))
}

async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let job = state
        .services
        .jobs
        .get(&id)
        .await?
        .ok_or(ValidationError::UnknownJob(id))?;
    Ok(Json(job))
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    repository: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<Json<AnswerResponse>> {
    let response = answer(
        &state.services,
        &request.question,
        request.repository.as_deref(),
        request.session_id.as_deref(),
    )
    .await?;
    Ok(Json(response))
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Session>> {
    let session = state
        .services
        .sessions
        .get(&id)
        .await?
        .ok_or(ValidationError::UnknownSession(id))?;
    Ok(Json(session))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.services.sessions.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ValidationError::UnknownSession(id).into())
    }
}

async fn handle_stats(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> ApiResult<Json<IndexStats>> {
    Ok(Json(repository_stats(&state.services, Some(&repo)).await?))
}

#[derive(Serialize)]
struct DeleteResponse {
    repository: String,
    deleted: u64,
}

async fn handle_delete_repository(
    State(state): State<AppState>,
    Path(repo): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let deleted = delete_repository(&state.services, &repo).await?;
    Ok(Json(DeleteResponse {
        repository: repo,
        deleted,
    }))
}
