//! REST API endpoint handlers.
//!
//! Every handler is a thin shim over [`ResearchService`]. Failures travel as
//! [`ApiError`], which maps the pipeline's error taxonomy onto HTTP statuses.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use diligent::error::DiligentError;
use diligent::executor::ChainResults;
use diligent::memory::{Artifact, ArtifactListing};
use diligent::router::{Mode, ResearchInput};
use diligent::service::{ChainRun, ResearchService};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

/// Shared application state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ResearchService>,
}

// ── Errors ─────────────────────────────────────────────────────────

/// A pipeline error rendered as `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub struct ApiError(pub DiligentError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            DiligentError::InputValidation(_)
            | DiligentError::UnknownMode(_)
            | DiligentError::TemplateNotFound(_) => StatusCode::BAD_REQUEST,
            DiligentError::ArtifactNotFound(_) => StatusCode::NOT_FOUND,
            DiligentError::Serialization(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DiligentError::Provider(_) => StatusCode::BAD_GATEWAY,
            DiligentError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DiligentError> for ApiError {
    fn from(e: DiligentError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("API error ({status}): {}", self.0);
        } else {
            debug!("API error ({status}): {}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// A body that does not deserialize is a validation failure of the request.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(DiligentError::InputValidation(rejection.body_text()))
    }
}

fn not_found(id: &str) -> ApiError {
    ApiError(DiligentError::ArtifactNotFound(id.to_string()))
}

// ── Research ───────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchResponse {
    pub success: bool,
    #[serde(flatten)]
    pub run: ChainRun,
    pub artifact: Option<Artifact>,
}

/// POST /api/research: Validate the request and run its whole chain.
///
/// Returns 400 when the body does not parse or validation fails; no session
/// is created in either case.
pub async fn post_research(
    State(app): State<AppState>,
    body: Result<Json<ResearchInput>, JsonRejection>,
) -> Result<Json<ResearchResponse>, ApiError> {
    let Json(input) = body?;
    let run = app.service.run_chain(&input).await?;
    let artifact = app.service.get_artifact(&run.artifact_id);
    Ok(Json(ResearchResponse {
        success: true,
        run,
        artifact,
    }))
}

#[derive(Serialize)]
pub struct ListResponse {
    pub artifacts: Vec<ArtifactListing>,
}

/// GET /api/research: List every artifact, oldest first.
pub async fn list_research(State(app): State<AppState>) -> Json<ListResponse> {
    Json(ListResponse {
        artifacts: app.service.list_artifacts(),
    })
}

/// GET /api/research/{id}
pub async fn get_research(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let artifact = app.service.get_artifact(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(json!({ "artifact": artifact })))
}

/// DELETE /api/research/{id}: 204 on success, 404 if absent.
pub async fn delete_research(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if app.service.delete_artifact(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

/// GET /api/research/{id}/summary
pub async fn get_summary(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<diligent::memory::ArtifactSummary>, ApiError> {
    app.service
        .get_summary(&id)
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

/// GET /api/research/{id}/export: The artifact as pretty JSON text.
pub async fn export_research(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let text = app.service.export_artifact(&id)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], text).into_response())
}

/// POST /api/research/import: Raw exported JSON in the body.
///
/// Returns 201 with the stored artifact, or 422 when the payload is
/// malformed or violates the artifact invariants.
pub async fn import_research(
    State(app): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<Artifact>), ApiError> {
    let artifact = app.service.import_artifact(&body)?;
    Ok((StatusCode::CREATED, Json(artifact)))
}

/// Request body for POST /api/research/{id}/modules.
#[derive(Deserialize)]
pub struct RunModuleRequest {
    pub module: String,
    /// Defaults to the artifact's own mode.
    #[serde(default)]
    pub mode: Option<String>,
}

/// POST /api/research/{id}/modules: Run one module against the artifact,
/// chaining from its latest content.
pub async fn run_module(
    State(app): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<RunModuleRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let artifact = app.service.get_artifact(&id).ok_or_else(|| not_found(&id))?;
    let mode = match body.mode.as_deref() {
        Some(name) => name.parse::<Mode>()?,
        None => artifact.metadata.mode,
    };
    let mut input = ResearchInput::new();
    input.topic = artifact.metadata.topic.clone();
    input.region = artifact.metadata.region.clone();

    let content = app
        .service
        .run_module(&id, mode, &body.module, &input)
        .await?;
    Ok(Json(json!({
        "module": body.module,
        "content": content,
        "artifact": app.service.get_artifact(&id),
    })))
}

// ── Enhancement ────────────────────────────────────────────────────

/// Request body for POST /api/enhance.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceRequest {
    pub artifact_id: String,
    #[serde(default)]
    pub modules: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhanceResponse {
    pub success: bool,
    pub artifact_id: String,
    pub results: ChainResults,
    pub artifact: Option<Artifact>,
}

/// POST /api/enhance: Run Extended modules over an existing artifact.
///
/// 404 for an unknown artifact, 400 for an empty module list.
pub async fn post_enhance(
    State(app): State<AppState>,
    body: Result<Json<EnhanceRequest>, JsonRejection>,
) -> Result<Json<EnhanceResponse>, ApiError> {
    let Json(body) = body?;
    let run = app.service.enhance(&body.artifact_id, &body.modules).await?;
    let artifact = app.service.get_artifact(&run.artifact_id);
    Ok(Json(EnhanceResponse {
        success: true,
        artifact_id: run.artifact_id,
        results: run.results,
        artifact,
    }))
}
