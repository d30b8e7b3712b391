//! Axum route handlers for the workflow API.
//!
//! Thin adapters: each handler resolves the session, takes its lock and calls
//! one controller operation. Every rule lives in `WorkflowController`.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::cache::HISTORY_SUMMARY;
use crate::analysis::models::Dimension;
use crate::errors::AppError;
use crate::models::user::UserIdentity;
use crate::state::AppState;
use crate::workflow::controller::{Preload, WorkflowView};
use crate::workflow::sessions::Session;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SessionUserQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: String,
}

impl SessionUserQuery {
    fn identity(self) -> UserIdentity {
        UserIdentity {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OpenWorkflowRequest {
    pub user_id: Uuid,
    pub email: String,
    /// Opens a past analysis straight into RESULTS.
    pub history_record_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SourceRequest {
    pub resume_text: String,
}

#[derive(Debug, Deserialize)]
pub struct DimensionsRequest {
    pub dimensions: BTreeSet<Dimension>,
}

#[derive(Debug, Deserialize)]
pub struct JobDescriptionRequest {
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub view: WorkflowView,
}

async fn session_for(
    state: &AppState,
    session_id: Uuid,
    query: SessionUserQuery,
) -> Result<Arc<Session>, AppError> {
    let user = query.identity();
    Ok(state
        .sessions
        .resolve(&state.workflows, session_id, &user)
        .await?)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/workflows
pub async fn handle_open_workflow(
    State(state): State<AppState>,
    Json(req): Json<OpenWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowResponse>), AppError> {
    let preload = match req.history_record_id {
        Some(record_id) => {
            let record = state
                .workflows
                .cache
                .history_record(req.user_id, record_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Analysis {record_id} not found")))?;
            Some(Preload {
                result: record.to_result(HISTORY_SUMMARY),
                resume_text: record.original_resume_text.unwrap_or_default(),
                job_description: record.original_job_description.unwrap_or_default(),
            })
        }
        None => None,
    };

    let user = UserIdentity {
        user_id: req.user_id,
        email: req.email,
    };
    let (session_id, session) = state
        .sessions
        .create(&state.workflows, user, preload)
        .await;
    let view = session.view();

    Ok((StatusCode::CREATED, Json(WorkflowResponse { session_id, view })))
}

/// GET /api/v1/workflows/:id
///
/// Never refused for a running analysis: the last persisted state is returned
/// with `in_progress: true`.
pub async fn handle_get_workflow(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let view = session.view();
    Ok(Json(WorkflowResponse { session_id, view }))
}

/// PUT /api/v1/workflows/:id/source
pub async fn handle_provide_source(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
    Json(req): Json<SourceRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.provide_source(&req.resume_text).await?;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}

/// PUT /api/v1/workflows/:id/dimensions
pub async fn handle_set_dimensions(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
    Json(req): Json<DimensionsRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.set_dimensions(req.dimensions).await?;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}

/// PUT /api/v1/workflows/:id/job-description
pub async fn handle_provide_job_description(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
    Json(req): Json<JobDescriptionRequest>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.provide_job_description(&req.job_description).await?;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}

/// POST /api/v1/workflows/:id/advance
///
/// Runs the analysis when the next step is RESULTS. The session stays locked
/// for the whole call, so concurrent writes get `409 ANALYSIS_IN_PROGRESS`.
pub async fn handle_advance(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.advance().await?;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}

/// POST /api/v1/workflows/:id/back
pub async fn handle_back(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.back().await?;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}

/// POST /api/v1/workflows/:id/reset
pub async fn handle_reset(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<SessionUserQuery>,
) -> Result<Json<WorkflowResponse>, AppError> {
    let session = session_for(&state, session_id, query).await?;
    let mut wf = session.lock()?;
    wf.reset().await;
    Ok(Json(WorkflowResponse {
        session_id,
        view: wf.view(),
    }))
}
