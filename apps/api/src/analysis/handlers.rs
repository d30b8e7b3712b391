use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::analysis::AnalysisRecord;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

#[derive(Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    pub is_premium: bool,
}

/// GET /api/v1/history
/// The caller's analyses and premium generations, newest first.
pub async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let records = state.workflows.cache.history(params.user_id).await?;
    Ok(Json(
        records
            .into_iter()
            .map(|record| HistoryEntry {
                is_premium: record.is_premium(),
                record,
            })
            .collect(),
    ))
}
