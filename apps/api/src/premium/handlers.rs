//! Axum route handler for premium fulfilment.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserIdentity;
use crate::premium::generator::{PremiumDocuments, PremiumOrder};
use crate::premium::payment::is_valid_reference;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FulfilRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub email: String,
    /// The workflow whose result the documents are built from.
    pub session_id: Uuid,
    pub payment_reference: String,
}

/// POST /api/v1/premium/fulfil
///
/// The session lock is only held while copying its state out; generation
/// runs without it.
pub async fn handle_fulfil(
    State(state): State<AppState>,
    Json(req): Json<FulfilRequest>,
) -> Result<Json<PremiumDocuments>, AppError> {
    let premium = state.premium.clone().ok_or(AppError::PremiumUnavailable)?;

    if !is_valid_reference(&req.payment_reference) {
        return Err(AppError::Validation(
            "payment_reference is missing or malformed".to_string(),
        ));
    }

    let user = UserIdentity {
        user_id: req.user_id,
        email: req.email,
    };
    let session = state
        .sessions
        .resolve(&state.workflows, req.session_id, &user)
        .await?;

    let snapshot = {
        let wf = session.lock()?;
        if !wf.is_premium_eligible() {
            return Err(AppError::Conflict(
                "Run an analysis before purchasing tailored documents".to_string(),
            ));
        }
        wf.state().clone()
    };

    let job_description = if snapshot.needs_job_description() {
        snapshot.job_description.as_str()
    } else {
        ""
    };

    let documents = premium
        .fulfil(PremiumOrder {
            user_id: user.user_id,
            resume_text: &snapshot.resume_text,
            job_description,
            prior_analysis: snapshot.result.as_ref(),
            payment_reference: &req.payment_reference,
        })
        .await?;

    Ok(Json(documents))
}
