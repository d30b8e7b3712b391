use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::gateway::GatewayError;
use crate::analysis::store::StoreError;
use crate::premium::generator::PremiumError;
use crate::premium::payment::PaymentError;
use crate::workflow::controller::WorkflowError;
use crate::workflow::sessions::SessionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("An analysis is already in progress for this session")]
    AnalysisInProgress,

    #[error("Forbidden")]
    Forbidden,

    /// The completion service failed; the same request may be retried.
    #[error("Analysis error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Payment was taken but documents could not be produced.
    #[error("Fulfilment error: {0}")]
    Fulfilment(String),

    #[error("Premium generation is not configured")]
    PremiumUnavailable,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Validation(msg) => AppError::Validation(msg),
            e @ WorkflowError::InvalidTransition { .. } => AppError::Conflict(e.to_string()),
            WorkflowError::AnalysisInProgress => AppError::AnalysisInProgress,
            WorkflowError::Gateway(e) => AppError::Gateway(e),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Forbidden => AppError::Forbidden,
        }
    }
}

impl From<PremiumError> for AppError {
    fn from(e: PremiumError) -> Self {
        match e {
            PremiumError::Payment(e) => AppError::Payment(e),
            PremiumError::Store(e) => AppError::Store(e),
            e @ PremiumError::Generation { .. } => AppError::Fulfilment(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "INVALID_TRANSITION", msg.clone()),
            AppError::AnalysisInProgress => (
                StatusCode::CONFLICT,
                "ANALYSIS_IN_PROGRESS",
                self.to_string(),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            AppError::Gateway(e) => {
                tracing::warn!("Analysis gateway error: {e}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ANALYSIS_FAILED",
                    e.to_string(),
                )
            }
            AppError::Payment(e @ PaymentError::AlreadyFulfilled(_)) => {
                (StatusCode::CONFLICT, "PAYMENT_ALREADY_USED", e.to_string())
            }
            AppError::Payment(e) => {
                tracing::warn!("Payment verification failed: {e}");
                (
                    StatusCode::PAYMENT_REQUIRED,
                    "PAYMENT_NOT_VERIFIED",
                    e.to_string(),
                )
            }
            AppError::Fulfilment(msg) => {
                tracing::error!("Fulfilment error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "FULFILMENT_FAILED",
                    msg.clone(),
                )
            }
            AppError::PremiumUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PREMIUM_UNAVAILABLE",
                self.to_string(),
            ),
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if matches!(self, AppError::Gateway(_)) {
            error["retryable"] = json!(true);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
