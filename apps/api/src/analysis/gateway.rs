//! Analysis gateway: the boundary around the completion service.
//!
//! `AppState` holds an `Arc<dyn AnalysisGateway>`; production uses
//! `LlmAnalysisGateway`, tests script their own.

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::analysis::models::{AnalysisResult, Dimension};
use crate::analysis::prompts::{build_analysis_prompt, ANALYSIS_PERSONA, ANALYSIS_TEMPERATURE};
use crate::llm_client::prompts::json_system;
use crate::llm_client::{LlmClient, LlmError};

/// Both variants are retryable from the user's point of view.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid JSON response from AI. Please try again.")]
    MalformedResponse(String),
}

impl From<LlmError> for GatewayError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Parse(inner) => GatewayError::MalformedResponse(inner.to_string()),
            other => GatewayError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    /// Runs the core analysis plus the requested optional `dimensions`.
    /// `job_description` may be empty.
    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
        dimensions: &BTreeSet<Dimension>,
    ) -> Result<AnalysisResult, GatewayError>;

    /// Requests every optional dimension in one call.
    async fn analyze_comprehensive(
        &self,
        resume_text: &str,
        job_description: &str,
    ) -> Result<AnalysisResult, GatewayError> {
        let all: BTreeSet<Dimension> = Dimension::OPTIONAL.into_iter().collect();
        self.analyze(resume_text, job_description, &all).await
    }
}

pub struct LlmAnalysisGateway {
    llm: LlmClient,
}

impl LlmAnalysisGateway {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnalysisGateway for LlmAnalysisGateway {
    async fn analyze(
        &self,
        resume_text: &str,
        job_description: &str,
        dimensions: &BTreeSet<Dimension>,
    ) -> Result<AnalysisResult, GatewayError> {
        let optional: BTreeSet<Dimension> =
            dimensions.iter().copied().filter(|d| !d.is_core()).collect();
        let prompt = build_analysis_prompt(resume_text, job_description, &optional);

        let labels: Vec<&str> = optional.iter().map(|d| d.label()).collect();
        info!(
            "Requesting analysis (job description: {}, extra: [{}])",
            !job_description.trim().is_empty(),
            labels.join(", ")
        );

        let result = self
            .llm
            .call_json::<AnalysisResult>(
                &prompt,
                &json_system(ANALYSIS_PERSONA),
                ANALYSIS_TEMPERATURE,
            )
            .await?;
        Ok(result)
    }
}
