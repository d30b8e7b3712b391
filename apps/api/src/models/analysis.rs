use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::analysis::models::{AnalysisResult, JobKeyword, KeywordStatus};

/// One row of `resume_analyses`. Insert-only: free analyses carry both
/// fingerprints, premium generations carry the tailored documents.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub compatibility_score: i32,
    pub keyword_matches: Vec<String>,
    pub experience_gaps: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub tailored_resume: Option<String>,
    pub cover_letter: Option<String>,
    pub resume_hash: Option<String>,
    pub job_description_hash: Option<String>,
    pub analysis_details: Option<Json<AnalysisResult>>,
    pub original_resume_text: Option<String>,
    pub original_job_description: Option<String>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// The stored analysis, or a summary-only view rebuilt from the score,
    /// keyword and gap columns when the full payload was not kept.
    pub fn to_result(&self, fallback_summary: &str) -> AnalysisResult {
        if let Some(Json(details)) = &self.analysis_details {
            return details.clone();
        }
        AnalysisResult {
            match_summary: fallback_summary.to_string(),
            match_score: format!("{}/100", self.compatibility_score),
            job_keywords_detected: self
                .keyword_matches
                .iter()
                .map(|keyword| JobKeyword {
                    keyword: keyword.clone(),
                    status: KeywordStatus::Present,
                })
                .collect(),
            gaps_and_suggestions: self.experience_gaps.clone(),
            ..Default::default()
        }
    }

    pub fn is_premium(&self) -> bool {
        self.tailored_resume.is_some()
    }
}

/// Column values for a new `resume_analyses` row.
#[derive(Debug, Clone, Default)]
pub struct NewAnalysisRecord {
    pub user_id: Uuid,
    pub compatibility_score: i32,
    pub keyword_matches: Vec<String>,
    pub experience_gaps: Vec<String>,
    pub tailored_resume: Option<String>,
    pub cover_letter: Option<String>,
    pub resume_hash: Option<String>,
    pub job_description_hash: Option<String>,
    pub analysis_details: Option<AnalysisResult>,
    pub original_resume_text: Option<String>,
    pub original_job_description: Option<String>,
    pub payment_reference: Option<String>,
}

#[cfg(test)]
impl NewAnalysisRecord {
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> AnalysisRecord {
        AnalysisRecord {
            id,
            user_id: self.user_id,
            compatibility_score: self.compatibility_score,
            keyword_matches: self.keyword_matches,
            experience_gaps: self.experience_gaps,
            skill_gaps: Vec::new(),
            tailored_resume: self.tailored_resume,
            cover_letter: self.cover_letter,
            resume_hash: self.resume_hash,
            job_description_hash: self.job_description_hash,
            analysis_details: self.analysis_details.map(Json),
            original_resume_text: self.original_resume_text,
            original_job_description: self.original_job_description,
            payment_reference: self.payment_reference,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary_only_record() -> AnalysisRecord {
        NewAnalysisRecord {
            user_id: Uuid::new_v4(),
            compatibility_score: 64,
            keyword_matches: vec!["Rust".to_string(), "SQL".to_string()],
            experience_gaps: vec!["Add metrics".to_string()],
            ..Default::default()
        }
        .into_record(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_to_result_rebuilds_summary_view() {
        let record = summary_only_record();
        let result = record.to_result("Retrieved from history.");

        assert_eq!(result.match_summary, "Retrieved from history.");
        assert_eq!(result.match_score, "64/100");
        assert_eq!(result.numeric_score(), 64);
        assert_eq!(result.present_keywords(), vec!["Rust", "SQL"]);
        assert!(result.missing_keywords().is_empty());
        assert_eq!(result.gaps_and_suggestions, vec!["Add metrics"]);
    }

    #[test]
    fn test_to_result_prefers_stored_details() {
        let details = AnalysisResult {
            match_summary: "Full analysis".to_string(),
            match_score: "88/100".to_string(),
            ..Default::default()
        };
        let record = NewAnalysisRecord {
            user_id: Uuid::new_v4(),
            compatibility_score: 88,
            analysis_details: Some(details.clone()),
            ..Default::default()
        }
        .into_record(Uuid::new_v4(), Utc::now());

        assert_eq!(record.to_result("unused"), details);
        assert!(!record.is_premium());
    }

    #[test]
    fn test_record_serializes_details_inline() {
        let record = NewAnalysisRecord {
            user_id: Uuid::new_v4(),
            analysis_details: Some(AnalysisResult {
                match_score: "10/100".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }
        .into_record(Uuid::new_v4(), Utc::now());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["analysis_details"]["match_score"], "10/100");
    }
}
