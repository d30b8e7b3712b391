//! Analysis cache: dedups analyses by (user, resume fingerprint, job description fingerprint).
//!
//! Best effort in both directions: a failed lookup is a miss, a failed store
//! is logged and dropped. The cache never blocks the user's request.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::fingerprint::{Fingerprint, Fingerprinter};
use crate::analysis::models::AnalysisResult;
use crate::analysis::store::{AnalysisStore, StoreError};
use crate::models::analysis::{AnalysisRecord, NewAnalysisRecord};

/// Summary line used when a cached record has no stored analysis payload.
pub const CACHED_SUMMARY: &str = "This analysis was retrieved from your previous submission \
    with the same resume and job description.";

/// Summary line for a summary-only record opened from the history list.
pub const HISTORY_SUMMARY: &str = "This is a historical analysis from your account.";

/// Tailored documents from a paid generation, recorded as a new history row.
#[derive(Debug, Clone)]
pub struct PremiumRecord<'a> {
    pub user_id: Uuid,
    pub resume_text: &'a str,
    pub job_description: &'a str,
    pub analysis: Option<&'a AnalysisResult>,
    pub tailored_resume: &'a str,
    pub cover_letter: Option<&'a str>,
    pub payment_reference: &'a str,
}

#[derive(Clone)]
pub struct AnalysisCache {
    store: Arc<dyn AnalysisStore>,
    fingerprinter: Arc<Fingerprinter>,
}

impl AnalysisCache {
    pub fn new(store: Arc<dyn AnalysisStore>, fingerprinter: Fingerprinter) -> Self {
        Self {
            store,
            fingerprinter: Arc::new(fingerprinter),
        }
    }

    pub fn fingerprint(&self, text: &str) -> Fingerprint {
        self.fingerprinter.fingerprint(text)
    }

    /// Returns the caller's most recent analysis for this fingerprint pair.
    /// Store failures are treated as a miss.
    pub async fn lookup(
        &self,
        user_id: Uuid,
        resume: &Fingerprint,
        job_description: &Fingerprint,
    ) -> Option<AnalysisRecord> {
        match self
            .store
            .find_by_fingerprints(user_id, resume, job_description)
            .await
        {
            Ok(Some(record)) => {
                info!("Cache hit for user {user_id}: record {}", record.id);
                Some(record)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup failed for user {user_id}, treating as miss: {e}");
                None
            }
        }
    }

    /// Records a fresh analysis so identical submissions are served from history.
    /// Returns `None` when the write failed; the failure is only logged.
    pub async fn store(
        &self,
        user_id: Uuid,
        resume_text: &str,
        job_description: &str,
        result: &AnalysisResult,
    ) -> Option<AnalysisRecord> {
        let record = NewAnalysisRecord {
            user_id,
            compatibility_score: score_column(result),
            keyword_matches: result.present_keywords(),
            experience_gaps: result.gaps_and_suggestions.clone(),
            resume_hash: Some(self.fingerprint(resume_text).to_string()),
            job_description_hash: Some(self.fingerprint(job_description).to_string()),
            analysis_details: Some(result.clone()),
            original_resume_text: Some(resume_text.to_string()),
            original_job_description: Some(job_description.to_string()),
            ..Default::default()
        };
        log_write(user_id, self.store.insert(record).await)
    }

    /// Inserts an independent premium record. The free-tier record it came
    /// from is left untouched.
    pub async fn record_premium(&self, premium: PremiumRecord<'_>) -> Option<AnalysisRecord> {
        let job_description = Some(premium.job_description)
            .filter(|jd| !jd.trim().is_empty())
            .map(str::to_string);
        let record = NewAnalysisRecord {
            user_id: premium.user_id,
            compatibility_score: premium.analysis.map(score_column).unwrap_or(0),
            keyword_matches: premium
                .analysis
                .map(AnalysisResult::present_keywords)
                .unwrap_or_default(),
            experience_gaps: premium
                .analysis
                .map(|a| a.gaps_and_suggestions.clone())
                .unwrap_or_default(),
            tailored_resume: Some(premium.tailored_resume.to_string()),
            cover_letter: premium.cover_letter.map(str::to_string),
            original_resume_text: Some(premium.resume_text.to_string()),
            original_job_description: job_description,
            payment_reference: Some(premium.payment_reference.to_string()),
            ..Default::default()
        };
        log_write(premium.user_id, self.store.insert(record).await)
    }

    /// Redeems a payment reference. Unlike the rest of the cache this fails
    /// closed: a store error is returned, never read as "unclaimed".
    pub async fn claim_payment(&self, reference: &str, user_id: Uuid) -> Result<bool, StoreError> {
        self.store.claim_payment(reference, user_id).await
    }

    pub async fn release_payment(&self, reference: &str) {
        if let Err(e) = self.store.release_payment(reference).await {
            warn!("Failed to release payment reference {reference}: {e}");
        }
    }

    pub async fn history(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, StoreError> {
        self.store.list_for_user(user_id).await
    }

    pub async fn history_record(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        self.store.get_for_user(user_id, record_id).await
    }
}

fn score_column(result: &AnalysisResult) -> i32 {
    i32::try_from(result.numeric_score()).unwrap_or(i32::MAX)
}

fn log_write(
    user_id: Uuid,
    outcome: Result<AnalysisRecord, StoreError>,
) -> Option<AnalysisRecord> {
    match outcome {
        Ok(record) => {
            info!("Stored analysis record {} for user {user_id}", record.id);
            Some(record)
        }
        Err(e) => {
            warn!("Failed to store analysis for user {user_id}: {e}");
            None
        }
    }
}
