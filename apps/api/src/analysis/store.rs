//! Row store for analysis records, behind a trait.
//!
//! Default: `PgAnalysisStore` (table `resume_analyses`).
//! Tests: `InMemoryAnalysisStore`.
//!
//! `AppState` holds the store behind `AnalysisCache` as an `Arc<dyn AnalysisStore>`.

#[cfg(test)]
use std::collections::HashSet;

use async_trait::async_trait;
#[cfg(test)]
use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
#[cfg(test)]
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::analysis::fingerprint::Fingerprint;
use crate::models::analysis::{AnalysisRecord, NewAnalysisRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Insert-only access to analysis records. Every query is scoped to one user.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Most recent record matching the exact (user, resume, job description) key.
    async fn find_by_fingerprints(
        &self,
        user_id: Uuid,
        resume: &Fingerprint,
        job_description: &Fingerprint,
    ) -> Result<Option<AnalysisRecord>, StoreError>;

    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, StoreError>;

    /// All of a user's records, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, StoreError>;

    async fn get_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, StoreError>;

    /// Marks a payment reference as redeemed. `false` when it already was.
    async fn claim_payment(&self, reference: &str, user_id: Uuid) -> Result<bool, StoreError>;

    /// Returns a claimed reference so the same payment can be retried.
    async fn release_payment(&self, reference: &str) -> Result<(), StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ────────────────────────────────────────────────────────────────────────────

pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn find_by_fingerprints(
        &self,
        user_id: Uuid,
        resume: &Fingerprint,
        job_description: &Fingerprint,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            r#"
            SELECT * FROM resume_analyses
            WHERE user_id = $1 AND resume_hash = $2 AND job_description_hash = $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(resume.as_str())
        .bind(job_description.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            r#"
            INSERT INTO resume_analyses
                (id, user_id, compatibility_score, keyword_matches, experience_gaps,
                 skill_gaps, tailored_resume, cover_letter, resume_hash,
                 job_description_hash, analysis_details, original_resume_text,
                 original_job_description, payment_reference)
            VALUES ($1, $2, $3, $4, $5, '{}', $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.compatibility_score)
        .bind(&record.keyword_matches)
        .bind(&record.experience_gaps)
        .bind(&record.tailored_resume)
        .bind(&record.cover_letter)
        .bind(&record.resume_hash)
        .bind(&record.job_description_hash)
        .bind(record.analysis_details.as_ref().map(Json))
        .bind(&record.original_resume_text)
        .bind(&record.original_job_description)
        .bind(&record.payment_reference)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            "SELECT * FROM resume_analyses WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        Ok(sqlx::query_as::<_, AnalysisRecord>(
            "SELECT * FROM resume_analyses WHERE id = $1 AND user_id = $2",
        )
        .bind(record_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn claim_payment(&self, reference: &str, user_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO premium_fulfilments (payment_reference, user_id)
            VALUES ($1, $2)
            ON CONFLICT (payment_reference) DO NOTHING
            "#,
        )
        .bind(reference)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_payment(&self, reference: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM premium_fulfilments WHERE payment_reference = $1")
            .bind(reference)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store. Records are kept in insertion order.
#[cfg(test)]
#[derive(Default)]
pub struct InMemoryAnalysisStore {
    records: RwLock<Vec<AnalysisRecord>>,
    claimed: RwLock<HashSet<String>>,
}

#[cfg(test)]
impl InMemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
#[async_trait]
impl AnalysisStore for InMemoryAnalysisStore {
    async fn find_by_fingerprints(
        &self,
        user_id: Uuid,
        resume: &Fingerprint,
        job_description: &Fingerprint,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| {
                r.user_id == user_id
                    && r.resume_hash.as_deref() == Some(resume.as_str())
                    && r.job_description_hash.as_deref() == Some(job_description.as_str())
            })
            .cloned())
    }

    async fn insert(&self, record: NewAnalysisRecord) -> Result<AnalysisRecord, StoreError> {
        let record = record.into_record(Uuid::new_v4(), Utc::now());
        self.records.write().await.push(record.clone());
        Ok(record)
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<AnalysisRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_for_user(
        &self,
        user_id: Uuid,
        record_id: Uuid,
    ) -> Result<Option<AnalysisRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.id == record_id && r.user_id == user_id)
            .cloned())
    }

    async fn claim_payment(&self, reference: &str, _user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self.claimed.write().await.insert(reference.to_string()))
    }

    async fn release_payment(&self, reference: &str) -> Result<(), StoreError> {
        self.claimed.write().await.remove(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fingerprint::fingerprint;

    fn keyed(user_id: Uuid, resume: &str, jd: &str, score: i32) -> NewAnalysisRecord {
        NewAnalysisRecord {
            user_id,
            compatibility_score: score,
            resume_hash: Some(fingerprint(resume).as_str().to_string()),
            job_description_hash: Some(fingerprint(jd).as_str().to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_find_returns_most_recent_match() {
        let store = InMemoryAnalysisStore::new();
        let user = Uuid::new_v4();
        store.insert(keyed(user, "r", "j", 40)).await.unwrap();
        store.insert(keyed(user, "r", "j", 70)).await.unwrap();

        let found = store
            .find_by_fingerprints(user, &fingerprint("r"), &fingerprint("j"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.compatibility_score, 70);
    }

    #[tokio::test]
    async fn test_find_is_scoped_to_user() {
        let store = InMemoryAnalysisStore::new();
        store.insert(keyed(Uuid::new_v4(), "r", "j", 40)).await.unwrap();

        let found = store
            .find_by_fingerprints(Uuid::new_v4(), &fingerprint("r"), &fingerprint("j"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_unkeyed_records_never_match() {
        let store = InMemoryAnalysisStore::new();
        let user = Uuid::new_v4();
        store
            .insert(NewAnalysisRecord {
                user_id: user,
                tailored_resume: Some("## Resume".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let found = store
            .find_by_fingerprints(user, &fingerprint("r"), &fingerprint("j"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_get_is_scoped() {
        let store = InMemoryAnalysisStore::new();
        let user = Uuid::new_v4();
        let first = store.insert(keyed(user, "a", "j", 1)).await.unwrap();
        let second = store.insert(keyed(user, "b", "j", 2)).await.unwrap();
        store.insert(keyed(Uuid::new_v4(), "c", "j", 3)).await.unwrap();

        let listed = store.list_for_user(user).await.unwrap();
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        assert!(store.get_for_user(user, first.id).await.unwrap().is_some());
        assert!(store
            .get_for_user(Uuid::new_v4(), first.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_payment_reference_is_claimed_once() {
        let store = InMemoryAnalysisStore::new();
        let user = Uuid::new_v4();

        assert!(store.claim_payment("ref_1", user).await.unwrap());
        assert!(!store.claim_payment("ref_1", Uuid::new_v4()).await.unwrap());
        assert!(store.claim_payment("ref_2", user).await.unwrap());

        store.release_payment("ref_1").await.unwrap();
        assert!(store.claim_payment("ref_1", user).await.unwrap());
    }
}
