//! Premium fulfilment: paid document generation.
//!
//! Flow: verify payment → claim the reference →
//!       comprehensive analysis (job description only) →
//!       tailored resume → cover letter (job description only) →
//!       record a new premium history row → return the documents.
//!
//! Once payment is verified, a failed comprehensive analysis is not fatal:
//! the prior free-tier result is used instead. A failed document generation
//! is, and is reported as "payment succeeded but generation failed".

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::cache::{AnalysisCache, PremiumRecord};
use crate::analysis::gateway::{AnalysisGateway, GatewayError};
use crate::analysis::models::AnalysisResult;
use crate::analysis::store::StoreError;
use crate::llm_client::prompts::json_system;
use crate::llm_client::LlmClient;
use crate::premium::payment::{PaymentError, PaymentVerifier, VerifiedPayment};
use crate::premium::prompts::{
    build_cover_letter_prompt, build_tailored_resume_prompt, COVER_LETTER_PERSONA,
    GENERATION_TEMPERATURE, RESUME_WRITER_PERSONA,
};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailoredResume {
    pub tailored_resume: String,
    #[serde(default)]
    pub improvements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetter {
    pub cover_letter: String,
    #[serde(default)]
    pub key_points: Vec<String>,
}

/// What the caller paid for.
#[derive(Debug, Clone)]
pub struct PremiumOrder<'a> {
    pub user_id: Uuid,
    pub resume_text: &'a str,
    pub job_description: &'a str,
    /// The free-tier result shown before checkout, if any.
    pub prior_analysis: Option<&'a AnalysisResult>,
    pub payment_reference: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PremiumDocuments {
    /// `None` when the history write failed; the documents are still returned.
    pub record_id: Option<Uuid>,
    pub payment_reference: String,
    pub tailored_resume: String,
    pub improvements: Vec<String>,
    pub cover_letter: Option<String>,
    pub cover_letter_key_points: Vec<String>,
    pub analysis: Option<AnalysisResult>,
}

#[derive(Debug, Error)]
pub enum PremiumError {
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Payment successful but failed to generate {documents}. Please contact support with reference {reference}.")]
    Generation {
        documents: &'static str,
        reference: String,
        source: GatewayError,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Document writer
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn tailor_resume(
        &self,
        resume_text: &str,
        job_description: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<TailoredResume, GatewayError>;

    async fn write_cover_letter(
        &self,
        resume_text: &str,
        job_description: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<CoverLetter, GatewayError>;
}

pub struct LlmDocumentWriter {
    llm: LlmClient,
}

impl LlmDocumentWriter {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DocumentWriter for LlmDocumentWriter {
    async fn tailor_resume(
        &self,
        resume_text: &str,
        job_description: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<TailoredResume, GatewayError> {
        let prompt = build_tailored_resume_prompt(resume_text, job_description, analysis);
        Ok(self
            .llm
            .call_json(
                &prompt,
                &json_system(RESUME_WRITER_PERSONA),
                GENERATION_TEMPERATURE,
            )
            .await?)
    }

    async fn write_cover_letter(
        &self,
        resume_text: &str,
        job_description: &str,
        analysis: Option<&AnalysisResult>,
    ) -> Result<CoverLetter, GatewayError> {
        let prompt = build_cover_letter_prompt(resume_text, job_description, analysis);
        Ok(self
            .llm
            .call_json(
                &prompt,
                &json_system(COVER_LETTER_PERSONA),
                GENERATION_TEMPERATURE,
            )
            .await?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Service
// ────────────────────────────────────────────────────────────────────────────

pub struct PremiumService {
    verifier: Arc<dyn PaymentVerifier>,
    gateway: Arc<dyn AnalysisGateway>,
    writer: Arc<dyn DocumentWriter>,
    cache: AnalysisCache,
}

impl PremiumService {
    pub fn new(
        verifier: Arc<dyn PaymentVerifier>,
        gateway: Arc<dyn AnalysisGateway>,
        writer: Arc<dyn DocumentWriter>,
        cache: AnalysisCache,
    ) -> Self {
        Self {
            verifier,
            gateway,
            writer,
            cache,
        }
    }

    /// Each verified reference is redeemed once. The claim is returned when
    /// generation fails so the buyer can retry with the same payment.
    pub async fn fulfil(&self, order: PremiumOrder<'_>) -> Result<PremiumDocuments, PremiumError> {
        let payment = self.verifier.verify(order.payment_reference).await?;
        if !self
            .cache
            .claim_payment(&payment.reference, order.user_id)
            .await?
        {
            warn!("Payment {} was already fulfilled", payment.reference);
            return Err(PaymentError::AlreadyFulfilled(payment.reference).into());
        }

        let generated = match self.generate(&order, &payment).await {
            Ok(generated) => generated,
            Err(e) => {
                self.cache.release_payment(&payment.reference).await;
                return Err(e);
            }
        };
        let Generated {
            analysis,
            tailored,
            cover_letter,
        } = generated;

        let record = self
            .cache
            .record_premium(PremiumRecord {
                user_id: order.user_id,
                resume_text: order.resume_text,
                job_description: order.job_description,
                analysis: order.prior_analysis.or(analysis.as_ref()),
                tailored_resume: &tailored.tailored_resume,
                cover_letter: cover_letter.as_ref().map(|c| c.cover_letter.as_str()),
                payment_reference: &payment.reference,
            })
            .await;

        info!(
            "Fulfilled premium order {} for user {}",
            payment.reference, order.user_id
        );

        let (cover_letter, cover_letter_key_points) = match cover_letter {
            Some(c) => (Some(c.cover_letter), c.key_points),
            None => (None, Vec::new()),
        };

        Ok(PremiumDocuments {
            record_id: record.map(|r| r.id),
            payment_reference: payment.reference,
            tailored_resume: tailored.tailored_resume,
            improvements: tailored.improvements,
            cover_letter,
            cover_letter_key_points,
            analysis,
        })
    }

    async fn generate(
        &self,
        order: &PremiumOrder<'_>,
        payment: &VerifiedPayment,
    ) -> Result<Generated, PremiumError> {
        let has_jd = !order.job_description.trim().is_empty();
        let documents = if has_jd {
            "tailored resume and cover letter"
        } else {
            "tailored resume"
        };

        let mut analysis = order.prior_analysis.cloned();
        if has_jd {
            match self
                .gateway
                .analyze_comprehensive(order.resume_text, order.job_description)
                .await
            {
                Ok(full) => analysis = Some(full),
                Err(e) => {
                    warn!("Comprehensive analysis failed, using existing analysis: {e}");
                }
            }
        }

        let tailored = self
            .writer
            .tailor_resume(order.resume_text, order.job_description, analysis.as_ref())
            .await
            .map_err(|e| generation_failed(documents, payment, e))?;

        let cover_letter = if has_jd {
            Some(
                self.writer
                    .write_cover_letter(order.resume_text, order.job_description, analysis.as_ref())
                    .await
                    .map_err(|e| generation_failed(documents, payment, e))?,
            )
        } else {
            None
        };

        Ok(Generated {
            analysis,
            tailored,
            cover_letter,
        })
    }
}

struct Generated {
    analysis: Option<AnalysisResult>,
    tailored: TailoredResume,
    cover_letter: Option<CoverLetter>,
}

fn generation_failed(
    documents: &'static str,
    payment: &VerifiedPayment,
    source: GatewayError,
) -> PremiumError {
    warn!(
        "Generation failed after verified payment {}: {source}",
        payment.reference
    );
    PremiumError::Generation {
        documents,
        reference: payment.reference.clone(),
        source,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::analysis::fingerprint::Fingerprinter;
    use crate::analysis::gateway::tests::ScriptedGateway;
    use crate::analysis::store::{AnalysisStore, InMemoryAnalysisStore};

    /// Accepts every reference, or refuses every one.
    pub(crate) struct StaticVerifier {
        pub accept: bool,
    }

    #[async_trait]
    impl PaymentVerifier for StaticVerifier {
        async fn verify(&self, reference: &str) -> Result<VerifiedPayment, PaymentError> {
            if self.accept {
                Ok(VerifiedPayment {
                    reference: reference.to_string(),
                    amount_kobo: 250_000,
                })
            } else {
                Err(PaymentError::NotSuccessful {
                    reference: reference.to_string(),
                    status: "abandoned".to_string(),
                })
            }
        }
    }

    /// Writes fixed documents and records the match score it was given.
    #[derive(Default)]
    pub(crate) struct ScriptedWriter {
        pub fail_resume: bool,
        seen_scores: Mutex<Vec<Option<String>>>,
        cover_letters: Mutex<usize>,
    }

    impl ScriptedWriter {
        fn seen_scores(&self) -> Vec<Option<String>> {
            self.seen_scores.lock().unwrap().clone()
        }

        fn cover_letters(&self) -> usize {
            *self.cover_letters.lock().unwrap()
        }
    }

    #[async_trait]
    impl DocumentWriter for ScriptedWriter {
        async fn tailor_resume(
            &self,
            _resume_text: &str,
            _job_description: &str,
            analysis: Option<&AnalysisResult>,
        ) -> Result<TailoredResume, GatewayError> {
            self.seen_scores
                .lock()
                .unwrap()
                .push(analysis.map(|a| a.match_score.clone()));
            if self.fail_resume {
                return Err(GatewayError::Unavailable("model overloaded".to_string()));
            }
            Ok(TailoredResume {
                tailored_resume: "## EXPERIENCE\n- Shipped things".to_string(),
                improvements: vec!["Quantified impact".to_string()],
            })
        }

        async fn write_cover_letter(
            &self,
            _resume_text: &str,
            _job_description: &str,
            _analysis: Option<&AnalysisResult>,
        ) -> Result<CoverLetter, GatewayError> {
            *self.cover_letters.lock().unwrap() += 1;
            Ok(CoverLetter {
                cover_letter: "Dear hiring manager".to_string(),
                key_points: vec!["Rust depth".to_string()],
            })
        }
    }

    struct Fixture {
        store: Arc<InMemoryAnalysisStore>,
        gateway: Arc<ScriptedGateway>,
        writer: Arc<ScriptedWriter>,
        service: PremiumService,
    }

    fn fixture(accept: bool, writer: ScriptedWriter) -> Fixture {
        let store = Arc::new(InMemoryAnalysisStore::new());
        let gateway = Arc::new(ScriptedGateway::new());
        let writer = Arc::new(writer);
        let service = PremiumService::new(
            Arc::new(StaticVerifier { accept }),
            gateway.clone(),
            writer.clone(),
            AnalysisCache::new(store.clone() as Arc<dyn AnalysisStore>, Fingerprinter::default()),
        );
        Fixture {
            store,
            gateway,
            writer,
            service,
        }
    }

    fn prior() -> AnalysisResult {
        AnalysisResult {
            match_score: "58/100".to_string(),
            ..Default::default()
        }
    }

    fn order<'a>(jd: &'a str, prior: Option<&'a AnalysisResult>) -> PremiumOrder<'a> {
        PremiumOrder {
            user_id: Uuid::new_v4(),
            resume_text: "Backend engineer, Rust and Postgres.",
            job_description: jd,
            prior_analysis: prior,
            payment_reference: "ref_abc123",
        }
    }

    #[tokio::test]
    async fn test_unverified_payment_generates_nothing() {
        let f = fixture(false, ScriptedWriter::default());
        let prior = prior();

        let err = f
            .service
            .fulfil(order("Rust role", Some(&prior)))
            .await
            .unwrap_err();

        assert!(matches!(err, PremiumError::Payment(_)));
        assert!(f.gateway.calls().is_empty());
        assert!(f.writer.seen_scores().is_empty());
        assert_eq!(f.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_full_order_with_job_description() {
        let f = fixture(true, ScriptedWriter::default());
        let prior = prior();

        let docs = f
            .service
            .fulfil(order("Rust role", Some(&prior)))
            .await
            .unwrap();

        // Comprehensive analysis ran and fed the writer.
        assert_eq!(f.gateway.calls().len(), 1);
        assert_eq!(f.writer.seen_scores(), vec![Some("72/100".to_string())]);
        assert_eq!(f.writer.cover_letters(), 1);

        assert_eq!(docs.payment_reference, "ref_abc123");
        assert_eq!(docs.cover_letter.as_deref(), Some("Dear hiring manager"));
        assert_eq!(docs.cover_letter_key_points, vec!["Rust depth"]);
        assert_eq!(docs.improvements, vec!["Quantified impact"]);
        assert!(docs.record_id.is_some());
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_comprehensive_failure_falls_back_to_prior() {
        let f = fixture(true, ScriptedWriter::default());
        f.gateway
            .push(Err(GatewayError::Unavailable("timeout".to_string())));
        let prior = prior();

        let docs = f
            .service
            .fulfil(order("Rust role", Some(&prior)))
            .await
            .unwrap();

        assert_eq!(f.writer.seen_scores(), vec![Some("58/100".to_string())]);
        assert_eq!(docs.analysis, Some(prior));
    }

    #[tokio::test]
    async fn test_without_job_description_skips_analysis_and_cover_letter() {
        let f = fixture(true, ScriptedWriter::default());

        let docs = f.service.fulfil(order("   ", None)).await.unwrap();

        assert!(f.gateway.calls().is_empty());
        assert_eq!(f.writer.seen_scores(), vec![None]);
        assert_eq!(f.writer.cover_letters(), 0);
        assert!(docs.cover_letter.is_none());
        assert!(docs.cover_letter_key_points.is_empty());
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_generation_failure_after_payment() {
        let f = fixture(
            true,
            ScriptedWriter {
                fail_resume: true,
                ..Default::default()
            },
        );

        let err = f.service.fulfil(order("Rust role", None)).await.unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("Payment successful but failed to generate tailored resume and cover letter"));
        assert!(message.contains("ref_abc123"));
        assert_eq!(f.writer.cover_letters(), 0);
        assert_eq!(f.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_reference_is_fulfilled_once() {
        let f = fixture(true, ScriptedWriter::default());

        f.service.fulfil(order("Rust role", None)).await.unwrap();
        let err = f
            .service
            .fulfil(order("Another role", None))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PremiumError::Payment(PaymentError::AlreadyFulfilled(ref r)) if r == "ref_abc123"
        ));
        assert_eq!(f.writer.seen_scores().len(), 1);
        assert_eq!(f.gateway.calls().len(), 1);
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn test_failed_generation_releases_the_reference() {
        let f = fixture(
            true,
            ScriptedWriter {
                fail_resume: true,
                ..Default::default()
            },
        );

        assert!(f.service.fulfil(order("   ", None)).await.is_err());
        assert!(f
            .store
            .claim_payment("ref_abc123", Uuid::new_v4())
            .await
            .unwrap());
    }
}
