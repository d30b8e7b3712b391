//! Payment verification: confirms a checkout reference before any paid work.
//!
//! `AppState` carries an `Arc<dyn PaymentVerifier>` inside `PremiumService`;
//! production uses `PaystackVerifier`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

const PAYSTACK_VERIFY_URL: &str = "https://api.paystack.co/transaction/verify";
const EXPECTED_CURRENCY: &str = "NGN";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Payment provider returned {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("Invalid payment reference")]
    InvalidReference,

    #[error("Payment {reference} was not successful (status: {status})")]
    NotSuccessful { reference: String, status: String },

    #[error("Payment was made in {0}, expected NGN")]
    WrongCurrency(String),

    #[error("Payment of {paid} kobo is below the required {required} kobo")]
    Underpaid { paid: u64, required: u64 },

    #[error("Payment {0} has already been used")]
    AlreadyFulfilled(String),
}

/// The `data` object of a verify response.
#[derive(Debug, Clone, Deserialize)]
pub struct PaystackTransaction {
    pub status: String,
    pub reference: String,
    /// Smallest currency unit (kobo).
    pub amount: u64,
    pub currency: String,
}

#[derive(Debug, Deserialize)]
struct VerifyEnvelope {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<PaystackTransaction>,
}

/// A payment that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayment {
    pub reference: String,
    pub amount_kobo: u64,
}

#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, PaymentError>;
}

/// Checkout references are opaque provider tokens; anything outside this
/// alphabet is refused before it reaches a URL path.
pub fn is_valid_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 100
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '='))
}

/// Accepts only a successful NGN transaction of at least the premium price.
pub fn check_transaction(
    tx: &PaystackTransaction,
    price_ngn: u64,
) -> Result<VerifiedPayment, PaymentError> {
    if tx.status != "success" {
        return Err(PaymentError::NotSuccessful {
            reference: tx.reference.clone(),
            status: tx.status.clone(),
        });
    }
    if !tx.currency.eq_ignore_ascii_case(EXPECTED_CURRENCY) {
        return Err(PaymentError::WrongCurrency(tx.currency.clone()));
    }
    let required = price_ngn.saturating_mul(100);
    if tx.amount < required {
        return Err(PaymentError::Underpaid {
            paid: tx.amount,
            required,
        });
    }
    Ok(VerifiedPayment {
        reference: tx.reference.clone(),
        amount_kobo: tx.amount,
    })
}

pub struct PaystackVerifier {
    client: Client,
    secret_key: String,
    price_ngn: u64,
}

impl PaystackVerifier {
    pub fn new(secret_key: String, price_ngn: u64) -> Result<Self, PaymentError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            secret_key,
            price_ngn,
        })
    }
}

#[async_trait]
impl PaymentVerifier for PaystackVerifier {
    async fn verify(&self, reference: &str) -> Result<VerifiedPayment, PaymentError> {
        if !is_valid_reference(reference) {
            return Err(PaymentError::InvalidReference);
        }

        let response = self
            .client
            .get(format!("{PAYSTACK_VERIFY_URL}/{reference}"))
            .bearer_auth(&self.secret_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let envelope = serde_json::from_str::<VerifyEnvelope>(&body).ok();

        let tx = match envelope {
            Some(VerifyEnvelope {
                status: true,
                data: Some(tx),
                ..
            }) if status.is_success() => tx,
            Some(envelope) => {
                warn!("Payment verification refused for {reference}: {}", envelope.message);
                return Err(PaymentError::Provider {
                    status: status.as_u16(),
                    message: envelope.message,
                });
            }
            None => {
                return Err(PaymentError::Provider {
                    status: status.as_u16(),
                    message: body,
                });
            }
        };

        let verified = check_transaction(&tx, self.price_ngn)?;
        info!(
            "Verified payment {} ({} kobo)",
            verified.reference, verified.amount_kobo
        );
        Ok(verified)
    }
}
