use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub openai_api_key: String,
    /// Premium fulfilment is disabled when no Paystack secret is configured.
    pub paystack_secret_key: Option<String>,
    pub premium_price_ngn: u64,
    pub fingerprint_digest: String,
    pub snapshot_ttl_secs: u64,
    /// Live sessions idle this long are dropped from memory.
    pub session_idle_secs: u64,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            openai_api_key: require_env("OPENAI_API_KEY")?,
            paystack_secret_key: std::env::var("PAYSTACK_SECRET_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            premium_price_ngn: parse_env("PREMIUM_PRICE_NGN", 2500)?,
            fingerprint_digest: std::env::var("FINGERPRINT_DIGEST")
                .unwrap_or_else(|_| "sha256".to_string()),
            snapshot_ttl_secs: parse_env("SNAPSHOT_TTL_SECS", 86_400)?,
            session_idle_secs: parse_env("SESSION_IDLE_SECS", 3_600)?,
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        Err(_) => Ok(default),
    }
}
