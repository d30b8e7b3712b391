mod analysis;
mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod premium;
mod routes;
mod state;
mod workflow;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis::cache::AnalysisCache;
use crate::analysis::fingerprint::Fingerprinter;
use crate::analysis::gateway::LlmAnalysisGateway;
use crate::analysis::store::PgAnalysisStore;
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::premium::generator::{LlmDocumentWriter, PremiumService};
use crate::premium::payment::PaystackVerifier;
use crate::routes::build_router;
use crate::state::AppState;
use crate::workflow::sessions::{SessionRegistry, WorkflowDeps};
use crate::workflow::snapshot::RedisSnapshotBackend;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (analysis history + dedup cache)
    let db = create_pool(&config.database_url).await?;
    let fingerprinter = Fingerprinter::from_name(&config.fingerprint_digest);
    info!("Fingerprint digest: {:?}", fingerprinter.kind());
    let cache = AnalysisCache::new(Arc::new(PgAnalysisStore::new(db)), fingerprinter);

    // Initialize Redis (workflow snapshots)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let snapshots = RedisSnapshotBackend::new(redis, config.snapshot_ttl_secs);
    info!("Redis client initialized (snapshot ttl: {}s)", config.snapshot_ttl_secs);

    // Initialize LLM client
    let llm = LlmClient::new(config.openai_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let gateway = Arc::new(LlmAnalysisGateway::new(llm.clone()));

    // Premium fulfilment is only mounted with a payment provider key
    let premium = match &config.paystack_secret_key {
        Some(key) => {
            let verifier = PaystackVerifier::new(key.clone(), config.premium_price_ngn)?;
            info!("Premium enabled (price: NGN {})", config.premium_price_ngn);
            Some(Arc::new(PremiumService::new(
                Arc::new(verifier),
                gateway.clone(),
                Arc::new(LlmDocumentWriter::new(llm)),
                cache.clone(),
            )))
        }
        None => {
            warn!("PAYSTACK_SECRET_KEY not set; premium fulfilment disabled");
            None
        }
    };

    // Live sessions; idle ones fall back to their Redis snapshot
    let sessions = Arc::new(SessionRegistry::new(Duration::from_secs(
        config.session_idle_secs,
    )));
    let sweeper = sessions.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            tick.tick().await;
            sweeper.evict_idle().await;
        }
    });
    info!("Session idle window: {}s", config.session_idle_secs);

    // Build app state
    let state = AppState {
        workflows: WorkflowDeps {
            cache,
            gateway,
            snapshots: Arc::new(snapshots),
        },
        sessions,
        premium,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the deployed frontend

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
