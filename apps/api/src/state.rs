use std::sync::Arc;

use crate::premium::generator::PremiumService;
use crate::workflow::sessions::{SessionRegistry, WorkflowDeps};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Cache, gateway and snapshot backend every controller is built from.
    pub workflows: WorkflowDeps,
    pub sessions: Arc<SessionRegistry>,
    /// `None` when no payment provider key is configured.
    pub premium: Option<Arc<PremiumService>>,
}
