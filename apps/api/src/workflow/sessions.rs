//! Live workflow sessions, keyed by session id.
//!
//! Each controller sits behind its own `tokio::sync::Mutex`. Requests take
//! the lock with `try_lock`, so a second request arriving while an analysis
//! is awaiting is refused instead of queued. Reads go through the session's
//! `WorkflowMonitor` and never wait.
//!
//! Sessions idle longer than the configured window are dropped from memory;
//! their Redis snapshot brings them back on the next request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::cache::AnalysisCache;
use crate::analysis::gateway::AnalysisGateway;
use crate::models::user::UserIdentity;
use crate::workflow::controller::{
    Preload, WorkflowController, WorkflowError, WorkflowMonitor, WorkflowView,
};
use crate::workflow::snapshot::SnapshotBackend;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Workflow session {0} not found")]
    NotFound(Uuid),

    #[error("Workflow session belongs to another user")]
    Forbidden,
}

/// Everything a controller is built from.
#[derive(Clone)]
pub struct WorkflowDeps {
    pub cache: AnalysisCache,
    pub gateway: Arc<dyn AnalysisGateway>,
    pub snapshots: Arc<dyn SnapshotBackend>,
}

impl WorkflowDeps {
    pub async fn open(
        &self,
        session_id: Uuid,
        user: UserIdentity,
        preload: Option<Preload>,
    ) -> WorkflowController {
        WorkflowController::open(
            user,
            self.cache.clone(),
            self.gateway.clone(),
            self.snapshots.for_session(session_id),
            preload,
        )
        .await
    }
}

pub struct Session {
    owner: Uuid,
    monitor: WorkflowMonitor,
    controller: Mutex<WorkflowController>,
    /// Milliseconds since the registry epoch.
    last_seen: AtomicU64,
}

impl Session {
    fn new(controller: WorkflowController, now_ms: u64) -> Self {
        Self {
            owner: controller.user().user_id,
            monitor: controller.monitor(),
            controller: Mutex::new(controller),
            last_seen: AtomicU64::new(now_ms),
        }
    }

    pub fn owner(&self) -> Uuid {
        self.owner
    }

    /// Exclusive access to the controller, or `AnalysisInProgress` when
    /// another request holds it.
    pub fn lock(&self) -> Result<MutexGuard<'_, WorkflowController>, WorkflowError> {
        self.controller
            .try_lock()
            .map_err(|_| WorkflowError::AnalysisInProgress)
    }

    /// The live view when the controller is free, otherwise the last
    /// persisted state as published by the busy controller.
    pub fn view(&self) -> WorkflowView {
        match self.controller.try_lock() {
            Ok(wf) => wf.view(),
            Err(_) => self.monitor.view(),
        }
    }

    fn is_busy(&self) -> bool {
        self.monitor.is_in_progress() || self.controller.try_lock().is_err()
    }

    fn touch(&self, now_ms: u64) {
        self.last_seen.store(now_ms, Ordering::Relaxed);
    }

    fn idle_for(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.last_seen.load(Ordering::Relaxed)))
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    idle_ttl: Duration,
    epoch: Instant,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Opens a new session for `user` under a fresh id.
    pub async fn create(
        &self,
        deps: &WorkflowDeps,
        user: UserIdentity,
        preload: Option<Preload>,
    ) -> (Uuid, Arc<Session>) {
        let session_id = Uuid::new_v4();
        let controller = deps.open(session_id, user, preload).await;
        let session = Arc::new(Session::new(controller, self.now_ms()));
        self.sessions
            .write()
            .await
            .insert(session_id, session.clone());
        info!("Opened workflow session {session_id} for user {}", session.owner);
        (session_id, session)
    }

    /// Finds a live session, or reopens one whose snapshot survived a restart
    /// or an eviction. Only the user recorded as owner gets it back.
    pub async fn resolve(
        &self,
        deps: &WorkflowDeps,
        session_id: Uuid,
        user: &UserIdentity,
    ) -> Result<Arc<Session>, SessionError> {
        let live = self.sessions.read().await.get(&session_id).cloned();
        let session = match live {
            Some(session) => session,
            None => self.reopen(deps, session_id, user).await?,
        };

        if session.owner() != user.user_id {
            return Err(SessionError::Forbidden);
        }
        session.touch(self.now_ms());
        Ok(session)
    }

    async fn reopen(
        &self,
        deps: &WorkflowDeps,
        session_id: Uuid,
        user: &UserIdentity,
    ) -> Result<Arc<Session>, SessionError> {
        match deps.snapshots.for_session(session_id).load().await {
            Ok(Some(saved)) if saved.owner == user.user_id => {}
            Ok(Some(_)) => {
                warn!(
                    "User {} asked for workflow session {session_id} owned by another user",
                    user.user_id
                );
                return Err(SessionError::Forbidden);
            }
            Ok(None) => return Err(SessionError::NotFound(session_id)),
            Err(e) => {
                warn!("Failed to read snapshot for session {session_id}: {e}");
                return Err(SessionError::NotFound(session_id));
            }
        }

        let controller = deps.open(session_id, user.clone(), None).await;
        let session = Arc::new(Session::new(controller, self.now_ms()));
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(session_id).or_insert(session).clone();
        info!("Reopened workflow session {session_id} from snapshot");
        Ok(session)
    }

    /// Drops sessions idle past the window. Busy sessions are kept.
    pub async fn evict_idle(&self) -> usize {
        let now = self.now_ms();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.is_busy() || session.idle_for(now) <= self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle workflow sessions ({} live)", sessions.len());
        }
        evicted
    }

    #[cfg(test)]
    pub async fn live(&self) -> usize {
        self.sessions.read().await.len()
    }
}
