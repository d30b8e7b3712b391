//! Session snapshots so a reload resumes the wizard where it was.
//!
//! A `SnapshotStore` is bound to exactly one session key; a
//! `SnapshotBackend` hands out stores per session. Each snapshot records the
//! user that owns it so a restored session is only handed back to them.

#[cfg(test)]
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
#[cfg(test)]
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::workflow::state::WorkflowState;

const KEY_PREFIX: &str = "tailor:workflow";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub owner: Uuid,
    pub state: WorkflowState,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
    async fn load(&self) -> Result<Option<Snapshot>, SnapshotError>;
    async fn clear(&self) -> Result<(), SnapshotError>;
}

pub trait SnapshotBackend: Send + Sync {
    fn for_session(&self, session_id: Uuid) -> Arc<dyn SnapshotStore>;
}

pub fn session_key(session_id: Uuid) -> String {
    format!("{KEY_PREFIX}:{session_id}")
}

// ────────────────────────────────────────────────────────────────────────────
// Redis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisSnapshotBackend {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisSnapshotBackend {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }
}

impl SnapshotBackend for RedisSnapshotBackend {
    fn for_session(&self, session_id: Uuid) -> Arc<dyn SnapshotStore> {
        Arc::new(RedisSnapshotStore {
            client: self.client.clone(),
            key: session_key(session_id),
            ttl_secs: self.ttl_secs,
        })
    }
}

pub struct RedisSnapshotStore {
    client: redis::Client,
    key: String,
    ttl_secs: u64,
}

#[async_trait]
impl SnapshotStore for RedisSnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let payload = serde_json::to_string(snapshot)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(&self.key, payload, self.ttl_secs)
            .await?;
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.get(&self.key).await?;
        Ok(payload
            .map(|p| serde_json::from_str::<Snapshot>(&p))
            .transpose()?)
    }

    async fn clear(&self) -> Result<(), SnapshotError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(&self.key).await?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Shared map of serialized snapshots. Cloning shares the map, so a new
/// controller for the same session sees what an earlier one saved.
#[cfg(test)]
#[derive(Clone, Default)]
pub struct InMemorySnapshotBackend {
    snapshots: Arc<RwLock<HashMap<String, String>>>,
}

#[cfg(test)]
impl InMemorySnapshotBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.snapshots
            .read()
            .await
            .contains_key(&session_key(session_id))
    }
}

#[cfg(test)]
impl SnapshotBackend for InMemorySnapshotBackend {
    fn for_session(&self, session_id: Uuid) -> Arc<dyn SnapshotStore> {
        Arc::new(InMemorySnapshotStore {
            snapshots: self.snapshots.clone(),
            key: session_key(session_id),
        })
    }
}

#[cfg(test)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<RwLock<HashMap<String, String>>>,
    key: String,
}

#[cfg(test)]
#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let payload = serde_json::to_string(snapshot)?;
        self.snapshots.write().await.insert(self.key.clone(), payload);
        Ok(())
    }

    async fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let snapshots = self.snapshots.read().await;
        Ok(snapshots
            .get(&self.key)
            .map(|p| serde_json::from_str::<Snapshot>(p))
            .transpose()?)
    }

    async fn clear(&self) -> Result<(), SnapshotError> {
        self.snapshots.write().await.remove(&self.key);
        Ok(())
    }
}
