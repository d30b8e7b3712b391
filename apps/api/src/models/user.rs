use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The only identity facts the workflow consumes from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: Uuid,
    pub email: String,
}
