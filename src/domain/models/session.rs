use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Cached proof of an active login, stored under `session:<token>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
}
