//! Verification token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-time token exchanged for account activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    /// Issue a fresh random token for a user
    pub fn issue(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().to_string(),
            user_id,
            created_at: now,
        }
    }
}
