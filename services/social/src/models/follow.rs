//! Follow edge model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directed edge: `following_id` receives `followed_id`'s content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: Uuid,
    pub following_id: Uuid,
    pub followed_id: Uuid,
    pub followed_at: DateTime<Utc>,
}
