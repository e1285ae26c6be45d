use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member's public display fields, snapshotted onto every delivered
/// message so clients can render without a second lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub avatar: Option<String>,
}

/// A group message as delivered over the gateway and returned by
/// history reads. Content is post-filter text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    pub id: Uuid,
    pub faculty: String,
    pub sender: Profile,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A private one-to-one message with both ends denormalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateMessage {
    pub id: Uuid,
    pub sender: Profile,
    pub receiver: Profile,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The singleton moderation settings record. Read by the word filter
/// and the retention sweeper, mutated only through the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub rules: String,
    pub daily_topic: String,
    pub filter_words: Vec<String>,
    pub group_retention_hours: i64,
    pub private_retention_hours: i64,
}
