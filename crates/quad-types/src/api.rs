use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Profile;

// -- JWT Claims --

/// Role baked into the token at login time. Resolved once at the
/// boundary (REST middleware or gateway send path); downstream code
/// only ever sees the resolved member/moderator row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Moderator,
    Super,
}

/// JWT claims shared between quad-api (REST middleware) and
/// quad-gateway (per-send credential resolution). Canonical definition
/// lives here to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub phone: String,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by both register and login.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub member: MemberSummary,
}

#[derive(Debug, Serialize)]
pub struct MemberSummary {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModeratorLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ModeratorLoginResponse {
    pub token: String,
    pub moderator: ModeratorSummary,
}

#[derive(Debug, Serialize)]
pub struct ModeratorSummary {
    pub id: Uuid,
    pub username: String,
    pub is_super: bool,
}

// -- Members --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub faculty: Option<String>,
    pub degree: Option<String>,
    pub course: Option<String>,
}

/// A member as seen by other members and by moderators.
/// Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub avatar: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    pub reason: String,
}

// -- Admin --

#[derive(Debug, Serialize)]
pub struct ToggleActiveResponse {
    pub id: Uuid,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct ReportedMemberResponse {
    #[serde(flatten)]
    pub member: Profile,
    pub report_count: i64,
}

/// Partial settings update — absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateSettingsRequest {
    pub rules: Option<String>,
    pub daily_topic: Option<String>,
    pub filter_words: Option<Vec<String>>,
    pub group_retention_hours: Option<i64>,
    pub private_retention_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateModeratorRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ModeratorResponse {
    pub id: Uuid,
    pub username: String,
    pub is_super: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
