/// Database row types — these map directly to SQLite rows.
/// Distinct from the quad-types API models to keep the DB layer
/// independent.

#[derive(Debug, Clone)]
pub struct MemberRow {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub avatar: Option<String>,
    pub password: String,
    pub is_active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ModeratorRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub is_super: bool,
    pub created_at: String,
}

/// Public display fields joined onto message rows.
#[derive(Debug, Clone)]
pub struct ProfileRow {
    pub id: String,
    pub full_name: String,
    pub faculty: String,
    pub degree: String,
    pub course: String,
    pub avatar: Option<String>,
}

#[derive(Debug)]
pub struct GroupMessageRow {
    pub id: String,
    pub faculty: String,
    pub content: String,
    pub created_at: String,
    pub sender: ProfileRow,
}

#[derive(Debug)]
pub struct PrivateMessageRow {
    pub id: String,
    pub content: String,
    pub created_at: String,
    pub sender: ProfileRow,
    pub receiver: ProfileRow,
}

#[derive(Debug)]
pub struct ReportedMemberRow {
    pub member: ProfileRow,
    pub report_count: i64,
}

#[derive(Debug, Clone)]
pub struct SettingsRow {
    pub rules: String,
    pub daily_topic: String,
    pub filter_words: Vec<String>,
    pub group_retention_hours: i64,
    pub private_retention_hours: i64,
}
