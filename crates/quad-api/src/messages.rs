use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::warn;
use uuid::Uuid;

use quad_db::models::{GroupMessageRow, PrivateMessageRow, ProfileRow};
use quad_types::models::{GroupMessage, PrivateMessage, Profile};

use crate::error::{ApiError, run_blocking};
use crate::middleware::CurrentMember;
use crate::state::AppState;

/// Group history: most recent 100 for the room, oldest first, with
/// messages from senders the requester has blocked filtered out.
pub async fn group_history(
    State(state): State<AppState>,
    Path(faculty): Path<String>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> Result<Json<Vec<GroupMessage>>, ApiError> {
    let db = state.db.clone();
    let viewer = member.id.clone();
    let rows = run_blocking(move || db.group_history(&faculty, &viewer)).await?;

    Ok(Json(rows.into_iter().map(group_message).collect()))
}

/// Private history with one other member: most recent 100, oldest
/// first, no block filtering.
pub async fn private_history(
    State(state): State<AppState>,
    Path(other_id): Path<Uuid>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> Result<Json<Vec<PrivateMessage>>, ApiError> {
    let db = state.db.clone();
    let me = member.id.clone();
    let rows = run_blocking(move || db.private_history(&me, &other_id.to_string())).await?;

    Ok(Json(rows.into_iter().map(private_message).collect()))
}

fn group_message(row: GroupMessageRow) -> GroupMessage {
    GroupMessage {
        id: parse_id(&row.id),
        faculty: row.faculty,
        sender: api_profile(row.sender),
        content: row.content,
        created_at: quad_db::parse_timestamp(&row.created_at),
    }
}

fn private_message(row: PrivateMessageRow) -> PrivateMessage {
    PrivateMessage {
        id: parse_id(&row.id),
        sender: api_profile(row.sender),
        receiver: api_profile(row.receiver),
        content: row.content,
        created_at: quad_db::parse_timestamp(&row.created_at),
    }
}

fn parse_id(id: &str) -> Uuid {
    id.parse().unwrap_or_else(|e| {
        warn!("Corrupt message id '{}': {}", id, e);
        Uuid::default()
    })
}

pub(crate) fn api_profile(row: ProfileRow) -> Profile {
    Profile {
        id: row.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt member id '{}': {}", row.id, e);
            Uuid::default()
        }),
        full_name: row.full_name,
        faculty: row.faculty,
        degree: row.degree,
        course: row.course,
        avatar: row.avatar,
    }
}
