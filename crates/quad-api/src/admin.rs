use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use quad_db::models::{ModeratorRow, SettingsRow};
use quad_db::moderators::DeleteModerator;
use quad_db::settings::SettingsPatch;
use quad_types::api::{
    CreateModeratorRequest, MemberResponse, ModeratorResponse, ReportedMemberResponse,
    ToggleActiveResponse, UpdateSettingsRequest,
};
use quad_types::events::GatewayEvent;
use quad_types::models::Settings;

use crate::auth::hash_password;
use crate::error::{ApiError, run_blocking};
use crate::members::member_response;
use crate::messages::api_profile;
use crate::middleware::CurrentModerator;
use crate::state::AppState;

/// A member lands on the moderation triage list after this many reports.
const REPORT_TRIAGE_THRESHOLD: i64 = 16;

// -- Settings --

/// Unauthenticated read: clients fetch rules, daily topic and
/// retention windows before login.
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<Settings>, ApiError> {
    let db = state.db.clone();
    let row = run_blocking(move || db.get_settings()).await?;
    Ok(Json(settings_model(row)))
}

/// Any moderator may mutate settings. The full updated record is
/// pushed to every live connection, best-effort.
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(_moderator): Extension<CurrentModerator>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Settings>, ApiError> {
    for hours in [req.group_retention_hours, req.private_retention_hours].into_iter().flatten() {
        if hours < 0 {
            return Err(ApiError::Validation("retention hours cannot be negative".into()));
        }
    }

    let db = state.db.clone();
    let patch = SettingsPatch {
        rules: req.rules,
        daily_topic: req.daily_topic,
        filter_words: req.filter_words,
        group_retention_hours: req.group_retention_hours,
        private_retention_hours: req.private_retention_hours,
    };
    let updated = run_blocking(move || db.update_settings(&patch)).await?;

    let settings = settings_model(updated);
    state.dispatcher.broadcast(GatewayEvent::SettingsChanged {
        settings: settings.clone(),
    });

    Ok(Json(settings))
}

// -- Members --

pub async fn list_members(
    State(state): State<AppState>,
    Extension(_moderator): Extension<CurrentModerator>,
) -> Result<Json<Vec<MemberResponse>>, ApiError> {
    let db = state.db.clone();
    let members = run_blocking(move || db.list_members()).await?;
    Ok(Json(members.iter().map(member_response).collect()))
}

pub async fn toggle_member_active(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(_moderator): Extension<CurrentModerator>,
) -> Result<Json<ToggleActiveResponse>, ApiError> {
    let db = state.db.clone();
    let is_active = run_blocking(move || db.toggle_member_active(&member_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("member"))?;

    Ok(Json(ToggleActiveResponse {
        id: member_id,
        is_active,
    }))
}

pub async fn reported_members(
    State(state): State<AppState>,
    Extension(_moderator): Extension<CurrentModerator>,
) -> Result<Json<Vec<ReportedMemberResponse>>, ApiError> {
    let db = state.db.clone();
    let rows = run_blocking(move || db.reported_members(REPORT_TRIAGE_THRESHOLD)).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ReportedMemberResponse {
                member: api_profile(row.member),
                report_count: row.report_count,
            })
            .collect(),
    ))
}

// -- Moderators (super only) --

pub async fn create_moderator(
    State(state): State<AppState>,
    Extension(CurrentModerator(moderator)): Extension<CurrentModerator>,
    Json(req): Json<CreateModeratorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_super(&moderator)?;

    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation("username must be 3-32 characters".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters".into()));
    }

    let db = state.db.clone();
    let username = req.username.clone();
    if run_blocking(move || db.get_moderator_by_username(&username))
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("username already in use".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let id = Uuid::new_v4();
    let created_at = quad_db::timestamp(Utc::now());

    let db = state.db.clone();
    let username = req.username.clone();
    let at = created_at.clone();
    run_blocking(move || db.create_moderator(&id.to_string(), &username, &password_hash, &at))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ModeratorResponse {
            id,
            username: req.username,
            is_super: false,
            created_at: quad_db::parse_timestamp(&created_at),
        }),
    ))
}

pub async fn delete_moderator(
    State(state): State<AppState>,
    Path(moderator_id): Path<Uuid>,
    Extension(CurrentModerator(moderator)): Extension<CurrentModerator>,
) -> Result<impl IntoResponse, ApiError> {
    require_super(&moderator)?;

    let db = state.db.clone();
    let outcome = run_blocking(move || db.delete_moderator(&moderator_id.to_string())).await?;

    match outcome {
        DeleteModerator::Deleted => Ok(StatusCode::NO_CONTENT),
        DeleteModerator::NotFound => Err(ApiError::NotFound("moderator")),
        DeleteModerator::IsSuper => Err(ApiError::Forbidden),
    }
}

pub async fn list_moderators(
    State(state): State<AppState>,
    Extension(CurrentModerator(moderator)): Extension<CurrentModerator>,
) -> Result<Json<Vec<ModeratorResponse>>, ApiError> {
    require_super(&moderator)?;

    let db = state.db.clone();
    let rows = run_blocking(move || db.list_moderators()).await?;

    Ok(Json(
        rows.into_iter()
            .map(|row| ModeratorResponse {
                id: row.id.parse().unwrap_or_default(),
                username: row.username,
                is_super: row.is_super,
                created_at: quad_db::parse_timestamp(&row.created_at),
            })
            .collect(),
    ))
}

fn require_super(moderator: &ModeratorRow) -> Result<(), ApiError> {
    if moderator.is_super {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

pub(crate) fn settings_model(row: SettingsRow) -> Settings {
    Settings {
        rules: row.rules,
        daily_topic: row.daily_topic,
        filter_words: row.filter_words,
        group_retention_hours: row.group_retention_hours,
        private_retention_hours: row.private_retention_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use quad_db::Database;
    use quad_gateway::dispatcher::Dispatcher;
    use std::sync::Arc;

    use crate::state::AppStateInner;

    fn make_state() -> (AppState, Dispatcher) {
        let dispatcher = Dispatcher::new();
        let state: AppState = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            dispatcher: dispatcher.clone(),
            jwt_secret: "test-secret".to_string(),
            email_domain: "uni.edu".to_string(),
        });
        (state, dispatcher)
    }

    fn moderator(id: &str, is_super: bool) -> CurrentModerator {
        CurrentModerator(ModeratorRow {
            id: id.to_string(),
            username: format!("mod-{}", id),
            password: "hash".to_string(),
            is_super,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        })
    }

    #[tokio::test]
    async fn settings_update_is_visible_and_broadcast() {
        let (state, dispatcher) = make_state();
        let (_conn, mut rx) = dispatcher.register();

        let Json(updated) = update_settings(
            State(state.clone()),
            Extension(moderator("m1", false)),
            Json(UpdateSettingsRequest {
                filter_words: Some(vec!["spam".to_string()]),
                daily_topic: Some("exams".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.filter_words, vec!["spam".to_string()]);

        // Visible to a subsequent unauthenticated read.
        let Json(read_back) = get_settings(State(state)).await.unwrap();
        assert_eq!(read_back.daily_topic, "exams");

        // Pushed to the live connection.
        match rx.try_recv().unwrap() {
            GatewayEvent::SettingsChanged { settings } => {
                assert_eq!(settings.filter_words, vec!["spam".to_string()]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn negative_retention_is_rejected() {
        let (state, _) = make_state();
        let result = update_settings(
            State(state),
            Extension(moderator("m1", false)),
            Json(UpdateSettingsRequest {
                group_retention_hours: Some(-1),
                ..Default::default()
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn non_super_cannot_manage_moderators() {
        let (state, _) = make_state();

        let created = create_moderator(
            State(state.clone()),
            Extension(moderator("m1", false)),
            Json(CreateModeratorRequest {
                username: "helper".to_string(),
                password: "longenough".to_string(),
            }),
        )
        .await;
        assert!(matches!(created, Err(ApiError::Forbidden)));

        let deleted = delete_moderator(
            State(state),
            Path(Uuid::new_v4()),
            Extension(moderator("m1", false)),
        )
        .await;
        assert!(matches!(deleted, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn super_moderator_cannot_be_deleted() {
        let (state, _) = make_state();
        let super_id = Uuid::new_v4();
        state
            .db
            .ensure_super_moderator(&super_id.to_string(), "root", "hash", "2026-01-01T00:00:00.000Z")
            .unwrap();

        let result = delete_moderator(
            State(state),
            Path(super_id),
            Extension(moderator("m1", true)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Forbidden)));
    }

    #[tokio::test]
    async fn toggle_active_unknown_member_is_not_found() {
        let (state, _) = make_state();
        let result = toggle_member_active(
            State(state),
            Path(Uuid::new_v4()),
            Extension(moderator("m1", false)),
        )
        .await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
