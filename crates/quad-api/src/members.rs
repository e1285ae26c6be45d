use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use quad_db::models::MemberRow;
use quad_types::api::{MemberResponse, ReportRequest, UpdateProfileRequest};

use crate::error::{ApiError, run_blocking};
use crate::middleware::CurrentMember;
use crate::state::AppState;

pub async fn get_profile(
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> Json<MemberResponse> {
    Json(member_response(&member))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<MemberResponse>, ApiError> {
    let db = state.db.clone();
    let id = member.id.clone();
    let updated = run_blocking(move || {
        db.update_member_profile(
            &id,
            req.full_name.as_deref(),
            req.faculty.as_deref(),
            req.degree.as_deref(),
            req.course.as_deref(),
        )
    })
    .await?
    .ok_or(ApiError::NotFound("member"))?;

    Ok(Json(member_response(&updated)))
}

pub async fn get_member(
    State(state): State<AppState>,
    Path(member_id): Path<Uuid>,
    Extension(_current): Extension<CurrentMember>,
) -> Result<Json<MemberResponse>, ApiError> {
    let db = state.db.clone();
    let member = run_blocking(move || db.get_member_by_id(&member_id.to_string()))
        .await?
        .ok_or(ApiError::NotFound("member"))?;

    Ok(Json(member_response(&member)))
}

pub async fn block_member(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> Result<impl IntoResponse, ApiError> {
    if member.id == target_id.to_string() {
        return Err(ApiError::Validation("cannot block yourself".into()));
    }

    let db = state.db.clone();
    let blocker = member.id.clone();
    run_blocking(move || {
        let target = target_id.to_string();
        if db.get_member_by_id(&target)?.is_none() {
            return Ok(false);
        }
        db.add_block(&blocker, &target, &quad_db::timestamp(Utc::now()))?;
        Ok(true)
    })
    .await?
    .then_some(StatusCode::NO_CONTENT)
    .ok_or(ApiError::NotFound("member"))
}

pub async fn unblock_member(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let blocker = member.id.clone();
    run_blocking(move || db.remove_block(&blocker, &target_id.to_string())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn report_member(
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
    Extension(CurrentMember(member)): Extension<CurrentMember>,
    Json(req): Json<ReportRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.reason.trim().is_empty() {
        return Err(ApiError::Validation("a reason is required".into()));
    }

    let db = state.db.clone();
    let reporter = member.id.clone();
    run_blocking(move || {
        let target = target_id.to_string();
        if db.get_member_by_id(&target)?.is_none() {
            return Ok(false);
        }
        db.insert_report(
            &Uuid::new_v4().to_string(),
            &target,
            &reporter,
            &req.reason,
            &quad_db::timestamp(Utc::now()),
        )?;
        Ok(true)
    })
    .await?
    .then_some(StatusCode::CREATED)
    .ok_or(ApiError::NotFound("member"))
}

pub(crate) fn member_response(member: &MemberRow) -> MemberResponse {
    MemberResponse {
        id: member.id.parse().unwrap_or_else(|e| {
            warn!("Corrupt member id '{}': {}", member.id, e);
            Uuid::default()
        }),
        email: member.email.clone(),
        phone: member.phone.clone(),
        full_name: member.full_name.clone(),
        faculty: member.faculty.clone(),
        degree: member.degree.clone(),
        course: member.course.clone(),
        avatar: member.avatar.clone(),
        is_active: member.is_active,
        created_at: quad_db::parse_timestamp(&member.created_at),
    }
}
