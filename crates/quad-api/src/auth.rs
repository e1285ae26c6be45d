use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use quad_db::models::MemberRow;
use quad_types::api::{
    AuthResponse, Claims, LoginRequest, MemberSummary, ModeratorLoginRequest,
    ModeratorLoginResponse, ModeratorSummary, RegisterRequest, Role,
};

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain_suffix = format!("@{}", state.email_domain);
    if !req.email.ends_with(&domain_suffix) {
        return Err(ApiError::Validation(format!(
            "registration requires a {} email",
            domain_suffix
        )));
    }
    if req.full_name.trim().is_empty() || req.faculty.trim().is_empty() {
        return Err(ApiError::Validation("name and faculty are required".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation("password must be at least 8 characters".into()));
    }

    // Duplicate check on both unique-ish handles.
    let db = state.db.clone();
    let email = req.email.clone();
    let phone = req.phone.clone();
    let existing = run_blocking(move || db.find_member_by_email_or_phone(&email, &phone)).await?;
    if let Some(existing) = existing {
        if !existing.is_active {
            return Err(ApiError::Inactive);
        }
        return Err(ApiError::Conflict("email or phone already in use".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let member_id = Uuid::new_v4();
    let row = MemberRow {
        id: member_id.to_string(),
        email: req.email,
        phone: req.phone,
        full_name: req.full_name,
        faculty: req.faculty,
        degree: req.degree,
        course: req.course,
        avatar: None,
        password: password_hash,
        is_active: true,
        created_at: quad_db::timestamp(Utc::now()),
    };

    let db = state.db.clone();
    let stored = row.clone();
    run_blocking(move || db.create_member(&stored)).await?;

    let token = create_token(&state.jwt_secret, member_id, Role::Member)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            member: member_summary(&row),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let email = req.email.clone();
    let member = run_blocking(move || db.get_member_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if !member.is_active {
        return Err(ApiError::Inactive);
    }

    verify_password(&req.password, &member.password)?;

    let member_id: Uuid = member
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt member id: {}", e)))?;
    let token = create_token(&state.jwt_secret, member_id, Role::Member)?;

    Ok(Json(AuthResponse {
        token,
        member: member_summary(&member),
    }))
}

pub async fn moderator_login(
    State(state): State<AppState>,
    Json(req): Json<ModeratorLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let username = req.username.clone();
    let moderator = run_blocking(move || db.get_moderator_by_username(&username))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    verify_password(&req.password, &moderator.password)?;

    let moderator_id: Uuid = moderator
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt moderator id: {}", e)))?;
    let role = if moderator.is_super { Role::Super } else { Role::Moderator };
    let token = create_token(&state.jwt_secret, moderator_id, role)?;

    Ok(Json(ModeratorLoginResponse {
        token,
        moderator: ModeratorSummary {
            id: moderator_id,
            username: moderator.username,
            is_super: moderator.is_super,
        },
    }))
}

/// Member tokens last 30 days, moderator tokens 7.
fn create_token(secret: &str, sub: Uuid, role: Role) -> Result<String, ApiError> {
    let ttl = match role {
        Role::Member => chrono::Duration::days(30),
        Role::Moderator | Role::Super => chrono::Duration::days(7),
    };
    let claims = Claims {
        sub,
        role,
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encode failed: {}", e)))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<(), ApiError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt password hash: {}", e)))?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthenticated)
}

fn member_summary(member: &MemberRow) -> MemberSummary {
    MemberSummary {
        id: member.id.parse().unwrap_or_default(),
        email: member.email.clone(),
        full_name: member.full_name.clone(),
        faculty: member.faculty.clone(),
        degree: member.degree.clone(),
        course: member.course.clone(),
        avatar: member.avatar.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quad_db::Database;
    use quad_gateway::dispatcher::Dispatcher;
    use std::sync::Arc;

    use crate::state::AppStateInner;

    fn make_state() -> AppState {
        Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            dispatcher: Dispatcher::new(),
            jwt_secret: "test-secret".to_string(),
            email_domain: "uni.edu".to_string(),
        })
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            phone: format!("+994-{}", email),
            full_name: "Test Student".to_string(),
            faculty: "physics".to_string(),
            degree: "bachelor".to_string(),
            course: "2".to_string(),
            password: "longenough".to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login() {
        let state = make_state();

        register(State(state.clone()), Json(register_request("a@uni.edu")))
            .await
            .expect("register should succeed");

        let login_result = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "a@uni.edu".to_string(),
                password: "longenough".to_string(),
            }),
        )
        .await;
        assert!(login_result.is_ok());

        let bad_password = login(
            State(state),
            Json(LoginRequest {
                email: "a@uni.edu".to_string(),
                password: "wrong-password".to_string(),
            }),
        )
        .await;
        assert!(matches!(bad_password, Err(ApiError::Unauthenticated)));
    }

    #[tokio::test]
    async fn foreign_email_domain_is_rejected() {
        let state = make_state();
        let result = register(State(state), Json(register_request("a@gmail.com"))).await;
        assert!(matches!(result, Err(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let state = make_state();
        register(State(state.clone()), Json(register_request("a@uni.edu")))
            .await
            .expect("first registration");

        let again = register(State(state), Json(register_request("a@uni.edu"))).await;
        assert!(matches!(again, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    async fn deactivated_member_cannot_log_in() {
        let state = make_state();
        register(State(state.clone()), Json(register_request("a@uni.edu")))
            .await
            .expect("register should succeed");

        let member = state.db.get_member_by_email("a@uni.edu").unwrap().unwrap();
        state.db.toggle_member_active(&member.id).unwrap();

        let result = login(
            State(state),
            Json(LoginRequest {
                email: "a@uni.edu".to_string(),
                password: "longenough".to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(ApiError::Inactive)));
    }

    #[tokio::test]
    async fn moderator_login_carries_role() {
        let state = make_state();
        let hash = hash_password("rootsecret").unwrap();
        state
            .db
            .ensure_super_moderator(&Uuid::new_v4().to_string(), "root", &hash, "2026-01-01T00:00:00.000Z")
            .unwrap();

        let result = moderator_login(
            State(state),
            Json(ModeratorLoginRequest {
                username: "root".to_string(),
                password: "rootsecret".to_string(),
            }),
        )
        .await;
        assert!(result.is_ok());
    }
}
