use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use quad_db::models::{MemberRow, ModeratorRow};
use quad_types::api::{Claims, Role};

use crate::error::{ApiError, run_blocking};
use crate::state::AppState;

/// The member resolved once at the boundary. Handlers downstream of
/// `require_member` never re-inspect the token.
#[derive(Clone)]
pub struct CurrentMember(pub MemberRow);

#[derive(Clone)]
pub struct CurrentModerator(pub ModeratorRow);

fn claims_from(state: &AppState, req: &Request) -> Result<Claims, ApiError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthenticated)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthenticated)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthenticated)?;

    Ok(token_data.claims)
}

/// Member routes: valid member token, existing row, active flag set.
pub async fn require_member(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from(&state, &req)?;
    if claims.role != Role::Member {
        return Err(ApiError::Forbidden);
    }

    let db = state.db.clone();
    let id = claims.sub.to_string();
    let member = run_blocking(move || db.get_member_by_id(&id))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    if !member.is_active {
        return Err(ApiError::Inactive);
    }

    req.extensions_mut().insert(CurrentMember(member));
    Ok(next.run(req).await)
}

/// Admin routes: any moderator. Super-only handlers additionally check
/// the is_super flag on the resolved row.
pub async fn require_moderator(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = claims_from(&state, &req)?;
    if claims.role == Role::Member {
        return Err(ApiError::Forbidden);
    }

    let db = state.db.clone();
    let id = claims.sub.to_string();
    let moderator = run_blocking(move || db.get_moderator_by_id(&id))
        .await?
        .ok_or(ApiError::Unauthenticated)?;

    req.extensions_mut().insert(CurrentModerator(moderator));
    Ok(next.run(req).await)
}
