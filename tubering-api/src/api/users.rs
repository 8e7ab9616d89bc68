//! Teacher profile endpoints

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::users::{self, ProfileUpdate};
use crate::models::UserProfile;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct TermsResponse {
    pub accepted: bool,
    pub profile: UserProfile,
}

/// GET /api/users/:uid
pub async fn get_profile(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<UserProfile>> {
    users::load_profile(&state.db, &uid)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User {}", uid)))
}

/// PUT /api/users/:uid
///
/// Creates the profile on first call; later calls change only the fields
/// present in the body.
pub async fn put_profile(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(update): Json<ProfileUpdate>,
) -> ApiResult<Json<UserProfile>> {
    if uid.trim().is_empty() {
        return Err(ApiError::BadRequest("uid is required".to_string()));
    }
    let profile = users::upsert_profile(&state.db, &uid, &update).await?;
    Ok(Json(profile))
}

/// POST /api/users/:uid/terms
pub async fn accept_terms(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<TermsResponse>> {
    if !users::accept_terms(&state.db, &uid).await? {
        return Err(ApiError::NotFound(format!("User {}", uid)));
    }

    let profile = users::load_profile(&state.db, &uid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {}", uid)))?;

    Ok(Json(TermsResponse {
        accepted: true,
        profile,
    }))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:uid", get(get_profile).put(put_profile))
        .route("/api/users/:uid/terms", post(accept_terms))
}
