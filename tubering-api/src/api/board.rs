//! Community board and subject-like endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::like_subjects::{self, SubjectLikes};
use crate::db::shared_videos::{self, BoardFilter, NewSharedVideo};
use crate::models::SharedVideo;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub like_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct SubjectLikeRequest {
    pub uid: String,
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct SubjectLikeResponse {
    pub subject: String,
    pub liked: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubjectLikesQuery {
    pub uid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubjectLikesResponse {
    pub counts: Vec<SubjectLikes>,
    /// Subjects the querying user liked (empty without `uid`)
    pub liked: Vec<String>,
}

/// GET /api/board?subject=&grade=&limit=
pub async fn list_board(
    State(state): State<AppState>,
    Query(filter): Query<BoardFilter>,
) -> ApiResult<Json<Vec<SharedVideo>>> {
    Ok(Json(shared_videos::list_shared(&state.db, &filter).await?))
}

/// POST /api/board
pub async fn share_video(
    State(state): State<AppState>,
    Json(new): Json<NewSharedVideo>,
) -> ApiResult<(StatusCode, Json<SharedVideo>)> {
    if new.video_id.trim().is_empty() || new.title.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "video_id and title are required".to_string(),
        ));
    }
    if new.sharer_uid.trim().is_empty() {
        return Err(ApiError::BadRequest("sharer_uid is required".to_string()));
    }

    let shared = shared_videos::share_video(&state.db, new).await?;
    tracing::info!(id = %shared.id, video_id = %shared.video_id, "Video shared to board");
    Ok((StatusCode::CREATED, Json(shared)))
}

/// GET /api/board/:id
pub async fn get_shared(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SharedVideo>> {
    shared_videos::load_shared(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Shared video {}", id)))
}

/// POST /api/board/:id/like
pub async fn like_shared(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    shared_videos::like_shared(&state.db, id)
        .await?
        .map(|like_count| Json(LikeResponse { like_count }))
        .ok_or_else(|| ApiError::NotFound(format!("Shared video {}", id)))
}

/// DELETE /api/board/:id?uid=
///
/// Only the sharer may delete; anything else looks like a missing entry.
pub async fn delete_shared(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(owner): Query<OwnerQuery>,
) -> ApiResult<StatusCode> {
    if shared_videos::delete_shared(&state.db, id, &owner.uid).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Shared video {}", id)))
    }
}

/// POST /api/subjects/like
///
/// Toggles: a second call from the same user removes the like.
pub async fn toggle_subject_like(
    State(state): State<AppState>,
    Json(request): Json<SubjectLikeRequest>,
) -> ApiResult<Json<SubjectLikeResponse>> {
    let subject = request.subject.trim().to_string();
    if request.uid.trim().is_empty() || subject.is_empty() {
        return Err(ApiError::BadRequest(
            "uid and subject are required".to_string(),
        ));
    }

    let liked = like_subjects::toggle_like(&state.db, &request.uid, &subject).await?;
    Ok(Json(SubjectLikeResponse { subject, liked }))
}

/// GET /api/subjects/likes?uid=
pub async fn subject_likes(
    State(state): State<AppState>,
    Query(query): Query<SubjectLikesQuery>,
) -> ApiResult<Json<SubjectLikesResponse>> {
    let counts = like_subjects::like_counts(&state.db).await?;
    let liked = match query.uid.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(uid) => like_subjects::liked_by(&state.db, uid).await?,
        None => Vec::new(),
    };
    Ok(Json(SubjectLikesResponse { counts, liked }))
}

pub fn board_routes() -> Router<AppState> {
    Router::new()
        .route("/api/board", get(list_board).post(share_video))
        .route("/api/board/:id", get(get_shared).delete(delete_shared))
        .route("/api/board/:id/like", post(like_shared))
        .route("/api/subjects/like", post(toggle_subject_like))
        .route("/api/subjects/likes", get(subject_likes))
}
