//! Saved-video collection endpoints
//!
//! All routes are scoped by `uid`; the store handles shard placement.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::jjim::{
    FolderDeletion, JjimCollection, NewJjimLink, NewJjimVideo, VideoUpdate,
};
use crate::models::{JjimFolder, JjimVideo};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct RemoveVideoRequest {
    pub video_id: String,
    #[serde(default)]
    pub folder_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RemovedResponse {
    pub removed: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}

/// GET /api/jjim/:uid
pub async fn get_collection(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<Json<JjimCollection>> {
    Ok(Json(state.jjim.load_all(&uid).await?))
}

/// POST /api/jjim/:uid/videos
pub async fn add_video(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(new): Json<NewJjimVideo>,
) -> ApiResult<(StatusCode, Json<JjimVideo>)> {
    let saved = state.jjim.add_to_jjim(&uid, new).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// POST /api/jjim/:uid/links
pub async fn add_link(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(link): Json<NewJjimLink>,
) -> ApiResult<(StatusCode, Json<JjimVideo>)> {
    let saved = state.jjim.add_link_directly(&uid, link).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// PATCH /api/jjim/:uid/videos/:entry_id
pub async fn update_video(
    State(state): State<AppState>,
    Path((uid, entry_id)): Path<(String, String)>,
    Json(update): Json<VideoUpdate>,
) -> ApiResult<Json<JjimVideo>> {
    Ok(Json(state.jjim.update_video(&uid, &entry_id, update).await?))
}

/// DELETE /api/jjim/:uid/videos/:entry_id
pub async fn delete_video(
    State(state): State<AppState>,
    Path((uid, entry_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    if state.jjim.delete_video(&uid, &entry_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Saved video {}", entry_id)))
    }
}

/// POST /api/jjim/:uid/remove
///
/// Removes by YouTube video id within one folder (root when omitted).
pub async fn remove_video(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(request): Json<RemoveVideoRequest>,
) -> ApiResult<Json<RemovedResponse>> {
    let removed = state
        .jjim
        .remove_from_jjim(&uid, &request.video_id, request.folder_id.as_deref())
        .await?;
    Ok(Json(RemovedResponse { removed }))
}

/// POST /api/jjim/:uid/folders
pub async fn create_folder(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Json(request): Json<CreateFolderRequest>,
) -> ApiResult<(StatusCode, Json<JjimFolder>)> {
    let folder = state
        .jjim
        .create_folder(&uid, &request.name, request.parent_id)
        .await?;
    Ok((StatusCode::CREATED, Json(folder)))
}

/// PATCH /api/jjim/:uid/folders/:folder_id
pub async fn rename_folder(
    State(state): State<AppState>,
    Path((uid, folder_id)): Path<(String, String)>,
    Json(request): Json<RenameFolderRequest>,
) -> ApiResult<Json<JjimFolder>> {
    Ok(Json(
        state
            .jjim
            .rename_folder(&uid, &folder_id, &request.name)
            .await?,
    ))
}

/// DELETE /api/jjim/:uid/folders/:folder_id
///
/// Removes the folder, its subfolders and every video filed under them.
pub async fn delete_folder(
    State(state): State<AppState>,
    Path((uid, folder_id)): Path<(String, String)>,
) -> ApiResult<Json<FolderDeletion>> {
    Ok(Json(state.jjim.delete_folder(&uid, &folder_id).await?))
}

/// DELETE /api/jjim/:uid
pub async fn clear_collection(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> ApiResult<StatusCode> {
    state.jjim.clear(&uid).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn jjim_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jjim/:uid", get(get_collection).delete(clear_collection))
        .route("/api/jjim/:uid/videos", post(add_video))
        .route(
            "/api/jjim/:uid/videos/:entry_id",
            patch(update_video).delete(delete_video),
        )
        .route("/api/jjim/:uid/links", post(add_link))
        .route("/api/jjim/:uid/remove", post(remove_video))
        .route("/api/jjim/:uid/folders", post(create_folder))
        .route(
            "/api/jjim/:uid/folders/:folder_id",
            patch(rename_folder).delete(delete_folder),
        )
}
