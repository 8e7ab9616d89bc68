//! Video analysis endpoints
//!
//! `POST /api/analysis` validates the input, charges the daily quota and
//! returns immediately; the analysis itself runs in a background task that
//! reports through the request row and the event bus.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use crate::db::{analysis_requests, daily_usage};
use crate::models::{AnalysisRequest, DailyLimitStatus, RequestStatus, UsageSubject};
use crate::services::{run_analysis_request, youtube_url};
use crate::{ApiError, ApiResult, AppState};

/// Default page size for analysis history
const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// POST /api/analysis request
#[derive(Debug, Deserialize)]
pub struct StartAnalysisRequest {
    pub video_url: String,
    pub grade: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub anon_id: Option<String>,
}

/// POST /api/analysis response
#[derive(Debug, Serialize)]
pub struct StartAnalysisResponse {
    pub request_id: Uuid,
    pub video_id: String,
    pub status: RequestStatus,
    /// Quota after this request was counted
    pub usage: DailyLimitStatus,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/analysis
///
/// Rejects malformed URLs and missing identity with 400 and an exhausted
/// daily quota with 429, before any work starts.
pub async fn start_analysis(
    State(state): State<AppState>,
    Json(request): Json<StartAnalysisRequest>,
) -> ApiResult<(StatusCode, Json<StartAnalysisResponse>)> {
    let video_url = request.video_url.trim().to_string();
    let video_id = youtube_url::extract_video_id(&video_url)
        .ok_or_else(|| ApiError::BadRequest(format!("Not a YouTube URL: {}", video_url)))?;

    let grade = request.grade.trim().to_string();
    if grade.is_empty() {
        return Err(ApiError::BadRequest("grade is required".to_string()));
    }

    let subject = UsageSubject::from_ids(request.uid.as_deref(), request.anon_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("uid or anon_id is required".to_string()))?;

    let today = tubering_common::time::today();
    let Some(count) = daily_usage::consume_daily_quota(&state.db, &subject, today).await? else {
        let status = daily_usage::check_daily_limit(&state.db, &subject, today).await?;
        return Err(ApiError::TooManyRequests(format!(
            "{} of {} analyses used today",
            status.count, status.limit
        )));
    };
    let usage = DailyLimitStatus::new(
        count,
        subject.daily_limit(),
        tubering_common::time::date_key(today),
    );

    let analysis_request = AnalysisRequest::new(
        video_url,
        video_id.clone(),
        grade,
        request.uid.filter(|u| !u.trim().is_empty()),
        request.anon_id.filter(|a| !a.trim().is_empty()),
    );
    analysis_requests::save_request(&state.db, &analysis_request).await?;

    info!(
        request_id = %analysis_request.id,
        video_id = %video_id,
        usage = count,
        "Analysis request accepted"
    );

    let response = StartAnalysisResponse {
        request_id: analysis_request.id,
        video_id,
        status: analysis_request.status,
        usage,
    };

    let task_state = state.clone();
    tokio::spawn(async move {
        let ctx = task_state.service_context();
        if let Err(e) = run_analysis_request(&ctx, &analysis_request).await {
            error!(request_id = %analysis_request.id, error = %e, "Background analysis task failed");
            task_state
                .record_error(format!("analysis {}: {}", analysis_request.id, e))
                .await;
        }
    });

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /api/analysis/:id
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AnalysisRequest>> {
    analysis_requests::load_request(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Analysis request {}", id)))
}

/// GET /api/users/:uid/analysis
pub async fn list_user_analyses(
    State(state): State<AppState>,
    Path(uid): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<AnalysisRequest>>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 200);
    let requests = analysis_requests::list_for_user(&state.db, &uid, limit).await?;
    Ok(Json(requests))
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis", post(start_analysis))
        .route("/api/analysis/:id", get(get_analysis))
        .route("/api/users/:uid/analysis", get(list_user_analyses))
}
