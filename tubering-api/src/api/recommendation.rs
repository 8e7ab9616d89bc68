//! Recommendation and keyword endpoints

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::db::recommend_keywords::{self, KeywordCount};
use crate::db::recommendation_requests;
use crate::models::RecommendationRequest;
use crate::services::{random_keywords, run_recommendation_request, RecommendationError};
use crate::{ApiError, ApiResult, AppState};

const DEFAULT_RANDOM_KEYWORDS: usize = 5;
const MAX_RANDOM_KEYWORDS: usize = 20;
const DEFAULT_TOP_KEYWORDS: i64 = 10;
const MAX_TOP_KEYWORDS: i64 = 50;

/// POST /api/recommendations request
#[derive(Debug, Deserialize)]
pub struct CreateRecommendationRequest {
    pub subject: String,
    pub grade: String,
    #[serde(default)]
    pub intention: String,
    #[serde(default)]
    pub uid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RandomKeywordsQuery {
    pub subject: String,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TopKeywordsQuery {
    pub subject: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TopKeywordsResponse {
    pub subject: String,
    pub keywords: Vec<KeywordCount>,
}

#[derive(Debug, Serialize)]
pub struct RandomKeywordsResponse {
    pub subject: String,
    pub keywords: Vec<String>,
}

/// POST /api/recommendations
///
/// Runs keyword generation and the YouTube fan-out before answering. The
/// request row records the outcome either way.
pub async fn create_recommendation(
    State(state): State<AppState>,
    Json(request): Json<CreateRecommendationRequest>,
) -> ApiResult<Json<RecommendationRequest>> {
    let subject = request.subject.trim().to_string();
    let grade = request.grade.trim().to_string();
    if subject.is_empty() || grade.is_empty() {
        return Err(ApiError::BadRequest(
            "subject and grade are required".to_string(),
        ));
    }

    let recommendation = RecommendationRequest::new(
        request.uid.filter(|u| !u.trim().is_empty()),
        subject,
        grade,
        request.intention.trim().to_string(),
    );
    recommendation_requests::save_request(&state.db, &recommendation).await?;

    info!(
        request_id = %recommendation.id,
        subject = %recommendation.subject,
        grade = %recommendation.grade,
        "Recommendation request created"
    );

    let ctx = state.service_context();
    if let Err(e) = run_recommendation_request(&ctx, &recommendation).await {
        state
            .record_error(format!("recommendation {}: {}", recommendation.id, e))
            .await;
        return Err(match e {
            RecommendationError::Storage(msg) => ApiError::Internal(msg),
            other => ApiError::Upstream(other.to_string()),
        });
    }

    recommendation_requests::load_request(&state.db, recommendation.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Internal(format!("Recommendation {} vanished", recommendation.id)))
}

/// GET /api/recommendations/:id
pub async fn get_recommendation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<RecommendationRequest>> {
    recommendation_requests::load_request(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Recommendation request {}", id)))
}

/// GET /api/keywords/random?subject=과학&count=5
///
/// Samples previously generated keywords, favouring frequent ones.
pub async fn get_random_keywords(
    State(state): State<AppState>,
    Query(query): Query<RandomKeywordsQuery>,
) -> ApiResult<Json<RandomKeywordsResponse>> {
    let subject = query.subject.trim().to_string();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject is required".to_string()));
    }

    let count = query
        .count
        .unwrap_or(DEFAULT_RANDOM_KEYWORDS)
        .clamp(1, MAX_RANDOM_KEYWORDS);
    let keywords = random_keywords(&state.db, &subject, count).await?;

    Ok(Json(RandomKeywordsResponse { subject, keywords }))
}

/// GET /api/keywords/top?subject=과학&limit=10
pub async fn get_top_keywords(
    State(state): State<AppState>,
    Query(query): Query<TopKeywordsQuery>,
) -> ApiResult<Json<TopKeywordsResponse>> {
    let subject = query.subject.trim().to_string();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject is required".to_string()));
    }

    let limit = query
        .limit
        .unwrap_or(DEFAULT_TOP_KEYWORDS)
        .clamp(1, MAX_TOP_KEYWORDS);
    let keywords = recommend_keywords::top_keywords(&state.db, &subject, limit).await?;

    Ok(Json(TopKeywordsResponse { subject, keywords }))
}

/// Build recommendation routes
pub fn recommendation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/recommendations", post(create_recommendation))
        .route("/api/recommendations/:id", get(get_recommendation))
        .route("/api/keywords/random", get(get_random_keywords))
        .route("/api/keywords/top", get(get_top_keywords))
}
