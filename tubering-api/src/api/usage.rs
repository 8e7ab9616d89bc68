//! Daily quota endpoint

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::db::daily_usage;
use crate::models::{DailyLimitStatus, UsageSubject};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct UsageQuery {
    pub uid: Option<String>,
    pub anon_id: Option<String>,
}

/// GET /api/usage?uid=… or ?anon_id=…
pub async fn get_usage(
    State(state): State<AppState>,
    Query(query): Query<UsageQuery>,
) -> ApiResult<Json<DailyLimitStatus>> {
    let subject = UsageSubject::from_ids(query.uid.as_deref(), query.anon_id.as_deref())
        .ok_or_else(|| ApiError::BadRequest("uid or anon_id is required".to_string()))?;

    let status =
        daily_usage::check_daily_limit(&state.db, &subject, tubering_common::time::today()).await?;
    Ok(Json(status))
}

pub fn usage_routes() -> Router<AppState> {
    Router::new().route("/api/usage", get(get_usage))
}
