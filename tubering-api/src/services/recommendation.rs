//! Educational video recommendation
//!
//! Gemini proposes search keywords for a subject/grade/intention; each
//! keyword is searched in parallel, results are deduplicated, filtered by
//! length and ranked by view count.

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{error, info, warn};
use tubering_common::events::TuberingEvent;

use super::gemini_client::{GeminiError, GenerationRequest, GenerativeModel};
use super::json_extract::parse_llm_json;
use super::prompts;
use super::youtube_client::{VideoCatalog, YouTubeError};
use super::youtube_url::watch_url;
use super::ServiceContext;
use crate::db::recommend_keywords::{self, KeywordCount};
use crate::db::{recommendation_requests, users};
use crate::models::{RecommendationRequest, RecommendedVideo};

/// Keywords requested from the model
pub const KEYWORD_COUNT: usize = 5;

/// Search results fetched per keyword
pub const RESULTS_PER_KEYWORD: u32 = 10;

/// Longest video recommended (60 minutes)
pub const MAX_DURATION_SECONDS: u32 = 60 * 60;

/// Recommendations kept after ranking
pub const MAX_RECOMMENDATIONS: usize = 20;

/// Recommendation errors
#[derive(Debug, Error)]
pub enum RecommendationError {
    #[error("YouTube error: {0}")]
    YouTube(#[from] YouTubeError),

    #[error("No search keywords available")]
    NoKeywords,

    #[error("Storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawKeywords {
    Object { keywords: Vec<String> },
    List(Vec<String>),
}

/// Ask the model for search keywords
///
/// Blank and repeated keywords are dropped; at most `count` are returned.
pub async fn generate_keywords(
    model: &dyn GenerativeModel,
    subject: &str,
    grade: &str,
    intention: &str,
    count: usize,
) -> Result<Vec<String>, GeminiError> {
    let prompt = prompts::keyword_prompt(subject, grade, intention, count);
    let raw = model.generate_json(&GenerationRequest::text(prompt)).await?;

    let keywords = match parse_llm_json::<RawKeywords>(&raw)? {
        RawKeywords::Object { keywords } | RawKeywords::List(keywords) => keywords,
    };

    let mut seen = HashSet::new();
    Ok(keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .take(count)
        .collect())
}

/// Keywords used when the model is unavailable
fn fallback_keywords(subject: &str, grade: &str, intention: &str) -> Vec<String> {
    let mut keywords = vec![format!("{} {}", grade, subject).trim().to_string()];
    if !intention.trim().is_empty() {
        keywords.push(format!("{} {}", subject, intention.trim()));
    }
    keywords.retain(|k| !k.is_empty());
    keywords
}

/// Search every keyword, then filter and rank the combined results
///
/// A failing keyword search is skipped; only when every search fails is the
/// first error returned.
pub async fn recommend_videos(
    catalog: &dyn VideoCatalog,
    keywords: &[String],
    max_duration_seconds: u32,
) -> Result<Vec<RecommendedVideo>, RecommendationError> {
    if keywords.is_empty() {
        return Err(RecommendationError::NoKeywords);
    }

    let searches = join_all(
        keywords
            .iter()
            .map(|keyword| async move { (keyword, catalog.search(keyword, RESULTS_PER_KEYWORD).await) }),
    )
    .await;

    let mut first_error = None;
    let mut succeeded = 0;
    let mut seen = HashSet::new();
    let mut candidates: Vec<(String, String)> = Vec::new(); // (video_id, keyword)

    for (keyword, result) in searches {
        match result {
            Ok(hits) => {
                succeeded += 1;
                for hit in hits {
                    if seen.insert(hit.video_id.clone()) {
                        candidates.push((hit.video_id, keyword.clone()));
                    }
                }
            }
            Err(e) => {
                warn!(keyword = %keyword, error = %e, "Keyword search failed");
                first_error.get_or_insert(e);
            }
        }
    }

    if succeeded == 0 {
        if let Some(e) = first_error {
            return Err(e.into());
        }
    }

    let ids: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
    let details = catalog.video_details(&ids).await?;

    let mut videos: Vec<RecommendedVideo> = details
        .into_iter()
        .filter(|d| d.duration_seconds > 0 && d.duration_seconds <= max_duration_seconds)
        .filter_map(|d| {
            let keyword = candidates
                .iter()
                .find(|(id, _)| *id == d.video_id)
                .map(|(_, k)| k.clone())?;
            Some(RecommendedVideo {
                url: watch_url(&d.video_id),
                video_id: d.video_id,
                title: d.title,
                channel_title: d.channel_title,
                thumbnail_url: d.thumbnail_url,
                duration_seconds: d.duration_seconds,
                view_count: d.view_count,
                published_at: d.published_at,
                keyword,
            })
        })
        .collect();

    videos.sort_by(|a, b| b.view_count.cmp(&a.view_count));
    videos.truncate(MAX_RECOMMENDATIONS);

    Ok(videos)
}

/// Run a stored request: pending → processing → completed | error
pub async fn run_recommendation_request(
    ctx: &ServiceContext,
    request: &RecommendationRequest,
) -> Result<Vec<RecommendedVideo>, RecommendationError> {
    let result = execute_request(ctx, request).await;

    match &result {
        Ok(videos) => {
            info!(request_id = %request.id, videos = videos.len(), "Recommendation completed");

            if let Some(uid) = &request.uid {
                if let Err(e) = users::increment_recommendation_count(&ctx.db, uid).await {
                    warn!(uid = %uid, error = %e, "Failed to increment recommendation count");
                }
            }

            ctx.event_bus.emit_lossy(TuberingEvent::RecommendationCompleted {
                request_id: request.id,
                video_count: videos.len(),
                timestamp: chrono::Utc::now(),
            });
        }
        Err(e) => {
            error!(request_id = %request.id, error = %e, "Recommendation failed");

            if let Err(db_err) =
                recommendation_requests::fail_request(&ctx.db, request.id, &e.to_string()).await
            {
                error!(request_id = %request.id, error = %db_err, "Failed to record recommendation failure");
            }

            ctx.event_bus.emit_lossy(TuberingEvent::RecommendationFailed {
                request_id: request.id,
                message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    result
}

async fn execute_request(
    ctx: &ServiceContext,
    request: &RecommendationRequest,
) -> Result<Vec<RecommendedVideo>, RecommendationError> {
    recommendation_requests::mark_processing(&ctx.db, request.id)
        .await
        .map_err(|e| RecommendationError::Storage(e.to_string()))?;

    let keywords = match generate_keywords(
        ctx.model.as_ref(),
        &request.subject,
        &request.grade,
        &request.intention,
        KEYWORD_COUNT,
    )
    .await
    {
        Ok(keywords) if !keywords.is_empty() => {
            if let Err(e) =
                recommend_keywords::record_keywords(&ctx.db, &request.subject, &keywords).await
            {
                warn!(error = %e, "Failed to record generated keywords");
            }
            keywords
        }
        Ok(_) => fallback_keywords(&request.subject, &request.grade, &request.intention),
        Err(e) => {
            warn!(error = %e, "Keyword generation failed, using fallback keywords");
            fallback_keywords(&request.subject, &request.grade, &request.intention)
        }
    };

    let videos = recommend_videos(ctx.catalog.as_ref(), &keywords, MAX_DURATION_SECONDS).await?;

    recommendation_requests::complete_request(&ctx.db, request.id, &keywords, &videos)
        .await
        .map_err(|e| RecommendationError::Storage(e.to_string()))?;

    Ok(videos)
}

/// Sample up to `n` distinct stored keywords for a subject, weighted by count
pub async fn random_keywords(pool: &SqlitePool, subject: &str, n: usize) -> anyhow::Result<Vec<String>> {
    let keywords = recommend_keywords::all_keywords(pool, subject).await?;
    Ok(sample_weighted(&keywords, n, &mut rand::thread_rng()))
}

fn sample_weighted<R: Rng + ?Sized>(keywords: &[KeywordCount], n: usize, rng: &mut R) -> Vec<String> {
    keywords
        .choose_multiple_weighted(rng, n.min(keywords.len()), |k| k.count.max(1) as f64)
        .map(|chosen| chosen.map(|k| k.keyword.clone()).collect())
        .unwrap_or_default()
}
