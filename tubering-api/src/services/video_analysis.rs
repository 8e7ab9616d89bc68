//! Video safety analysis
//!
//! Videos up to one window long get a single whole-video request
//! ([`quick_analysis`]). Longer videos are split into fixed 600-second
//! windows analyzed in parallel ([`analyze_long_video`]); the merged
//! warnings are then summarized by one more request.
//!
//! A window whose request or parse fails contributes nothing. The result
//! records it in `failed_chunks` and is marked `partial`.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{error, info, warn};
use tubering_common::events::TuberingEvent;
use tubering_common::timestamp::{clamp_to_window, format_timestamp, parse_timestamp};
use uuid::Uuid;

use super::gemini_client::{GeminiError, GenerationRequest, GenerativeModel, VideoClip};
use super::json_extract::parse_llm_json;
use super::prompts;
use super::youtube_client::YouTubeError;
use super::youtube_url::watch_url;
use super::ServiceContext;
use crate::db::{analysis_requests, users};
use crate::models::{AnalysisRequest, Chapter, FlowMarker, Severity, VideoAnalysis, Warning};

/// Analysis window length in seconds
pub const CHUNK_SECONDS: u32 = 600;

/// Score used when the summary request fails
pub const FALLBACK_SAFETY_SCORE: u8 = 70;

/// Summary used when the summary request fails
pub const FALLBACK_SUMMARY: &str =
    "전체 요약을 생성하지 못했습니다. 구간별 경고 목록을 직접 확인해 주세요.";

const DEFAULT_TAG: &str = "기타";

/// Analysis errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Gemini error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("YouTube error: {0}")]
    YouTube(#[from] YouTubeError),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// One `[start, end)` analysis window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub index: u32,
    pub start: u32,
    pub end: u32,
}

/// Split `duration_seconds` into consecutive windows of `chunk_seconds`
///
/// The last window is shortened to end at the video's end. A zero duration
/// yields no windows.
pub fn chunk_windows(duration_seconds: u32, chunk_seconds: u32) -> Vec<ChunkWindow> {
    if duration_seconds == 0 || chunk_seconds == 0 {
        return Vec::new();
    }

    (0..duration_seconds)
        .step_by(chunk_seconds as usize)
        .enumerate()
        .map(|(i, start)| ChunkWindow {
            index: i as u32,
            start,
            end: start.saturating_add(chunk_seconds).min(duration_seconds),
        })
        .collect()
}

/// What the analyzer needs to know about a video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub video_id: String,
    pub title: Option<String>,
    /// 0 when unknown
    pub duration_seconds: u32,
}

impl VideoInfo {
    fn url(&self) -> String {
        watch_url(&self.video_id)
    }

    fn uses_single_window(&self) -> bool {
        self.duration_seconds <= CHUNK_SECONDS
    }
}

/// Receives per-window completion during long analyses
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn chunk_completed(&self, chunks_done: u32, chunks_total: u32, succeeded: bool);
}

/// Progress sink that discards updates
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn chunk_completed(&self, _chunks_done: u32, _chunks_total: u32, _succeeded: bool) {}
}

// Raw model output. Field names follow the prompts; aliases cover the
// camelCase and shorthand variants models drift into.

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawNumber {
    fn as_seconds(&self) -> Option<u32> {
        match self {
            RawNumber::Int(n) => u32::try_from(*n).ok(),
            RawNumber::Float(f) if f.is_finite() && *f >= 0.0 => Some(*f as u32),
            RawNumber::Float(_) => None,
            RawNumber::Text(s) => parse_timestamp(s),
        }
    }

    fn as_score(&self) -> Option<u8> {
        let value = match self {
            RawNumber::Int(n) => *n as f64,
            RawNumber::Float(f) => *f,
            RawNumber::Text(s) => s.trim().trim_end_matches('점').trim().parse().ok()?,
        };
        value
            .is_finite()
            .then(|| value.round().clamp(0.0, 100.0) as u8)
    }
}

#[derive(Debug, Deserialize)]
struct RawWarning {
    #[serde(alias = "startTime", alias = "start")]
    start_time: Option<RawNumber>,
    #[serde(alias = "endTime", alias = "end")]
    end_time: Option<RawNumber>,
    #[serde(default, alias = "category", alias = "type")]
    tag: String,
    #[serde(default, alias = "level")]
    severity: String,
    #[serde(default, alias = "reason")]
    description: String,
}

#[derive(Debug, Deserialize)]
struct RawMarker {
    #[serde(alias = "timestamp", alias = "start_time", alias = "startTime", alias = "start")]
    time: Option<RawNumber>,
    #[serde(default, alias = "topic", alias = "title")]
    label: String,
}

#[derive(Debug, Deserialize)]
struct RawChunkResponse {
    #[serde(default)]
    warnings: Vec<RawWarning>,
    #[serde(default)]
    flow: Vec<RawMarker>,
}

#[derive(Debug, Deserialize)]
struct RawQuickResponse {
    #[serde(default)]
    summary: String,
    #[serde(alias = "safetyScore", alias = "score")]
    safety_score: Option<RawNumber>,
    #[serde(default)]
    warnings: Vec<RawWarning>,
    #[serde(default)]
    chapters: Vec<RawMarker>,
    #[serde(default)]
    flow: Vec<RawMarker>,
}

#[derive(Debug, Deserialize)]
struct RawSummaryResponse {
    #[serde(default)]
    summary: String,
    #[serde(alias = "safetyScore", alias = "score")]
    safety_score: Option<RawNumber>,
}

/// Findings of one window, timestamps already inside the window
#[derive(Debug, Default)]
struct ChunkFindings {
    warnings: Vec<Warning>,
    flow: Vec<FlowMarker>,
}

fn normalize_warnings(raw: Vec<RawWarning>, start: u32, end: u32) -> Vec<Warning> {
    raw.into_iter()
        .filter(|w| !(w.tag.trim().is_empty() && w.description.trim().is_empty()))
        .map(|w| {
            let from = w
                .start_time
                .as_ref()
                .and_then(RawNumber::as_seconds)
                .map_or(start, |t| clamp_to_window(t, start, end));
            let to = w
                .end_time
                .as_ref()
                .and_then(RawNumber::as_seconds)
                .map_or(from, |t| clamp_to_window(t, start, end));
            let tag = match w.tag.trim() {
                "" => DEFAULT_TAG,
                tag => tag,
            };
            Warning::new(
                from,
                to,
                tag,
                Severity::normalize(&w.severity),
                w.description.trim(),
            )
        })
        .collect()
}

fn normalize_markers(raw: Vec<RawMarker>, start: u32, end: u32) -> Vec<(u32, String)> {
    raw.into_iter()
        .filter_map(|m| {
            let t = m.time.as_ref().and_then(RawNumber::as_seconds)?;
            let label = m.label.trim();
            (!label.is_empty()).then(|| (clamp_to_window(t, start, end), label.to_string()))
        })
        .collect()
}

/// Sort by start time and fold repeats (same start, tag and description)
///
/// A folded warning keeps the highest severity and the latest end seen.
fn merge_warnings(mut warnings: Vec<Warning>) -> Vec<Warning> {
    warnings.sort_by_key(|w| (w.start_seconds, w.end_seconds));

    let mut merged: Vec<Warning> = Vec::with_capacity(warnings.len());
    let mut positions: HashMap<(u32, String, String), usize> = HashMap::new();
    for warning in warnings {
        let key = (
            warning.start_seconds,
            warning.tag.clone(),
            warning.description.clone(),
        );
        match positions.get(&key) {
            Some(&i) => {
                let kept = &mut merged[i];
                kept.severity = kept.severity.max(warning.severity);
                if warning.end_seconds > kept.end_seconds {
                    kept.end_seconds = warning.end_seconds;
                    kept.end_time = format_timestamp(warning.end_seconds);
                }
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(warning);
            }
        }
    }

    merged.sort_by_key(|w| (w.start_seconds, w.end_seconds));
    merged
}

fn merge_flow(mut flow: Vec<FlowMarker>) -> Vec<FlowMarker> {
    flow.sort_by_key(|f| f.seconds);
    let mut seen = HashSet::new();
    flow.retain(|f| seen.insert((f.seconds, f.topic.clone())));
    flow
}

async fn analyze_chunk(
    model: &dyn GenerativeModel,
    video: &VideoInfo,
    grade: &str,
    window: ChunkWindow,
) -> Result<ChunkFindings, GeminiError> {
    let request = GenerationRequest::with_video(
        prompts::chunk_analysis_prompt(grade, window.start, window.end),
        VideoClip::window(video.url(), window.start, window.end),
    );

    let raw = model.generate_json(&request).await?;
    let parsed: RawChunkResponse = parse_llm_json(&raw)?;

    Ok(ChunkFindings {
        warnings: normalize_warnings(parsed.warnings, window.start, window.end),
        flow: normalize_markers(parsed.flow, window.start, window.end)
            .into_iter()
            .map(|(t, topic)| FlowMarker::new(t, topic))
            .collect(),
    })
}

async fn summarize(
    model: &dyn GenerativeModel,
    video: &VideoInfo,
    grade: &str,
    warnings: &[Warning],
    flow: &[FlowMarker],
) -> Result<(String, u8), GeminiError> {
    let prompt = prompts::summary_prompt(
        grade,
        video.title.as_deref(),
        video.duration_seconds,
        warnings,
        flow,
    );

    let raw = model.generate_json(&GenerationRequest::text(prompt)).await?;
    let parsed: RawSummaryResponse = parse_llm_json(&raw)?;

    let score = parsed
        .safety_score
        .as_ref()
        .and_then(RawNumber::as_score)
        .ok_or_else(|| GeminiError::Parse("summary response has no safety_score".to_string()))?;

    let summary = match parsed.summary.trim() {
        "" => FALLBACK_SUMMARY.to_string(),
        s => s.to_string(),
    };

    Ok((summary, score))
}

/// Analyze a video that fits in one window with a single request
pub async fn quick_analysis(
    model: &dyn GenerativeModel,
    video: &VideoInfo,
    grade: &str,
) -> Result<VideoAnalysis, AnalysisError> {
    let request = GenerationRequest::with_video(
        prompts::quick_analysis_prompt(grade, video.title.as_deref()),
        VideoClip::whole(video.url()),
    );

    let raw = model.generate_json(&request).await?;
    let parsed: RawQuickResponse = parse_llm_json(&raw)?;

    let end = match video.duration_seconds {
        0 => u32::MAX,
        d => d,
    };

    let score = parsed.safety_score.as_ref().and_then(RawNumber::as_score);
    let summary = parsed.summary.trim().to_string();
    let partial = score.is_none() || summary.is_empty();
    if partial {
        warn!(video_id = %video.video_id, "Quick analysis response incomplete; using fallbacks");
    }

    let flow = normalize_markers(parsed.flow, 0, end)
        .into_iter()
        .map(|(t, topic)| FlowMarker::new(t, topic))
        .collect();
    let mut chapters: Vec<Chapter> = normalize_markers(parsed.chapters, 0, end)
        .into_iter()
        .map(|(t, title)| Chapter::new(t, title))
        .collect();
    chapters.sort_by_key(|c| c.seconds);

    Ok(VideoAnalysis {
        video_id: video.video_id.clone(),
        title: video.title.clone(),
        duration_seconds: video.duration_seconds,
        grade: grade.to_string(),
        summary: if summary.is_empty() {
            FALLBACK_SUMMARY.to_string()
        } else {
            summary
        },
        safety_score: score.unwrap_or(FALLBACK_SAFETY_SCORE),
        warnings: merge_warnings(normalize_warnings(parsed.warnings, 0, end)),
        chapters,
        flow: merge_flow(flow),
        chunk_count: 1,
        failed_chunks: Vec::new(),
        partial,
        analyzed_at: chrono::Utc::now(),
    })
}

/// Analyze a long video window by window
///
/// Never fails: failed windows are listed in `failed_chunks`, and a failed
/// summary request falls back to [`FALLBACK_SAFETY_SCORE`].
pub async fn analyze_long_video(
    model: &dyn GenerativeModel,
    video: &VideoInfo,
    grade: &str,
    progress: &dyn ProgressSink,
) -> VideoAnalysis {
    let windows = chunk_windows(video.duration_seconds, CHUNK_SECONDS);
    let chunks_total = windows.len() as u32;

    info!(
        video_id = %video.video_id,
        duration = video.duration_seconds,
        chunks = chunks_total,
        "Starting chunked analysis"
    );

    let mut pending: FuturesUnordered<_> = windows
        .iter()
        .map(|&window| async move { (window, analyze_chunk(model, video, grade, window).await) })
        .collect();

    let mut warnings = Vec::new();
    let mut flow = Vec::new();
    let mut failed_chunks = Vec::new();
    let mut chunks_done = 0;

    while let Some((window, result)) = pending.next().await {
        chunks_done += 1;
        let succeeded = match result {
            Ok(findings) => {
                warnings.extend(findings.warnings);
                flow.extend(findings.flow);
                true
            }
            Err(e) => {
                warn!(
                    video_id = %video.video_id,
                    chunk = window.index,
                    start = window.start,
                    end = window.end,
                    error = %e,
                    "Chunk analysis failed, continuing without it"
                );
                failed_chunks.push(window.index);
                false
            }
        };
        progress
            .chunk_completed(chunks_done, chunks_total, succeeded)
            .await;
    }
    failed_chunks.sort_unstable();

    let warnings = merge_warnings(warnings);
    let flow = merge_flow(flow);

    let (summary, safety_score, summary_failed) =
        match summarize(model, video, grade, &warnings, &flow).await {
            Ok((summary, score)) => (summary, score, false),
            Err(e) => {
                warn!(video_id = %video.video_id, error = %e, "Summary request failed, using fallback score");
                (FALLBACK_SUMMARY.to_string(), FALLBACK_SAFETY_SCORE, true)
            }
        };

    let chapters = flow
        .iter()
        .map(|f| Chapter::new(f.seconds, f.topic.clone()))
        .collect();

    VideoAnalysis {
        video_id: video.video_id.clone(),
        title: video.title.clone(),
        duration_seconds: video.duration_seconds,
        grade: grade.to_string(),
        summary,
        safety_score,
        warnings,
        chapters,
        flow,
        chunk_count: chunks_total,
        partial: !failed_chunks.is_empty() || summary_failed,
        failed_chunks,
        analyzed_at: chrono::Utc::now(),
    }
}

/// Pick quick or chunked analysis by duration
pub async fn analyze_video(
    model: &dyn GenerativeModel,
    video: &VideoInfo,
    grade: &str,
    progress: &dyn ProgressSink,
) -> Result<VideoAnalysis, AnalysisError> {
    if video.uses_single_window() {
        let analysis = quick_analysis(model, video, grade).await?;
        progress.chunk_completed(1, 1, true).await;
        Ok(analysis)
    } else {
        Ok(analyze_long_video(model, video, grade, progress).await)
    }
}

/// Persists chunk progress and forwards it to the event bus
struct RequestProgress<'a> {
    ctx: &'a ServiceContext,
    request_id: Uuid,
}

#[async_trait]
impl<'a> ProgressSink for RequestProgress<'a> {
    async fn chunk_completed(&self, chunks_done: u32, chunks_total: u32, succeeded: bool) {
        if let Err(e) =
            analysis_requests::update_progress(&self.ctx.db, self.request_id, chunks_done).await
        {
            warn!(request_id = %self.request_id, error = %e, "Failed to record chunk progress");
        }

        self.ctx
            .event_bus
            .emit_lossy(TuberingEvent::AnalysisChunkCompleted {
                request_id: self.request_id,
                chunks_done,
                chunks_total,
                succeeded,
                timestamp: chrono::Utc::now(),
            });
    }
}

/// Run a stored request: pending → processing → completed | error
///
/// The outcome is persisted on the request row and broadcast; the returned
/// value mirrors it for callers that wait.
pub async fn run_analysis_request(
    ctx: &ServiceContext,
    request: &AnalysisRequest,
) -> Result<VideoAnalysis, AnalysisError> {
    let result = execute_request(ctx, request).await;

    match &result {
        Ok(analysis) => {
            info!(
                request_id = %request.id,
                video_id = %request.video_id,
                safety_score = analysis.safety_score,
                warnings = analysis.warnings.len(),
                partial = analysis.partial,
                "Analysis completed"
            );

            if let Some(uid) = &request.uid {
                if let Err(e) = users::increment_analysis_count(&ctx.db, uid).await {
                    warn!(uid = %uid, error = %e, "Failed to increment analysis count");
                }
            }

            ctx.event_bus.emit_lossy(TuberingEvent::AnalysisCompleted {
                request_id: request.id,
                safety_score: analysis.safety_score,
                warning_count: analysis.warnings.len(),
                timestamp: chrono::Utc::now(),
            });
        }
        Err(e) => {
            error!(request_id = %request.id, error = %e, "Analysis failed");

            if let Err(db_err) = analysis_requests::fail_request(&ctx.db, request.id, &e.to_string()).await {
                error!(request_id = %request.id, error = %db_err, "Failed to record analysis failure");
            }

            ctx.event_bus.emit_lossy(TuberingEvent::AnalysisFailed {
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
    request: &AnalysisRequest,
) -> Result<VideoAnalysis, AnalysisError> {
    let video = match ctx.catalog.video(&request.video_id).await {
        Ok(details) => VideoInfo {
            video_id: request.video_id.clone(),
            title: Some(details.title),
            duration_seconds: details.duration_seconds,
        },
        Err(YouTubeError::NotFound(_)) => {
            return Err(AnalysisError::VideoNotFound(request.video_id.clone()))
        }
        Err(e) => {
            warn!(video_id = %request.video_id, error = %e, "Video lookup failed, analyzing without duration");
            VideoInfo {
                video_id: request.video_id.clone(),
                title: None,
                duration_seconds: 0,
            }
        }
    };

    let chunks_total = if video.uses_single_window() {
        1
    } else {
        chunk_windows(video.duration_seconds, CHUNK_SECONDS).len() as u32
    };

    analysis_requests::mark_processing(&ctx.db, request.id, chunks_total)
        .await
        .map_err(|e| AnalysisError::Storage(e.to_string()))?;

    ctx.event_bus.emit_lossy(TuberingEvent::AnalysisStarted {
        request_id: request.id,
        video_id: request.video_id.clone(),
        chunks_total,
        timestamp: chrono::Utc::now(),
    });

    let progress = RequestProgress {
        ctx,
        request_id: request.id,
    };
    let analysis = analyze_video(ctx.model.as_ref(), &video, &request.grade, &progress).await?;

    analysis_requests::complete_request(&ctx.db, request.id, &analysis)
        .await
        .map_err(|e| AnalysisError::Storage(e.to_string()))?;

    Ok(analysis)
}
