//! Chunked analysis behaviour against a scripted model

mod helpers;

use async_trait::async_trait;
use helpers::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tubering_api::db::analysis_requests;
use tubering_api::models::{AnalysisRequest, RequestStatus};
use tubering_api::services::video_analysis::FALLBACK_SUMMARY;
use tubering_api::services::{
    analyze_long_video, run_analysis_request, GeminiError, NoProgress, ProgressSink,
    ServiceContext, VideoInfo, FALLBACK_SAFETY_SCORE,
};
use tubering_common::events::{EventBus, TuberingEvent};

const SUMMARY_RESPONSE: &str = r#"{"summary": "전반적으로 안전합니다.", "safety_score": 85}"#;

/// Chunk responses tag every warning with the window start and deliberately
/// use timestamps outside the window.
fn chunk_response(start: u32) -> String {
    format!(
        r#"{{
            "warnings": [
                {{"start_time": "0:05", "end_time": "0:30", "tag": "w{start}", "severity": "high", "description": "early"}},
                {{"start_time": "{start_plus}", "tag": "w{start}", "severity": "low", "description": "inside"}},
                {{"start_time": "3:00:00", "end_time": "3:10:00", "tag": "w{start}", "severity": "medium", "description": "late"}}
            ],
            "flow": [{{"time": "99:00", "topic": "f{start}"}}]
        }}"#,
        start = start,
        start_plus = tubering_common::timestamp::format_timestamp(start + 42),
    )
}

fn long_video(duration_seconds: u32) -> VideoInfo {
    VideoInfo {
        video_id: "dQw4w9WgXcQ".to_string(),
        title: Some("세포 분열".to_string()),
        duration_seconds,
    }
}

#[derive(Default)]
struct CountingProgress {
    calls: AtomicU32,
    failures: AtomicU32,
}

#[async_trait]
impl ProgressSink for CountingProgress {
    async fn chunk_completed(&self, _done: u32, _total: u32, succeeded: bool) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !succeeded {
            self.failures.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn scripted_long_model() -> ScriptedModel {
    ScriptedModel::new(|request| match window_start(request) {
        Some(start) => Ok(chunk_response(start)),
        None => Ok(SUMMARY_RESPONSE.to_string()),
    })
}

#[tokio::test]
async fn test_every_timestamp_is_clamped_into_its_window() {
    let model = scripted_long_model();
    let analysis = analyze_long_video(&model, &long_video(1_500), "중학교 2학년", &NoProgress).await;

    assert_eq!(analysis.chunk_count, 3);
    assert!(!analysis.partial);
    assert_eq!(analysis.warnings.len(), 9);

    for (start, end) in [(0, 600), (600, 1_200), (1_200, 1_500)] {
        let tag = format!("w{}", start);
        for w in analysis.warnings.iter().filter(|w| w.tag == tag) {
            assert!(start <= w.start_seconds && w.start_seconds < end, "{:?}", w);
            assert!(start <= w.end_seconds && w.end_seconds < end, "{:?}", w);
        }
        let topic = format!("f{}", start);
        let marker = analysis.flow.iter().find(|f| f.topic == topic).unwrap();
        assert!(start <= marker.seconds && marker.seconds < end);
    }
}

#[tokio::test]
async fn test_warnings_sorted_by_start() {
    let model = scripted_long_model();
    let analysis = analyze_long_video(&model, &long_video(1_800), "고등학교 1학년", &NoProgress).await;

    let starts: Vec<u32> = analysis.warnings.iter().map(|w| w.start_seconds).collect();
    let mut sorted = starts.clone();
    sorted.sort_unstable();
    assert_eq!(starts, sorted);
    assert_eq!(analysis.summary, "전반적으로 안전합니다.");
    assert_eq!(analysis.safety_score, 85);
    assert_eq!(analysis.chapters.len(), analysis.flow.len());
}

#[tokio::test]
async fn test_failed_chunk_degrades_to_partial() {
    let model = ScriptedModel::new(|request| match window_start(request) {
        Some(600) => Err(GeminiError::Api(500, "boom".to_string())),
        Some(start) => Ok(chunk_response(start)),
        None => Ok(SUMMARY_RESPONSE.to_string()),
    });
    let progress = CountingProgress::default();

    let analysis = analyze_long_video(&model, &long_video(1_500), "중학교 2학년", &progress).await;

    assert!(analysis.partial);
    assert_eq!(analysis.failed_chunks, vec![1]);
    assert!(!analysis.warnings.iter().any(|w| w.tag == "w600"));
    assert_eq!(analysis.warnings.len(), 6);
    assert_eq!(progress.calls.load(Ordering::SeqCst), 3);
    assert_eq!(progress.failures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unparseable_chunk_counts_as_failed() {
    let model = ScriptedModel::new(|request| match window_start(request) {
        Some(0) => Ok("죄송합니다, 분석할 수 없습니다.".to_string()),
        Some(start) => Ok(chunk_response(start)),
        None => Ok(SUMMARY_RESPONSE.to_string()),
    });

    let analysis = analyze_long_video(&model, &long_video(1_200), "초등 6학년", &NoProgress).await;

    assert_eq!(analysis.failed_chunks, vec![0]);
    assert!(analysis.partial);
}

#[tokio::test]
async fn test_summary_failure_falls_back_to_default_score() {
    let model = ScriptedModel::new(|request| match window_start(request) {
        Some(start) => Ok(chunk_response(start)),
        None => Err(GeminiError::RateLimited),
    });

    let analysis = analyze_long_video(&model, &long_video(1_500), "중학교 2학년", &NoProgress).await;

    assert_eq!(analysis.safety_score, FALLBACK_SAFETY_SCORE);
    assert_eq!(analysis.safety_score, 70);
    assert_eq!(analysis.summary, FALLBACK_SUMMARY);
    assert!(analysis.partial);
    assert!(analysis.failed_chunks.is_empty());
    assert_eq!(analysis.warnings.len(), 9);
}

#[tokio::test]
async fn test_one_request_per_window_plus_summary() {
    let model = scripted_long_model();
    analyze_long_video(&model, &long_video(3_601), "중학교 2학년", &NoProgress).await;

    let calls = model.calls();
    let mut starts: Vec<u32> = calls.iter().filter_map(window_start).collect();
    starts.sort_unstable();
    assert_eq!(starts, vec![0, 600, 1_200, 1_800, 2_400, 3_000, 3_600]);
    assert_eq!(calls.iter().filter(|c| c.video.is_none()).count(), 1);
}

async fn context(model: ScriptedModel, catalog: FakeCatalog) -> ServiceContext {
    ServiceContext {
        db: setup_db().await,
        event_bus: EventBus::new(100),
        model: Arc::new(model),
        catalog: Arc::new(catalog),
    }
}

#[tokio::test]
async fn test_request_lifecycle_persists_progress_and_emits_events() {
    let ctx = context(
        scripted_long_model(),
        FakeCatalog::default().with_video(video("dQw4w9WgXcQ", "세포 분열", 1_500, 10)),
    )
    .await;
    let mut rx = ctx.event_bus.subscribe();

    let request = AnalysisRequest::new(
        "https://youtu.be/dQw4w9WgXcQ".to_string(),
        "dQw4w9WgXcQ".to_string(),
        "중학교 2학년".to_string(),
        None,
        Some("anon-1".to_string()),
    );
    analysis_requests::save_request(&ctx.db, &request).await.unwrap();

    let analysis = run_analysis_request(&ctx, &request).await.unwrap();
    assert_eq!(analysis.chunk_count, 3);

    let stored = analysis_requests::load_request(&ctx.db, request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Completed);
    assert_eq!(stored.chunks_total, 3);
    assert_eq!(stored.chunks_done, 3);
    assert_eq!(stored.analysis.unwrap().safety_score, 85);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert!(matches!(
        events.first(),
        Some(TuberingEvent::AnalysisStarted { chunks_total: 3, .. })
    ));
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, TuberingEvent::AnalysisChunkCompleted { .. }))
            .count(),
        3
    );
    assert!(matches!(
        events.last(),
        Some(TuberingEvent::AnalysisCompleted { safety_score: 85, .. })
    ));
}

#[tokio::test]
async fn test_missing_video_marks_request_error() {
    let ctx = context(scripted_long_model(), FakeCatalog::default()).await;

    let request = AnalysisRequest::new(
        "https://youtu.be/dQw4w9WgXcQ".to_string(),
        "dQw4w9WgXcQ".to_string(),
        "중학교 2학년".to_string(),
        Some("t1".to_string()),
        None,
    );
    analysis_requests::save_request(&ctx.db, &request).await.unwrap();

    assert!(run_analysis_request(&ctx, &request).await.is_err());

    let stored = analysis_requests::load_request(&ctx.db, request.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, RequestStatus::Error);
    assert!(stored.error_message.unwrap().contains("dQw4w9WgXcQ"));
}
