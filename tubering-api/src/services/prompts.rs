//! Prompt templates
//!
//! All prompts ask for a single JSON object; field names here must match
//! the raw response types in `video_analysis` and `recommendation`.

use tubering_common::timestamp::format_timestamp;

use crate::models::{FlowMarker, Warning};

const WARNING_TAGS: &str = "폭력성, 선정성, 언어, 공포, 약물/음주, 차별/혐오, 위험행동, 광고/상업성, 기타";

/// Whole-video prompt for videos that fit in a single window
pub fn quick_analysis_prompt(grade: &str, title: Option<&str>) -> String {
    format!(
        r#"당신은 {grade} 학생에게 수업 시간에 보여줄 영상을 검토하는 교육 전문가입니다.
영상 제목: {title}

영상 전체를 보고 다음 JSON 형식으로만 답하세요.
{{
  "summary": "영상 내용 요약 (3~5문장)",
  "safety_score": 0에서 100 사이 정수 (100이 가장 안전),
  "warnings": [
    {{"start_time": "M:SS", "end_time": "M:SS", "tag": "분류", "severity": "low|medium|high", "description": "문제 장면 설명"}}
  ],
  "chapters": [{{"time": "M:SS", "title": "챕터 제목"}}],
  "flow": [{{"time": "M:SS", "topic": "이 시점부터 다루는 주제"}}]
}}
경고 분류는 다음 중 하나를 사용하세요: {WARNING_TAGS}.
문제 장면이 없으면 warnings는 빈 배열로 두세요."#,
        grade = grade,
        title = title.unwrap_or("(알 수 없음)"),
    )
}

/// Prompt for one `[start, end)` window of a long video
pub fn chunk_analysis_prompt(grade: &str, start: u32, end: u32) -> String {
    format!(
        r#"당신은 {grade} 학생에게 수업 시간에 보여줄 영상을 검토하는 교육 전문가입니다.
영상의 {start}부터 {end}까지 구간만 검토하세요.

다음 JSON 형식으로만 답하세요. 모든 시각은 영상 시작 기준 절대 시각(M:SS 또는 H:MM:SS)이며 반드시 {start} 이상 {end} 미만이어야 합니다.
{{
  "warnings": [
    {{"start_time": "M:SS", "end_time": "M:SS", "tag": "분류", "severity": "low|medium|high", "description": "문제 장면 설명"}}
  ],
  "flow": [{{"time": "M:SS", "topic": "이 시점부터 다루는 주제"}}]
}}
경고 분류는 다음 중 하나를 사용하세요: {WARNING_TAGS}.
문제 장면이 없으면 warnings는 빈 배열로 두세요."#,
        grade = grade,
        start = format_timestamp(start),
        end = format_timestamp(end),
    )
}

/// Prompt that turns merged chunk findings into an overall verdict
pub fn summary_prompt(
    grade: &str,
    title: Option<&str>,
    duration_seconds: u32,
    warnings: &[Warning],
    flow: &[FlowMarker],
) -> String {
    let warning_lines = if warnings.is_empty() {
        "(없음)".to_string()
    } else {
        warnings
            .iter()
            .map(|w| {
                format!(
                    "- [{}~{}] {} ({}): {}",
                    w.start_time,
                    w.end_time,
                    w.tag,
                    w.severity.as_str(),
                    w.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let flow_lines = if flow.is_empty() {
        "(없음)".to_string()
    } else {
        flow.iter()
            .map(|f| format!("- {} {}", f.timestamp, f.topic))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"다음은 길이 {duration}인 영상 "{title}"을 구간별로 검토한 결과입니다.
대상 학년: {grade}

[경고 목록]
{warning_lines}

[내용 흐름]
{flow_lines}

이 결과를 종합하여 다음 JSON 형식으로만 답하세요.
{{"summary": "영상 전체 요약과 수업 활용 시 유의점 (3~5문장)", "safety_score": 0에서 100 사이 정수 (100이 가장 안전)}}"#,
        duration = format_timestamp(duration_seconds),
        title = title.unwrap_or("(제목 없음)"),
        grade = grade,
        warning_lines = warning_lines,
        flow_lines = flow_lines,
    )
}

/// Prompt for recommendation search keywords
pub fn keyword_prompt(subject: &str, grade: &str, intention: &str, count: usize) -> String {
    let intention = if intention.trim().is_empty() {
        "(특별한 의도 없음)"
    } else {
        intention.trim()
    };

    format!(
        r#"{grade} {subject} 수업에 활용할 교육용 YouTube 영상을 찾으려고 합니다.
수업 의도: {intention}

YouTube에서 검색할 한국어 검색어 {count}개를 다음 JSON 형식으로만 답하세요.
{{"keywords": ["검색어1", "검색어2"]}}
검색어는 짧고 구체적으로 작성하세요."#,
        grade = grade,
        subject = subject,
        intention = intention,
        count = count,
    )
}
