//! Lenient JSON extraction from LLM output
//!
//! Models asked for JSON still sometimes wrap it in Markdown fences or add a
//! sentence before it. [`parse_llm_json`] tries the raw text first, then the
//! fenced block, then the outermost `{...}` / `[...]` span.

use serde::de::DeserializeOwned;

use super::gemini_client::GeminiError;

/// Deserialize JSON embedded in model output
pub fn parse_llm_json<T: DeserializeOwned>(raw: &str) -> Result<T, GeminiError> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(fenced) {
            return Ok(value);
        }
    }

    let span = outer_json_span(trimmed)
        .ok_or_else(|| GeminiError::Parse(format!("No JSON found in: {}", preview(trimmed))))?;

    serde_json::from_str::<T>(span).map_err(|e| GeminiError::Parse(e.to_string()))
}

/// Content between the first ``` fence (with optional language tag) and the next
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// From the first `{` or `[` to the last matching closer
fn outer_json_span(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let closer = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        score: u32,
    }

    #[test]
    fn test_plain_json() {
        let parsed: Score = parse_llm_json(r#"{"score": 80}"#).unwrap();
        assert_eq!(parsed, Score { score: 80 });
    }

    #[test]
    fn test_fenced_json() {
        let raw = "```json\n{\"score\": 55}\n```";
        let parsed: Score = parse_llm_json(raw).unwrap();
        assert_eq!(parsed.score, 55);
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let raw = "분석 결과입니다:\n{\"score\": 91}\n감사합니다.";
        let parsed: Score = parse_llm_json(raw).unwrap();
        assert_eq!(parsed.score, 91);
    }

    #[test]
    fn test_array_span() {
        let raw = "keywords: [\"광합성\", \"엽록체\"] done";
        let parsed: Vec<String> = parse_llm_json(raw).unwrap();
        assert_eq!(parsed, vec!["광합성", "엽록체"]);
    }

    #[test]
    fn test_no_json_is_parse_error() {
        let err = parse_llm_json::<Score>("I cannot help with that.").unwrap_err();
        assert!(matches!(err, GeminiError::Parse(_)));
    }
}
