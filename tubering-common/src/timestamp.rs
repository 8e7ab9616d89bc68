//! Video timestamp parsing and formatting
//!
//! Timestamps travel as `M:SS` / `H:MM:SS` strings in LLM responses and in
//! stored analyses, and as whole seconds everywhere else.

/// Seconds in one hour; at or above this `format_timestamp` switches to `H:MM:SS`
const HOUR_SECS: u32 = 3600;

/// Parse a timestamp string into whole seconds.
///
/// Accepts `SS`, `M:SS`, `MM:SS` and `H:MM:SS`. Surrounding whitespace and
/// square/round brackets are ignored. The leading component may be any size;
/// later components must be below 60.
///
/// # Examples
///
/// ```
/// use tubering_common::timestamp::parse_timestamp;
///
/// assert_eq!(parse_timestamp("12:30"), Some(750));
/// assert_eq!(parse_timestamp("1:02:03"), Some(3723));
/// assert_eq!(parse_timestamp("[0:45]"), Some(45));
/// assert_eq!(parse_timestamp("abc"), None);
/// ```
pub fn parse_timestamp(input: &str) -> Option<u32> {
    let trimmed = input
        .trim()
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')'])
        .trim();

    if trimmed.is_empty() {
        return None;
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() > 3 {
        return None;
    }

    let mut total: u32 = 0;
    for (i, part) in parts.iter().enumerate() {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u32 = part.parse().ok()?;
        if i > 0 && value >= 60 {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(value)?;
    }

    Some(total)
}

/// Format whole seconds as `M:SS` (under an hour) or `H:MM:SS`.
///
/// # Examples
///
/// ```
/// use tubering_common::timestamp::format_timestamp;
///
/// assert_eq!(format_timestamp(750), "12:30");
/// assert_eq!(format_timestamp(5), "0:05");
/// assert_eq!(format_timestamp(3723), "1:02:03");
/// ```
pub fn format_timestamp(seconds: u32) -> String {
    if seconds >= HOUR_SECS {
        let hours = seconds / HOUR_SECS;
        let mins = (seconds % HOUR_SECS) / 60;
        let secs = seconds % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

/// Clamp `t` into the half-open window `[start, end)`.
///
/// An empty window (`end <= start`) clamps to `start`.
pub fn clamp_to_window(t: u32, start: u32, end: u32) -> u32 {
    if end <= start {
        return start;
    }
    t.clamp(start, end - 1)
}
