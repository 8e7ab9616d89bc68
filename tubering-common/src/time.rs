//! Timestamp and calendar-day utilities

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar-day key in the `Date.toDateString()` shape, e.g. "Sun Oct 18 2026"
///
/// Daily usage counters compare these keys, so a changed key means a new day.
pub fn date_key(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}

/// Date key for the local calendar day
pub fn today_key() -> String {
    date_key(today())
}

/// Local calendar day
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
