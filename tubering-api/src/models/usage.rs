//! Daily usage quota models

use serde::Serialize;

/// Daily analysis limit for signed-in users
pub const DAILY_LIMIT_LOGGED_IN: u32 = 10;

/// Daily analysis limit for anonymous visitors
pub const DAILY_LIMIT_ANONYMOUS: u32 = 3;

/// Who a usage counter belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageSubject {
    /// Signed-in user (uid)
    User(String),
    /// Anonymous visitor (client-generated id)
    Anonymous(String),
}

impl UsageSubject {
    /// Build a subject from optional ids; a uid takes precedence
    pub fn from_ids(uid: Option<&str>, anon_id: Option<&str>) -> Option<Self> {
        match (uid, anon_id) {
            (Some(uid), _) if !uid.trim().is_empty() => Some(UsageSubject::User(uid.to_string())),
            (_, Some(anon)) if !anon.trim().is_empty() => {
                Some(UsageSubject::Anonymous(anon.to_string()))
            }
            _ => None,
        }
    }

    /// Storage key for the daily_usage table
    pub fn key(&self) -> String {
        match self {
            UsageSubject::User(uid) => format!("user:{}", uid),
            UsageSubject::Anonymous(id) => format!("anon:{}", id),
        }
    }

    /// Limit for the subject's auth state
    pub fn daily_limit(&self) -> u32 {
        match self {
            UsageSubject::User(_) => DAILY_LIMIT_LOGGED_IN,
            UsageSubject::Anonymous(_) => DAILY_LIMIT_ANONYMOUS,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        matches!(self, UsageSubject::User(_))
    }
}

/// Result of a daily limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLimitStatus {
    pub exceeded: bool,
    pub count: u32,
    pub limit: u32,
    pub remaining: u32,
    pub date_key: String,
}

impl DailyLimitStatus {
    pub fn new(count: u32, limit: u32, date_key: String) -> Self {
        Self {
            exceeded: count >= limit,
            count,
            limit,
            remaining: limit.saturating_sub(count),
            date_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_takes_precedence() {
        let subject = UsageSubject::from_ids(Some("u1"), Some("anon-1")).unwrap();
        assert_eq!(subject, UsageSubject::User("u1".to_string()));
        assert_eq!(subject.daily_limit(), 10);
        assert_eq!(subject.key(), "user:u1");
    }

    #[test]
    fn test_anonymous_subject() {
        let subject = UsageSubject::from_ids(None, Some("anon-1")).unwrap();
        assert_eq!(subject.daily_limit(), 3);
        assert_eq!(subject.key(), "anon:anon-1");
        assert!(!subject.is_logged_in());
    }

    #[test]
    fn test_blank_ids_rejected() {
        assert!(UsageSubject::from_ids(Some(" "), None).is_none());
        assert!(UsageSubject::from_ids(None, None).is_none());
        // Blank uid falls through to anon id
        assert_eq!(
            UsageSubject::from_ids(Some(""), Some("a")),
            Some(UsageSubject::Anonymous("a".to_string()))
        );
    }

    #[test]
    fn test_status_exceeded_at_limit() {
        assert!(!DailyLimitStatus::new(2, 3, "d".into()).exceeded);
        assert!(DailyLimitStatus::new(3, 3, "d".into()).exceeded);
        assert_eq!(DailyLimitStatus::new(5, 3, "d".into()).remaining, 0);
    }
}
