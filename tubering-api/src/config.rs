//! API key resolution for tubering-api
//!
//! Keys resolve with Database → ENV → TOML priority. The database is
//! authoritative; the settings endpoints write it and mirror the value into
//! the TOML file as a backup.

use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{info, warn};
use tubering_common::config::TomlConfig;
use tubering_common::{Error, Result};

/// Environment variable holding the Gemini API key
pub const GEMINI_API_KEY_ENV: &str = "TUBERING_GEMINI_API_KEY";

/// Environment variable holding comma-separated YouTube Data API keys
pub const YOUTUBE_API_KEYS_ENV: &str = "TUBERING_YOUTUBE_API_KEYS";

/// Resolve the Gemini API key from the three configuration tiers
pub async fn resolve_gemini_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<String> {
    let db_key = crate::db::settings::get_gemini_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(GEMINI_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .gemini_api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let mut sources = Vec::new();
    if db_key.is_some() {
        sources.push("database");
    }
    if env_key.is_some() {
        sources.push("environment");
    }
    if toml_key.is_some() {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        warn!(
            "Gemini API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Gemini API key loaded from database");
        return Ok(key);
    }
    if let Some(key) = env_key {
        info!("Gemini API key loaded from environment variable");
        return Ok(key.trim().to_string());
    }
    if let Some(key) = toml_key {
        info!("Gemini API key loaded from TOML config");
        return Ok(key);
    }

    Err(Error::Config(format!(
        "Gemini API key not configured. Configure using one of:\n\
         1. POST /api/settings/gemini_api_key\n\
         2. Environment: {}=your-key\n\
         3. TOML config: gemini_api_key = \"your-key\"",
        GEMINI_API_KEY_ENV
    )))
}

/// Resolve the YouTube Data API key list from the three configuration tiers
///
/// A tier counts only when it yields at least one non-blank key.
pub async fn resolve_youtube_api_keys(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<Vec<String>> {
    let db_keys = crate::db::settings::get_youtube_api_keys(db)
        .await?
        .map(|keys| clean_keys(&keys))
        .filter(|keys| !keys.is_empty());
    let env_keys = std::env::var(YOUTUBE_API_KEYS_ENV)
        .ok()
        .map(|raw| parse_key_list(&raw))
        .filter(|keys| !keys.is_empty());
    let toml_keys = Some(clean_keys(&toml_config.youtube_api_keys)).filter(|k| !k.is_empty());

    let mut sources = Vec::new();
    if db_keys.is_some() {
        sources.push("database");
    }
    if env_keys.is_some() {
        sources.push("environment");
    }
    if toml_keys.is_some() {
        sources.push("TOML");
    }
    if sources.len() > 1 {
        warn!(
            "YouTube API keys found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = db_keys.or(env_keys).or(toml_keys);
    match resolved {
        Some(keys) => {
            info!(
                count = keys.len(),
                source = sources[0],
                "YouTube API keys loaded"
            );
            Ok(keys)
        }
        None => Err(Error::Config(format!(
            "YouTube API keys not configured. Configure using one of:\n\
             1. POST /api/settings/youtube_api_keys\n\
             2. Environment: {}=key1,key2\n\
             3. TOML config: youtube_api_keys = [\"key1\", \"key2\"]",
            YOUTUBE_API_KEYS_ENV
        ))),
    }
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Split a comma-separated key list, dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn clean_keys(keys: &[String]) -> Vec<String> {
    keys.iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Setting values mirrored into the TOML file
#[derive(Debug, Clone)]
pub enum TomlSetting {
    GeminiApiKey(String),
    YouTubeApiKeys(Vec<String>),
}

/// Mirror settings into the TOML file (best effort)
///
/// A write failure is logged and swallowed: the database write already
/// succeeded and stays authoritative.
pub async fn sync_settings_to_toml(settings: Vec<TomlSetting>, toml_path: &Path) -> Result<()> {
    let mut config = if toml_path.exists() {
        tubering_common::config::load_toml_config(toml_path)?
    } else {
        TomlConfig::default()
    };

    for setting in settings {
        match setting {
            TomlSetting::GeminiApiKey(key) => config.gemini_api_key = Some(key),
            TomlSetting::YouTubeApiKeys(keys) => config.youtube_api_keys = keys,
        }
    }

    match tubering_common::config::write_toml_config(&config, toml_path) {
        Ok(()) => {
            info!("Settings synced to TOML: {}", toml_path.display());
            Ok(())
        }
        Err(e) => {
            warn!("TOML write failed (database write succeeded): {}", e);
            Ok(())
        }
    }
}

/// Show only the last four characters of a key
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.trim().chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("  \t"));
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(parse_key_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_key_list(" , ").is_empty());
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("AIzaSy123456"), "********3456");
        assert_eq!(mask_key("abc"), "***");
    }

    #[tokio::test]
    async fn test_sync_creates_and_merges_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        sync_settings_to_toml(vec![TomlSetting::GeminiApiKey("g-key".into())], &path)
            .await
            .unwrap();
        sync_settings_to_toml(
            vec![TomlSetting::YouTubeApiKeys(vec!["y1".into(), "y2".into()])],
            &path,
        )
        .await
        .unwrap();

        let config = tubering_common::config::load_toml_config(&path).unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("g-key"));
        assert_eq!(config.youtube_api_keys, vec!["y1", "y2"]);
    }
}
