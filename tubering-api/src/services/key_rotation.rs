//! YouTube API key rotation
//!
//! Several Data API keys share the daily quota. A single index (persisted in
//! the settings table) selects the active key; when a request is rejected
//! with HTTP 403 the index advances modulo the key count and the request is
//! retried, at most `keys.len() - 1` times. If every key is rejected the
//! first rejection is returned.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::db::settings;

/// Key rotation errors
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("No API keys configured")]
    NoKeys,

    #[error("Key index store error: {0}")]
    Store(#[from] tubering_common::Error),
}

/// Errors that can signal "this key was rejected, try the next one"
pub trait RotatableError {
    fn is_key_rejected(&self) -> bool;
}

/// Where the active key index lives
#[async_trait]
pub trait KeyIndexStore: Send + Sync {
    async fn load_index(&self) -> tubering_common::Result<usize>;
    async fn store_index(&self, index: usize) -> tubering_common::Result<()>;
}

/// Index persisted in the settings table (`youtube_api_key_index`)
pub struct SettingsKeyIndex {
    pool: SqlitePool,
}

impl SettingsKeyIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyIndexStore for SettingsKeyIndex {
    async fn load_index(&self) -> tubering_common::Result<usize> {
        settings::get_youtube_key_index(&self.pool).await
    }

    async fn store_index(&self, index: usize) -> tubering_common::Result<()> {
        settings::set_youtube_key_index(&self.pool, index).await
    }
}

/// Process-local index
#[derive(Default)]
pub struct MemoryKeyIndex {
    index: AtomicUsize,
}

#[async_trait]
impl KeyIndexStore for MemoryKeyIndex {
    async fn load_index(&self) -> tubering_common::Result<usize> {
        Ok(self.index.load(Ordering::SeqCst))
    }

    async fn store_index(&self, index: usize) -> tubering_common::Result<()> {
        self.index.store(index, Ordering::SeqCst);
        Ok(())
    }
}

/// Ordered API keys plus the persisted active index
pub struct KeyRing {
    keys: Vec<String>,
    store: Arc<dyn KeyIndexStore>,
}

impl KeyRing {
    /// Blank keys are dropped
    pub fn new(keys: Vec<String>, store: Arc<dyn KeyIndexStore>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys, store }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Active key and its index
    ///
    /// A stored index beyond the key list (keys were removed) wraps around.
    pub async fn current_key(&self) -> Result<(usize, String), RotationError> {
        if self.keys.is_empty() {
            return Err(RotationError::NoKeys);
        }
        let index = self.store.load_index().await? % self.keys.len();
        Ok((index, self.keys[index].clone()))
    }

    /// Advance the active index modulo the key count and persist it
    pub async fn rotate(&self) -> Result<(usize, String), RotationError> {
        let (current, _) = self.current_key().await?;
        let next = (current + 1) % self.keys.len();
        self.store.store_index(next).await?;
        debug!(from = current, to = next, "Rotated API key");
        Ok((next, self.keys[next].clone()))
    }
}

/// Run `request` with the active key, rotating on rejection
pub async fn with_key_rotation<T, E, F, Fut>(ring: &KeyRing, mut request: F) -> Result<T, E>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RotatableError + From<RotationError> + std::fmt::Display,
{
    let (mut index, mut key) = ring.current_key().await?;
    let max_retries = ring.len() - 1;
    let mut first_rejection: Option<E> = None;
    let mut retries = 0;

    loop {
        match request(key).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_key_rejected() => {
                warn!(key_index = index, error = %err, "API key rejected");
                let original = first_rejection.unwrap_or(err);

                if retries >= max_retries {
                    warn!(keys = ring.len(), "All API keys rejected");
                    return Err(original);
                }

                first_rejection = Some(original);
                retries += 1;
                (index, key) = ring.rotate().await?;
            }
            Err(err) => return Err(err),
        }
    }
}
