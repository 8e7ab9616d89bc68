//! Saved-video collections ("찜보따리")
//!
//! A user's collection is stored as a main document `{uid}` plus overflow
//! shards `{uid}_{n}` in the `jjimVideos` collection. The main document owns
//! the folder tree and `add_lists`, the ordered list of shard suffixes.
//!
//! New entries go to the main document while its estimated size (serialized
//! JSON byte length) stays within the threshold, then to the newest shard,
//! then to a freshly allocated shard. Shards are never compacted or
//! rebalanced; lookups scan the main document and then every shard in
//! `add_lists` order.
//!
//! Writes replace whole documents (last write wins).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use tubering_common::{Error, Result};
use uuid::Uuid;

use super::documents;
use crate::models::{JjimDocument, JjimFolder, JjimVideo};
use crate::services::youtube_url;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Document collection name
pub const COLLECTION: &str = "jjimVideos";

/// Shard size threshold: 0.8 MiB
pub const DEFAULT_SHARD_THRESHOLD_BYTES: usize = 838_860;

/// Merged view of a user's collection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JjimCollection {
    pub folders: Vec<JjimFolder>,
    pub videos: Vec<JjimVideo>,
    /// Overflow shard suffixes in allocation order
    pub shards: Vec<u32>,
}

/// An analyzed video to save
#[derive(Debug, Clone, Deserialize)]
pub struct NewJjimVideo {
    pub video_id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub title: String,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub analysis: Option<serde_json::Value>,
}

/// A bare link to save without analysis
#[derive(Debug, Clone, Deserialize)]
pub struct NewJjimLink {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub folder_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Changes to a saved entry; `None` leaves a field untouched
///
/// `folder_id: Some("")` moves the entry to the root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoUpdate {
    pub memo: Option<String>,
    pub tags: Option<Vec<String>>,
    pub folder_id: Option<String>,
}

/// What a folder deletion removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FolderDeletion {
    pub folders_removed: usize,
    pub videos_removed: usize,
}

/// Sharded per-user store
#[derive(Clone)]
pub struct JjimStore {
    pool: SqlitePool,
    threshold_bytes: usize,
}

fn shard_doc_id(uid: &str, suffix: u32) -> String {
    format!("{}_{}", uid, suffix)
}

/// Reject owner ids that are blank or shaped like a shard id (`{uid}_{n}`)
///
/// Shards share the main documents' namespace, so a uid ending in `_<digits>`
/// would address another user's overflow shard.
pub fn validate_owner_uid(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        return Err(Error::InvalidInput("uid must not be empty".to_string()));
    }
    if let Some((_, suffix)) = uid.rsplit_once('_') {
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidInput(format!(
                "uid {} ends in a shard suffix",
                uid
            )));
        }
    }
    Ok(())
}

impl JjimStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_threshold(pool, DEFAULT_SHARD_THRESHOLD_BYTES)
    }

    pub fn with_threshold(pool: SqlitePool, threshold_bytes: usize) -> Self {
        Self {
            pool,
            threshold_bytes,
        }
    }

    pub fn threshold_bytes(&self) -> usize {
        self.threshold_bytes
    }

    async fn load_doc(&self, doc_id: &str) -> Result<Option<JjimDocument>> {
        documents::get_document(&self.pool, COLLECTION, doc_id).await
    }

    async fn load_main(&self, uid: &str) -> Result<JjimDocument> {
        validate_owner_uid(uid)?;
        Ok(self.load_doc(uid).await?.unwrap_or_default())
    }

    async fn load_shard(&self, uid: &str, suffix: u32) -> Result<JjimDocument> {
        match self.load_doc(&shard_doc_id(uid, suffix)).await? {
            Some(doc) => Ok(doc),
            None => {
                warn!(uid = %uid, shard = suffix, "Registered shard document missing");
                Ok(JjimDocument::default())
            }
        }
    }

    async fn save_doc(&self, doc_id: &str, doc: &JjimDocument) -> Result<()> {
        let pool = &self.pool;
        let size = retry_on_lock("jjim document write", DEFAULT_MAX_LOCK_WAIT_MS, move || {
            documents::put_document(pool, COLLECTION, doc_id, doc)
        })
        .await?;
        debug!(doc_id = %doc_id, bytes = size, "Saved jjim document");
        Ok(())
    }

    /// Find the first document holding an entry matching `pred`
    ///
    /// Scans the main document, then each shard in `add_lists` order.
    /// Returns the document id, the document and the entry's index.
    async fn locate<F>(
        &self,
        uid: &str,
        main: &JjimDocument,
        pred: F,
    ) -> Result<Option<(String, JjimDocument, usize)>>
    where
        F: Fn(&JjimVideo) -> bool,
    {
        if let Some(index) = main.videos.iter().position(&pred) {
            return Ok(Some((uid.to_string(), main.clone(), index)));
        }

        for &suffix in &main.add_lists {
            let shard = self.load_shard(uid, suffix).await?;
            if let Some(index) = shard.videos.iter().position(&pred) {
                return Ok(Some((shard_doc_id(uid, suffix), shard, index)));
            }
        }

        Ok(None)
    }

    /// Merged folders and videos across the main document and all shards
    pub async fn load_all(&self, uid: &str) -> Result<JjimCollection> {
        let main = self.load_main(uid).await?;
        let mut videos = main.videos;

        for &suffix in &main.add_lists {
            videos.extend(self.load_shard(uid, suffix).await?.videos);
        }

        Ok(JjimCollection {
            folders: main.folders,
            videos,
            shards: main.add_lists,
        })
    }

    /// Save an analyzed video
    pub async fn add_to_jjim(&self, uid: &str, new: NewJjimVideo) -> Result<JjimVideo> {
        let video_id = new.video_id.trim().to_string();
        if video_id.is_empty() {
            return Err(Error::InvalidInput("video_id is required".to_string()));
        }

        let entry = JjimVideo {
            id: Uuid::new_v4().to_string(),
            url: new
                .url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| youtube_url::watch_url(&video_id)),
            thumbnail_url: new
                .thumbnail_url
                .or_else(|| Some(youtube_url::thumbnail_url(&video_id))),
            video_id,
            title: new.title,
            folder_id: normalize_folder_id(new.folder_id),
            tags: new.tags,
            memo: new.memo,
            analysis: new.analysis,
            added_at: Utc::now(),
        };

        self.insert_entry(uid, entry).await
    }

    /// Save a bare YouTube link
    pub async fn add_link_directly(&self, uid: &str, link: NewJjimLink) -> Result<JjimVideo> {
        let video_id = youtube_url::extract_video_id(&link.url)
            .ok_or_else(|| Error::InvalidInput(format!("Not a YouTube URL: {}", link.url)))?;

        let entry = JjimVideo {
            id: Uuid::new_v4().to_string(),
            url: youtube_url::watch_url(&video_id),
            title: link
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| link.url.trim().to_string()),
            thumbnail_url: Some(youtube_url::thumbnail_url(&video_id)),
            video_id,
            folder_id: normalize_folder_id(link.folder_id),
            tags: link.tags,
            memo: link.memo,
            analysis: None,
            added_at: Utc::now(),
        };

        self.insert_entry(uid, entry).await
    }

    async fn insert_entry(&self, uid: &str, entry: JjimVideo) -> Result<JjimVideo> {
        let mut main = self.load_main(uid).await?;

        if let Some(folder_id) = &entry.folder_id {
            if !main.folders.iter().any(|f| &f.id == folder_id) {
                return Err(Error::NotFound(format!("Folder {}", folder_id)));
            }
        }

        let duplicate = self
            .locate(uid, &main, |v| {
                v.video_id == entry.video_id && v.folder_id == entry.folder_id
            })
            .await?;
        if duplicate.is_some() {
            return Err(Error::AlreadyExists(format!(
                "Video {} is already saved in this folder",
                entry.video_id
            )));
        }

        let entry_size = entry.estimated_size();

        // Main document first
        if main.estimated_size() + entry_size <= self.threshold_bytes {
            main.videos.push(entry.clone());
            self.save_doc(uid, &main).await?;
            return Ok(entry);
        }

        // Then the newest shard
        if let Some(&suffix) = main.add_lists.last() {
            let mut shard = self.load_shard(uid, suffix).await?;
            if shard.estimated_size() + entry_size <= self.threshold_bytes {
                shard.videos.push(entry.clone());
                self.save_doc(&shard_doc_id(uid, suffix), &shard).await?;
                return Ok(entry);
            }
        }

        // Otherwise allocate a new shard and register it
        let suffix = main.add_lists.iter().max().map_or(1, |n| n + 1);
        let shard = JjimDocument {
            videos: vec![entry.clone()],
            ..Default::default()
        };
        self.save_doc(&shard_doc_id(uid, suffix), &shard).await?;

        main.add_lists.push(suffix);
        self.save_doc(uid, &main).await?;

        info!(uid = %uid, shard = suffix, "Allocated overflow shard");
        Ok(entry)
    }

    /// Remove a saved YouTube video from a folder (`None` = root)
    ///
    /// Returns false when no shard holds it.
    pub async fn remove_from_jjim(
        &self,
        uid: &str,
        video_id: &str,
        folder_id: Option<&str>,
    ) -> Result<bool> {
        let main = self.load_main(uid).await?;
        let folder_id = folder_id.filter(|f| !f.is_empty());

        let found = self
            .locate(uid, &main, |v| {
                v.video_id == video_id && v.folder_id.as_deref() == folder_id
            })
            .await?;

        self.remove_located(found).await
    }

    /// Delete a saved entry by entry id
    pub async fn delete_video(&self, uid: &str, entry_id: &str) -> Result<bool> {
        let main = self.load_main(uid).await?;
        let found = self.locate(uid, &main, |v| v.id == entry_id).await?;
        self.remove_located(found).await
    }

    async fn remove_located(&self, found: Option<(String, JjimDocument, usize)>) -> Result<bool> {
        match found {
            Some((doc_id, mut doc, index)) => {
                let removed = doc.videos.remove(index);
                self.save_doc(&doc_id, &doc).await?;
                debug!(doc_id = %doc_id, video_id = %removed.video_id, "Removed jjim entry");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Edit memo/tags or move an entry to another folder
    pub async fn update_video(
        &self,
        uid: &str,
        entry_id: &str,
        update: VideoUpdate,
    ) -> Result<JjimVideo> {
        let main = self.load_main(uid).await?;

        let target_folder = update.folder_id.map(|f| normalize_folder_id(Some(f)));
        if let Some(Some(folder_id)) = &target_folder {
            if !main.folders.iter().any(|f| &f.id == folder_id) {
                return Err(Error::NotFound(format!("Folder {}", folder_id)));
            }
        }

        let (doc_id, mut doc, index) = self
            .locate(uid, &main, |v| v.id == entry_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Saved video {}", entry_id)))?;

        let entry = &mut doc.videos[index];
        if let Some(memo) = update.memo {
            entry.memo = memo;
        }
        if let Some(tags) = update.tags {
            entry.tags = tags;
        }
        if let Some(folder_id) = target_folder {
            entry.folder_id = folder_id;
        }
        let updated = entry.clone();

        self.save_doc(&doc_id, &doc).await?;
        Ok(updated)
    }

    /// Create a folder under `parent_id` (`None` = top level)
    pub async fn create_folder(
        &self,
        uid: &str,
        name: &str,
        parent_id: Option<String>,
    ) -> Result<JjimFolder> {
        let name = validate_folder_name(name)?;
        let mut main = self.load_main(uid).await?;
        let parent_id = normalize_folder_id(parent_id);

        if let Some(parent) = &parent_id {
            if !main.folders.iter().any(|f| &f.id == parent) {
                return Err(Error::NotFound(format!("Folder {}", parent)));
            }
        }

        let folder = JjimFolder {
            id: Uuid::new_v4().to_string(),
            name,
            parent_id,
            created_at: Utc::now(),
        };
        main.folders.push(folder.clone());
        self.save_doc(uid, &main).await?;

        Ok(folder)
    }

    /// Rename a folder
    pub async fn rename_folder(&self, uid: &str, folder_id: &str, name: &str) -> Result<JjimFolder> {
        let name = validate_folder_name(name)?;
        let mut main = self.load_main(uid).await?;

        let folder = main
            .folders
            .iter_mut()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| Error::NotFound(format!("Folder {}", folder_id)))?;
        folder.name = name;
        let renamed = folder.clone();

        self.save_doc(uid, &main).await?;
        Ok(renamed)
    }

    /// Drop a user's whole collection: main document and every shard
    ///
    /// Returns how many documents were deleted.
    pub async fn clear(&self, uid: &str) -> Result<usize> {
        let main = self.load_main(uid).await?;

        let mut removed = 0;
        for &suffix in &main.add_lists {
            let shard_id = shard_doc_id(uid, suffix);
            if documents::delete_document(&self.pool, COLLECTION, &shard_id).await? {
                removed += 1;
            }
        }
        if documents::delete_document(&self.pool, COLLECTION, uid).await? {
            removed += 1;
        }

        info!(uid = %uid, documents = removed, "Cleared saved-video collection");
        Ok(removed)
    }

    /// Delete a folder, its descendants, and every video inside them
    pub async fn delete_folder(&self, uid: &str, folder_id: &str) -> Result<FolderDeletion> {
        let mut main = self.load_main(uid).await?;

        if !main.folders.iter().any(|f| f.id == folder_id) {
            return Err(Error::NotFound(format!("Folder {}", folder_id)));
        }

        let doomed = descendant_folders(&main.folders, folder_id);
        let in_doomed = |v: &JjimVideo| v.folder_id.as_ref().is_some_and(|f| doomed.contains(f));

        let mut videos_removed = 0;
        for &suffix in &main.add_lists {
            let mut shard = self.load_shard(uid, suffix).await?;
            let before = shard.videos.len();
            shard.videos.retain(|v| !in_doomed(v));
            if shard.videos.len() != before {
                videos_removed += before - shard.videos.len();
                self.save_doc(&shard_doc_id(uid, suffix), &shard).await?;
            }
        }

        let before = main.videos.len();
        main.videos.retain(|v| !in_doomed(v));
        videos_removed += before - main.videos.len();

        let folders_before = main.folders.len();
        main.folders.retain(|f| !doomed.contains(&f.id));
        let folders_removed = folders_before - main.folders.len();

        self.save_doc(uid, &main).await?;

        info!(
            uid = %uid,
            folder_id = %folder_id,
            folders_removed,
            videos_removed,
            "Deleted jjim folder"
        );

        Ok(FolderDeletion {
            folders_removed,
            videos_removed,
        })
    }
}

fn normalize_folder_id(folder_id: Option<String>) -> Option<String> {
    folder_id
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty())
}

fn validate_folder_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("Folder name is required".to_string()));
    }
    Ok(name.to_string())
}

/// `root` plus every folder below it
fn descendant_folders(folders: &[JjimFolder], root: &str) -> HashSet<String> {
    let mut found = HashSet::from([root.to_string()]);
    loop {
        let before = found.len();
        for folder in folders {
            if let Some(parent) = folder.parent_id.as_deref() {
                if found.contains(parent) {
                    found.insert(folder.id.clone());
                }
            }
        }
        if found.len() == before {
            return found;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    fn folder(id: &str, parent: Option<&str>) -> JjimFolder {
        JjimFolder {
            id: id.to_string(),
            name: id.to_string(),
            parent_id: parent.map(String::from),
            created_at: Utc::now(),
        }
    }

    fn link(url: &str, folder_id: Option<&str>) -> NewJjimLink {
        NewJjimLink {
            url: url.to_string(),
            title: None,
            memo: String::new(),
            folder_id: folder_id.map(String::from),
            tags: vec![],
        }
    }

    #[test]
    fn test_descendant_folders() {
        let folders = vec![
            folder("a", None),
            folder("b", Some("a")),
            folder("c", Some("b")),
            folder("d", None),
            folder("e", Some("d")),
        ];

        let found = descendant_folders(&folders, "a");
        let expected: HashSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn test_link_requires_youtube_url() {
        let store = JjimStore::new(setup_test_db().await);

        let err = store
            .add_link_directly("u1", link("https://vimeo.com/1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        let saved = store
            .add_link_directly("u1", link("https://youtu.be/dQw4w9WgXcQ", None))
            .await
            .unwrap();
        assert_eq!(saved.video_id, "dQw4w9WgXcQ");
        assert_eq!(saved.title, "https://youtu.be/dQw4w9WgXcQ");
        assert!(saved.analysis.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_in_same_folder_rejected() {
        let store = JjimStore::new(setup_test_db().await);
        let f = store.create_folder("u1", "과학", None).await.unwrap();
        let url = "https://youtu.be/dQw4w9WgXcQ";

        store.add_link_directly("u1", link(url, None)).await.unwrap();
        store
            .add_link_directly("u1", link(url, Some(&f.id)))
            .await
            .unwrap();

        let err = store
            .add_link_directly("u1", link(url, Some(&f.id)))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_unknown_folder_rejected() {
        let store = JjimStore::new(setup_test_db().await);

        let err = store
            .add_link_directly("u1", link("https://youtu.be/dQw4w9WgXcQ", Some("nope")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_moves_and_edits() {
        let store = JjimStore::new(setup_test_db().await);
        let f = store.create_folder("u1", "수학", None).await.unwrap();
        let saved = store
            .add_link_directly("u1", link("https://youtu.be/dQw4w9WgXcQ", None))
            .await
            .unwrap();

        let updated = store
            .update_video(
                "u1",
                &saved.id,
                VideoUpdate {
                    memo: Some("2교시".to_string()),
                    tags: Some(vec!["도입".to_string()]),
                    folder_id: Some(f.id.clone()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.folder_id.as_deref(), Some(f.id.as_str()));
        assert_eq!(updated.memo, "2교시");

        let back_to_root = store
            .update_video(
                "u1",
                &saved.id,
                VideoUpdate {
                    folder_id: Some(String::new()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(back_to_root.folder_id.is_none());
        assert_eq!(back_to_root.tags, vec!["도입"]);
    }

    #[tokio::test]
    async fn test_folder_rename_and_validation() {
        let store = JjimStore::new(setup_test_db().await);
        let f = store.create_folder("u1", " 국어 ", None).await.unwrap();
        assert_eq!(f.name, "국어");

        let renamed = store.rename_folder("u1", &f.id, "문학").await.unwrap();
        assert_eq!(renamed.name, "문학");

        assert!(matches!(
            store.create_folder("u1", "  ", None).await.unwrap_err(),
            Error::InvalidInput(_)
        ));
        assert!(matches!(
            store.rename_folder("u1", "missing", "x").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_owner_uid_must_not_look_like_a_shard() {
        assert!(validate_owner_uid("alice").is_ok());
        assert!(validate_owner_uid("alice_smith").is_ok());
        assert!(validate_owner_uid("user_1a").is_ok());
        assert!(validate_owner_uid("alice_").is_ok());

        assert!(matches!(validate_owner_uid("alice_1"), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_owner_uid("a_b_20"), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_owner_uid("  "), Err(Error::InvalidInput(_))));
    }
}
