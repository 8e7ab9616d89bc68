//! Shard placement and cross-shard lookup for saved-video collections

mod helpers;

use helpers::setup_db;
use tubering_api::db::documents;
use tubering_api::db::jjim::{JjimStore, NewJjimLink, COLLECTION};
use tubering_api::models::{JjimDocument, JjimVideo};
use tubering_common::Error;

/// Small enough that a handful of links overflow the main document
const TEST_THRESHOLD: usize = 1_500;

fn link(n: u32, folder_id: Option<&str>) -> NewJjimLink {
    NewJjimLink {
        url: format!("https://youtu.be/vid{:08}", n),
        title: Some(format!("영상 {}", n)),
        memo: String::new(),
        folder_id: folder_id.map(String::from),
        tags: vec!["과학".to_string()],
    }
}

async fn fill(store: &JjimStore, uid: &str, count: u32) -> Vec<JjimVideo> {
    let mut saved = Vec::new();
    for n in 0..count {
        saved.push(store.add_link_directly(uid, link(n, None)).await.unwrap());
    }
    saved
}

async fn doc(pool: &sqlx::SqlitePool, id: &str) -> Option<JjimDocument> {
    documents::get_document(pool, COLLECTION, id).await.unwrap()
}

#[tokio::test]
async fn test_overflow_creates_registered_shard() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "t1", 12).await;

    let main = doc(&pool, "t1").await.unwrap();
    assert!(!main.add_lists.is_empty());
    assert_eq!(main.add_lists[0], 1);
    assert!(main.estimated_size() <= TEST_THRESHOLD);

    for suffix in &main.add_lists {
        let shard = doc(&pool, &format!("t1_{}", suffix)).await.unwrap();
        assert!(!shard.videos.is_empty());
        assert!(shard.folders.is_empty());
        assert!(shard.add_lists.is_empty());
        assert!(shard.estimated_size() <= TEST_THRESHOLD);
    }

    let all = store.load_all("t1").await.unwrap();
    assert_eq!(all.videos.len(), 12);
    assert_eq!(all.shards, main.add_lists);
}

#[tokio::test]
async fn test_shard_suffixes_increase() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "t1", 30).await;

    let main = doc(&pool, "t1").await.unwrap();
    assert!(main.add_lists.len() >= 2);
    let expected: Vec<u32> = (1..=main.add_lists.len() as u32).collect();
    assert_eq!(main.add_lists, expected);
}

#[tokio::test]
async fn test_delete_and_remove_find_items_in_any_shard() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    let saved = fill(&store, "t1", 12).await;
    let first = &saved[0];
    let last = &saved[11];

    // The last entry lives in an overflow shard
    let main = doc(&pool, "t1").await.unwrap();
    assert!(!main.videos.iter().any(|v| v.id == last.id));

    assert!(store.delete_video("t1", &last.id).await.unwrap());
    assert!(!store.delete_video("t1", &last.id).await.unwrap());

    assert!(store
        .remove_from_jjim("t1", &first.video_id, None)
        .await
        .unwrap());

    let all = store.load_all("t1").await.unwrap();
    assert_eq!(all.videos.len(), 10);
    assert!(!all.videos.iter().any(|v| v.id == first.id || v.id == last.id));
}

#[tokio::test]
async fn test_freed_main_space_is_reused() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    let saved = fill(&store, "t1", 12).await;
    let shards_before = doc(&pool, "t1").await.unwrap().add_lists;

    // No compaction: deleting from main leaves the shards alone
    assert!(store.delete_video("t1", &saved[0].id).await.unwrap());
    let added = store.add_link_directly("t1", link(100, None)).await.unwrap();

    let main = doc(&pool, "t1").await.unwrap();
    assert_eq!(main.add_lists, shards_before);
    assert!(main.videos.iter().any(|v| v.id == added.id));
}

#[tokio::test]
async fn test_duplicate_detected_across_shards() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "t1", 12).await;

    let err = store.add_link_directly("t1", link(11, None)).await.unwrap_err();
    assert!(matches!(err, tubering_common::Error::AlreadyExists(_)));
}

#[tokio::test]
async fn test_update_moves_entry_inside_its_shard() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), 4_000);

    let folder = store.create_folder("t1", "보관함", None).await.unwrap();
    let saved = fill(&store, "t1", 20).await;
    let target = &saved[19];

    let updated = store
        .update_video(
            "t1",
            &target.id,
            tubering_api::db::jjim::VideoUpdate {
                folder_id: Some(folder.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.folder_id.as_deref(), Some(folder.id.as_str()));

    let all = store.load_all("t1").await.unwrap();
    let stored = all.videos.iter().find(|v| v.id == target.id).unwrap();
    assert_eq!(stored.folder_id.as_deref(), Some(folder.id.as_str()));
}

#[tokio::test]
async fn test_delete_folder_removes_descendants_across_shards() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    let parent = store.create_folder("t1", "과학", None).await.unwrap();
    let child = store
        .create_folder("t1", "실험", Some(parent.id.clone()))
        .await
        .unwrap();
    let other = store.create_folder("t1", "수학", None).await.unwrap();

    for n in 0..6 {
        store
            .add_link_directly("t1", link(n, Some(&parent.id)))
            .await
            .unwrap();
    }
    for n in 6..12 {
        store
            .add_link_directly("t1", link(n, Some(&child.id)))
            .await
            .unwrap();
    }
    store
        .add_link_directly("t1", link(50, Some(&other.id)))
        .await
        .unwrap();

    let deletion = store.delete_folder("t1", &parent.id).await.unwrap();
    assert_eq!(deletion.folders_removed, 2);
    assert_eq!(deletion.videos_removed, 12);

    let all = store.load_all("t1").await.unwrap();
    assert_eq!(all.folders.len(), 1);
    assert_eq!(all.folders[0].id, other.id);
    assert_eq!(all.videos.len(), 1);
}

#[tokio::test]
async fn test_users_are_isolated() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "t1", 12).await;
    fill(&store, "t2", 2).await;

    assert_eq!(store.load_all("t2").await.unwrap().videos.len(), 2);
    assert!(doc(&pool, "t2").await.unwrap().add_lists.is_empty());
}

#[tokio::test]
async fn test_shard_shaped_uid_cannot_reach_overflow_shard() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "alice", 12).await;
    let shards = doc(&pool, "alice").await.unwrap().add_lists;
    assert!(!shards.is_empty());

    let intruder = format!("alice_{}", shards[0]);
    assert!(matches!(
        store.load_all(&intruder).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        store.add_link_directly(&intruder, link(99, None)).await,
        Err(Error::InvalidInput(_))
    ));
    assert!(matches!(
        store.delete_folder(&intruder, "any").await,
        Err(Error::InvalidInput(_))
    ));

    // The shard itself is untouched
    let shard = doc(&pool, &intruder).await.unwrap();
    assert!(!shard.videos.is_empty());
    assert_eq!(store.load_all("alice").await.unwrap().videos.len(), 12);
}

#[tokio::test]
async fn test_clear_drops_main_document_and_shards() {
    let pool = setup_db().await;
    let store = JjimStore::with_threshold(pool.clone(), TEST_THRESHOLD);

    fill(&store, "t1", 12).await;
    fill(&store, "t2", 2).await;
    let shards = doc(&pool, "t1").await.unwrap().add_lists;

    let removed = store.clear("t1").await.unwrap();
    assert_eq!(removed, shards.len() + 1);

    assert!(doc(&pool, "t1").await.is_none());
    for suffix in shards {
        assert!(doc(&pool, &format!("t1_{}", suffix)).await.is_none());
    }
    assert!(store.load_all("t1").await.unwrap().videos.is_empty());
    assert_eq!(store.load_all("t2").await.unwrap().videos.len(), 2);

    assert_eq!(store.clear("t1").await.unwrap(), 0);
}
