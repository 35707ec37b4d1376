//! Unit tests for the settings store collaborators: the in-memory store's
//! change notifications and the JSON-file store's load/save/fallback paths.

use tempfile::TempDir;

use wordlight::services::settings_store::{JsonFileStore, MemoryStore, SettingsStoreTrait};
use wordlight::types::errors::StoreError;
use wordlight::types::settings::{SettingsSnapshot, WordEntry, WordList};

fn file_store(dir: &TempDir) -> JsonFileStore {
    JsonFileStore::new(dir.path().join("settings.json"))
}

#[tokio::test]
async fn test_memory_store_starts_with_first_run_snapshot() {
    let store = MemoryStore::new();
    let snapshot = store.read().await.unwrap();
    assert!(snapshot.enable_highlighting);
    assert!(snapshot.word_lists.is_empty());
}

#[tokio::test]
async fn test_memory_store_write_flag_notifies() {
    let store = MemoryStore::new();
    let mut rx = store.subscribe();

    store.write_enable_highlighting(false).await.unwrap();

    assert!(!store.read().await.unwrap().enable_highlighting);
    assert!(rx.recv().await.is_ok());
}

#[tokio::test]
async fn test_memory_store_replace_notifies() {
    let store = MemoryStore::new();
    let mut rx = store.subscribe();

    let snapshot = SettingsSnapshot {
        word_lists: vec![WordList {
            id: "l".to_string(),
            name: "terms".to_string(),
            words: vec![WordEntry::new("cat")],
            ..WordList::default()
        }],
        ..SettingsSnapshot::first_run()
    };
    store.replace(snapshot.clone()).await;

    assert!(rx.recv().await.is_ok());
    assert_eq!(store.read().await.unwrap(), snapshot);
}

#[tokio::test]
async fn test_file_store_missing_file_yields_first_run_defaults() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);

    let snapshot = store.read().await.unwrap();
    assert_eq!(snapshot, SettingsSnapshot::first_run());
}

#[tokio::test]
async fn test_file_store_write_survives_reload() {
    let dir = TempDir::new().unwrap();

    {
        let store = file_store(&dir);
        store.write_enable_highlighting(false).await.unwrap();
    }

    let store = file_store(&dir);
    let snapshot = store.read().await.unwrap();
    assert!(
        !snapshot.enable_highlighting,
        "the persisted flag must be read back by a fresh store instance"
    );
}

#[tokio::test]
async fn test_file_store_write_notifies() {
    let dir = TempDir::new().unwrap();
    let store = file_store(&dir);
    let mut rx = store.subscribe();

    store.write_enable_highlighting(false).await.unwrap();
    assert!(rx.recv().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_file_store_malformed_json_errors_after_retries() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("settings.json"), "{ not json }").unwrap();
    let store = file_store(&dir);

    // Paused clock: the retry backoff sleeps auto-advance.
    let result = store.read().await;
    assert!(matches!(result, Err(StoreError::Serialization(_))));
}

#[tokio::test]
async fn test_file_store_normalizes_sloppy_payload() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("settings.json"),
        r#"{
            "enableHighlighting": true,
            "websiteRule": "include",
            "includeWebsites": ["example.com"],
            "wordLists": [
                {"name": "terms", "words": [{"text": " cat "}, {"text": ""}]},
                {"bogus": true}
            ]
        }"#,
    )
    .unwrap();

    let store = file_store(&dir);
    let snapshot = store.read().await.unwrap();

    assert!(snapshot.enable_highlighting);
    assert_eq!(snapshot.include_websites, vec!["example.com".to_string()]);
    assert_eq!(snapshot.word_lists.len(), 1);
    assert_eq!(snapshot.word_lists[0].words.len(), 1);
    assert_eq!(snapshot.word_lists[0].words[0].text, "cat");
    assert!(!snapshot.word_lists[0].id.is_empty());
}

#[tokio::test]
async fn test_file_store_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let store = JsonFileStore::new(dir.path().join("nested").join("settings.json"));

    store.write_enable_highlighting(true).await.unwrap();
    assert!(store.path().exists());
}
