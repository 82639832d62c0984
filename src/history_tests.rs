use super::*;
use crate::store::{BrokenStore, MemoryStore};
use serde_json::json;

fn entry(n: usize) -> HistoryEntry {
    HistoryEntry {
        timestamp: format!("2024-05-01T10:00:{:02}.000Z", n % 60),
        model: "openai/gpt-4o-mini".into(),
        input: format!("input {n}"),
        output: format!("output {n}"),
        duration_secs: Some("1.25".into()),
    }
}

#[tokio::test]
async fn append_prepends_newest() {
    let log = HistoryLog::spawn(Arc::new(MemoryStore::default()));
    log.append(entry(1)).await.unwrap();
    log.append(entry(2)).await.unwrap();
    let all = log.list().await.unwrap();
    assert_eq!(all.iter().map(|e| e.input.as_str()).collect::<Vec<_>>(), vec!["input 2", "input 1"]);
}

#[tokio::test]
async fn append_caps_at_one_hundred() {
    let log = HistoryLog::spawn(Arc::new(MemoryStore::default()));
    for n in 0..=MAX_HISTORY {
        let len = log.append(entry(n)).await.unwrap();
        assert!(len <= MAX_HISTORY);
    }
    let all = log.list().await.unwrap();
    assert_eq!(all.len(), MAX_HISTORY);
    assert_eq!(all[0].input, format!("input {MAX_HISTORY}"));
    assert!(all.iter().all(|e| e.input != "input 0"));
}

#[tokio::test]
async fn concurrent_appends_are_all_kept() {
    let log = HistoryLog::spawn(Arc::new(MemoryStore::default()));
    let tasks: Vec<_> = (0..20)
        .map(|n| {
            let log = log.clone();
            tokio::spawn(async move { log.append(entry(n)).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    assert_eq!(log.list().await.unwrap().len(), 20);
}

#[tokio::test]
async fn clear_requires_confirmation() {
    let log = HistoryLog::spawn(Arc::new(MemoryStore::default()));
    log.append(entry(1)).await.unwrap();

    assert!(!log.clear(|| false).await.unwrap());
    assert_eq!(log.list().await.unwrap().len(), 1);

    assert!(log.clear(|| true).await.unwrap());
    assert!(log.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn reads_entries_without_duration() {
    let store = MemoryStore::with(json!({
        "history": [{ "timestamp": "2024-01-01T00:00:00.000Z", "model": "m", "input": "i", "output": "o" }]
    }));
    let log = HistoryLog::spawn(Arc::new(store));
    let all = log.list().await.unwrap();
    assert_eq!(all[0].duration_secs, None);
    assert!(describe(&all[0]).contains("Duration: N/A"));
}

#[tokio::test]
async fn storage_failure_is_reported() {
    let log = HistoryLog::spawn(Arc::new(BrokenStore));
    assert!(log.append(entry(1)).await.is_err());
    assert!(log.list().await.is_err());
}

#[test]
fn new_entry_has_iso_timestamp_and_two_decimal_duration() {
    let e = HistoryEntry::now("m", "in", "out", Duration::from_millis(1234));
    assert_eq!(e.duration_secs.as_deref(), Some("1.23"));
    assert!(e.timestamp.ends_with('Z'));
    assert!(chrono::DateTime::parse_from_rfc3339(&e.timestamp).is_ok());

    let json = serde_json::to_value(&e).unwrap();
    assert_eq!(json["duration"], "1.23");
}

#[tokio::test]
async fn truncated_history_file_is_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, r#"{"history": [trunc"#).unwrap();
    let log = HistoryLog::spawn(Arc::new(crate::store::JsonFileStore::new(&path)));

    assert_eq!(log.append(entry(1)).await.unwrap(), 1);
    assert_eq!(log.list().await.unwrap(), vec![entry(1)]);

    std::fs::write(&path, r#"{"history": [trunc"#).unwrap();
    assert!(log.clear(|| true).await.unwrap());
    assert!(log.list().await.unwrap().is_empty());
}
