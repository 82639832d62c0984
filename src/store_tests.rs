use super::*;
use serde_json::json;

fn items(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => unreachable!(),
    }
}

#[test]
fn missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("settings.json"));
    assert!(store.get_all().unwrap().is_empty());
    assert_eq!(store.get("timeout").unwrap(), None);
}

#[test]
fn set_merges_into_existing_keys() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("nested").join("settings.json"));
    store.set(items(json!({"timeout": 30, "temperature": 0.5}))).unwrap();
    store.set(items(json!({"timeout": 45}))).unwrap();

    let all = store.get_all().unwrap();
    assert_eq!(all["timeout"], 45);
    assert_eq!(all["temperature"], 0.5);
}

#[test]
fn non_object_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "[1, 2]").unwrap();
    let store = JsonFileStore::new(&path);
    assert!(matches!(store.get_all(), Err(StoreError::NotAnObject(_))));
}

#[test]
fn corrupt_file_is_a_json_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    fs::write(&path, "{not json").unwrap();
    let store = JsonFileStore::new(&path);
    assert!(matches!(store.get("history"), Err(StoreError::Json(_))));
}

#[test]
fn set_recovers_from_truncated_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    fs::write(&path, r#"{"history": [trunc"#).unwrap();
    let store = JsonFileStore::new(&path);

    store.set(items(json!({"history": []}))).unwrap();
    assert_eq!(store.get("history").unwrap(), Some(json!([])));
    assert!(!dir.path().join("history.json.tmp").exists());
}

#[test]
fn set_replaces_non_object_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, "[1, 2]").unwrap();
    let store = JsonFileStore::new(&path);
    store.set(items(json!({"timeout": 30}))).unwrap();
    assert_eq!(store.get_all().unwrap().len(), 1);
}
