//! Generation history, newest first and capped.
//!
//! Every read-modify-write goes through one writer task, so concurrent
//! appends from parallel triggers are applied in order and none is lost.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::error::StoreError;
use crate::store::KeyValueStore;

pub const HISTORY_KEY: &str = "history";
pub const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    /// Seconds with two decimals. Absent in records from older builds.
    #[serde(rename = "duration", default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<String>,
}

impl HistoryEntry {
    pub fn now(model: &str, input: &str, output: &str, elapsed: Duration) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            model: model.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            duration_secs: Some(format!("{:.2}", elapsed.as_secs_f64())),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum Command {
    Append(HistoryEntry, Reply<usize>),
    List(Reply<Vec<HistoryEntry>>),
    Clear(Reply<()>),
}

/// Handle to the history writer. Cheap to clone.
#[derive(Clone)]
pub struct HistoryLog {
    tx: mpsc::UnboundedSender<Command>,
}

impl HistoryLog {
    /// Start the writer task on the current tokio runtime.
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Append(entry, reply) => {
                        let _ = reply.send(append_to(store.as_ref(), entry));
                    }
                    Command::List(reply) => {
                        let _ = reply.send(read(store.as_ref()));
                    }
                    Command::Clear(reply) => {
                        let _ = reply.send(write(store.as_ref(), Vec::new()));
                    }
                }
            }
        });
        Self { tx }
    }

    /// Prepend `entry`, keeping the newest `MAX_HISTORY`. Returns the new size.
    pub async fn append(&self, entry: HistoryEntry) -> Result<usize, StoreError> {
        self.call(|reply| Command::Append(entry, reply)).await
    }

    pub async fn list(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        self.call(Command::List).await
    }

    /// Empty the history if `confirm` agrees. Returns whether it was cleared.
    pub async fn clear(&self, confirm: impl FnOnce() -> bool) -> Result<bool, StoreError> {
        if !confirm() {
            return Ok(false);
        }
        self.call(Command::Clear).await?;
        info!("History cleared from storage.");
        Ok(true)
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(make(reply)).map_err(|_| StoreError::Closed)?;
        rx.await.map_err(|_| StoreError::Closed)?
    }
}

fn read(store: &dyn KeyValueStore) -> Result<Vec<HistoryEntry>, StoreError> {
    match store.get(HISTORY_KEY)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(Vec::new()),
    }
}

fn write(store: &dyn KeyValueStore, entries: Vec<HistoryEntry>) -> Result<(), StoreError> {
    let mut items = Map::new();
    items.insert(HISTORY_KEY.to_string(), serde_json::to_value(entries)?);
    store.set(items)
}

fn append_to(store: &dyn KeyValueStore, entry: HistoryEntry) -> Result<usize, StoreError> {
    let mut history = read(store).unwrap_or_else(|e| {
        error!("Error reading history, starting fresh: {}", e);
        Vec::new()
    });
    history.insert(0, entry);
    history.truncate(MAX_HISTORY);
    let len = history.len();
    write(store, history)?;
    info!("Log entry added. History size: {}", len);
    Ok(len)
}

/// Human-facing rendering of one entry.
pub fn describe(entry: &HistoryEntry) -> String {
    let time = chrono::DateTime::parse_from_rfc3339(&entry.timestamp)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| entry.timestamp.clone());
    let model = if entry.model.is_empty() { "N/A" } else { entry.model.as_str() };
    let duration = entry.duration_secs.as_deref().map(|d| format!("{d}s")).unwrap_or_else(|| "N/A".into());
    format!(
        "Time: {time}\nModel: {model}\nDuration: {duration}\nInput:\n{}\nOutput:\n{}",
        entry.input, entry.output
    )
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod tests;
