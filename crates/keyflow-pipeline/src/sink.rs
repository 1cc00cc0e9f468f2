//! Credential sink
//!
//! Concurrency-safe accumulator for extracted credentials. Extract
//! tasks append from many workers at once; a mutex serializes writes.
//! Re-extraction of an item that already has an entry is skipped, so
//! the first write wins and the sink never holds two entries for the
//! same work item.

use crate::naming::WorkItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

/// Newline-delimited output file, one credential per line
pub const LINE_FILE: &str = "api_keys.txt";

/// Single-line output file, credentials joined by commas
pub const CSV_FILE: &str = "api_keys_csv.txt";

/// An extracted credential
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Work item the credential was extracted from
    pub item: WorkItem,

    /// The secret value
    pub secret: String,

    /// When the extraction happened
    pub extracted_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(item: WorkItem, secret: impl Into<String>) -> Self {
        Self {
            item,
            secret: secret.into(),
            extracted_at: Utc::now(),
        }
    }
}

/// Paths written by [`CredentialSink::flush`]
#[derive(Debug, Clone)]
pub struct OutputFiles {
    pub line_file: PathBuf,
    pub csv_file: PathBuf,
}

#[derive(Default)]
struct SinkState {
    entries: Vec<Credential>,
    seen: HashSet<WorkItem>,
}

/// Concurrency-safe credential accumulator
#[derive(Default)]
pub struct CredentialSink {
    state: Mutex<SinkState>,
}

impl CredentialSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a credential. Returns false when the work item already
    /// has an entry (the duplicate is dropped).
    pub async fn append(&self, credential: Credential) -> bool {
        let mut state = self.state.lock().await;
        if !state.seen.insert(credential.item.clone()) {
            tracing::debug!(item = %credential.item, "duplicate credential skipped");
            return false;
        }
        state.entries.push(credential);
        true
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Copy of the accumulated credentials.
    pub async fn snapshot(&self) -> Vec<Credential> {
        self.state.lock().await.entries.clone()
    }

    /// Write both output encodings from one consistent snapshot.
    ///
    /// Both files are rewritten in full each time, so calling flush at
    /// run start with an empty sink truncates leftovers from earlier
    /// runs.
    pub async fn flush(&self, dir: &Path) -> std::io::Result<OutputFiles> {
        let secrets: Vec<String> = {
            let state = self.state.lock().await;
            state.entries.iter().map(|c| c.secret.clone()).collect()
        };

        if !dir.exists() {
            fs::create_dir_all(dir).await?;
        }

        let line_file = dir.join(LINE_FILE);
        let csv_file = dir.join(CSV_FILE);

        let mut lines = secrets.join("\n");
        if !lines.is_empty() {
            lines.push('\n');
        }

        fs::write(&line_file, lines).await?;
        fs::write(&csv_file, secrets.join(",")).await?;

        tracing::debug!(
            count = secrets.len(),
            path = %line_file.display(),
            "flushed credential files"
        );

        Ok(OutputFiles {
            line_file,
            csv_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let sink = Arc::new(CredentialSink::new());

        let mut handles = Vec::new();
        for i in 0..32 {
            let sink = sink.clone();
            handles.push(tokio::spawn(async move {
                let item = WorkItem::new(format!("proj-{:03}", i));
                sink.append(Credential::new(item, format!("secret-{}", i)))
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        assert_eq!(sink.len().await, 32);

        let dir = tempdir().unwrap();
        sink.flush(dir.path()).await.unwrap();

        let lines = std::fs::read_to_string(dir.path().join(LINE_FILE)).unwrap();
        assert_eq!(lines.lines().count(), 32);

        let csv = std::fs::read_to_string(dir.path().join(CSV_FILE)).unwrap();
        assert_eq!(csv.matches(',').count(), 31);
        assert_eq!(csv.split(',').count(), 32);
    }

    #[tokio::test]
    async fn test_duplicate_item_is_skipped() {
        let sink = CredentialSink::new();
        let item = WorkItem::new("proj-001");

        assert!(sink.append(Credential::new(item.clone(), "first")).await);
        assert!(!sink.append(Credential::new(item, "second")).await);

        let snapshot = sink.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].secret, "first");
    }

    #[tokio::test]
    async fn test_flush_empty_truncates_previous_output() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(LINE_FILE), "stale-key\n").unwrap();

        let sink = CredentialSink::new();
        sink.flush(dir.path()).await.unwrap();

        let lines = std::fs::read_to_string(dir.path().join(LINE_FILE)).unwrap();
        assert!(lines.is_empty());
        let csv = std::fs::read_to_string(dir.path().join(CSV_FILE)).unwrap();
        assert!(csv.is_empty());
    }
}
