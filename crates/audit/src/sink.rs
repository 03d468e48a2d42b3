use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::events::AuditRecord;

/// Write-once destination for audit records. Implementations must be
/// append-only; there is deliberately no update or delete method.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<()>;
}

/// JSONL-backed audit sink, one record per line.
#[derive(Debug, Clone)]
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back, oldest first. Corrupt lines are skipped with
    /// a warning so one bad write never hides the rest of the trail.
    pub fn load(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = OpenOptions::new().read(true).open(&self.path)?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();

        for (line_idx, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(
                        line = line_idx + 1,
                        error = %err,
                        path = %self.path.display(),
                        "corrupt audit record — skipping line"
                    );
                }
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = serde_json::to_string(record)?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        // Flush userspace buffers and fsync so the record survives a crash
        // immediately after append.
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

/// In-memory sink for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("audit sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: &AuditRecord) -> Result<()> {
        self.records
            .lock()
            .expect("audit sink lock poisoned")
            .push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MetricsSnapshot;
    use crate::tier_change;

    fn make_record(member: &str) -> AuditRecord {
        tier_change(
            "test",
            member,
            "c-1",
            "seedling",
            "growing",
            vec!["growing-member".to_string()],
            vec![],
            MetricsSnapshot::default(),
        )
    }

    #[tokio::test]
    async fn append_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit.jsonl"));
        sink.append(&make_record("m-1")).await.unwrap();
        sink.append(&make_record("m-2")).await.unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
        let AuditRecord::TierChange(first) = &records[0] else {
            panic!("expected tier change");
        };
        assert_eq!(first.member_id, "m-1");
    }

    #[tokio::test]
    async fn load_skips_corrupt_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path);
        sink.append(&make_record("m-1")).await.unwrap();
        tokio::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .await
            .unwrap()
            .write_all(b"not json\n")
            .await
            .unwrap();
        sink.append(&make_record("m-2")).await.unwrap();

        let records = sink.load().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test]
    async fn memory_sink_keeps_insertion_order() {
        let sink = MemoryAuditSink::new();
        sink.append(&make_record("m-1")).await.unwrap();
        sink.append(&make_record("m-2")).await.unwrap();
        let records = sink.records();
        assert_eq!(records.len(), 2);
        let AuditRecord::TierChange(last) = &records[1] else {
            panic!("expected tier change");
        };
        assert_eq!(last.member_id, "m-2");
    }

    #[test]
    fn load_missing_file_is_empty() {
        let sink = JsonlAuditSink::new("/nonexistent/grove-audit-test.jsonl");
        assert!(sink.load().unwrap().is_empty());
    }
}
