//! JSONL-backed member store.
//!
//! The full member set is held in memory and mirrored to a snapshot file,
//! one member per line. Every upsert rewrites the snapshot atomically:
//! content goes to a `.tmp` sibling, is fsync'd, then renamed over the
//! original, so a crash at any point leaves either the old or the new file
//! intact — never a torn one.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::schema::{CommunityId, Member, MemberId};
use crate::store::MemberStore;

pub struct JsonlMemberStore {
    path: PathBuf,
    members: Mutex<HashMap<(MemberId, CommunityId), Member>>,
}

impl JsonlMemberStore {
    /// Open the store, replaying the snapshot if one exists. Corrupt lines
    /// are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut members = HashMap::new();

        if path.exists() {
            let file = OpenOptions::new()
                .read(true)
                .open(&path)
                .with_context(|| format!("opening member snapshot {}", path.display()))?;
            let reader = BufReader::new(file);
            for (line_idx, line_result) in reader.lines().enumerate() {
                let line = line_result?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Member>(&line) {
                    Ok(member) => {
                        members.insert(member.key(), member);
                    }
                    Err(err) => {
                        warn!(
                            line = line_idx + 1,
                            error = %err,
                            path = %path.display(),
                            "corrupt member record — skipping line"
                        );
                    }
                }
            }
            info!(
                members = members.len(),
                path = %path.display(),
                "member snapshot loaded"
            );
        }

        Ok(Self {
            path,
            members: Mutex::new(members),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.members.lock().expect("member store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn rewrite_snapshot(&self, snapshot: Vec<Member>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp_path = {
            let filename = self
                .path
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "members.jsonl".to_string());
            self.path.with_file_name(format!("{filename}.tmp"))
        };

        let write_result: Result<()> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .await?;
            for member in &snapshot {
                let line = serde_json::to_string(member)?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
            }
            file.flush().await?;
            file.sync_all().await?;
            Ok(())
        }
        .await;

        if let Err(err) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(err) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        Ok(())
    }

    fn snapshot(&self) -> Vec<Member> {
        let members = self.members.lock().expect("member store lock poisoned");
        let mut snapshot: Vec<Member> = members.values().cloned().collect();
        snapshot.sort_by(|a, b| a.key().cmp(&b.key()));
        snapshot
    }
}

#[async_trait]
impl MemberStore for JsonlMemberStore {
    async fn get(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
    ) -> Result<Option<Member>> {
        let members = self.members.lock().expect("member store lock poisoned");
        Ok(members
            .get(&(member_id.clone(), community_id.clone()))
            .cloned())
    }

    async fn upsert(&self, member: &Member) -> Result<()> {
        {
            let mut members = self.members.lock().expect("member store lock poisoned");
            members.insert(member.key(), member.clone());
        }
        self.rewrite_snapshot(self.snapshot()).await
    }

    async fn list_for_community(&self, community_id: &CommunityId) -> Result<Vec<Member>> {
        let members = self.members.lock().expect("member store lock poisoned");
        let mut result: Vec<Member> = members
            .values()
            .filter(|m| &m.community_id == community_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.member_id.cmp(&b.member_id));
        Ok(result)
    }
}
