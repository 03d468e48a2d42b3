//! File-backed capability store for local and single-host deployments.
//!
//! Production deployments point the engine at the platform's role API; this
//! store keeps grants in a JSON map beside the other engine state so the CLI
//! works end to end without one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;

use grove_engine::{CapabilityStore, MemberId};

pub struct FileCapabilityStore {
    path: PathBuf,
    grants: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl FileCapabilityStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let grants = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading capability store {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing capability store {}", path.display()))?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            grants: Mutex::new(grants),
        })
    }

    fn persist(&self, grants: &BTreeMap<String, BTreeSet<String>>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(grants)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing capability store {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl CapabilityStore for FileCapabilityStore {
    async fn grant(&self, member_id: &MemberId, capability_id: &str, _reason: &str) -> Result<()> {
        let mut grants = self.grants.lock().expect("capability store lock poisoned");
        grants
            .entry(member_id.as_str().to_string())
            .or_default()
            .insert(capability_id.to_string());
        self.persist(&grants)
    }

    async fn revoke(&self, member_id: &MemberId, capability_id: &str, _reason: &str) -> Result<()> {
        let mut grants = self.grants.lock().expect("capability store lock poisoned");
        if let Some(set) = grants.get_mut(member_id.as_str()) {
            set.remove(capability_id);
        }
        self.persist(&grants)
    }

    async fn list_grants(&self, member_id: &MemberId) -> Result<Vec<String>> {
        let grants = self.grants.lock().expect("capability store lock poisoned");
        Ok(grants
            .get(member_id.as_str())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grants_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        let id = MemberId::new("m-1");

        let store = FileCapabilityStore::open(&path).unwrap();
        store.grant(&id, "growing-member", "promotion").await.unwrap();

        let reopened = FileCapabilityStore::open(&path).unwrap();
        assert_eq!(reopened.list_grants(&id).await.unwrap(), vec!["growing-member"]);
    }

    #[tokio::test]
    async fn revoke_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capabilities.json");
        let id = MemberId::new("m-1");

        let store = FileCapabilityStore::open(&path).unwrap();
        store.grant(&id, "growing-member", "r").await.unwrap();
        store.revoke(&id, "growing-member", "r").await.unwrap();

        let reopened = FileCapabilityStore::open(&path).unwrap();
        assert!(reopened.list_grants(&id).await.unwrap().is_empty());
    }
}
