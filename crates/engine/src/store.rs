//! Seams to the externally held stores.
//!
//! The engine never talks to a database or a platform API directly; it goes
//! through these traits. In-memory implementations back the tests and small
//! deployments; the JSONL member store lives in [`crate::member_log`].

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::schema::{CommunityId, Member, MemberId};

/// Member record persistence.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn get(&self, member_id: &MemberId, community_id: &CommunityId)
    -> Result<Option<Member>>;
    async fn upsert(&self, member: &Member) -> Result<()>;
    async fn list_for_community(&self, community_id: &CommunityId) -> Result<Vec<Member>>;
}

/// External capability-grant store (platform roles, permission flags, …).
#[async_trait]
pub trait CapabilityStore: Send + Sync {
    async fn grant(&self, member_id: &MemberId, capability_id: &str, reason: &str) -> Result<()>;
    async fn revoke(&self, member_id: &MemberId, capability_id: &str, reason: &str) -> Result<()>;
    async fn list_grants(&self, member_id: &MemberId) -> Result<Vec<String>>;
}

// ── In-memory member store ────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryMemberStore {
    members: Mutex<HashMap<(MemberId, CommunityId), Member>>,
}

impl InMemoryMemberStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.lock().expect("member store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MemberStore for InMemoryMemberStore {
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
        let mut members = self.members.lock().expect("member store lock poisoned");
        members.insert(member.key(), member.clone());
        Ok(())
    }

    async fn list_for_community(&self, community_id: &CommunityId) -> Result<Vec<Member>> {
        let members = self.members.lock().expect("member store lock poisoned");
        let mut result: Vec<Member> = members
            .values()
            .filter(|m| &m.community_id == community_id)
            .cloned()
            .collect();
        // Deterministic order keeps sweep summaries and tests stable.
        result.sort_by(|a, b| a.member_id.cmp(&b.member_id));
        Ok(result)
    }
}

// ── In-memory capability store ────────────────────────────────────────────────

/// Capability store backed by a map, with injectable per-capability failures
/// so tests can exercise the reconciler's partial-success path.
#[derive(Debug, Default)]
pub struct InMemoryCapabilityStore {
    grants: Mutex<HashMap<MemberId, BTreeSet<String>>>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryCapabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every grant/revoke of `capability_id` fail until cleared.
    pub fn fail_capability(&self, capability_id: impl Into<String>) {
        self.failing
            .lock()
            .expect("capability store lock poisoned")
            .insert(capability_id.into());
    }

    pub fn clear_failures(&self) {
        self.failing
            .lock()
            .expect("capability store lock poisoned")
            .clear();
    }

    fn check_failure(&self, capability_id: &str) -> Result<()> {
        let failing = self.failing.lock().expect("capability store lock poisoned");
        if failing.contains(capability_id) {
            bail!("capability store unavailable for '{capability_id}'");
        }
        Ok(())
    }
}

#[async_trait]
impl CapabilityStore for InMemoryCapabilityStore {
    async fn grant(&self, member_id: &MemberId, capability_id: &str, _reason: &str) -> Result<()> {
        self.check_failure(capability_id)?;
        let mut grants = self.grants.lock().expect("capability store lock poisoned");
        grants
            .entry(member_id.clone())
            .or_default()
            .insert(capability_id.to_string());
        Ok(())
    }

    async fn revoke(&self, member_id: &MemberId, capability_id: &str, _reason: &str) -> Result<()> {
        self.check_failure(capability_id)?;
        let mut grants = self.grants.lock().expect("capability store lock poisoned");
        if let Some(set) = grants.get_mut(member_id) {
            set.remove(capability_id);
        }
        Ok(())
    }

    async fn list_grants(&self, member_id: &MemberId) -> Result<Vec<String>> {
        let grants = self.grants.lock().expect("capability store lock poisoned");
        Ok(grants
            .get(member_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}
