//! Real-time promotion queue.
//!
//! An in-memory map keyed by `(member, community)`: enqueueing the same
//! member again overwrites the pending item (last reason wins), so a burst
//! of activity produces exactly one re-check. The queue is deliberately not
//! durable — a restart drops pending items and the batch sweep, as the
//! system of record, re-examines every member anyway.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::schema::{CommunityId, MemberId};

/// One pending re-check request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub member_id: MemberId,
    pub community_id: CommunityId,
    pub reason: String,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PromotionQueue {
    items: Mutex<HashMap<(MemberId, CommunityId), QueueItem>>,
}

impl PromotionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the pending item for this member. Idempotent.
    pub fn enqueue(
        &self,
        member_id: MemberId,
        community_id: CommunityId,
        reason: impl Into<String>,
    ) {
        let item = QueueItem {
            member_id: member_id.clone(),
            community_id: community_id.clone(),
            reason: reason.into(),
            enqueued_at: Utc::now(),
        };
        let mut items = self.items.lock().expect("queue lock poisoned");
        items.insert((member_id, community_id), item);
    }

    /// Remove and return every pending item, oldest first. Items are gone
    /// from the queue regardless of what the caller does with them — there
    /// is no automatic requeue on failure.
    pub fn take_all(&self) -> Vec<QueueItem> {
        let mut items = self.items.lock().expect("queue lock poisoned");
        let mut drained: Vec<QueueItem> = items.drain().map(|(_, item)| item).collect();
        drained.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.member_id.cmp(&b.member_id))
        });
        drained
    }

    pub fn len(&self) -> usize {
        self.items.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
