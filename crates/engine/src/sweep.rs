//! Batch sweep support types.
//!
//! The sweep loop itself lives on [`crate::engine::ProgressionEngine`]; this
//! module holds the interval classes, the summary types, and the
//! per-community single-flight guard.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{CommunityId, MemberId, Tier};

/// How wide a recency net the sweep casts.
///
/// | Class    | Members examined                          |
/// |----------|-------------------------------------------|
/// | `Hourly` | active within the last hour               |
/// | `Daily`  | active within the last 24 hours           |
/// | `Weekly` | every verified, non-deactivated member    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalClass {
    Hourly,
    Daily,
    Weekly,
}

impl IntervalClass {
    pub fn slug(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    /// Activity cutoff for this class; `None` means no recency filter.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Hourly => Some(now - Duration::hours(1)),
            Self::Daily => Some(now - Duration::hours(24)),
            Self::Weekly => None,
        }
    }
}

/// One promotion applied during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub member_id: MemberId,
    pub from: Tier,
    pub to: Tier,
}

/// What a completed sweep did.
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    pub total_checked: usize,
    pub promotions: Vec<Promotion>,
    pub errors: Vec<String>,
}

/// Result of asking for a sweep.
#[derive(Debug, Clone)]
pub enum SweepOutcome {
    Completed(SweepSummary),
    /// A sweep for this community is already in flight; nothing was checked.
    AlreadyRunning,
}

// ── Single-flight guard ───────────────────────────────────────────────────────

/// Tracks which communities have a sweep in flight.
///
/// Process-local only: this does not coordinate across replicas, so a
/// multi-instance deployment needs an external lock instead.
#[derive(Debug, Default, Clone)]
pub struct SweepGuard {
    in_flight: Arc<Mutex<HashSet<CommunityId>>>,
}

/// Held for the duration of one sweep; releases the community slot on drop,
/// including every early-return and error path.
pub struct SweepToken {
    guard: SweepGuard,
    community_id: CommunityId,
}

impl SweepGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the community for a sweep. `None` means one is already running.
    pub fn try_acquire(&self, community_id: &CommunityId) -> Option<SweepToken> {
        let mut in_flight = self.in_flight.lock().expect("sweep guard lock poisoned");
        if !in_flight.insert(community_id.clone()) {
            return None;
        }
        Some(SweepToken {
            guard: self.clone(),
            community_id: community_id.clone(),
        })
    }

    pub fn is_sweeping(&self, community_id: &CommunityId) -> bool {
        self.in_flight
            .lock()
            .expect("sweep guard lock poisoned")
            .contains(community_id)
    }
}

impl Drop for SweepToken {
    fn drop(&mut self) {
        self.guard
            .in_flight
            .lock()
            .expect("sweep guard lock poisoned")
            .remove(&self.community_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_and_daily_have_cutoffs_weekly_does_not() {
        let now = Utc::now();
        assert_eq!(IntervalClass::Hourly.cutoff(now), Some(now - Duration::hours(1)));
        assert_eq!(IntervalClass::Daily.cutoff(now), Some(now - Duration::hours(24)));
        assert_eq!(IntervalClass::Weekly.cutoff(now), None);
    }

    #[test]
    fn guard_blocks_second_acquire_until_dropped() {
        let guard = SweepGuard::new();
        let community = CommunityId::new("c-1");

        let token = guard.try_acquire(&community);
        assert!(token.is_some());
        assert!(guard.try_acquire(&community).is_none());
        assert!(guard.is_sweeping(&community));

        drop(token);
        assert!(!guard.is_sweeping(&community));
        assert!(guard.try_acquire(&community).is_some());
    }

    #[test]
    fn guard_is_scoped_per_community() {
        let guard = SweepGuard::new();
        let _token = guard.try_acquire(&CommunityId::new("c-1")).unwrap();
        assert!(guard.try_acquire(&CommunityId::new("c-2")).is_some());
    }
}
