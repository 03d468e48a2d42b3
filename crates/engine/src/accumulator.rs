//! Activity & XP accumulation.
//!
//! Converts one [`ActivityEvent`] into XP and counter deltas on a member
//! record. Tier decisions never happen here — the accumulator only feeds the
//! numbers the resolver reads later.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use grove_config::ProgressionConfig;
use tracing::{debug, trace};

use crate::progress::level_for_xp;
use crate::schema::{ActivityEvent, ActivityKind, Member};

/// Caller-supplied validity check run before any XP is granted (e.g. a
/// per-channel cooldown, or spam heuristics owned by the ingestion layer).
/// Returning `false` rejects the event with zero side effects.
pub type ActivityGate = Arc<dyn Fn(&Member, &ActivityEvent) -> bool + Send + Sync>;

/// Outcome of submitting one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AwardOutcome {
    pub accepted: bool,
    pub xp_awarded: u64,
}

impl AwardOutcome {
    pub fn rejected() -> Self {
        Self {
            accepted: false,
            xp_awarded: 0,
        }
    }
}

/// XP granted per activity kind. Compiled-in defaults, with per-kind config
/// overrides merged at construction; immutable afterwards.
#[derive(Debug, Clone)]
pub struct XpTable {
    values: [u64; 5],
}

fn default_xp(kind: ActivityKind) -> u64 {
    match kind {
        ActivityKind::Message => 10,
        ActivityKind::VoiceMinute => 5,
        ActivityKind::ReactionReceived => 5,
        ActivityKind::ThreadStarted => 25,
        ActivityKind::EventAttended => 50,
    }
}

impl Default for XpTable {
    fn default() -> Self {
        Self {
            values: ActivityKind::ALL.map(default_xp),
        }
    }
}

impl XpTable {
    pub fn from_config(config: &ProgressionConfig) -> Self {
        let values = ActivityKind::ALL.map(|kind| {
            config
                .xp
                .get(kind.slug())
                .copied()
                .unwrap_or_else(|| default_xp(kind))
        });
        Self { values }
    }

    pub fn xp_for(&self, kind: ActivityKind) -> u64 {
        self.values[kind as usize]
    }
}

/// Apply one event to a member record.
///
/// Rejections (gate refusal, future-dated timestamp, unverified member) leave
/// the record untouched. Acceptance bumps `total_xp`, the matching counter,
/// `last_activity_at`, and the derived level.
pub fn award(
    member: &mut Member,
    event: &ActivityEvent,
    table: &XpTable,
    gate: Option<&ActivityGate>,
    future_skew: Duration,
    now: DateTime<Utc>,
) -> AwardOutcome {
    if member.deactivated || !member.verified {
        trace!(member = %member.member_id, "event from inactive or unverified member rejected");
        return AwardOutcome::rejected();
    }

    if event.timestamp > now + future_skew {
        debug!(
            member = %member.member_id,
            timestamp = %event.timestamp,
            "event timestamp beyond skew window — rejected"
        );
        return AwardOutcome::rejected();
    }

    if let Some(gate) = gate {
        if !gate(member, event) {
            trace!(member = %member.member_id, kind = event.kind.slug(), "event gated");
            return AwardOutcome::rejected();
        }
    }

    let xp = table.xp_for(event.kind);
    member.total_xp = member.total_xp.saturating_add(xp);
    match event.kind {
        ActivityKind::Message => member.messages_count += 1,
        ActivityKind::VoiceMinute => member.voice_minutes += 1,
        ActivityKind::ReactionReceived => member.reactions_received += 1,
        // XP-only kinds: no dedicated counter.
        ActivityKind::ThreadStarted | ActivityKind::EventAttended => {}
    }
    member.last_activity_at = event.timestamp;
    member.current_level = level_for_xp(member.total_xp);

    trace!(
        member = %member.member_id,
        kind = event.kind.slug(),
        xp,
        total_xp = member.total_xp,
        level = member.current_level,
        "activity accepted"
    );

    AwardOutcome {
        accepted: true,
        xp_awarded: xp,
    }
}
