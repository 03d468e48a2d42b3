pub mod events;
pub mod sink;

use chrono::Utc;
use uuid::Uuid;

pub use events::{
    AuditRecord, MetricsSnapshot, PromotionEntry, RevocationRecord, SweepRecord, TierChangeRecord,
};
pub use sink::{AuditSink, JsonlAuditSink, MemoryAuditSink};

/// Build a tier-change record with a fresh id and the current timestamp.
#[allow(clippy::too_many_arguments)]
pub fn tier_change(
    actor: impl Into<String>,
    member_id: impl Into<String>,
    community_id: impl Into<String>,
    previous_tier: impl Into<String>,
    new_tier: impl Into<String>,
    granted_capabilities: Vec<String>,
    failed_capabilities: Vec<String>,
    metrics: MetricsSnapshot,
) -> AuditRecord {
    AuditRecord::TierChange(TierChangeRecord {
        record_id: Uuid::new_v4(),
        actor: actor.into(),
        member_id: member_id.into(),
        community_id: community_id.into(),
        previous_tier: previous_tier.into(),
        new_tier: new_tier.into(),
        granted_capabilities,
        failed_capabilities,
        metrics,
        timestamp: Utc::now(),
    })
}

/// Build a revocation record with a fresh id and the current timestamp.
pub fn revocation(
    actor: impl Into<String>,
    member_id: impl Into<String>,
    community_id: impl Into<String>,
    capability_id: impl Into<String>,
    reason: impl Into<String>,
) -> AuditRecord {
    AuditRecord::Revocation(RevocationRecord {
        record_id: Uuid::new_v4(),
        actor: actor.into(),
        member_id: member_id.into(),
        community_id: community_id.into(),
        capability_id: capability_id.into(),
        reason: reason.into(),
        timestamp: Utc::now(),
    })
}
