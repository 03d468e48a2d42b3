use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counter snapshot captured at the moment a tier decision was made.
///
/// Stored alongside the tier-change record so compliance reviews can see
/// exactly which numbers justified the promotion, independent of how the
/// member record has evolved since.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_xp: u64,
    pub level: u32,
    pub activity_score: u32,
    pub messages: u64,
    pub voice_minutes: u64,
    pub reactions: u64,
    pub days_active: u32,
}

/// One capability reconciliation that changed (or partially changed) a
/// member's tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChangeRecord {
    pub record_id: Uuid,
    /// Who drove the change: `system:sweep`, `system:queue:<reason>`, or an
    /// operator id.
    pub actor: String,
    pub member_id: String,
    pub community_id: String,
    pub previous_tier: String,
    pub new_tier: String,
    pub granted_capabilities: Vec<String>,
    pub failed_capabilities: Vec<String>,
    pub metrics: MetricsSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// A single from→to promotion counted in a sweep summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionEntry {
    pub member_id: String,
    pub from_tier: String,
    pub to_tier: String,
}

/// One completed batch sweep over a community.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRecord {
    pub record_id: Uuid,
    pub community_id: String,
    /// Interval class slug: `hourly`, `daily`, or `weekly`.
    pub interval: String,
    pub total_checked: usize,
    pub promotions: Vec<PromotionEntry>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// An explicit capability revocation, outside the promotion flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRecord {
    pub record_id: Uuid,
    pub actor: String,
    pub member_id: String,
    pub community_id: String,
    pub capability_id: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only audit entry. Immutable once written; the sink exposes no
/// update or delete surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AuditRecord {
    TierChange(TierChangeRecord),
    SweepSummary(SweepRecord),
    Revocation(RevocationRecord),
}

impl AuditRecord {
    pub fn record_id(&self) -> Uuid {
        match self {
            Self::TierChange(r) => r.record_id,
            Self::SweepSummary(r) => r.record_id,
            Self::Revocation(r) => r.record_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::TierChange(r) => r.timestamp,
            Self::SweepSummary(r) => r.finished_at,
            Self::Revocation(r) => r.timestamp,
        }
    }
}
