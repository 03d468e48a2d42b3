use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Identifiers ───────────────────────────────────────────────────────────────

/// Identity of a community (the scope within which progression is tracked).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommunityId(pub String);

/// Identity of a member within a community.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(pub String);

impl CommunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl MemberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Tiers ─────────────────────────────────────────────────────────────────────

/// Progression tiers from newest to most senior.
///
/// | Tier          | Meaning                                              |
/// |---------------|------------------------------------------------------|
/// | `Seedling`    | Freshly verified, no sustained engagement yet        |
/// | `Growing`     | Regular participant                                  |
/// | `Established` | Long-standing, high-engagement member                |
/// | `Harvested`   | Top tier: veteran with deep, sustained contribution  |
///
/// The derived `Ord` follows declaration order; promotion is monotonic
/// up-only, so a member's tier never decreases through the resolver path.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Seedling,
    Growing,
    Established,
    Harvested,
}

impl Tier {
    pub const ALL: [Tier; 4] = [
        Tier::Seedling,
        Tier::Growing,
        Tier::Established,
        Tier::Harvested,
    ];

    /// Canonical display label used in CLI output and log lines.
    pub fn label(self) -> &'static str {
        match self {
            Self::Seedling => "Seedling",
            Self::Growing => "Growing",
            Self::Established => "Established",
            Self::Harvested => "Harvested",
        }
    }

    /// Kebab-case slug used for config keys, audit records, and log lines.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Seedling => "seedling",
            Self::Growing => "growing",
            Self::Established => "established",
            Self::Harvested => "harvested",
        }
    }

    /// Parse a tier from its label or slug (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seedling" => Some(Self::Seedling),
            "growing" => Some(Self::Growing),
            "established" => Some(Self::Established),
            "harvested" => Some(Self::Harvested),
            _ => None,
        }
    }

    /// The next tier up, or `None` at the top.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Seedling => Some(Self::Growing),
            Self::Growing => Some(Self::Established),
            Self::Established => Some(Self::Harvested),
            Self::Harvested => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ── Activity events ───────────────────────────────────────────────────────────

/// Every kind of engagement the engine awards XP for.
///
/// A closed enum rather than an open string table: a new activity source has
/// to be added here, which forces the XP value and counter wiring to be
/// decided at compile time instead of silently defaulting to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivityKind {
    Message,
    VoiceMinute,
    ReactionReceived,
    ThreadStarted,
    EventAttended,
}

impl ActivityKind {
    pub const ALL: [ActivityKind; 5] = [
        ActivityKind::Message,
        ActivityKind::VoiceMinute,
        ActivityKind::ReactionReceived,
        ActivityKind::ThreadStarted,
        ActivityKind::EventAttended,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::VoiceMinute => "voice-minute",
            Self::ReactionReceived => "reaction-received",
            Self::ThreadStarted => "thread-started",
            Self::EventAttended => "event-attended",
        }
    }

    pub fn from_slug(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "message" => Some(Self::Message),
            "voice-minute" | "voice_minute" | "voice" => Some(Self::VoiceMinute),
            "reaction-received" | "reaction_received" | "reaction" => {
                Some(Self::ReactionReceived)
            }
            "thread-started" | "thread_started" | "thread" => Some(Self::ThreadStarted),
            "event-attended" | "event_attended" | "event" => Some(Self::EventAttended),
            _ => None,
        }
    }
}

/// A single raw engagement event submitted by an upstream handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub member_id: MemberId,
    pub community_id: CommunityId,
    pub timestamp: DateTime<Utc>,
}

// ── Member record ─────────────────────────────────────────────────────────────

/// Progression state for one member in one community.
///
/// Counters and `total_xp` are non-decreasing; `tier` changes only through
/// the resolver + reconciler path. Members are deactivated on leave, never
/// deleted, so the audit trail stays resolvable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub member_id: MemberId,
    pub community_id: CommunityId,
    pub total_xp: u64,
    pub current_level: u32,
    pub tier: Tier,
    pub messages_count: u64,
    pub voice_minutes: u64,
    pub reactions_received: u64,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub deactivated: bool,
    #[serde(default)]
    pub assigned_capabilities: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    /// Fresh record for a member seen for the first time. Verification state
    /// comes from the external identity flow; `verified_at` is stamped here
    /// when the caller says the member is already verified.
    pub fn new(member_id: MemberId, community_id: CommunityId, verified: bool) -> Self {
        let now = Utc::now();
        Self {
            member_id,
            community_id,
            total_xp: 0,
            current_level: 1,
            tier: Tier::Seedling,
            messages_count: 0,
            voice_minutes: 0,
            reactions_received: 0,
            verified,
            verified_at: verified.then_some(now),
            last_activity_at: now,
            deactivated: false,
            assigned_capabilities: BTreeSet::new(),
            created_at: now,
        }
    }

    /// Storage key: progression is tracked per community, so the same person
    /// in two communities is two independent members.
    pub fn key(&self) -> (MemberId, CommunityId) {
        (self.member_id.clone(), self.community_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_matches_seniority() {
        assert!(Tier::Seedling < Tier::Growing);
        assert!(Tier::Growing < Tier::Established);
        assert!(Tier::Established < Tier::Harvested);
    }

    #[test]
    fn tier_label_slug_round_trip() {
        for tier in Tier::ALL {
            assert_eq!(Tier::from_label(tier.label()), Some(tier));
            assert_eq!(Tier::from_label(tier.slug()), Some(tier));
        }
        assert_eq!(Tier::from_label("sprout"), None);
    }

    #[test]
    fn tier_next_walks_up_and_stops() {
        assert_eq!(Tier::Seedling.next(), Some(Tier::Growing));
        assert_eq!(Tier::Harvested.next(), None);
    }

    #[test]
    fn activity_kind_slug_round_trip() {
        for kind in ActivityKind::ALL {
            assert_eq!(ActivityKind::from_slug(kind.slug()), Some(kind));
        }
        assert_eq!(ActivityKind::from_slug("voice_minute"), Some(ActivityKind::VoiceMinute));
        assert_eq!(ActivityKind::from_slug("boost"), None);
    }

    #[test]
    fn new_member_starts_at_seedling() {
        let member = Member::new(MemberId::new("m-1"), CommunityId::new("c-1"), true);
        assert_eq!(member.tier, Tier::Seedling);
        assert_eq!(member.current_level, 1);
        assert_eq!(member.total_xp, 0);
        assert!(member.verified_at.is_some());
        assert!(!member.deactivated);
    }

    #[test]
    fn unverified_member_has_no_verified_at() {
        let member = Member::new(MemberId::new("m-1"), CommunityId::new("c-1"), false);
        assert!(member.verified_at.is_none());
    }
}
