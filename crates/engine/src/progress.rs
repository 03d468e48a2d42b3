//! Pure derivations over a member snapshot: level from XP, the capped
//! composite activity score, and days active since verification.
//!
//! Nothing here touches storage or tiers; the resolver consumes these
//! numbers through a [`MetricsSnapshot`].

use chrono::{DateTime, Utc};
use grove_audit::MetricsSnapshot;

use crate::schema::Member;

/// Highest level the table reaches; XP beyond this stays at `MAX_LEVEL`.
pub const MAX_LEVEL: u32 = 100;

/// Total XP required to hold `level`.
///
/// A step table rather than a closed formula: cheap 50-XP steps through the
/// early levels, then progressively steeper bands so senior levels represent
/// sustained engagement.
pub fn xp_threshold(level: u32) -> u64 {
    match level {
        0 | 1 => 0,
        2..=12 => 50 * u64::from(level),
        13..=25 => 600 + 75 * u64::from(level - 12),
        26..=50 => 1_575 + 100 * u64::from(level - 25),
        _ => 4_075 + 150 * u64::from(level.min(MAX_LEVEL) - 50),
    }
}

/// Monotonic step function from total XP to level. Always ≥ 1.
pub fn level_for_xp(total_xp: u64) -> u32 {
    let mut level = 1;
    while level < MAX_LEVEL && total_xp >= xp_threshold(level + 1) {
        level += 1;
    }
    level
}

/// XP still needed to reach the next level; `None` at `MAX_LEVEL`.
pub fn xp_to_next_level(total_xp: u64) -> Option<u64> {
    let level = level_for_xp(total_xp);
    if level >= MAX_LEVEL {
        return None;
    }
    Some(xp_threshold(level + 1).saturating_sub(total_xp))
}

/// Weighted composite engagement score, capped at 100.
///
/// Each term is capped independently and the caps sum to 100, so the score
/// is non-decreasing in every counter and never exceeds 100:
///
/// | Term               | Weight | Saturates at     |
/// |--------------------|--------|------------------|
/// | messages / 10      | 30     | 300 messages     |
/// | voice minutes / 60 | 25     | 1 500 minutes    |
/// | reactions / 5      | 20     | 100 reactions    |
/// | total XP / 1000    | 25     | 25 000 XP        |
pub fn activity_score(member: &Member) -> u32 {
    let score = (member.messages_count as f64 / 10.0).min(30.0)
        + (member.voice_minutes as f64 / 60.0).min(25.0)
        + (member.reactions_received as f64 / 5.0).min(20.0)
        + (member.total_xp as f64 / 1_000.0).min(25.0);
    score.floor() as u32
}

/// Whole days since verification. Unverified members report 0, which blocks
/// any promotion above Seedling at the criteria gate.
pub fn days_active(member: &Member, now: DateTime<Utc>) -> u32 {
    match member.verified_at {
        Some(verified_at) => {
            let days = (now - verified_at).num_days();
            days.max(0).min(i64::from(u32::MAX)) as u32
        }
        None => 0,
    }
}

/// Capture everything the resolver and audit trail need in one snapshot.
pub fn snapshot(member: &Member, now: DateTime<Utc>) -> MetricsSnapshot {
    MetricsSnapshot {
        total_xp: member.total_xp,
        level: level_for_xp(member.total_xp),
        activity_score: activity_score(member),
        messages: member.messages_count,
        voice_minutes: member.voice_minutes,
        reactions: member.reactions_received,
        days_active: days_active(member, now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::schema::{CommunityId, Member, MemberId};

    fn member() -> Member {
        Member::new(MemberId::new("m-1"), CommunityId::new("c-1"), true)
    }

    #[test]
    fn level_one_at_zero_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
    }

    #[test]
    fn level_twelve_at_six_hundred_xp() {
        assert_eq!(level_for_xp(599), 11);
        assert_eq!(level_for_xp(600), 12);
        assert_eq!(level_for_xp(649), 12);
    }

    #[test]
    fn level_table_is_monotonic() {
        let mut previous = 0;
        for xp in (0..20_000).step_by(37) {
            let level = level_for_xp(xp);
            assert!(level >= previous, "level regressed at xp={xp}");
            previous = level;
        }
        assert_eq!(level_for_xp(u64::MAX), MAX_LEVEL);
    }

    #[test]
    fn thresholds_are_strictly_increasing() {
        for level in 2..=MAX_LEVEL {
            assert!(
                xp_threshold(level) > xp_threshold(level - 1),
                "threshold not increasing at level {level}"
            );
        }
    }

    #[test]
    fn xp_to_next_level_reaches_zero_at_cap() {
        assert_eq!(xp_to_next_level(0), Some(100));
        assert_eq!(xp_to_next_level(599), Some(1));
        assert_eq!(xp_to_next_level(xp_threshold(MAX_LEVEL)), None);
    }

    #[test]
    fn score_is_zero_for_fresh_member() {
        assert_eq!(activity_score(&member()), 0);
    }

    #[test]
    fn score_never_exceeds_one_hundred() {
        let mut m = member();
        m.messages_count = 1_000_000;
        m.voice_minutes = 1_000_000;
        m.reactions_received = 1_000_000;
        m.total_xp = u64::MAX / 2;
        assert_eq!(activity_score(&m), 100);
    }

    #[test]
    fn score_is_monotonic_in_every_counter() {
        let mut m = member();
        m.messages_count = 40;
        m.voice_minutes = 120;
        m.reactions_received = 15;
        m.total_xp = 2_500;
        let base = activity_score(&m);

        for bump in [
            |m: &mut Member| m.messages_count += 100,
            |m: &mut Member| m.voice_minutes += 100,
            |m: &mut Member| m.reactions_received += 100,
            |m: &mut Member| m.total_xp += 5_000,
        ] {
            let mut bumped = m.clone();
            bump(&mut bumped);
            assert!(activity_score(&bumped) >= base);
        }
    }

    #[test]
    fn score_floors_fractional_sum() {
        let mut m = member();
        m.messages_count = 40; // 4.0
        m.total_xp = 600; // 0.6
        assert_eq!(activity_score(&m), 4);
    }

    #[test]
    fn days_active_zero_without_verification() {
        let mut m = member();
        m.verified_at = None;
        assert_eq!(days_active(&m, Utc::now()), 0);
    }

    #[test]
    fn days_active_counts_whole_days() {
        let mut m = member();
        let now = Utc::now();
        m.verified_at = Some(now - Duration::days(10) - Duration::hours(5));
        assert_eq!(days_active(&m, now), 10);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let mut m = member();
        m.messages_count = 40;
        m.total_xp = 600;
        m.verified_at = Some(Utc::now() - Duration::days(10));
        let snap = snapshot(&m, Utc::now());
        assert_eq!(snap.level, 12);
        assert_eq!(snap.activity_score, 4);
        assert_eq!(snap.days_active, 10);
        assert_eq!(snap.messages, 40);
    }
}
