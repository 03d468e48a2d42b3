//! Two-stage tier resolution.
//!
//! Stage A derives a quick target tier from level and activity score alone.
//! Stage B then checks the full criteria table for that target; every
//! threshold must hold or the member stays where they are. The two stages
//! are tuned independently and can disagree — Stage A is kept as a cheap
//! pre-filter, Stage B is the authoritative gate.
//!
//! Promotion is monotonic up-only: a target at or below the current tier is
//! never acted on, and nothing here can lower a tier.

use grove_audit::MetricsSnapshot;
use tracing::debug;

use crate::criteria::CriteriaTable;
use crate::schema::Tier;

/// Outcome of resolving one member against the tier policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Stage A and Stage B both admit a higher tier.
    Promote { from: Tier, to: Tier },
    /// Stage A admitted a higher tier but Stage B rejected it; `unmet` lists
    /// the failing threshold slugs.
    NotEligible {
        target: Tier,
        unmet: Vec<&'static str>,
    },
    /// The member already holds the target tier or a higher one.
    AtOrAboveTarget { target: Tier },
}

impl Resolution {
    pub fn is_promotion(&self) -> bool {
        matches!(self, Self::Promote { .. })
    }
}

/// Stage A: quick target from level and score only.
pub fn stage_a_target(level: u32, activity_score: u32) -> Tier {
    if level >= 51 && activity_score >= 70 {
        Tier::Harvested
    } else if level >= 26 && activity_score >= 50 {
        Tier::Established
    } else if level >= 11 && activity_score >= 30 {
        Tier::Growing
    } else {
        Tier::Seedling
    }
}

/// Run both stages for a member currently holding `current`.
pub fn resolve(current: Tier, metrics: &MetricsSnapshot, criteria: &CriteriaTable) -> Resolution {
    let target = stage_a_target(metrics.level, metrics.activity_score);

    if target <= current {
        return Resolution::AtOrAboveTarget { target };
    }

    let unmet = criteria.for_tier(target).unmet(metrics);
    if !unmet.is_empty() {
        debug!(
            target = target.slug(),
            ?unmet,
            level = metrics.level,
            score = metrics.activity_score,
            "stage B rejected stage A target"
        );
        return Resolution::NotEligible { target, unmet };
    }

    Resolution::Promote {
        from: current,
        to: target,
    }
}
