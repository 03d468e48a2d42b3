//! Per-tier promotion thresholds (the Stage B gate).
//!
//! The compiled-in table is the source of truth; deployments tune individual
//! thresholds through `[progression.criteria.<tier>]` config overrides.

use grove_audit::MetricsSnapshot;
use grove_config::ProgressionConfig;

use crate::schema::Tier;

/// Detailed thresholds a member must meet to hold a tier. All thresholds are
/// inclusive minimums; `None` means the tier does not gate on that counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierCriteria {
    pub min_level: u32,
    pub min_days_active: u32,
    pub min_messages: u64,
    pub min_xp: u64,
    pub min_voice_minutes: Option<u64>,
    pub min_reactions: Option<u64>,
}

impl TierCriteria {
    /// Threshold slugs unmet by `metrics`, in a stable order. Empty means
    /// eligible.
    pub fn unmet(&self, metrics: &MetricsSnapshot) -> Vec<&'static str> {
        let mut unmet = Vec::new();
        if metrics.level < self.min_level {
            unmet.push("level");
        }
        if metrics.days_active < self.min_days_active {
            unmet.push("days_active");
        }
        if metrics.messages < self.min_messages {
            unmet.push("messages");
        }
        if metrics.total_xp < self.min_xp {
            unmet.push("xp");
        }
        if let Some(min_voice) = self.min_voice_minutes {
            if metrics.voice_minutes < min_voice {
                unmet.push("voice_minutes");
            }
        }
        if let Some(min_reactions) = self.min_reactions {
            if metrics.reactions < min_reactions {
                unmet.push("reactions");
            }
        }
        unmet
    }
}

/// Compiled-in defaults per tier.
pub fn default_criteria(tier: Tier) -> TierCriteria {
    match tier {
        // Seedling is the floor every verified member holds.
        Tier::Seedling => TierCriteria {
            min_level: 1,
            min_days_active: 0,
            min_messages: 0,
            min_xp: 0,
            min_voice_minutes: None,
            min_reactions: None,
        },
        Tier::Growing => TierCriteria {
            min_level: 11,
            min_days_active: 7,
            min_messages: 30,
            min_xp: 500,
            min_voice_minutes: None,
            min_reactions: None,
        },
        Tier::Established => TierCriteria {
            min_level: 26,
            min_days_active: 30,
            min_messages: 200,
            min_xp: 1_500,
            min_voice_minutes: Some(300),
            min_reactions: None,
        },
        Tier::Harvested => TierCriteria {
            min_level: 51,
            min_days_active: 90,
            min_messages: 1_000,
            min_xp: 4_000,
            min_voice_minutes: Some(1_200),
            min_reactions: Some(500),
        },
    }
}

/// Runtime criteria table: compiled-in defaults with config overrides merged
/// in at construction. Immutable afterwards.
#[derive(Debug, Clone)]
pub struct CriteriaTable {
    entries: [TierCriteria; 4],
}

impl Default for CriteriaTable {
    fn default() -> Self {
        Self {
            entries: Tier::ALL.map(default_criteria),
        }
    }
}

impl CriteriaTable {
    pub fn from_config(config: &ProgressionConfig) -> Self {
        let entries = Tier::ALL.map(|tier| {
            let mut criteria = default_criteria(tier);
            if let Some(over) = config.criteria.get(tier.slug()) {
                if let Some(v) = over.min_level {
                    criteria.min_level = v;
                }
                if let Some(v) = over.min_days_active {
                    criteria.min_days_active = v;
                }
                if let Some(v) = over.min_messages {
                    criteria.min_messages = v;
                }
                if let Some(v) = over.min_xp {
                    criteria.min_xp = v;
                }
                if let Some(v) = over.min_voice_minutes {
                    criteria.min_voice_minutes = Some(v);
                }
                if let Some(v) = over.min_reactions {
                    criteria.min_reactions = Some(v);
                }
            }
            criteria
        });
        Self { entries }
    }

    pub fn for_tier(&self, tier: Tier) -> &TierCriteria {
        &self.entries[tier as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> MetricsSnapshot {
        MetricsSnapshot {
            total_xp: 600,
            level: 12,
            activity_score: 35,
            messages: 40,
            voice_minutes: 0,
            reactions: 0,
            days_active: 10,
        }
    }

    #[test]
    fn seedling_has_no_real_gate() {
        let table = CriteriaTable::default();
        let empty = MetricsSnapshot {
            level: 1,
            ..Default::default()
        };
        assert!(table.for_tier(Tier::Seedling).unmet(&empty).is_empty());
    }

    #[test]
    fn growing_gate_passes_reference_metrics() {
        let table = CriteriaTable::default();
        assert!(table.for_tier(Tier::Growing).unmet(&metrics()).is_empty());
    }

    #[test]
    fn growing_gate_reports_days_active() {
        let table = CriteriaTable::default();
        let mut m = metrics();
        m.days_active = 3;
        assert_eq!(table.for_tier(Tier::Growing).unmet(&m), vec!["days_active"]);
    }

    #[test]
    fn optional_thresholds_only_gate_when_set() {
        let table = CriteriaTable::default();
        // Growing has no voice threshold; Established does.
        let mut m = metrics();
        m.level = 30;
        m.days_active = 60;
        m.messages = 500;
        m.total_xp = 2_000;
        m.voice_minutes = 0;
        assert!(table.for_tier(Tier::Growing).unmet(&m).is_empty());
        assert_eq!(
            table.for_tier(Tier::Established).unmet(&m),
            vec!["voice_minutes"]
        );
    }

    #[test]
    fn config_overrides_merge_over_defaults() {
        let mut config = ProgressionConfig::default();
        config.criteria.insert(
            "growing".to_string(),
            grove_config::CriteriaOverride {
                min_days_active: Some(14),
                ..Default::default()
            },
        );
        let table = CriteriaTable::from_config(&config);
        let growing = table.for_tier(Tier::Growing);
        assert_eq!(growing.min_days_active, 14);
        // untouched fields keep their defaults
        assert_eq!(growing.min_level, 11);
        assert_eq!(growing.min_xp, 500);
    }

    #[test]
    fn unmet_lists_every_failing_threshold() {
        let table = CriteriaTable::default();
        let unmet = table
            .for_tier(Tier::Harvested)
            .unmet(&MetricsSnapshot::default());
        assert_eq!(
            unmet,
            vec![
                "level",
                "days_active",
                "messages",
                "xp",
                "voice_minutes",
                "reactions"
            ]
        );
    }
}
