use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Engine paths & telemetry ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root directory for all engine state (member snapshots, audit log).
    /// Overridden at runtime by the `GROVE_DATA_DIR` environment variable.
    pub data_dir: String,
    /// Append-only audit log, relative to `data_dir` unless absolute.
    pub audit_log: String,
    /// Member snapshot file, relative to `data_dir` unless absolute.
    pub member_log: String,
    /// Default log level when `GROVE_LOG` is unset.
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: ".grove".to_string(),
            audit_log: "audit.jsonl".to_string(),
            member_log: "members.jsonl".to_string(),
            log_level: "info".to_string(),
        }
    }
}

// ── Progression tuning ────────────────────────────────────────────────────────

/// Per-tier threshold overrides exposed in `[progression.criteria.<tier>]`.
///
/// Every field is optional; unset fields fall back to the compiled-in
/// criteria table. Values are absolute thresholds, not deltas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaOverride {
    pub min_level: Option<u32>,
    pub min_days_active: Option<u32>,
    pub min_messages: Option<u64>,
    pub min_xp: Option<u64>,
    pub min_voice_minutes: Option<u64>,
    pub min_reactions: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Fixed delay between members during a sweep and between queue items
    /// during a drain. Throttles calls to the capability store; has no
    /// correctness role.
    pub inter_member_delay_ms: u64,
    /// Deadline for a single capability-store call. Expiry is recorded as a
    /// per-item failure, not a fatal error.
    pub grant_timeout_ms: u64,
    /// Events timestamped further than this into the future are rejected by
    /// the accumulator.
    pub future_skew_secs: i64,
    /// XP awarded per activity kind, keyed by the kind's slug
    /// (`message`, `voice-minute`, `reaction-received`, `thread-started`,
    /// `event-attended`). Unset kinds use the compiled-in table.
    pub xp: BTreeMap<String, u64>,
    /// Capability ids granted at each tier, keyed by tier slug. A tier with
    /// no entry grants nothing; the reconciler logs the missing mapping and
    /// skips those grants.
    pub capabilities: BTreeMap<String, Vec<String>>,
    /// Threshold overrides per tier slug, merged over the compiled-in table.
    pub criteria: BTreeMap<String, CriteriaOverride>,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        let mut capabilities = BTreeMap::new();
        capabilities.insert("growing".to_string(), vec!["growing-member".to_string()]);
        capabilities.insert(
            "established".to_string(),
            vec!["established-member".to_string(), "media-access".to_string()],
        );
        capabilities.insert(
            "harvested".to_string(),
            vec!["harvested-member".to_string(), "mentor-access".to_string()],
        );

        Self {
            inter_member_delay_ms: 150,
            grant_timeout_ms: 5_000,
            future_skew_secs: 300,
            xp: BTreeMap::new(),
            capabilities,
            criteria: BTreeMap::new(),
        }
    }
}

impl ProgressionConfig {
    /// Capability ids for a tier slug; empty when the tier has no mapping.
    pub fn capabilities_for(&self, tier_slug: &str) -> &[String] {
        self.capabilities
            .get(tier_slug)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }
}

// ── Top-level config ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub progression: ProgressionConfig,
}

impl AppConfig {
    /// Load from the default location (`grove.toml`, or `GROVE_CONFIG` when
    /// set). A missing file yields the compiled-in defaults.
    pub fn load() -> Result<Self> {
        let path = env::var("GROVE_CONFIG").unwrap_or_else(|_| "grove.toml".to_string());
        Self::load_from(path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            config = toml::from_str(&raw)
                .with_context(|| format!("parsing config file {}", path.display()))?;
        }

        if let Ok(value) = env::var("GROVE_DATA_DIR") {
            if !value.is_empty() {
                config.engine.data_dir = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = toml::to_string_pretty(self)?;
        fs::write(path, raw)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    /// Audit log path, resolving relative entries against `data_dir`.
    pub fn audit_log_path(&self) -> PathBuf {
        resolve_against_data_dir(&self.engine.data_dir, &self.engine.audit_log)
    }

    /// Member snapshot path, resolving relative entries against `data_dir`.
    pub fn member_log_path(&self) -> PathBuf {
        resolve_against_data_dir(&self.engine.data_dir, &self.engine.member_log)
    }
}

fn resolve_against_data_dir(data_dir: &str, entry: &str) -> PathBuf {
    let entry_path = Path::new(entry);
    if entry_path.is_absolute() {
        entry_path.to_path_buf()
    } else {
        Path::new(data_dir).join(entry_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.engine.data_dir, ".grove");
        assert_eq!(config.progression.inter_member_delay_ms, 150);
        assert_eq!(config.progression.capabilities_for("growing").len(), 1);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grove.toml");
        fs::write(
            &path,
            "[progression]\ninter_member_delay_ms = 5\n\n[progression.criteria.growing]\nmin_days_active = 14\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.progression.inter_member_delay_ms, 5);
        assert_eq!(config.progression.grant_timeout_ms, 5_000);
        assert_eq!(
            config
                .progression
                .criteria
                .get("growing")
                .and_then(|c| c.min_days_active),
            Some(14)
        );
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grove.toml");

        let mut config = AppConfig::default();
        config.progression.grant_timeout_ms = 1_234;
        config.progression.xp.insert("message".to_string(), 20);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.progression.grant_timeout_ms, 1_234);
        assert_eq!(loaded.progression.xp.get("message"), Some(&20));
    }

    #[test]
    fn unmapped_tier_has_no_capabilities() {
        let config = AppConfig::default();
        assert!(config.progression.capabilities_for("seedling").is_empty());
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let mut config = AppConfig::default();
        config.engine.data_dir = "/var/lib/grove".to_string();
        assert_eq!(
            config.audit_log_path(),
            Path::new("/var/lib/grove/audit.jsonl")
        );
        config.engine.audit_log = "/tmp/audit.jsonl".to_string();
        assert_eq!(config.audit_log_path(), Path::new("/tmp/audit.jsonl"));
    }
}
