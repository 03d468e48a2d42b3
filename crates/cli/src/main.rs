mod capstore;

use std::sync::Arc;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use grove_audit::{AuditRecord, JsonlAuditSink};
use grove_config::AppConfig;
use grove_engine::{
    ActivityEvent, ActivityKind, CommunityId, IntervalClass, JsonlMemberStore, MemberId,
    ProgressionEngine, SweepOutcome, progress,
};

use crate::capstore::FileCapabilityStore;

#[derive(Debug, Parser)]
#[command(
    name = "grove",
    version,
    about = "Community progression engine: XP, tiers, and capability reconciliation"
)]
struct Cli {
    /// Path to the config file (defaults to grove.toml / $GROVE_CONFIG).
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit an activity event for a member.
    Submit {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
        #[arg(long, value_enum)]
        kind: CliActivityKind,
        /// Repeat the event this many times (e.g. minutes of voice).
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Run a batch sweep over a community.
    Sweep {
        #[arg(long)]
        community: String,
        #[arg(long, value_enum, default_value = "daily")]
        class: CliIntervalClass,
    },
    /// Queue a member for a real-time re-check.
    Enqueue {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
        #[arg(long, default_value = "manual")]
        reason: String,
    },
    /// Process every queued re-check.
    Drain,
    /// Mark a member verified (creates the record when absent).
    Verify {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
    },
    /// Revoke a single capability outside the promotion flow.
    Revoke {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
        #[arg(long)]
        capability: String,
        #[arg(long, default_value = "operator action")]
        reason: String,
    },
    /// Inspect member records.
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
}

#[derive(Debug, Subcommand)]
enum MemberCommands {
    /// Show one member's progression state.
    Show {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
    },
    /// List all members of a community.
    List {
        #[arg(long)]
        community: String,
    },
    /// Exclude a departed member from future sweeps.
    Deactivate {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
    },
    /// Re-include a returning member in sweeps.
    Reactivate {
        #[arg(long)]
        community: String,
        #[arg(long)]
        member: String,
    },
}

#[derive(Debug, Subcommand)]
enum AuditCommands {
    /// Show the most recent audit records.
    Tail {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliActivityKind {
    Message,
    VoiceMinute,
    ReactionReceived,
    ThreadStarted,
    EventAttended,
}

impl From<CliActivityKind> for ActivityKind {
    fn from(kind: CliActivityKind) -> Self {
        match kind {
            CliActivityKind::Message => Self::Message,
            CliActivityKind::VoiceMinute => Self::VoiceMinute,
            CliActivityKind::ReactionReceived => Self::ReactionReceived,
            CliActivityKind::ThreadStarted => Self::ThreadStarted,
            CliActivityKind::EventAttended => Self::EventAttended,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliIntervalClass {
    Hourly,
    Daily,
    Weekly,
}

impl From<CliIntervalClass> for IntervalClass {
    fn from(class: CliIntervalClass) -> Self {
        match class {
            CliIntervalClass::Hourly => Self::Hourly,
            CliIntervalClass::Daily => Self::Daily,
            CliIntervalClass::Weekly => Self::Weekly,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GROVE_LOG")
                .unwrap_or_else(|_| EnvFilter::new(&config.engine.log_level)),
        )
        .init();

    let audit = Arc::new(JsonlAuditSink::new(config.audit_log_path()));
    let members = Arc::new(JsonlMemberStore::open(config.member_log_path())?);
    let capabilities = Arc::new(FileCapabilityStore::open(
        std::path::Path::new(&config.engine.data_dir).join("capabilities.json"),
    )?);
    let engine = ProgressionEngine::new(
        members.clone(),
        capabilities,
        audit.clone(),
        &config.progression,
    );

    match cli.command {
        Commands::Submit {
            community,
            member,
            kind,
            count,
        } => {
            if count == 0 {
                bail!("--count must be at least 1");
            }
            let mut accepted = 0u32;
            let mut xp_total = 0u64;
            for _ in 0..count {
                let outcome = engine
                    .submit(&ActivityEvent {
                        kind: kind.into(),
                        member_id: MemberId::new(&member),
                        community_id: CommunityId::new(&community),
                        timestamp: Utc::now(),
                    })
                    .await?;
                if outcome.accepted {
                    accepted += 1;
                    xp_total += outcome.xp_awarded;
                }
            }
            println!("accepted {accepted}/{count} events, {xp_total} XP awarded");
        }
        Commands::Sweep { community, class } => {
            let outcome = engine
                .run_sweep(&CommunityId::new(&community), class.into())
                .await?;
            match outcome {
                SweepOutcome::AlreadyRunning => {
                    println!("sweep for {community} already in progress");
                }
                SweepOutcome::Completed(summary) => {
                    println!(
                        "checked {} members: {} promotions, {} errors",
                        summary.total_checked,
                        summary.promotions.len(),
                        summary.errors.len()
                    );
                    for promotion in &summary.promotions {
                        println!(
                            "  {} {} -> {}",
                            promotion.member_id,
                            promotion.from.label(),
                            promotion.to.label()
                        );
                    }
                    for error in &summary.errors {
                        println!("  error: {error}");
                    }
                }
            }
        }
        Commands::Enqueue {
            community,
            member,
            reason,
        } => {
            engine.enqueue(MemberId::new(&member), CommunityId::new(&community), reason);
            println!("queued ({} pending)", engine.queue_len());
        }
        Commands::Drain => {
            let summary = engine.drain().await?;
            println!("processed {} queued items", summary.processed);
        }
        Commands::Verify { community, member } => {
            engine
                .verify(&MemberId::new(&member), &CommunityId::new(&community))
                .await?;
            println!("{member} verified in {community}");
        }
        Commands::Revoke {
            community,
            member,
            capability,
            reason,
        } => {
            engine
                .revoke_capability(
                    &MemberId::new(&member),
                    &CommunityId::new(&community),
                    &capability,
                    &reason,
                    "operator:cli",
                )
                .await?;
            println!("revoked {capability} from {member}");
        }
        Commands::Member { command } => run_member_command(&engine, &members, command).await?,
        Commands::Audit { command } => match command {
            AuditCommands::Tail { count } => {
                let records = audit.load()?;
                for record in records.iter().rev().take(count).rev() {
                    print_audit_record(record);
                }
            }
        },
    }

    Ok(())
}

async fn run_member_command(
    engine: &ProgressionEngine,
    members: &JsonlMemberStore,
    command: MemberCommands,
) -> Result<()> {
    use grove_engine::MemberStore;

    match command {
        MemberCommands::Show { community, member } => {
            let record = members
                .get(&MemberId::new(&member), &CommunityId::new(&community))
                .await?;
            let Some(record) = record else {
                bail!("member {member} not found in {community}");
            };
            let now = Utc::now();
            println!("{} @ {}", record.member_id, record.community_id);
            println!("  tier:        {}", record.tier.label());
            println!(
                "  level:       {} ({} XP, {} to next)",
                record.current_level,
                record.total_xp,
                progress::xp_to_next_level(record.total_xp)
                    .map(|xp| xp.to_string())
                    .unwrap_or_else(|| "max".to_string())
            );
            println!("  score:       {}", progress::activity_score(&record));
            println!(
                "  counters:    {} messages, {} voice minutes, {} reactions",
                record.messages_count, record.voice_minutes, record.reactions_received
            );
            println!(
                "  days active: {}",
                progress::days_active(&record, now)
            );
            println!(
                "  capabilities: {}",
                if record.assigned_capabilities.is_empty() {
                    "none".to_string()
                } else {
                    record
                        .assigned_capabilities
                        .iter()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            );
            if record.deactivated {
                println!("  (deactivated — excluded from sweeps)");
            }
        }
        MemberCommands::List { community } => {
            let listed = members
                .list_for_community(&CommunityId::new(&community))
                .await?;
            if listed.is_empty() {
                println!("no members in {community}");
            }
            for record in listed {
                println!(
                    "{}  {}  level {}  {} XP{}",
                    record.member_id,
                    record.tier.label(),
                    record.current_level,
                    record.total_xp,
                    if record.deactivated { "  [deactivated]" } else { "" }
                );
            }
        }
        MemberCommands::Deactivate { community, member } => {
            engine
                .deactivate(&MemberId::new(&member), &CommunityId::new(&community))
                .await?;
            println!("{member} deactivated");
        }
        MemberCommands::Reactivate { community, member } => {
            engine
                .reactivate(&MemberId::new(&member), &CommunityId::new(&community))
                .await?;
            println!("{member} reactivated");
        }
    }
    Ok(())
}

fn print_audit_record(record: &AuditRecord) {
    match record {
        AuditRecord::TierChange(r) => {
            println!(
                "{}  tier-change  {}  {} -> {}  granted={} failed={}  by {}",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                r.member_id,
                r.previous_tier,
                r.new_tier,
                r.granted_capabilities.len(),
                r.failed_capabilities.len(),
                r.actor
            );
        }
        AuditRecord::SweepSummary(r) => {
            println!(
                "{}  sweep  {}  {}  checked={} promotions={} errors={}",
                r.finished_at.format("%Y-%m-%d %H:%M:%S"),
                r.community_id,
                r.interval,
                r.total_checked,
                r.promotions.len(),
                r.errors.len()
            );
        }
        AuditRecord::Revocation(r) => {
            println!(
                "{}  revocation  {}  -{}  by {} ({})",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                r.member_id,
                r.capability_id,
                r.actor,
                r.reason
            );
        }
    }
}
