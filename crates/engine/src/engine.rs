//! The progression engine facade.
//!
//! Owns the store seams and drives the full path: activity submission →
//! counter updates → tier resolution → capability reconciliation → audit.
//! Both the real-time drain and the batch sweep funnel through
//! [`ProgressionEngine::check_member`], so the two paths can never disagree
//! on policy.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::{Duration, Utc};
use grove_audit::{AuditSink, PromotionEntry, SweepRecord};
use grove_config::ProgressionConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accumulator::{self, ActivityGate, AwardOutcome, XpTable};
use crate::criteria::CriteriaTable;
use crate::error::{EngineError, EngineResult};
use crate::progress;
use crate::queue::PromotionQueue;
use crate::reconciler::{self, ReconcileOutcome};
use crate::resolver::{self, Resolution};
use crate::schema::{ActivityEvent, CommunityId, Member, MemberId};
use crate::store::{CapabilityStore, MemberStore};
use crate::sweep::{IntervalClass, Promotion, SweepGuard, SweepOutcome, SweepSummary};

/// Result of checking a single member against the tier policy.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub resolution: Resolution,
    /// Present only when a promotion was attempted.
    pub reconcile: Option<ReconcileOutcome>,
}

/// Result of draining the real-time queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
}

pub struct ProgressionEngine {
    members: Arc<dyn MemberStore>,
    capabilities: Arc<dyn CapabilityStore>,
    audit: Arc<dyn AuditSink>,
    xp_table: XpTable,
    criteria: CriteriaTable,
    config: ProgressionConfig,
    queue: PromotionQueue,
    sweeps: SweepGuard,
    gate: Option<ActivityGate>,
}

impl ProgressionEngine {
    pub fn new(
        members: Arc<dyn MemberStore>,
        capabilities: Arc<dyn CapabilityStore>,
        audit: Arc<dyn AuditSink>,
        config: &ProgressionConfig,
    ) -> Self {
        Self {
            members,
            capabilities,
            audit,
            xp_table: XpTable::from_config(config),
            criteria: CriteriaTable::from_config(config),
            config: config.clone(),
            queue: PromotionQueue::new(),
            sweeps: SweepGuard::new(),
            gate: None,
        }
    }

    /// Install a caller-supplied validity check (cooldowns, spam heuristics)
    /// consulted before any XP is granted.
    pub fn with_activity_gate(mut self, gate: ActivityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    fn grant_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.config.grant_timeout_ms)
    }

    fn inter_member_delay(&self) -> StdDuration {
        StdDuration::from_millis(self.config.inter_member_delay_ms)
    }

    // ── Activity ingestion ───────────────────────────────────────────────────

    /// Submit one activity event. The member record is created on first
    /// activity; ingestion sits behind the external verification flow, so a
    /// member whose events reach the engine is treated as verified from
    /// their first event's timestamp.
    pub async fn submit(&self, event: &ActivityEvent) -> Result<AwardOutcome> {
        let mut member = match self
            .members
            .get(&event.member_id, &event.community_id)
            .await?
        {
            Some(member) => member,
            None => {
                info!(
                    member = %event.member_id,
                    community = %event.community_id,
                    "first activity — creating member record"
                );
                let mut member = Member::new(
                    event.member_id.clone(),
                    event.community_id.clone(),
                    true,
                );
                member.verified_at = Some(event.timestamp);
                member
            }
        };

        let outcome = accumulator::award(
            &mut member,
            event,
            &self.xp_table,
            self.gate.as_ref(),
            Duration::seconds(self.config.future_skew_secs),
            Utc::now(),
        );

        if outcome.accepted {
            self.members.upsert(&member).await?;
        }

        Ok(outcome)
    }

    // ── Membership lifecycle ─────────────────────────────────────────────────

    /// Mark a member verified (entry point for the external identity flow),
    /// creating the record when absent. Idempotent: an existing
    /// `verified_at` timestamp is never reset.
    pub async fn verify(&self, member_id: &MemberId, community_id: &CommunityId) -> Result<()> {
        let mut member = match self.members.get(member_id, community_id).await? {
            Some(member) => member,
            None => Member::new(member_id.clone(), community_id.clone(), true),
        };
        member.verified = true;
        if member.verified_at.is_none() {
            member.verified_at = Some(Utc::now());
        }
        self.members.upsert(&member).await?;
        Ok(())
    }

    /// Exclude a departed member from future sweeps. The record is kept so
    /// the audit trail stays resolvable.
    pub async fn deactivate(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
    ) -> EngineResult<()> {
        self.set_deactivated(member_id, community_id, true).await
    }

    /// Re-include a returning member in sweeps. Tier and counters are
    /// whatever they were when the member left.
    pub async fn reactivate(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
    ) -> EngineResult<()> {
        self.set_deactivated(member_id, community_id, false).await
    }

    async fn set_deactivated(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
        deactivated: bool,
    ) -> EngineResult<()> {
        let mut member = self
            .members
            .get(member_id, community_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                member_id: member_id.clone(),
                community_id: community_id.clone(),
            })?;
        member.deactivated = deactivated;
        self.members.upsert(&member).await?;
        info!(member = %member_id, community = %community_id, deactivated, "member lifecycle change");
        Ok(())
    }

    // ── Tier resolution & reconciliation ─────────────────────────────────────

    /// Resolve one member against the tier policy and, when eligible, apply
    /// the promotion. The tier is persisted on any reconciliation success,
    /// including partial ones; failed grants wait for the next sweep.
    pub async fn check_member(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
        actor: &str,
    ) -> EngineResult<CheckOutcome> {
        let mut member = self
            .members
            .get(member_id, community_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                member_id: member_id.clone(),
                community_id: community_id.clone(),
            })?;

        if member.deactivated {
            debug!(member = %member_id, "deactivated member — skipping tier check");
            return Ok(CheckOutcome {
                resolution: Resolution::AtOrAboveTarget {
                    target: member.tier,
                },
                reconcile: None,
            });
        }

        let metrics = progress::snapshot(&member, Utc::now());
        let resolution = resolver::resolve(member.tier, &metrics, &self.criteria);

        let (from, to) = match &resolution {
            Resolution::Promote { from, to } => (*from, *to),
            _ => {
                return Ok(CheckOutcome {
                    resolution,
                    reconcile: None,
                });
            }
        };

        let capability_ids = self.config.capabilities_for(to.slug()).to_vec();
        let outcome = reconciler::reconcile(
            &mut member,
            to,
            &capability_ids,
            self.capabilities.as_ref(),
            self.grant_timeout(),
        )
        .await;

        if outcome.success() {
            member.tier = to;
            self.members.upsert(&member).await?;
            self.audit
                .append(&grove_audit::tier_change(
                    actor,
                    member_id.as_str(),
                    community_id.as_str(),
                    from.slug(),
                    to.slug(),
                    outcome.granted.clone(),
                    outcome.failed.clone(),
                    metrics,
                ))
                .await?;
            info!(
                member = %member_id,
                community = %community_id,
                from = from.slug(),
                to = to.slug(),
                granted = outcome.granted.len(),
                failed = outcome.failed.len(),
                "member promoted"
            );
        } else {
            warn!(
                member = %member_id,
                to = to.slug(),
                failed = outcome.failed.len(),
                "promotion approved but no grant landed — tier unchanged"
            );
        }

        Ok(CheckOutcome {
            resolution: Resolution::Promote { from, to },
            reconcile: Some(outcome),
        })
    }

    /// Explicitly revoke a single capability. Separate from the promotion
    /// flow, which never revokes anything on its own.
    pub async fn revoke_capability(
        &self,
        member_id: &MemberId,
        community_id: &CommunityId,
        capability_id: &str,
        reason: &str,
        actor: &str,
    ) -> EngineResult<()> {
        let mut member = self
            .members
            .get(member_id, community_id)
            .await?
            .ok_or_else(|| EngineError::NotFound {
                member_id: member_id.clone(),
                community_id: community_id.clone(),
            })?;

        let attempt = tokio::time::timeout(
            self.grant_timeout(),
            self.capabilities.revoke(member_id, capability_id, reason),
        )
        .await;
        match attempt {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                return Err(EngineError::Transient {
                    capability: capability_id.to_string(),
                    reason: err.to_string(),
                });
            }
            Err(_) => {
                return Err(EngineError::Transient {
                    capability: capability_id.to_string(),
                    reason: "revoke timed out".to_string(),
                });
            }
        }

        member.assigned_capabilities.remove(capability_id);
        self.members.upsert(&member).await?;
        self.audit
            .append(&grove_audit::revocation(
                actor,
                member_id.as_str(),
                community_id.as_str(),
                capability_id,
                reason,
            ))
            .await?;
        Ok(())
    }

    // ── Real-time queue ──────────────────────────────────────────────────────

    /// Request a re-check for a member. Idempotent per `(member, community)`;
    /// the latest reason wins.
    pub fn enqueue(
        &self,
        member_id: MemberId,
        community_id: CommunityId,
        reason: impl Into<String>,
    ) {
        let reason = reason.into();
        debug!(member = %member_id, community = %community_id, reason = reason.as_str(), "enqueued for re-check");
        self.queue.enqueue(member_id, community_id, reason);
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Process every currently queued item exactly once. Items leave the
    /// queue no matter what happens to them; members that can no longer be
    /// resolved are dropped silently. The item's reason (last one enqueued
    /// wins) is carried into the audit actor as `system:queue:<reason>`.
    pub async fn drain(&self) -> Result<DrainSummary> {
        let items = self.queue.take_all();
        if items.is_empty() {
            return Ok(DrainSummary::default());
        }

        info!(items = items.len(), "draining promotion queue");
        let mut processed = 0usize;
        let delay = self.inter_member_delay();

        for item in items {
            let actor = format!("system:queue:{}", item.reason);
            match self
                .check_member(&item.member_id, &item.community_id, &actor)
                .await
            {
                Ok(_) => {}
                Err(EngineError::NotFound { .. }) => {
                    debug!(
                        member = %item.member_id,
                        community = %item.community_id,
                        "queued member no longer resolvable — dropping"
                    );
                }
                Err(err) => {
                    warn!(
                        member = %item.member_id,
                        error = %err,
                        "queued re-check failed — not requeued"
                    );
                }
            }
            processed += 1;
            tokio::time::sleep(delay).await;
        }

        Ok(DrainSummary { processed })
    }

    // ── Batch sweep ──────────────────────────────────────────────────────────

    pub fn is_sweeping(&self, community_id: &CommunityId) -> bool {
        self.sweeps.is_sweeping(community_id)
    }

    /// Community-wide reconciliation pass. Single-flight per community: a
    /// concurrent call returns [`SweepOutcome::AlreadyRunning`] without
    /// checking anyone. Per-member failures are collected into the summary
    /// and the pass continues.
    pub async fn run_sweep(
        &self,
        community_id: &CommunityId,
        class: IntervalClass,
    ) -> Result<SweepOutcome> {
        let Some(_token) = self.sweeps.try_acquire(community_id) else {
            info!(community = %community_id, "sweep already in progress — skipping");
            return Ok(SweepOutcome::AlreadyRunning);
        };

        let started_at = Utc::now();
        let cutoff = class.cutoff(started_at);
        let all_members = self.members.list_for_community(community_id).await?;
        let eligible: Vec<Member> = all_members
            .into_iter()
            .filter(|m| m.verified && !m.deactivated)
            .filter(|m| cutoff.is_none_or(|c| m.last_activity_at >= c))
            .collect();

        info!(
            community = %community_id,
            class = class.slug(),
            eligible = eligible.len(),
            "sweep started"
        );

        let mut summary = SweepSummary::default();
        let delay = self.inter_member_delay();

        for member in &eligible {
            match self
                .check_member(&member.member_id, community_id, "system:sweep")
                .await
            {
                Ok(outcome) => {
                    if let (
                        Resolution::Promote { from, to },
                        Some(reconcile),
                    ) = (&outcome.resolution, &outcome.reconcile)
                    {
                        if reconcile.success() {
                            summary.promotions.push(Promotion {
                                member_id: member.member_id.clone(),
                                from: *from,
                                to: *to,
                            });
                        }
                    }
                }
                Err(err) => {
                    summary
                        .errors
                        .push(format!("{}: {err}", member.member_id));
                }
            }
            summary.total_checked += 1;
            tokio::time::sleep(delay).await;
        }

        let finished_at = Utc::now();
        self.audit
            .append(&grove_audit::AuditRecord::SweepSummary(SweepRecord {
                record_id: Uuid::new_v4(),
                community_id: community_id.as_str().to_string(),
                interval: class.slug().to_string(),
                total_checked: summary.total_checked,
                promotions: summary
                    .promotions
                    .iter()
                    .map(|p| PromotionEntry {
                        member_id: p.member_id.as_str().to_string(),
                        from_tier: p.from.slug().to_string(),
                        to_tier: p.to.slug().to_string(),
                    })
                    .collect(),
                errors: summary.errors.clone(),
                started_at,
                finished_at,
            }))
            .await?;

        info!(
            community = %community_id,
            checked = summary.total_checked,
            promotions = summary.promotions.len(),
            errors = summary.errors.len(),
            "sweep finished"
        );

        Ok(SweepOutcome::Completed(summary))
    }
}
