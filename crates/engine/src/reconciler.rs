//! Capability reconciliation.
//!
//! Once Stage B has approved a target tier, the reconciler applies that
//! tier's external grants one at a time. Each grant is isolated: a store
//! error or timeout lands in `failed` and the remaining grants still run.
//! Failed grants are not retried here — the next sweep recomputes from
//! scratch and tries again.
//!
//! Previously held capabilities are never revoked by promotion; explicit
//! revocation is a separate engine operation.

use std::time::Duration;

use tracing::{debug, warn};

use crate::schema::{Member, Tier};
use crate::store::CapabilityStore;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub granted: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileOutcome {
    /// Partial success counts: the tier is persisted as long as at least one
    /// grant landed.
    pub fn success(&self) -> bool {
        !self.granted.is_empty()
    }
}

/// Attempt every grant for `target`, recording each one into the member's
/// `assigned_capabilities` as it lands. The caller persists the member and
/// the new tier when the outcome reports success.
pub async fn reconcile(
    member: &mut Member,
    target: Tier,
    capability_ids: &[String],
    store: &dyn CapabilityStore,
    grant_timeout: Duration,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    if capability_ids.is_empty() {
        warn!(
            tier = target.slug(),
            member = %member.member_id,
            "no capability mapping configured for tier — nothing to grant"
        );
        return outcome;
    }

    for capability_id in capability_ids {
        let reason = format!("tier promotion to {}", target.slug());
        let attempt = tokio::time::timeout(
            grant_timeout,
            store.grant(&member.member_id, capability_id, &reason),
        )
        .await;

        match attempt {
            Ok(Ok(())) => {
                member.assigned_capabilities.insert(capability_id.clone());
                outcome.granted.push(capability_id.clone());
            }
            Ok(Err(err)) => {
                warn!(
                    member = %member.member_id,
                    capability = capability_id.as_str(),
                    error = %err,
                    "capability grant failed"
                );
                outcome.failed.push(capability_id.clone());
            }
            Err(_) => {
                warn!(
                    member = %member.member_id,
                    capability = capability_id.as_str(),
                    timeout_ms = grant_timeout.as_millis() as u64,
                    "capability grant timed out"
                );
                outcome.failed.push(capability_id.clone());
            }
        }
    }

    debug!(
        member = %member.member_id,
        tier = target.slug(),
        granted = outcome.granted.len(),
        failed = outcome.failed.len(),
        "reconciliation finished"
    );

    outcome
}
