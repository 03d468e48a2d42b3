use thiserror::Error;

use crate::schema::{CommunityId, MemberId};

/// Failure taxonomy for the progression engine.
///
/// None of these are process-fatal: sweeps and drains degrade item-by-item,
/// and the worst case is an incomplete pass whose summary enumerates the
/// errors for operator follow-up.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A tier has no capability mapping (or the mapping is unusable).
    /// Logged once per occurrence; the affected grants are skipped.
    #[error("no capability mapping configured for tier '{tier}'")]
    Configuration { tier: String },

    /// The external capability store failed or timed out. Captured per item;
    /// never retried within the same run — the next sweep recomputes from
    /// scratch.
    #[error("capability store error for '{capability}': {reason}")]
    Transient { capability: String, reason: String },

    /// The member (or its community scope) could not be resolved. Queue items
    /// hitting this are dropped silently; sweep iterations skip and continue.
    #[error("member {member_id} not found in community {community_id}")]
    NotFound {
        member_id: MemberId,
        community_id: CommunityId,
    },

    /// A malformed event (e.g. a timestamp too far in the future). The
    /// accumulator rejects these without raising to the caller.
    #[error("invalid activity event: {reason}")]
    Validation { reason: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
