//! Community progression engine.
//!
//! Raw engagement events become XP and counters on a member record; level
//! and a capped activity score derive from those counters; a two-stage
//! policy maps them to a tier; and a reconciler applies the tier's external
//! capability grants with per-item failure isolation. A real-time queue and
//! scheduled batch sweeps both drive the same resolution path, and every
//! mutation lands in the append-only audit trail.

pub mod accumulator;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod member_log;
pub mod progress;
pub mod queue;
pub mod reconciler;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod sweep;

pub use accumulator::{ActivityGate, AwardOutcome, XpTable};
pub use criteria::{CriteriaTable, TierCriteria};
pub use engine::{CheckOutcome, DrainSummary, ProgressionEngine};
pub use error::{EngineError, EngineResult};
pub use member_log::JsonlMemberStore;
pub use queue::{PromotionQueue, QueueItem};
pub use reconciler::ReconcileOutcome;
pub use resolver::{Resolution, resolve, stage_a_target};
pub use schema::{ActivityEvent, ActivityKind, CommunityId, Member, MemberId, Tier};
pub use store::{CapabilityStore, InMemoryCapabilityStore, InMemoryMemberStore, MemberStore};
pub use sweep::{IntervalClass, Promotion, SweepGuard, SweepOutcome, SweepSummary};
