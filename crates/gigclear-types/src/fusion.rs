//! Reputation and risk types for GigClear
//!
//! Reputation signals arrive from several sources and are fused into one
//! score per agent; adverse events raise a risk index that decays with
//! time. Both are backed by append-only event logs.

use crate::{AgentId, GigId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a reputation signal came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReputationSource {
    /// On-chain activity (payments, bonding history)
    OnChain,
    /// Imported moltbook karma
    Moltbook,
    /// Swarm validation verdicts
    Swarm,
    /// Escrow settlement outcomes
    Escrow,
}

impl fmt::Display for ReputationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OnChain => "on_chain",
            Self::Moltbook => "moltbook",
            Self::Swarm => "swarm",
            Self::Escrow => "escrow",
        };
        write!(f, "{}", s)
    }
}

/// One entry in an agent's append-only reputation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationEvent {
    /// ULID-backed event ID (`repevt_` prefix)
    pub id: String,
    /// Agent the signal is about
    pub agent_id: AgentId,
    /// Free-form label for what happened (e.g. "gig_completed")
    pub event_type: String,
    /// Raw signed score change, before source weighting
    pub score_change: i64,
    /// Source the signal came from
    pub source: ReputationSource,
    /// Structured detail payload
    pub details: serde_json::Value,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Adverse (or corrective) event category feeding the risk index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskFactor {
    /// Bond was slashed
    Slash,
    /// Gig ended in rejection past the retry limit
    FailedGig,
    /// A dispute was filed against the agent
    DisputeOpened,
    /// A dispute concluded
    DisputeResolved,
    /// Extended inactivity
    Inactivity,
    /// Bond balance hit zero through slashing
    BondDepletion,
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Slash => "slash",
            Self::FailedGig => "failed_gig",
            Self::DisputeOpened => "dispute_opened",
            Self::DisputeResolved => "dispute_resolved",
            Self::Inactivity => "inactivity",
            Self::BondDepletion => "bond_depletion",
        };
        write!(f, "{}", s)
    }
}

/// One entry in an agent's append-only risk log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskEvent {
    /// ULID-backed event ID (`riskevt_` prefix)
    pub id: String,
    /// Agent the event is about
    pub agent_id: AgentId,
    /// Category of the event
    pub factor: RiskFactor,
    /// Signed index delta; positive raises risk
    pub delta: f64,
    /// Structured detail payload
    pub details: serde_json::Value,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Terminal outcome of a gig from one agent's perspective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GigOutcome {
    /// Gig completed and paid
    Completed {
        /// Budget earned, in human units of the settlement currency
        earned: f64,
    },
    /// Gig failed (rejected past the retry limit or lost in arbitration)
    Failed,
}

/// An agent's fused standing (materialized view over both logs)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStanding {
    /// Agent this standing describes
    pub agent_id: AgentId,
    /// Fused reputation score, clamped to the configured range
    pub fused_score: f64,
    /// Time-decaying risk index, clamped to the configured range
    pub risk_index: f64,
    /// Consecutive days without an adverse event
    pub clean_streak_days: u32,
    /// Gigs completed and paid
    pub gigs_completed: u32,
    /// Gigs failed
    pub gigs_failed: u32,
    /// Lifetime earnings, in human units
    pub total_earned: f64,
    /// Last gig either side concluded, used for inactivity decay
    pub last_gig_id: Option<GigId>,
    /// When risk decay was last applied
    pub last_risk_update: DateTime<Utc>,
    /// When the standing was created
    pub created_at: DateTime<Utc>,
}

impl AgentStanding {
    /// Completion rate over concluded gigs, in [0, 1]; 0 with no history
    pub fn completion_rate(&self) -> f64 {
        let concluded = self.gigs_completed + self.gigs_failed;
        if concluded == 0 {
            return 0.0;
        }
        self.gigs_completed as f64 / concluded as f64
    }
}
