//! Gig types for GigClear
//!
//! A gig is a unit of paid work posted by one agent and performed by
//! another. Its status is the top-level state machine every other component
//! hangs off: escrow funds it, bonds collateralize it, the swarm certifies
//! it.

use crate::{AgentId, Amount, Chain, GigId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a gig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GigStatus {
    /// Posted, accepting applications
    Open,
    /// Assignee chosen, bond locked, work not started
    Assigned,
    /// Assignee is working
    InProgress,
    /// Work submitted, swarm round running
    PendingValidation,
    /// Work approved and paid out
    Completed,
    /// Suspended pending external arbitration
    Disputed,
}

impl GigStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check whether a transition to `next` is allowed
    pub fn can_transition_to(&self, next: GigStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Assigned)
                | (Self::Assigned, Self::InProgress)
                | (Self::InProgress, Self::PendingValidation)
                | (Self::PendingValidation, Self::Completed)
                | (Self::PendingValidation, Self::InProgress)
                | (Self::Open, Self::Disputed)
                | (Self::Assigned, Self::Disputed)
                | (Self::InProgress, Self::Disputed)
                | (Self::PendingValidation, Self::Disputed)
                | (Self::Disputed, Self::Completed)
        )
    }
}

impl fmt::Display for GigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "Open",
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::PendingValidation => "PendingValidation",
            Self::Completed => "Completed",
            Self::Disputed => "Disputed",
        };
        write!(f, "{}", s)
    }
}

/// An application by an agent to work a gig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GigApplication {
    /// The applicant
    pub agent_id: AgentId,
    /// When the application was recorded
    pub applied_at: DateTime<Utc>,
}

/// Status of a poster-initiated offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OfferStatus {
    /// Awaiting the invited agent's answer
    Pending,
    /// Accepted; the agent counts as an applicant
    Accepted,
    /// Turned down by the invited agent
    Declined,
    /// Lapsed unanswered when the gig left Open
    Expired,
}

/// An invitation from the poster to a specific agent
///
/// Offers are the poster-initiated counterpart of applications; both paths
/// converge on assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GigOffer {
    /// The invited agent
    pub agent_id: AgentId,
    /// Optional note from the poster
    pub message: Option<String>,
    /// Current offer status
    pub status: OfferStatus,
    /// When the offer was extended
    pub offered_at: DateTime<Utc>,
    /// When the agent answered, if they have
    pub responded_at: Option<DateTime<Utc>>,
}

/// A gig and the full state its lifecycle has accumulated
///
/// Gigs are never deleted; terminal states are retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gig {
    /// Unique gig ID
    pub id: GigId,
    /// Short human-readable title
    pub title: String,
    /// What the work is
    pub description: String,
    /// Skills the poster asked for
    pub skills_required: Vec<String>,
    /// Agent that posted the gig and funds the escrow
    pub poster: AgentId,
    /// Agent performing the work; set exactly when status leaves Open
    pub assignee: Option<AgentId>,
    /// Budget paid out on completion
    pub budget: Amount,
    /// Collateral the assignee must lock
    pub bond_required: Amount,
    /// Chain the budget settles on
    pub chain: Chain,
    /// Current lifecycle status
    pub status: GigStatus,
    /// Agents that applied while the gig was Open
    pub applicants: Vec<GigApplication>,
    /// Invitations the poster extended while the gig was Open
    pub offers: Vec<GigOffer>,
    /// Whether the assignee's bond is currently locked for this gig
    pub bond_locked: bool,
    /// Swarm rejections accumulated across submissions
    pub rejection_count: u32,
    /// When the gig was posted
    pub created_at: DateTime<Utc>,
    /// When an assignee was chosen
    pub assigned_at: Option<DateTime<Utc>>,
    /// When the gig completed
    pub completed_at: Option<DateTime<Utc>>,
    /// When a dispute on the gig was resolved
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the gig last changed
    pub updated_at: DateTime<Utc>,
}

impl Gig {
    /// Check whether `agent` is the poster or the assignee
    pub fn is_participant(&self, agent: &AgentId) -> bool {
        self.poster == *agent || self.assignee.as_ref() == Some(agent)
    }

    /// Check whether `agent` has applied to this gig
    pub fn has_applied(&self, agent: &AgentId) -> bool {
        self.applicants.iter().any(|a| a.agent_id == *agent)
    }

    /// Check whether `agent` holds an unanswered offer
    pub fn has_pending_offer(&self, agent: &AgentId) -> bool {
        self.pending_offer(agent).is_some()
    }

    /// The unanswered offer extended to `agent`, if any
    pub fn pending_offer(&self, agent: &AgentId) -> Option<&GigOffer> {
        self.offers
            .iter()
            .find(|o| o.agent_id == *agent && o.status == OfferStatus::Pending)
    }

    /// Mutable view of the unanswered offer extended to `agent`, if any
    pub fn pending_offer_mut(&mut self, agent: &AgentId) -> Option<&mut GigOffer> {
        self.offers
            .iter_mut()
            .find(|o| o.agent_id == *agent && o.status == OfferStatus::Pending)
    }
}

/// Request to post a new gig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GigSpec {
    /// Short human-readable title
    pub title: String,
    /// What the work is
    pub description: String,
    /// Skills the poster asks for
    pub skills_required: Vec<String>,
    /// Agent posting the gig
    pub poster: AgentId,
    /// Budget paid out on completion
    pub budget: Amount,
    /// Collateral the assignee must lock
    pub bond_required: Amount,
    /// Chain the budget settles on
    pub chain: Chain,
}

/// Arbiter's decision on a disputed gig
///
/// Arbitration itself is external; the decision arrives as a single opaque
/// command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeResolution {
    /// The work stands: pay the assignee, return their bond
    ReleaseToAssignee,
    /// The work does not stand: refund the poster
    RefundToPoster {
        /// Confiscate the assignee's locked bond as well
        slash_assignee: bool,
    },
}
