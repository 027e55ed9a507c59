//! Lifecycle events for external sinks
//!
//! Every accepted gig command emits one event on the board's broadcast
//! channel after its status commit. Subscribers (dashboards, ledger
//! exporters) see transitions in commit order per gig.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gigclear_types::{
    AgentId, EscrowId, GigId, ReceiptId, ValidationId, ValidationStatus,
};

/// Events emitted by the gig board as gigs move through their lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum LifecycleEvent {
    /// A gig was posted and its escrow record initiated
    GigPosted {
        gig_id: GigId,
        poster: AgentId,
        budget: f64,
        timestamp: DateTime<Utc>,
    },

    /// The escrow deposit was confirmed on chain
    EscrowFunded {
        gig_id: GigId,
        escrow_id: EscrowId,
        timestamp: DateTime<Utc>,
    },

    /// The poster invited an agent to the gig
    OfferExtended {
        gig_id: GigId,
        agent: AgentId,
        timestamp: DateTime<Utc>,
    },

    /// The invited agent answered the offer
    OfferAnswered {
        gig_id: GigId,
        agent: AgentId,
        accepted: bool,
        timestamp: DateTime<Utc>,
    },

    /// An assignee was chosen and their bond locked
    GigAssigned {
        gig_id: GigId,
        assignee: AgentId,
        bond_locked: f64,
        timestamp: DateTime<Utc>,
    },

    /// The assignee started working
    WorkStarted {
        gig_id: GigId,
        assignee: AgentId,
        timestamp: DateTime<Utc>,
    },

    /// Work was submitted and a validation round opened
    WorkSubmitted {
        gig_id: GigId,
        validation_id: ValidationId,
        reward_pool: f64,
        timestamp: DateTime<Utc>,
    },

    /// A validation round reached a verdict
    VerdictReached {
        gig_id: GigId,
        validation_id: ValidationId,
        verdict: ValidationStatus,
        timestamp: DateTime<Utc>,
    },

    /// The gig completed: escrow released, bond unlocked, receipt issued
    GigCompleted {
        gig_id: GigId,
        assignee: AgentId,
        paid: f64,
        receipt_id: ReceiptId,
        timestamp: DateTime<Utc>,
    },

    /// The swarm rejected the submission; the assignee may rework
    ReworkRequested {
        gig_id: GigId,
        rejection_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A dispute was filed and the gig frozen pending arbitration
    DisputeFiled {
        gig_id: GigId,
        filed_by: AgentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The external arbiter's decision was applied
    DisputeSettled {
        gig_id: GigId,
        released_to_assignee: bool,
        assignee_slashed: bool,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// When the event was emitted
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::GigPosted { timestamp, .. } => *timestamp,
            Self::EscrowFunded { timestamp, .. } => *timestamp,
            Self::OfferExtended { timestamp, .. } => *timestamp,
            Self::OfferAnswered { timestamp, .. } => *timestamp,
            Self::GigAssigned { timestamp, .. } => *timestamp,
            Self::WorkStarted { timestamp, .. } => *timestamp,
            Self::WorkSubmitted { timestamp, .. } => *timestamp,
            Self::VerdictReached { timestamp, .. } => *timestamp,
            Self::GigCompleted { timestamp, .. } => *timestamp,
            Self::ReworkRequested { timestamp, .. } => *timestamp,
            Self::DisputeFiled { timestamp, .. } => *timestamp,
            Self::DisputeSettled { timestamp, .. } => *timestamp,
        }
    }

    /// Short description for logging
    pub fn summary(&self) -> String {
        match self {
            Self::GigPosted { gig_id, budget, .. } => {
                format!("Gig {} posted ({:.2})", gig_id, budget)
            }
            Self::EscrowFunded { gig_id, .. } => format!("Gig {} escrow funded", gig_id),
            Self::OfferExtended { gig_id, agent, .. } => {
                format!("Gig {} offered to {}", gig_id, agent)
            }
            Self::OfferAnswered { gig_id, agent, accepted, .. } => {
                format!(
                    "Gig {} offer {} by {}",
                    gig_id,
                    if *accepted { "accepted" } else { "declined" },
                    agent
                )
            }
            Self::GigAssigned { gig_id, assignee, .. } => {
                format!("Gig {} assigned to {}", gig_id, assignee)
            }
            Self::WorkStarted { gig_id, .. } => format!("Gig {} work started", gig_id),
            Self::WorkSubmitted { gig_id, validation_id, .. } => {
                format!("Gig {} submitted, validation {}", gig_id, validation_id)
            }
            Self::VerdictReached { gig_id, verdict, .. } => {
                format!("Gig {} verdict: {}", gig_id, verdict)
            }
            Self::GigCompleted { gig_id, paid, .. } => {
                format!("Gig {} completed ({:.2} paid)", gig_id, paid)
            }
            Self::ReworkRequested { gig_id, rejection_count, .. } => {
                format!("Gig {} rework requested (rejection {})", gig_id, rejection_count)
            }
            Self::DisputeFiled { gig_id, reason, .. } => {
                format!("Gig {} disputed: {}", gig_id, reason)
            }
            Self::DisputeSettled { gig_id, released_to_assignee, .. } => {
                format!(
                    "Gig {} dispute settled ({})",
                    gig_id,
                    if *released_to_assignee { "release" } else { "refund" }
                )
            }
        }
    }
}
