//! Swarm validation types for GigClear
//!
//! Completion of a gig is certified by a sampled jury of peer agents. A
//! round is opened with a fixed validator set and closes with a verdict the
//! moment one becomes mathematically certain.

use crate::{AgentId, Amount, GigId, ValidationId, VoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a validation round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    /// Round is open and accepting votes
    Pending,
    /// Approvals reached the threshold
    Approved,
    /// Threshold became unreachable, or the round was closed inconclusive
    Rejected,
}

impl ValidationStatus {
    /// Check if the round has reached a verdict
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        };
        write!(f, "{}", s)
    }
}

/// A validator's verdict on submitted work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteChoice {
    /// Work meets the gig requirements
    Approve,
    /// Work does not meet the gig requirements
    Reject,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
        };
        write!(f, "{}", s)
    }
}

/// A swarm validation round for one work submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmValidation {
    /// Unique round ID
    pub id: ValidationId,
    /// Gig whose submission is under review
    pub gig_id: GigId,
    /// Current status
    pub status: ValidationStatus,
    /// Approvals counted so far
    pub votes_for: u32,
    /// Rejections counted so far
    pub votes_against: u32,
    /// Approvals required for an Approved verdict
    pub threshold: u32,
    /// Validator set, fixed when the round opens
    pub validators: Vec<AgentId>,
    /// Total reward carved out for this round
    pub reward_pool: Amount,
    /// Share owed to each aligned validator
    pub reward_per_validator: Amount,
    /// Seed the validator sample was drawn with, kept for audit
    pub seed: u64,
    /// When the round opened
    pub opened_at: DateTime<Utc>,
    /// When the round reached a verdict
    pub closed_at: Option<DateTime<Utc>>,
}

impl SwarmValidation {
    /// Check whether `agent` is in the validator set
    pub fn is_validator(&self, agent: &AgentId) -> bool {
        self.validators.contains(agent)
    }

    /// Votes cast so far
    pub fn votes_cast(&self) -> u32 {
        self.votes_for + self.votes_against
    }

    /// Rejections at which approval becomes mathematically unreachable
    pub fn rejection_bound(&self) -> u32 {
        self.validators.len() as u32 - self.threshold + 1
    }
}

/// A single validator's vote, immutable once cast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmVote {
    /// Unique vote ID
    pub id: VoteId,
    /// Round the vote belongs to
    pub validation_id: ValidationId,
    /// Who voted
    pub voter: AgentId,
    /// The verdict
    pub choice: VoteChoice,
    /// Optional free-form reasoning
    pub reasoning: Option<String>,
    /// Reward owed if this vote ends up aligned with the verdict
    pub reward_amount: Amount,
    /// Whether the reward has been claimed
    pub reward_claimed: bool,
    /// When the vote was cast
    pub cast_at: DateTime<Utc>,
}

impl SwarmVote {
    /// Check whether this vote agrees with the round's final status
    pub fn aligned_with(&self, status: ValidationStatus) -> bool {
        matches!(
            (self.choice, status),
            (VoteChoice::Approve, ValidationStatus::Approved)
                | (VoteChoice::Reject, ValidationStatus::Rejected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round(validators: usize, threshold: u32) -> SwarmValidation {
        SwarmValidation {
            id: ValidationId::new(),
            gig_id: GigId::new(),
            status: ValidationStatus::Pending,
            votes_for: 0,
            votes_against: 0,
            threshold,
            validators: (0..validators).map(|_| AgentId::new()).collect(),
            reward_pool: Amount::usdc(10.0),
            reward_per_validator: Amount::usdc(2.0),
            seed: 42,
            opened_at: Utc::now(),
            closed_at: None,
        }
    }

    #[test]
    fn test_rejection_bound() {
        // 5 validators, 3 to approve: 3 rejections make approval impossible
        let v = round(5, 3);
        assert_eq!(v.rejection_bound(), 3);

        // Unanimous requirement: a single rejection suffices
        let v = round(5, 5);
        assert_eq!(v.rejection_bound(), 1);
    }

    #[test]
    fn test_vote_alignment() {
        let vote = SwarmVote {
            id: VoteId::new(),
            validation_id: ValidationId::new(),
            voter: AgentId::new(),
            choice: VoteChoice::Approve,
            reasoning: None,
            reward_amount: Amount::usdc(2.0),
            reward_claimed: false,
            cast_at: Utc::now(),
        };

        assert!(vote.aligned_with(ValidationStatus::Approved));
        assert!(!vote.aligned_with(ValidationStatus::Rejected));
        assert!(!vote.aligned_with(ValidationStatus::Pending));
    }

    #[test]
    fn test_status_closed() {
        assert!(!ValidationStatus::Pending.is_closed());
        assert!(ValidationStatus::Approved.is_closed());
        assert!(ValidationStatus::Rejected.is_closed());
    }
}
