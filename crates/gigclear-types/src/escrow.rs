//! Escrow types for GigClear
//!
//! Every gig budget is escrowed before work starts - funds never move
//! directly between poster and assignee. The record tracks custody state;
//! actual fund movement happens on chain and is reflected here through
//! transaction references.

use crate::{AgentId, Amount, Chain, EscrowId, GigId, TxRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Custody state of an escrow record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Escrow intent recorded, awaiting on-chain deposit confirmation
    Pending,
    /// Deposit confirmed, funds held
    Locked,
    /// Funds released to the assignee
    Released,
    /// Funds returned to the depositor
    Refunded,
    /// Held pending dispute resolution
    Disputed,
}

impl EscrowStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    /// Check if funds are currently held
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked | Self::Disputed)
    }

    /// Check whether a transition to `next` is allowed
    pub fn can_transition_to(&self, next: EscrowStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Locked)
                | (Self::Locked, Self::Released)
                | (Self::Locked, Self::Refunded)
                | (Self::Locked, Self::Disputed)
                | (Self::Disputed, Self::Released)
                | (Self::Disputed, Self::Refunded)
        )
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Locked => "Locked",
            Self::Released => "Released",
            Self::Refunded => "Refunded",
            Self::Disputed => "Disputed",
        };
        write!(f, "{}", s)
    }
}

/// An escrow record for a gig's budget
///
/// At most one non-terminal record exists per gig. The record never holds
/// funds itself; it mirrors what the chain collaborator reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// Unique escrow ID
    pub id: EscrowId,
    /// Gig this escrow funds
    pub gig_id: GigId,
    /// Agent that funded the escrow (the gig poster)
    pub depositor: AgentId,
    /// Amount held
    pub amount: Amount,
    /// Chain the funds live on
    pub chain: Chain,
    /// Current custody state
    pub status: EscrowStatus,
    /// Transaction that locked the deposit
    pub deposit_tx: Option<TxRef>,
    /// Transaction that released or refunded the funds
    pub release_tx: Option<TxRef>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record last changed state
    pub updated_at: DateTime<Utc>,
}

impl EscrowRecord {
    /// Check whether the deposit has been confirmed and funds are held
    pub fn is_funded(&self) -> bool {
        self.status.is_locked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escrow_status_terminal() {
        assert!(!EscrowStatus::Pending.is_terminal());
        assert!(!EscrowStatus::Locked.is_terminal());
        assert!(!EscrowStatus::Disputed.is_terminal());
        assert!(EscrowStatus::Released.is_terminal());
        assert!(EscrowStatus::Refunded.is_terminal());
    }

    #[test]
    fn test_escrow_transitions() {
        assert!(EscrowStatus::Pending.can_transition_to(EscrowStatus::Locked));
        assert!(EscrowStatus::Locked.can_transition_to(EscrowStatus::Released));
        assert!(EscrowStatus::Locked.can_transition_to(EscrowStatus::Refunded));
        assert!(EscrowStatus::Locked.can_transition_to(EscrowStatus::Disputed));
        assert!(EscrowStatus::Disputed.can_transition_to(EscrowStatus::Refunded));

        // No release before funding, no reopening terminal records
        assert!(!EscrowStatus::Pending.can_transition_to(EscrowStatus::Released));
        assert!(!EscrowStatus::Pending.can_transition_to(EscrowStatus::Disputed));
        assert!(!EscrowStatus::Released.can_transition_to(EscrowStatus::Refunded));
        assert!(!EscrowStatus::Refunded.can_transition_to(EscrowStatus::Locked));
    }
}
