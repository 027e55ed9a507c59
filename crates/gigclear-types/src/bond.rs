//! Bond types for GigClear
//!
//! Agents post slashable collateral before taking on work. The ledger's
//! source of truth is the append-only event log; `BondAccount` is the
//! materialized view and can always be rebuilt by replaying events.

use crate::{AgentId, Amount, GigId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bonding tier, derived from total bonded collateral
///
/// Never stored independently - always recomputed from the account total
/// against the active thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BondTier {
    /// Below the minimum bonding threshold
    Unbonded,
    /// At or above the minimum, below the high-bond threshold
    Bonded,
    /// At or above the high-bond threshold
    HighBond,
}

impl fmt::Display for BondTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unbonded => "UNBONDED",
            Self::Bonded => "BONDED",
            Self::HighBond => "HIGH_BOND",
        };
        write!(f, "{}", s)
    }
}

/// Snapshot of an account's balances, recorded on every event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondBalances {
    /// Collateral free to withdraw or lock
    pub available: Amount,
    /// Collateral committed to in-flight gigs
    pub locked: Amount,
}

impl BondBalances {
    /// Total bonded collateral
    pub fn total(&self) -> Result<Amount> {
        self.available.checked_add(self.locked)
    }
}

/// A single agent's collateral account (materialized view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondAccount {
    /// Account owner
    pub agent_id: AgentId,
    /// Collateral free to withdraw or lock
    pub available: Amount,
    /// Collateral committed to in-flight gigs
    pub locked: Amount,
    /// Per-gig breakdown of locked collateral; values sum to `locked`
    pub gig_locks: BTreeMap<GigId, Amount>,
    /// Fraction of past locks that ended cleanly, in [0, 1]
    pub reliability: f64,
    /// Consecutive whole days without a slash, as of the last update
    pub clean_streak_days: u32,
    /// When the account was last slashed
    pub last_slash_at: Option<DateTime<Utc>>,
    /// When the account was created
    pub created_at: DateTime<Utc>,
    /// When the account last changed
    pub updated_at: DateTime<Utc>,
}

impl BondAccount {
    /// Create an empty account denominated in `currency`
    pub fn empty(agent_id: AgentId, currency: crate::Currency) -> Self {
        let now = Utc::now();
        Self {
            agent_id,
            available: Amount::zero(currency),
            locked: Amount::zero(currency),
            gig_locks: BTreeMap::new(),
            reliability: 1.0,
            clean_streak_days: 0,
            last_slash_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Consecutive whole days without a slash as of `now`, anchored at the
    /// last slash (or account creation when never slashed)
    pub fn streak_as_of(&self, now: DateTime<Utc>) -> u32 {
        let anchor = self.last_slash_at.unwrap_or(self.created_at);
        (now - anchor).num_days().max(0) as u32
    }

    /// Total bonded collateral
    pub fn total(&self) -> Result<Amount> {
        self.available.checked_add(self.locked)
    }

    /// Current balances snapshot
    pub fn balances(&self) -> BondBalances {
        BondBalances {
            available: self.available,
            locked: self.locked,
        }
    }

    /// Collateral locked for a specific gig
    pub fn locked_for(&self, gig_id: &GigId) -> Amount {
        self.gig_locks
            .get(gig_id)
            .copied()
            .unwrap_or_else(|| Amount::zero(self.available.currency))
    }
}

/// Kind of bond ledger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BondEventKind {
    /// Collateral added to the available balance
    Deposit,
    /// Available collateral withdrawn
    Withdraw,
    /// Available collateral committed to a gig
    Lock,
    /// Gig collateral returned to the available balance
    Unlock,
    /// Locked collateral confiscated
    Slash,
}

impl fmt::Display for BondEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Slash => "slash",
        };
        write!(f, "{}", s)
    }
}

/// One entry in an agent's append-only bond log
///
/// Events are never mutated or deleted. IDs are ULIDs, so events for an
/// agent sort lexically in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondEvent {
    /// ULID-backed event ID (`bevt_` prefix)
    pub id: String,
    /// Account the event belongs to
    pub agent_id: AgentId,
    /// What happened
    pub kind: BondEventKind,
    /// Amount moved (always positive)
    pub amount: Amount,
    /// Gig the movement relates to, when applicable
    pub gig_id: Option<GigId>,
    /// Free-form reason (slash justification, withdrawal memo)
    pub reason: Option<String>,
    /// Balances immediately after this event applied
    pub balance_after: BondBalances,
    /// When the event was recorded
    pub recorded_at: DateTime<Utc>,
}
