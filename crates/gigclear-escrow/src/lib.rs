//! GigClear Escrow - custody state machine for gig budgets
//!
//! Every gig budget is escrowed before work starts; funds never move
//! directly between poster and assignee. The manager tracks custody state
//! and records the transaction references collaborators hand back - it
//! never moves funds itself.
//!
//! At most one non-terminal escrow exists per gig. Records are never
//! deleted; terminal states are retained for audit.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use gigclear_types::{
    AgentId, Amount, Chain, EscrowId, EscrowRecord, EscrowStatus, GigClearError, GigId, Result,
    TxRef,
};

/// How a disputed escrow is settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowResolution {
    /// Pay out to the assignee
    Release,
    /// Return the deposit to the depositor
    Refund,
}

/// Escrow manager over an in-memory record store
///
/// Mutations take the record's map entry and never await while holding it,
/// so each escrow serializes its own transitions without a global lock.
pub struct EscrowManager {
    records: Arc<DashMap<EscrowId, EscrowRecord>>,
    // Latest escrow per gig; the non-terminal-uniqueness check reads this
    by_gig: Arc<DashMap<GigId, EscrowId>>,
}

impl EscrowManager {
    pub fn new() -> Self {
        Self {
            records: Arc::new(DashMap::new()),
            by_gig: Arc::new(DashMap::new()),
        }
    }

    /// Create a Pending escrow record for a gig's budget
    ///
    /// Fails if the amount is not positive or the gig already has a live
    /// escrow. A gig whose previous escrow ended terminal may be escrowed
    /// again.
    pub async fn initiate(
        &self,
        gig_id: GigId,
        depositor: AgentId,
        amount: Amount,
        chain: Chain,
    ) -> Result<EscrowRecord> {
        if !amount.is_positive() {
            return Err(GigClearError::InvalidAmount {
                operation: "escrow.initiate".to_string(),
                amount: amount.to_human(),
            });
        }

        let now = Utc::now();
        let record = EscrowRecord {
            id: EscrowId::new(),
            gig_id,
            depositor,
            amount,
            chain,
            status: EscrowStatus::Pending,
            deposit_tx: None,
            release_tx: None,
            created_at: now,
            updated_at: now,
        };

        // The gig's index entry is held from the liveness check through the
        // registration, so concurrent initiates for one gig serialize here.
        match self.by_gig.entry(gig_id) {
            Entry::Occupied(mut slot) => {
                let existing_id = *slot.get();
                if let Some(existing) = self.records.get(&existing_id) {
                    if !existing.status.is_terminal() {
                        return Err(GigClearError::EscrowExists {
                            gig_id: gig_id.to_string(),
                            escrow_id: existing_id.to_string(),
                        });
                    }
                }
                self.records.insert(record.id, record.clone());
                slot.insert(record.id);
            }
            Entry::Vacant(slot) => {
                self.records.insert(record.id, record.clone());
                slot.insert(record.id);
            }
        }

        info!(
            "Escrow {} initiated for gig {}: {} on {}",
            record.id, gig_id, amount, chain
        );
        Ok(record)
    }

    /// Confirm the on-chain deposit and lock the escrow
    ///
    /// Idempotent: confirming an already-Locked record with the same
    /// transaction reference returns it unchanged. A different reference
    /// against a Locked record is rejected.
    pub async fn confirm_lock(&self, escrow_id: &EscrowId, tx_ref: TxRef) -> Result<EscrowRecord> {
        let mut entry = self
            .records
            .get_mut(escrow_id)
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: escrow_id.to_string(),
            })?;

        match entry.status {
            EscrowStatus::Pending => {
                entry.status = EscrowStatus::Locked;
                entry.deposit_tx = Some(tx_ref);
                entry.updated_at = Utc::now();
                info!("Escrow {} locked for gig {}", escrow_id, entry.gig_id);
                Ok(entry.clone())
            }
            EscrowStatus::Locked if entry.deposit_tx.as_ref() == Some(&tx_ref) => {
                // Duplicate confirmation of the same deposit
                Ok(entry.clone())
            }
            from => Err(GigClearError::invalid_transition(
                "escrow",
                from,
                EscrowStatus::Locked,
            )),
        }
    }

    /// Release held funds to the assignee
    pub async fn release(&self, escrow_id: &EscrowId, tx_ref: TxRef) -> Result<EscrowRecord> {
        self.settle(escrow_id, EscrowStatus::Released, tx_ref, &[EscrowStatus::Locked])
    }

    /// Return held funds to the depositor
    pub async fn refund(&self, escrow_id: &EscrowId, tx_ref: TxRef) -> Result<EscrowRecord> {
        self.settle(
            escrow_id,
            EscrowStatus::Refunded,
            tx_ref,
            &[EscrowStatus::Locked, EscrowStatus::Disputed],
        )
    }

    /// Suspend a locked escrow pending arbitration
    pub async fn mark_disputed(&self, escrow_id: &EscrowId) -> Result<EscrowRecord> {
        let mut entry = self
            .records
            .get_mut(escrow_id)
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: escrow_id.to_string(),
            })?;

        if entry.status != EscrowStatus::Locked {
            return Err(GigClearError::invalid_transition(
                "escrow",
                entry.status,
                EscrowStatus::Disputed,
            ));
        }

        entry.status = EscrowStatus::Disputed;
        entry.updated_at = Utc::now();
        warn!("Escrow {} disputed for gig {}", escrow_id, entry.gig_id);
        Ok(entry.clone())
    }

    /// Settle a disputed escrow per the arbiter's decision
    pub async fn resolve_dispute(
        &self,
        escrow_id: &EscrowId,
        outcome: EscrowResolution,
        tx_ref: TxRef,
    ) -> Result<EscrowRecord> {
        let target = match outcome {
            EscrowResolution::Release => EscrowStatus::Released,
            EscrowResolution::Refund => EscrowStatus::Refunded,
        };
        self.settle(escrow_id, target, tx_ref, &[EscrowStatus::Disputed])
    }

    /// Get an escrow record by ID
    pub async fn get(&self, escrow_id: &EscrowId) -> Result<EscrowRecord> {
        self.records
            .get(escrow_id)
            .map(|e| e.clone())
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: escrow_id.to_string(),
            })
    }

    /// Get the latest escrow record for a gig, if any
    pub async fn for_gig(&self, gig_id: &GigId) -> Option<EscrowRecord> {
        let escrow_id = *self.by_gig.get(gig_id)?.value();
        self.records.get(&escrow_id).map(|e| e.clone())
    }

    fn settle(
        &self,
        escrow_id: &EscrowId,
        target: EscrowStatus,
        tx_ref: TxRef,
        allowed_from: &[EscrowStatus],
    ) -> Result<EscrowRecord> {
        let mut entry = self
            .records
            .get_mut(escrow_id)
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: escrow_id.to_string(),
            })?;

        if !allowed_from.contains(&entry.status) {
            return Err(GigClearError::invalid_transition(
                "escrow",
                entry.status,
                target,
            ));
        }

        entry.status = target;
        entry.release_tx = Some(tx_ref);
        entry.updated_at = Utc::now();
        info!(
            "Escrow {} {} for gig {}: {}",
            escrow_id,
            if target == EscrowStatus::Released { "released" } else { "refunded" },
            entry.gig_id,
            entry.amount
        );
        Ok(entry.clone())
    }
}

impl Default for EscrowManager {
    fn default() -> Self {
        Self::new()
    }
}
