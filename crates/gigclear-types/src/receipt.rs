//! Trust receipts for GigClear
//!
//! Every completed gig produces a receipt binding the work, the parties,
//! the swarm verdict, and the reputation effect together. Receipts are
//! append-only and content-hashed so an exported history is tamper-evident.

use crate::{AgentId, Amount, BondTier, Chain, GigId, ReceiptId, ValidationStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Proof that a gig concluded and what it did to the agent's standing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustReceipt {
    /// Unique receipt ID
    pub id: ReceiptId,
    /// Gig the receipt settles
    pub gig_id: GigId,
    /// Agent that performed the work
    pub agent_id: AgentId,
    /// Agent that posted and funded the gig
    pub poster_id: AgentId,
    /// Gig title, frozen at completion
    pub gig_title: String,
    /// Budget paid out
    pub amount: Amount,
    /// Chain the payment settled on
    pub chain: Chain,
    /// Final swarm verdict
    pub swarm_verdict: ValidationStatus,
    /// Raw reputation change the completion produced
    pub score_change: i64,
    /// Bond tier before settlement
    pub tier_before: BondTier,
    /// Bond tier after settlement
    pub tier_after: BondTier,
    /// Content hash over the stable fields
    pub hash: String,
    /// When the gig completed
    pub completed_at: DateTime<Utc>,
}

impl TrustReceipt {
    /// Compute the content hash of this receipt
    pub fn compute_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let content = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}:{}",
            self.gig_id,
            self.agent_id,
            self.poster_id,
            self.amount.value,
            self.chain,
            self.swarm_verdict,
            self.score_change,
            self.tier_after,
            self.completed_at.timestamp_millis(),
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify the receipt hash
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> TrustReceipt {
        let mut r = TrustReceipt {
            id: ReceiptId::new(),
            gig_id: GigId::new(),
            agent_id: AgentId::new(),
            poster_id: AgentId::new(),
            gig_title: "Index devnet transfers".to_string(),
            amount: Amount::usdc(120.0),
            chain: Chain::BaseSepolia,
            swarm_verdict: ValidationStatus::Approved,
            score_change: 10,
            tier_before: BondTier::Bonded,
            tier_after: BondTier::Bonded,
            hash: String::new(),
            completed_at: Utc::now(),
        };
        r.hash = r.compute_hash();
        r
    }

    #[test]
    fn test_receipt_verifies() {
        assert!(receipt().verify());
    }

    #[test]
    fn test_tampering_breaks_hash() {
        let mut r = receipt();
        r.score_change = 9000;
        assert!(!r.verify());
    }
}
