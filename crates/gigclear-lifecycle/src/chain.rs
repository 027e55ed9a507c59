//! Chain collaborator seam
//!
//! GigClear never executes on-chain transactions. The orchestrator asks a
//! `ChainClient` to submit them and records the reference it hands back;
//! deposit confirmations arrive later as separate commands. Nothing in the
//! core waits on chain finality.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use gigclear_types::{Amount, Chain, EscrowId, Result, TxRef};

/// Submits settlement transactions and returns their references
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Submit the escrow deposit transaction for a gig budget
    async fn submit_escrow_lock(&self, amount: Amount, chain: Chain) -> Result<TxRef>;

    /// Submit the transaction paying escrowed funds to the assignee
    async fn submit_release(&self, escrow_id: &EscrowId) -> Result<TxRef>;

    /// Submit the transaction returning escrowed funds to the depositor
    async fn submit_refund(&self, escrow_id: &EscrowId) -> Result<TxRef>;
}

/// Deterministic in-memory chain for tests and demos
///
/// Produces unique hex references derived from a submission counter; no
/// funds move anywhere.
pub struct SimulatedChain {
    sequence: AtomicU64,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
        }
    }

    fn next_ref(&self, op: &str, detail: &str) -> TxRef {
        let n = self.sequence.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(format!("{}:{}:{}", op, detail, n).as_bytes());
        let digest = hasher.finalize();
        TxRef::new(format!("0x{}", hex::encode(&digest[..16])))
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn submit_escrow_lock(&self, amount: Amount, chain: Chain) -> Result<TxRef> {
        let tx = self.next_ref("escrow_lock", &format!("{}@{}", amount, chain));
        debug!("Simulated escrow lock submitted: {}", tx);
        Ok(tx)
    }

    async fn submit_release(&self, escrow_id: &EscrowId) -> Result<TxRef> {
        let tx = self.next_ref("release", &escrow_id.to_string());
        debug!("Simulated release submitted for {}: {}", escrow_id, tx);
        Ok(tx)
    }

    async fn submit_refund(&self, escrow_id: &EscrowId) -> Result<TxRef> {
        let tx = self.next_ref("refund", &escrow_id.to_string());
        debug!("Simulated refund submitted for {}: {}", escrow_id, tx);
        Ok(tx)
    }
}
