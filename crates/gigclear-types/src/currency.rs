//! Currency and chain types for GigClear
//!
//! Gigs settle in a small closed set of currencies on the testnets the
//! settlement collaborators support. Transaction references are opaque
//! strings recorded from those collaborators, never executed here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Settlement currencies supported for gig budgets and bonds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// Ether
    Eth,
    /// USD Coin
    Usdc,
}

impl Currency {
    /// Get the currency symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eth => "ETH",
            Self::Usdc => "USDC",
        }
    }

    /// Check if this is a stablecoin (pegged to fiat)
    pub fn is_stablecoin(&self) -> bool {
        matches!(self, Self::Usdc)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::Usdc
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Blockchain a gig settles on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    /// Base Sepolia testnet
    BaseSepolia,
    /// Solana devnet
    SolDevnet,
}

impl Chain {
    /// Get the chain ID (for EVM chains)
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Self::BaseSepolia => Some(84532),
            Self::SolDevnet => None,
        }
    }

    /// Check if this is an EVM-compatible chain
    pub fn is_evm(&self) -> bool {
        matches!(self, Self::BaseSepolia)
    }

    /// Get the canonical chain name
    pub fn name(&self) -> &'static str {
        match self {
            Self::BaseSepolia => "base-sepolia",
            Self::SolDevnet => "sol-devnet",
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::BaseSepolia
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Opaque reference to an on-chain transaction
///
/// GigClear never executes transactions. Collaborators submit them and hand
/// back a reference, which is recorded verbatim for audit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxRef(pub String);

impl TxRef {
    /// Create a transaction reference from a raw string
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the raw reference string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TxRef {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for TxRef {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_symbols() {
        assert_eq!(Currency::Eth.symbol(), "ETH");
        assert_eq!(Currency::Usdc.symbol(), "USDC");
    }

    #[test]
    fn test_stablecoin_detection() {
        assert!(Currency::Usdc.is_stablecoin());
        assert!(!Currency::Eth.is_stablecoin());
    }

    #[test]
    fn test_chain_ids() {
        assert_eq!(Chain::BaseSepolia.chain_id(), Some(84532));
        assert_eq!(Chain::SolDevnet.chain_id(), None);
        assert!(Chain::BaseSepolia.is_evm());
        assert!(!Chain::SolDevnet.is_evm());
    }

    #[test]
    fn test_tx_ref_roundtrip() {
        let tx = TxRef::new("0xabc123");
        assert_eq!(tx.as_str(), "0xabc123");
        assert_eq!(tx.to_string(), "0xabc123");
    }
}
