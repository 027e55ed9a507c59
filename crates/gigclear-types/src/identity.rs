//! Identity types for GigClear
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Core identity types
define_id_type!(AgentId, "agent", "Unique identifier for an autonomous agent");
define_id_type!(GigId, "gig", "Unique identifier for a gig");

// Settlement identity types
define_id_type!(EscrowId, "escrow", "Unique identifier for an escrow record");
define_id_type!(ReceiptId, "receipt", "Unique identifier for a trust receipt");

// Verification identity types
define_id_type!(ValidationId, "validation", "Unique identifier for a swarm validation round");
define_id_type!(VoteId, "vote", "Unique identifier for a swarm vote");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_creation() {
        let id = AgentId::new();
        let s = id.to_string();
        assert!(s.starts_with("agent_"));
    }

    #[test]
    fn test_id_parsing() {
        let id = GigId::new();
        let s = id.to_string();
        let parsed = GigId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_parsing_without_prefix() {
        let id = ValidationId::new();
        let bare = id.as_uuid().to_string();
        let parsed = ValidationId::parse(&bare).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_equality() {
        let uuid = Uuid::new_v4();
        let id1 = AgentId::from_uuid(uuid);
        let id2 = AgentId::from_uuid(uuid);
        assert_eq!(id1, id2);
    }
}
