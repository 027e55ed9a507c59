//! GigClear Types - Canonical domain types for agent gig settlement
//!
//! This crate contains all foundational types for GigClear with zero
//! dependencies on other gigclear crates. It defines the complete type
//! system for:
//!
//! - Identity types (AgentId, GigId, EscrowId, ValidationId, ...)
//! - Currency, chain, and amount types with 18-decimal precision
//! - Gig lifecycle and escrow custody state machines
//! - Bond accounts and their append-only event log
//! - Swarm validation rounds and votes
//! - Reputation/risk events and fused agent standing
//! - Trust receipts
//!
//! # Architectural Invariants
//!
//! These types support the core GigClear guarantees:
//!
//! 1. Budgets are escrowed before work starts - funds never move directly
//!    between poster and assignee
//! 2. Available + locked bond always equals total bonded; slashes only ever
//!    touch locked collateral
//! 3. Event logs are append-only and are the source of truth - every
//!    materialized view can be rebuilt by replay
//! 4. State machines only move along their declared transition tables, and
//!    terminal states are retained forever

pub mod identity;
pub mod currency;
pub mod amount;
pub mod gig;
pub mod escrow;
pub mod bond;
pub mod swarm;
pub mod fusion;
pub mod receipt;
pub mod error;

pub use identity::*;
pub use currency::*;
pub use amount::*;
pub use gig::*;
pub use escrow::*;
pub use bond::*;
pub use swarm::*;
pub use fusion::*;
pub use receipt::*;
pub use error::*;

/// Version of the GigClear types schema
pub const TYPES_VERSION: &str = "0.1.0";
