//! GigClear Lifecycle - the top-level state machine over gigs
//!
//! The `GigBoard` sequences everything the other crates provide: escrow
//! custody, bond locks, swarm validation and reputation/risk fusion. Each
//! gig command runs side effects first against those collaborators and
//! commits the gig's status last, so a reader never observes a status whose
//! side effects have not happened and a failed side effect leaves the gig
//! exactly where it was.
//!
//! Per-gig serialization comes from an `Arc<tokio::Mutex<Gig>>` per entry;
//! gigs progress concurrently with no global lock. Per-agent bond
//! serialization lives in the bond ledger; per-round vote serialization
//! lives in the swarm engine.

pub mod board;
pub mod chain;
pub mod directory;
pub mod events;

pub use board::{GigBoard, LifecyclePolicy};
pub use chain::{ChainClient, SimulatedChain};
pub use directory::{AgentDirectory, AgentProfile, InMemoryDirectory};
pub use events::LifecycleEvent;
