//! Error types for GigClear
//!
//! Every rejected operation returns a typed error carrying the authoritative
//! current state, so callers never have to guess what the system believed
//! when it refused them. Nothing in the core retries automatically.

use thiserror::Error;

/// Result type for GigClear operations
pub type Result<T> = std::result::Result<T, GigClearError>;

/// GigClear error types
#[derive(Debug, Clone, Error)]
pub enum GigClearError {
    // ========================================================================
    // Amount Errors
    // ========================================================================

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Amount underflow during arithmetic
    #[error("Amount underflow during arithmetic operation")]
    AmountUnderflow,

    /// Division by zero
    #[error("Division by zero")]
    DivisionByZero,

    /// Currency mismatch
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// Amount must be strictly positive
    #[error("Invalid amount for {operation}: {amount} (must be positive)")]
    InvalidAmount { operation: String, amount: f64 },

    // ========================================================================
    // Transition Errors
    // ========================================================================

    /// A state machine rejected a transition
    #[error("Invalid {entity} transition from {from} to {attempted}")]
    InvalidTransition {
        entity: String,
        from: String,
        attempted: String,
    },

    // ========================================================================
    // Escrow Errors
    // ========================================================================

    /// Escrow not found
    #[error("Escrow {escrow_id} not found")]
    EscrowNotFound { escrow_id: String },

    /// A gig already has a live escrow
    #[error("Gig {gig_id} already has an active escrow {escrow_id}")]
    EscrowExists { gig_id: String, escrow_id: String },

    /// Escrow deposit has not been confirmed on chain
    #[error("Escrow for gig {gig_id} is not funded (state: {state})")]
    EscrowNotFunded { gig_id: String, state: String },

    // ========================================================================
    // Bond Errors
    // ========================================================================

    /// Not enough unlocked bond to cover the request
    #[error("Insufficient available bond for agent {agent_id}: requested {requested}, available {available}")]
    InsufficientAvailable {
        agent_id: String,
        requested: f64,
        available: f64,
    },

    /// Slash targeted funds that are not locked
    #[error("Nothing locked to slash for agent {agent_id}: requested {requested}, locked {locked}")]
    NothingLocked {
        agent_id: String,
        requested: f64,
        locked: f64,
    },

    /// Bond account not found
    #[error("Bond account for agent {agent_id} not found")]
    BondAccountNotFound { agent_id: String },

    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Validation round not found
    #[error("Validation {validation_id} not found")]
    ValidationNotFound { validation_id: String },

    /// Not enough eligible validators to open a round
    #[error("Insufficient validators: required {required}, available {available}")]
    InsufficientValidators { required: usize, available: usize },

    /// Voter was not selected for this round
    #[error("Agent {agent_id} was not selected for validation {validation_id}")]
    NotSelected {
        agent_id: String,
        validation_id: String,
    },

    /// Validator already cast a vote in this round
    #[error("Agent {agent_id} already voted in validation {validation_id}")]
    AlreadyVoted {
        agent_id: String,
        validation_id: String,
    },

    /// Round has already reached a verdict
    #[error("Validation {validation_id} is closed (status: {status})")]
    ValidationClosed {
        validation_id: String,
        status: String,
    },

    /// Round has not reached a verdict yet
    #[error("Validation {validation_id} is still pending")]
    ValidationNotClosed { validation_id: String },

    /// Voter is not eligible for the requested reward
    #[error("Agent {agent_id} is not eligible for a reward in validation {validation_id}: {reason}")]
    NotEligible {
        agent_id: String,
        validation_id: String,
        reason: String,
    },

    /// Reward was already claimed
    #[error("Agent {agent_id} already claimed the reward for validation {validation_id}")]
    AlreadyClaimed {
        agent_id: String,
        validation_id: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================

    /// Gig not found
    #[error("Gig {gig_id} not found")]
    GigNotFound { gig_id: String },

    /// Bond could not be locked during assignment
    #[error("Bond lock failed for agent {agent_id} on gig {gig_id}: {cause}")]
    BondLockFailed {
        agent_id: String,
        gig_id: String,
        cause: String,
    },

    /// Agent already applied to this gig
    #[error("Agent {agent_id} already applied to gig {gig_id}")]
    AlreadyApplied { agent_id: String, gig_id: String },

    /// Assignment requires a prior application
    #[error("Agent {agent_id} has not applied to gig {gig_id}")]
    NotApplicant { agent_id: String, gig_id: String },

    /// Agent already holds an unanswered offer for this gig
    #[error("Agent {agent_id} already has a pending offer for gig {gig_id}")]
    OfferExists { agent_id: String, gig_id: String },

    /// No unanswered offer to respond to
    #[error("No pending offer for agent {agent_id} on gig {gig_id}")]
    OfferNotFound { agent_id: String, gig_id: String },

    /// Caller is neither poster nor assignee of the gig
    #[error("Agent {agent_id} is not a participant of gig {gig_id}")]
    NotParticipant { agent_id: String, gig_id: String },

    /// Agent not found in the directory
    #[error("Agent {agent_id} not found")]
    AgentNotFound { agent_id: String },

    // ========================================================================
    // General Errors
    // ========================================================================

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Invalid input
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },
}

impl GigClearError {
    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        entity: impl Into<String>,
        from: impl ToString,
        attempted: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity: entity.into(),
            from: from.to_string(),
            attempted: attempted.to_string(),
        }
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountUnderflow => "AMOUNT_UNDERFLOW",
            Self::DivisionByZero => "DIVISION_BY_ZERO",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::EscrowNotFound { .. } => "ESCROW_NOT_FOUND",
            Self::EscrowExists { .. } => "ESCROW_EXISTS",
            Self::EscrowNotFunded { .. } => "ESCROW_NOT_FUNDED",
            Self::InsufficientAvailable { .. } => "INSUFFICIENT_AVAILABLE",
            Self::NothingLocked { .. } => "NOTHING_LOCKED",
            Self::BondAccountNotFound { .. } => "BOND_ACCOUNT_NOT_FOUND",
            Self::ValidationNotFound { .. } => "VALIDATION_NOT_FOUND",
            Self::InsufficientValidators { .. } => "INSUFFICIENT_VALIDATORS",
            Self::NotSelected { .. } => "NOT_SELECTED",
            Self::AlreadyVoted { .. } => "ALREADY_VOTED",
            Self::ValidationClosed { .. } => "VALIDATION_CLOSED",
            Self::ValidationNotClosed { .. } => "VALIDATION_NOT_CLOSED",
            Self::NotEligible { .. } => "NOT_ELIGIBLE",
            Self::AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            Self::GigNotFound { .. } => "GIG_NOT_FOUND",
            Self::BondLockFailed { .. } => "BOND_LOCK_FAILED",
            Self::AlreadyApplied { .. } => "ALREADY_APPLIED",
            Self::NotApplicant { .. } => "NOT_APPLICANT",
            Self::OfferExists { .. } => "OFFER_EXISTS",
            Self::OfferNotFound { .. } => "OFFER_NOT_FOUND",
            Self::NotParticipant { .. } => "NOT_PARTICIPANT",
            Self::AgentNotFound { .. } => "AGENT_NOT_FOUND",
            Self::Internal { .. } => "INTERNAL_ERROR",
            Self::InvalidInput { .. } => "INVALID_INPUT",
        }
    }
}
