//! The gig board - orchestrator over the settlement pipeline
//!
//! Every command follows the same shape: lock the gig's mutex, validate the
//! current status, run side effects against escrow/bond/swarm/fusion/chain,
//! commit the new status, emit an event. A failed side effect returns the
//! collaborator's error with the gig untouched; status is a derived cache
//! of which side effects have succeeded.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use gigclear_bond::BondLedger;
use gigclear_escrow::{EscrowManager, EscrowResolution};
use gigclear_fusion::FusionEngine;
use gigclear_swarm::SwarmConsensus;
use gigclear_types::{
    AgentId, DisputeResolution, EscrowStatus, Gig, GigApplication, GigClearError, GigId,
    GigOffer, GigOutcome, GigSpec, GigStatus, OfferStatus, ReceiptId, ReputationSource, Result,
    RiskFactor, SwarmValidation, SwarmVote, TrustReceipt, TxRef, ValidationStatus, VoteChoice,
};

use crate::chain::ChainClient;
use crate::directory::AgentDirectory;
use crate::events::LifecycleEvent;

/// Tunable parameters of the gig lifecycle
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    /// Swarm rejections tolerated before the gig escalates to a dispute
    pub max_rejections: u32,
    /// Fraction of the budget carved out as the validator reward pool
    pub reward_pool_bps: u32,
    /// Whether assignment requires a prior application
    pub require_application: bool,
    /// How long a validation round stays open before it can be expired
    pub response_window: chrono::Duration,
    /// Escrow-source reputation gained on a paid completion
    pub completion_score: i64,
    /// Swarm-source reputation gained on an approved submission
    pub approval_score: i64,
    /// Swarm-source reputation change on a rejected submission
    pub rejection_penalty: i64,
    /// Risk added when rejections exhaust the retry budget
    pub failed_gig_risk: f64,
    /// Risk added when a dispute is filed against the assignee
    pub dispute_risk: f64,
    /// Risk change when a dispute concludes
    pub dispute_resolved_risk: f64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            max_rejections: 2,
            reward_pool_bps: 500,
            require_application: true,
            response_window: chrono::Duration::hours(24),
            completion_score: 25,
            approval_score: 15,
            rejection_penalty: -10,
            failed_gig_risk: 8.0,
            dispute_risk: 6.0,
            dispute_resolved_risk: -3.0,
        }
    }
}

/// The gig lifecycle orchestrator
///
/// Gigs are keyed by id; each holds its own mutex so transitions on
/// different gigs never contend. Collaborators are shared handles.
pub struct GigBoard {
    policy: LifecyclePolicy,
    gigs: Arc<DashMap<GigId, Arc<Mutex<Gig>>>>,
    receipts: Arc<DashMap<GigId, TrustReceipt>>,
    escrow: Arc<EscrowManager>,
    bonds: Arc<BondLedger>,
    swarm: Arc<SwarmConsensus>,
    fusion: Arc<FusionEngine>,
    chain: Arc<dyn ChainClient>,
    directory: Arc<dyn AgentDirectory>,
    events_tx: broadcast::Sender<LifecycleEvent>,
}

impl GigBoard {
    pub fn new(
        policy: LifecyclePolicy,
        escrow: Arc<EscrowManager>,
        bonds: Arc<BondLedger>,
        swarm: Arc<SwarmConsensus>,
        fusion: Arc<FusionEngine>,
        chain: Arc<dyn ChainClient>,
        directory: Arc<dyn AgentDirectory>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            policy,
            gigs: Arc::new(DashMap::new()),
            receipts: Arc::new(DashMap::new()),
            escrow,
            bonds,
            swarm,
            fusion,
            chain,
            directory,
            events_tx,
        }
    }

    /// Subscribe to the lifecycle event feed
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events_tx.subscribe()
    }

    /// The policy this board was built with
    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    fn emit(&self, event: LifecycleEvent) {
        // No receivers is fine
        let _ = self.events_tx.send(event);
    }

    /// Post a gig and initiate its escrow
    ///
    /// The gig opens with no assignee. Funding happens out of band: the
    /// chain collaborator submits the deposit and [`confirm_escrow_deposit`]
    /// relays the confirmation.
    ///
    /// [`confirm_escrow_deposit`]: GigBoard::confirm_escrow_deposit
    pub async fn post_gig(&self, spec: GigSpec) -> Result<Gig> {
        if !spec.budget.is_positive() {
            return Err(GigClearError::InvalidAmount {
                operation: "gig.post".to_string(),
                amount: spec.budget.to_human(),
            });
        }
        if spec.bond_required.is_negative() {
            return Err(GigClearError::InvalidAmount {
                operation: "gig.post".to_string(),
                amount: spec.bond_required.to_human(),
            });
        }
        if !self.directory.exists(&spec.poster).await {
            return Err(GigClearError::AgentNotFound {
                agent_id: spec.poster.to_string(),
            });
        }

        let now = Utc::now();
        let gig = Gig {
            id: GigId::new(),
            title: spec.title,
            description: spec.description,
            skills_required: spec.skills_required,
            poster: spec.poster,
            assignee: None,
            budget: spec.budget,
            bond_required: spec.bond_required,
            chain: spec.chain,
            status: GigStatus::Open,
            applicants: Vec::new(),
            offers: Vec::new(),
            bond_locked: false,
            rejection_count: 0,
            created_at: now,
            assigned_at: None,
            completed_at: None,
            resolved_at: None,
            updated_at: now,
        };

        self.escrow
            .initiate(gig.id, gig.poster, gig.budget, gig.chain)
            .await?;
        self.gigs.insert(gig.id, Arc::new(Mutex::new(gig.clone())));

        info!("Gig {} posted by {}: {}", gig.id, gig.poster, gig.budget);
        self.emit(LifecycleEvent::GigPosted {
            gig_id: gig.id,
            poster: gig.poster,
            budget: gig.budget.to_human(),
            timestamp: now,
        });
        Ok(gig)
    }

    /// Submit the escrow deposit through the chain collaborator
    ///
    /// Returns the submission reference. The deposit is not confirmed until
    /// [`confirm_escrow_deposit`] is called with it - the board never waits
    /// for finality.
    ///
    /// [`confirm_escrow_deposit`]: GigBoard::confirm_escrow_deposit
    pub async fn fund_escrow(&self, gig_id: &GigId) -> Result<TxRef> {
        let cell = self.gig_cell(gig_id)?;
        let gig = cell.lock().await;
        self.chain.submit_escrow_lock(gig.budget, gig.chain).await
    }

    /// Relay a confirmed escrow deposit
    ///
    /// Idempotent on the same transaction reference. The gig stays Open -
    /// funding is a precondition of assignment, not a status.
    pub async fn confirm_escrow_deposit(&self, gig_id: &GigId, tx_ref: TxRef) -> Result<()> {
        let record = self
            .escrow
            .for_gig(gig_id)
            .await
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: gig_id.to_string(),
            })?;
        let locked = self.escrow.confirm_lock(&record.id, tx_ref).await?;

        self.emit(LifecycleEvent::EscrowFunded {
            gig_id: *gig_id,
            escrow_id: locked.id,
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Apply to work an Open gig
    pub async fn apply_to_gig(&self, gig_id: &GigId, agent: AgentId) -> Result<Gig> {
        if !self.directory.exists(&agent).await {
            return Err(GigClearError::AgentNotFound {
                agent_id: agent.to_string(),
            });
        }

        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::Open {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                "application",
            ));
        }
        if gig.poster == agent {
            return Err(GigClearError::invalid_input(
                "agent",
                "poster cannot apply to their own gig",
            ));
        }
        if gig.has_applied(&agent) {
            return Err(GigClearError::AlreadyApplied {
                agent_id: agent.to_string(),
                gig_id: gig_id.to_string(),
            });
        }

        gig.applicants.push(GigApplication {
            agent_id: agent,
            applied_at: Utc::now(),
        });
        gig.updated_at = Utc::now();

        info!("Agent {} applied to gig {}", agent, gig_id);
        Ok(gig.clone())
    }

    /// Invite a specific agent to work an Open gig
    ///
    /// The poster-initiated counterpart of [`apply_to_gig`]; at most one
    /// unanswered offer per agent per gig.
    ///
    /// [`apply_to_gig`]: GigBoard::apply_to_gig
    pub async fn offer_gig(
        &self,
        gig_id: &GigId,
        agent: AgentId,
        message: Option<String>,
    ) -> Result<Gig> {
        if !self.directory.exists(&agent).await {
            return Err(GigClearError::AgentNotFound {
                agent_id: agent.to_string(),
            });
        }

        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::Open {
            return Err(GigClearError::invalid_transition("gig", gig.status, "offer"));
        }
        if gig.poster == agent {
            return Err(GigClearError::invalid_input(
                "agent",
                "poster cannot offer the gig to themselves",
            ));
        }
        if gig.has_pending_offer(&agent) {
            return Err(GigClearError::OfferExists {
                agent_id: agent.to_string(),
                gig_id: gig_id.to_string(),
            });
        }

        let now = Utc::now();
        gig.offers.push(GigOffer {
            agent_id: agent,
            message,
            status: OfferStatus::Pending,
            offered_at: now,
            responded_at: None,
        });
        gig.updated_at = now;

        info!("Gig {} offered to {}", gig_id, agent);
        self.emit(LifecycleEvent::OfferExtended {
            gig_id: *gig_id,
            agent,
            timestamp: now,
        });
        Ok(gig.clone())
    }

    /// Answer a pending offer
    ///
    /// Accepting records the agent as an applicant, so the usual
    /// assignment path applies afterwards.
    pub async fn respond_to_offer(
        &self,
        gig_id: &GigId,
        agent: AgentId,
        accept: bool,
    ) -> Result<Gig> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::Open {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                "offer response",
            ));
        }

        let now = Utc::now();
        let offer = gig
            .pending_offer_mut(&agent)
            .ok_or_else(|| GigClearError::OfferNotFound {
                agent_id: agent.to_string(),
                gig_id: gig_id.to_string(),
            })?;
        offer.status = if accept {
            OfferStatus::Accepted
        } else {
            OfferStatus::Declined
        };
        offer.responded_at = Some(now);

        if accept && !gig.has_applied(&agent) {
            gig.applicants.push(GigApplication {
                agent_id: agent,
                applied_at: now,
            });
        }
        gig.updated_at = now;

        info!(
            "Gig {} offer {} by {}",
            gig_id,
            if accept { "accepted" } else { "declined" },
            agent
        );
        self.emit(LifecycleEvent::OfferAnswered {
            gig_id: *gig_id,
            agent,
            accepted: accept,
            timestamp: now,
        });
        Ok(gig.clone())
    }

    /// Assign a gig to an applicant, locking their bond
    ///
    /// Requires the escrow to be funded. The bond lock is the one side
    /// effect that can fail mid-command; it runs before the status commit,
    /// so a failure leaves the gig Open with nothing locked.
    pub async fn assign(&self, gig_id: &GigId, assignee: AgentId) -> Result<Gig> {
        if !self.directory.exists(&assignee).await {
            return Err(GigClearError::AgentNotFound {
                agent_id: assignee.to_string(),
            });
        }

        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::Open {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                GigStatus::Assigned,
            ));
        }
        if self.policy.require_application && !gig.has_applied(&assignee) {
            return Err(GigClearError::NotApplicant {
                agent_id: assignee.to_string(),
                gig_id: gig_id.to_string(),
            });
        }

        let record = self
            .escrow
            .for_gig(gig_id)
            .await
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: gig_id.to_string(),
            })?;
        if record.status != EscrowStatus::Locked {
            return Err(GigClearError::EscrowNotFunded {
                gig_id: gig_id.to_string(),
                state: record.status.to_string(),
            });
        }

        if gig.bond_required.is_positive() {
            self.bonds
                .lock(&assignee, gig.bond_required, gig_id)
                .await
                .map_err(|cause| GigClearError::BondLockFailed {
                    agent_id: assignee.to_string(),
                    gig_id: gig_id.to_string(),
                    cause: cause.to_string(),
                })?;
        }

        let now = Utc::now();
        gig.assignee = Some(assignee);
        gig.bond_locked = gig.bond_required.is_positive();
        gig.status = GigStatus::Assigned;
        gig.assigned_at = Some(now);
        gig.updated_at = now;

        // Unanswered offers lapse once the gig leaves Open
        for offer in gig
            .offers
            .iter_mut()
            .filter(|o| o.status == OfferStatus::Pending)
        {
            offer.status = OfferStatus::Expired;
            offer.responded_at = Some(now);
        }

        info!(
            "Gig {} assigned to {} (bond {})",
            gig_id, assignee, gig.bond_required
        );
        self.emit(LifecycleEvent::GigAssigned {
            gig_id: *gig_id,
            assignee,
            bond_locked: gig.bond_required.to_human(),
            timestamp: now,
        });
        Ok(gig.clone())
    }

    /// Assignee starts working
    pub async fn start_work(&self, gig_id: &GigId, by: AgentId) -> Result<Gig> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.assignee != Some(by) {
            return Err(GigClearError::NotParticipant {
                agent_id: by.to_string(),
                gig_id: gig_id.to_string(),
            });
        }
        if gig.status != GigStatus::Assigned {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                GigStatus::InProgress,
            ));
        }

        let now = Utc::now();
        gig.status = GigStatus::InProgress;
        gig.updated_at = now;

        self.emit(LifecycleEvent::WorkStarted {
            gig_id: *gig_id,
            assignee: by,
            timestamp: now,
        });
        Ok(gig.clone())
    }

    /// Submit completed work, opening a validation round over the active
    /// agent pool
    ///
    /// The reward pool is carved from the budget at the configured rate. If
    /// the pool of eligible validators is too small the gig stays
    /// InProgress.
    pub async fn submit_work(&self, gig_id: &GigId, by: AgentId) -> Result<SwarmValidation> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.assignee != Some(by) {
            return Err(GigClearError::NotParticipant {
                agent_id: by.to_string(),
                gig_id: gig_id.to_string(),
            });
        }
        if gig.status != GigStatus::InProgress {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                GigStatus::PendingValidation,
            ));
        }

        let reward_pool = gig.budget.basis_points(self.policy.reward_pool_bps)?;
        let eligible = self.directory.active_agents().await;
        let validation = self
            .swarm
            .open_validation(*gig_id, gig.poster, by, &eligible, reward_pool)
            .await?;

        let now = Utc::now();
        gig.status = GigStatus::PendingValidation;
        gig.updated_at = now;

        self.emit(LifecycleEvent::WorkSubmitted {
            gig_id: *gig_id,
            validation_id: validation.id,
            reward_pool: reward_pool.to_human(),
            timestamp: now,
        });
        Ok(validation)
    }

    /// Cast a validator's vote on the gig's open round
    ///
    /// When the vote closes the round, the verdict is driven in the same
    /// call: approval settles the gig; rejection sends it back to rework or,
    /// past the retry limit, to a dispute.
    pub async fn cast_validation_vote(
        &self,
        gig_id: &GigId,
        voter: AgentId,
        choice: VoteChoice,
        reasoning: Option<String>,
    ) -> Result<(SwarmVote, Gig)> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::PendingValidation {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                "vote",
            ));
        }

        let validation = self.open_round(gig_id).await?;
        let (vote, status) = self
            .swarm
            .cast_vote(&validation.id, voter, choice, reasoning)
            .await?;

        if status.is_closed() {
            self.emit(LifecycleEvent::VerdictReached {
                gig_id: *gig_id,
                validation_id: validation.id,
                verdict: status,
                timestamp: Utc::now(),
            });
            match status {
                ValidationStatus::Approved => self.settle_approved(&mut gig).await?,
                ValidationStatus::Rejected => self.settle_rejected(&mut gig).await?,
                ValidationStatus::Pending => unreachable!("closed status is never pending"),
            }
        }

        Ok((vote, gig.clone()))
    }

    /// Force-close a round whose response window has elapsed
    ///
    /// The round closes Rejected under the inconclusive rule and the gig
    /// takes the same rework-or-dispute path as a voted rejection.
    pub async fn expire_validation(&self, gig_id: &GigId) -> Result<Gig> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::PendingValidation {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                "expire",
            ));
        }

        let validation = self.open_round(gig_id).await?;
        if Utc::now() - validation.opened_at < self.policy.response_window {
            return Err(GigClearError::invalid_input(
                "validation",
                "response window has not elapsed",
            ));
        }
        let closed = self.swarm.force_close(&validation.id).await?;

        self.emit(LifecycleEvent::VerdictReached {
            gig_id: *gig_id,
            validation_id: closed.id,
            verdict: closed.status,
            timestamp: Utc::now(),
        });
        self.settle_rejected(&mut gig).await?;
        Ok(gig.clone())
    }

    /// File a dispute, freezing the gig pending external arbitration
    ///
    /// Either participant may file from any non-terminal state. A pending
    /// validation round is force-closed so no further votes land; a locked
    /// escrow is suspended.
    pub async fn file_dispute(
        &self,
        gig_id: &GigId,
        by: AgentId,
        reason: impl Into<String>,
    ) -> Result<Gig> {
        let reason = reason.into();
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if !gig.is_participant(&by) {
            return Err(GigClearError::NotParticipant {
                agent_id: by.to_string(),
                gig_id: gig_id.to_string(),
            });
        }
        if !gig.status.can_transition_to(GigStatus::Disputed) {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                GigStatus::Disputed,
            ));
        }

        // Freeze any pending round before the status commit
        if gig.status == GigStatus::PendingValidation {
            if let Some(validation) = self.swarm.for_gig(gig_id).await {
                if !validation.status.is_closed() {
                    self.swarm.force_close(&validation.id).await?;
                }
            }
        }

        if let Some(record) = self.escrow.for_gig(gig_id).await {
            if record.status == EscrowStatus::Locked {
                self.escrow.mark_disputed(&record.id).await?;
            }
        }

        if let Some(assignee) = gig.assignee {
            self.fusion
                .record_risk(
                    assignee,
                    RiskFactor::DisputeOpened,
                    self.policy.dispute_risk,
                    serde_json::json!({ "gig_id": gig.id, "filed_by": by, "reason": reason }),
                )
                .await?;
        }

        let now = Utc::now();
        gig.status = GigStatus::Disputed;
        gig.updated_at = now;

        warn!("Gig {} disputed by {}: {}", gig_id, by, reason);
        self.emit(LifecycleEvent::DisputeFiled {
            gig_id: *gig_id,
            filed_by: by,
            reason,
            timestamp: now,
        });
        Ok(gig.clone())
    }

    /// Apply the external arbiter's decision to a disputed gig
    ///
    /// Release pays the assignee and returns their bond; the gig commits
    /// Completed. Refund returns the budget to the poster, slashes the
    /// assignee's gig bond when they are at fault (unlocks it otherwise),
    /// and the gig stays Disputed with `resolved_at` set - the dispute
    /// remains visible for audit.
    pub async fn resolve_dispute(
        &self,
        gig_id: &GigId,
        resolution: DisputeResolution,
    ) -> Result<Gig> {
        let cell = self.gig_cell(gig_id)?;
        let mut gig = cell.lock().await;

        if gig.status != GigStatus::Disputed || gig.resolved_at.is_some() {
            return Err(GigClearError::invalid_transition(
                "gig",
                gig.status,
                "dispute resolution",
            ));
        }

        match resolution {
            DisputeResolution::ReleaseToAssignee => self.settle_release(&mut gig).await?,
            DisputeResolution::RefundToPoster { slash_assignee } => {
                self.settle_refund(&mut gig, slash_assignee).await?
            }
        }
        Ok(gig.clone())
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current state of a gig
    pub async fn gig(&self, gig_id: &GigId) -> Result<Gig> {
        let cell = self.gig_cell(gig_id)?;
        let gig = cell.lock().await;
        Ok(gig.clone())
    }

    /// All gigs currently in `status`
    pub async fn gigs_by_status(&self, status: GigStatus) -> Vec<Gig> {
        let cells: Vec<Arc<Mutex<Gig>>> =
            self.gigs.iter().map(|entry| entry.value().clone()).collect();
        let mut matching = Vec::new();
        for cell in cells {
            let gig = cell.lock().await;
            if gig.status == status {
                matching.push(gig.clone());
            }
        }
        matching.sort_by_key(|gig| gig.created_at);
        matching
    }

    /// Derived performance projection for an agent
    ///
    /// Combines the fusion completion rate with the bond ledger's
    /// reliability. Computed on read, never stored.
    pub async fn performance(&self, agent: &AgentId) -> f64 {
        let reliability = self
            .bonds
            .account(agent)
            .await
            .map(|account| account.reliability)
            .unwrap_or(1.0);
        self.fusion.performance_score(agent, reliability).await
    }

    /// The latest validation round for a gig, if any
    pub async fn validation_for(&self, gig_id: &GigId) -> Option<SwarmValidation> {
        self.swarm.for_gig(gig_id).await
    }

    /// The trust receipt a completed gig produced, if any
    pub async fn receipt_for(&self, gig_id: &GigId) -> Option<TrustReceipt> {
        self.receipts.get(gig_id).map(|r| r.clone())
    }

    // ------------------------------------------------------------------
    // Verdict settlement (called with the gig's mutex held)
    // ------------------------------------------------------------------

    /// Approved verdict: release escrow, unwind the bond, pay reputation,
    /// issue the trust receipt, commit Completed.
    async fn settle_approved(&self, gig: &mut Gig) -> Result<()> {
        let assignee = self.require_assignee(gig)?;
        let record = self
            .escrow
            .for_gig(&gig.id)
            .await
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: gig.id.to_string(),
            })?;

        let tier_before = self.bonds.tier(&assignee).await?;

        let tx = self.chain.submit_release(&record.id).await?;
        self.escrow.release(&record.id, tx).await?;
        self.unwind_bond(gig, &assignee, false).await?;

        let tier_after = self.bonds.tier(&assignee).await?;

        self.fusion
            .record_reputation(
                assignee,
                "escrow_released",
                self.policy.completion_score,
                ReputationSource::Escrow,
                serde_json::json!({ "gig_id": gig.id, "amount": gig.budget.to_human() }),
            )
            .await?;
        self.fusion
            .record_reputation(
                assignee,
                "swarm_approved",
                self.policy.approval_score,
                ReputationSource::Swarm,
                serde_json::json!({ "gig_id": gig.id }),
            )
            .await?;
        self.fusion
            .record_outcome(
                assignee,
                gig.id,
                GigOutcome::Completed {
                    earned: gig.budget.to_human(),
                },
            )
            .await?;

        let now = Utc::now();
        let mut receipt = TrustReceipt {
            id: ReceiptId::new(),
            gig_id: gig.id,
            agent_id: assignee,
            poster_id: gig.poster,
            gig_title: gig.title.clone(),
            amount: gig.budget,
            chain: gig.chain,
            swarm_verdict: ValidationStatus::Approved,
            score_change: self.policy.completion_score + self.policy.approval_score,
            tier_before,
            tier_after,
            hash: String::new(),
            completed_at: now,
        };
        receipt.hash = receipt.compute_hash();
        let receipt_id = receipt.id;
        self.receipts.insert(gig.id, receipt);

        gig.status = GigStatus::Completed;
        gig.bond_locked = false;
        gig.completed_at = Some(now);
        gig.updated_at = now;

        info!("Gig {} completed: {} paid to {}", gig.id, gig.budget, assignee);
        self.emit(LifecycleEvent::GigCompleted {
            gig_id: gig.id,
            assignee,
            paid: gig.budget.to_human(),
            receipt_id,
            timestamp: now,
        });
        Ok(())
    }

    /// Rejected verdict: another rework round while the retry budget
    /// lasts, a dispute once it is spent.
    async fn settle_rejected(&self, gig: &mut Gig) -> Result<()> {
        let assignee = self.require_assignee(gig)?;
        gig.rejection_count += 1;

        self.fusion
            .record_reputation(
                assignee,
                "swarm_rejected",
                self.policy.rejection_penalty,
                ReputationSource::Swarm,
                serde_json::json!({ "gig_id": gig.id, "rejection": gig.rejection_count }),
            )
            .await?;

        let now = Utc::now();
        if gig.rejection_count <= self.policy.max_rejections {
            gig.status = GigStatus::InProgress;
            gig.updated_at = now;

            info!(
                "Gig {} rejected ({} of {}), returned for rework",
                gig.id, gig.rejection_count, self.policy.max_rejections
            );
            self.emit(LifecycleEvent::ReworkRequested {
                gig_id: gig.id,
                rejection_count: gig.rejection_count,
                timestamp: now,
            });
            return Ok(());
        }

        // Retry budget spent: escalate
        if let Some(record) = self.escrow.for_gig(&gig.id).await {
            if record.status == EscrowStatus::Locked {
                self.escrow.mark_disputed(&record.id).await?;
            }
        }
        self.fusion
            .record_risk(
                assignee,
                RiskFactor::FailedGig,
                self.policy.failed_gig_risk,
                serde_json::json!({ "gig_id": gig.id, "rejections": gig.rejection_count }),
            )
            .await?;
        self.fusion
            .record_risk(
                assignee,
                RiskFactor::DisputeOpened,
                self.policy.dispute_risk,
                serde_json::json!({ "gig_id": gig.id, "trigger": "rejection_limit" }),
            )
            .await?;

        gig.status = GigStatus::Disputed;
        gig.updated_at = now;

        warn!(
            "Gig {} rejected {} times, escalated to dispute",
            gig.id, gig.rejection_count
        );
        self.emit(LifecycleEvent::DisputeFiled {
            gig_id: gig.id,
            filed_by: gig.poster,
            reason: "rejection limit reached".to_string(),
            timestamp: now,
        });
        Ok(())
    }

    /// Arbiter sided with the assignee: pay out and commit Completed.
    async fn settle_release(&self, gig: &mut Gig) -> Result<()> {
        let assignee = self.require_assignee(gig)?;
        let record = self
            .escrow
            .for_gig(&gig.id)
            .await
            .ok_or_else(|| GigClearError::EscrowNotFound {
                escrow_id: gig.id.to_string(),
            })?;
        if record.status != EscrowStatus::Disputed {
            return Err(GigClearError::EscrowNotFunded {
                gig_id: gig.id.to_string(),
                state: record.status.to_string(),
            });
        }

        let tx = self.chain.submit_release(&record.id).await?;
        self.escrow
            .resolve_dispute(&record.id, EscrowResolution::Release, tx)
            .await?;
        self.unwind_bond(gig, &assignee, false).await?;

        self.fusion
            .record_reputation(
                assignee,
                "dispute_released",
                self.policy.completion_score,
                ReputationSource::Escrow,
                serde_json::json!({ "gig_id": gig.id, "amount": gig.budget.to_human() }),
            )
            .await?;
        self.fusion
            .record_risk(
                assignee,
                RiskFactor::DisputeResolved,
                self.policy.dispute_resolved_risk,
                serde_json::json!({ "gig_id": gig.id, "outcome": "release" }),
            )
            .await?;
        self.fusion
            .record_outcome(
                assignee,
                gig.id,
                GigOutcome::Completed {
                    earned: gig.budget.to_human(),
                },
            )
            .await?;

        let now = Utc::now();
        gig.status = GigStatus::Completed;
        gig.bond_locked = false;
        gig.completed_at = Some(now);
        gig.resolved_at = Some(now);
        gig.updated_at = now;

        info!("Gig {} dispute resolved: released to {}", gig.id, assignee);
        self.emit(LifecycleEvent::DisputeSettled {
            gig_id: gig.id,
            released_to_assignee: true,
            assignee_slashed: false,
            timestamp: now,
        });
        Ok(())
    }

    /// Arbiter sided with the poster: refund the budget and settle the
    /// assignee's bond. The gig stays Disputed; `resolved_at` marks it
    /// settled.
    async fn settle_refund(&self, gig: &mut Gig, slash_assignee: bool) -> Result<()> {
        if let Some(record) = self.escrow.for_gig(&gig.id).await {
            if record.status == EscrowStatus::Disputed {
                let tx = self.chain.submit_refund(&record.id).await?;
                self.escrow
                    .resolve_dispute(&record.id, EscrowResolution::Refund, tx)
                    .await?;
            }
        }

        let mut slashed = false;
        if let Some(assignee) = gig.assignee {
            slashed = self.unwind_bond(gig, &assignee, slash_assignee).await?;
            self.fusion
                .record_risk(
                    assignee,
                    RiskFactor::DisputeResolved,
                    self.policy.dispute_resolved_risk,
                    serde_json::json!({ "gig_id": gig.id, "outcome": "refund" }),
                )
                .await?;
            self.fusion
                .record_outcome(assignee, gig.id, GigOutcome::Failed)
                .await?;
        }

        let now = Utc::now();
        gig.bond_locked = false;
        gig.resolved_at = Some(now);
        gig.updated_at = now;

        warn!(
            "Gig {} dispute resolved: refunded to poster (assignee slashed: {})",
            gig.id, slashed
        );
        self.emit(LifecycleEvent::DisputeSettled {
            gig_id: gig.id,
            released_to_assignee: false,
            assignee_slashed: slashed,
            timestamp: now,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn gig_cell(&self, gig_id: &GigId) -> Result<Arc<Mutex<Gig>>> {
        self.gigs
            .get(gig_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GigClearError::GigNotFound {
                gig_id: gig_id.to_string(),
            })
    }

    fn require_assignee(&self, gig: &Gig) -> Result<AgentId> {
        gig.assignee.ok_or_else(|| {
            GigClearError::internal(format!("gig {} in {} has no assignee", gig.id, gig.status))
        })
    }

    async fn open_round(&self, gig_id: &GigId) -> Result<SwarmValidation> {
        self.swarm
            .for_gig(gig_id)
            .await
            .ok_or_else(|| GigClearError::ValidationNotFound {
                validation_id: gig_id.to_string(),
            })
    }

    /// Settle the assignee's gig bond: slash it when `slash` is set,
    /// unlock it otherwise. Returns whether a slash happened.
    async fn unwind_bond(&self, gig: &Gig, assignee: &AgentId, slash: bool) -> Result<bool> {
        if !gig.bond_locked {
            return Ok(false);
        }
        let held = self.bonds.account(assignee).await?.locked_for(&gig.id);
        if !held.is_positive() {
            return Ok(false);
        }

        if slash {
            let (_, risk_events) = self
                .bonds
                .slash(assignee, held, "dispute resolved against assignee", Some(&gig.id))
                .await?;
            for event in risk_events {
                self.fusion.ingest_risk(event).await?;
            }
            return Ok(true);
        }

        self.bonds.unlock(assignee, held, &gig.id).await?;
        Ok(false)
    }
}
