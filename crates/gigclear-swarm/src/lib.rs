//! Swarm consensus engine for GigClear
//!
//! Submitted work is certified by a sampled jury of peer agents rather than
//! by the poster alone. Each submission opens a validation round with a
//! validator set drawn from the eligible pool, excluding the gig's poster
//! and assignee. Votes tally toward one of two bounds: enough approvals
//! close the round `Approved`; enough rejections to make approval
//! unreachable close it `Rejected`. Validators whose vote aligned with the
//! final verdict split the round's reward pool.
//!
//! Sampling is seeded. The seed used for each round is recorded on the
//! validation itself so a draw can be re-checked after the fact.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use gigclear_types::{
    AgentId, Amount, GigClearError, GigId, Result, SwarmValidation, SwarmVote, ValidationId,
    ValidationStatus, VoteChoice, VoteId,
};

/// Where validator sampling seeds come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    /// Fresh OS entropy for every round
    Entropy,
    /// A fixed seed, for reproducible rounds
    Fixed(u64),
}

/// Tunable parameters for validator sampling and verdicts
#[derive(Debug, Clone)]
pub struct SwarmPolicy {
    /// Validators drawn for each round
    pub validator_count: usize,
    /// Approvals required for an Approved verdict
    pub threshold: u32,
    /// Seed source for the sampling draw
    pub seed: SeedSource,
}

impl Default for SwarmPolicy {
    fn default() -> Self {
        Self {
            validator_count: 5,
            threshold: 3,
            seed: SeedSource::Entropy,
        }
    }
}

/// A validation round together with its vote log
struct ValidationRound {
    validation: SwarmValidation,
    votes: Vec<SwarmVote>,
}

/// Peer-validation engine
///
/// Rounds are keyed by validation ID; vote casting and verdict evaluation
/// happen under the round's map entry, so two concurrent votes can never
/// both close the same round.
pub struct SwarmConsensus {
    policy: SwarmPolicy,
    rounds: Arc<DashMap<ValidationId, ValidationRound>>,
    by_gig: Arc<DashMap<GigId, ValidationId>>,
}

impl SwarmConsensus {
    pub fn new(policy: SwarmPolicy) -> Self {
        Self {
            policy,
            rounds: Arc::new(DashMap::new()),
            by_gig: Arc::new(DashMap::new()),
        }
    }

    /// The policy this engine was built with
    pub fn policy(&self) -> &SwarmPolicy {
        &self.policy
    }

    /// Open a validation round for a gig's submitted work.
    ///
    /// The poster and assignee are removed from `eligible` before sampling.
    /// Fails with `InsufficientValidators` when the remaining pool is
    /// smaller than the configured validator count. The pool is sorted by
    /// agent ID before the draw, so the same seed over the same pool always
    /// selects the same validators regardless of input order.
    pub async fn open_validation(
        &self,
        gig_id: GigId,
        poster: AgentId,
        assignee: AgentId,
        eligible: &[AgentId],
        reward_pool: Amount,
    ) -> Result<SwarmValidation> {
        if reward_pool.is_negative() {
            return Err(GigClearError::invalid_input(
                "reward_pool",
                "cannot be negative",
            ));
        }

        let required = self.policy.validator_count;
        if self.policy.threshold == 0 || self.policy.threshold as usize > required {
            return Err(GigClearError::invalid_input(
                "threshold",
                "must be between 1 and the validator count",
            ));
        }

        let mut pool: Vec<AgentId> = eligible
            .iter()
            .copied()
            .filter(|agent| *agent != poster && *agent != assignee)
            .collect();
        pool.sort_unstable();
        pool.dedup();

        if pool.len() < required {
            return Err(GigClearError::InsufficientValidators {
                required,
                available: pool.len(),
            });
        }

        let seed = match self.policy.seed {
            SeedSource::Fixed(seed) => seed,
            SeedSource::Entropy => rand::random::<u64>(),
        };

        // Partial Fisher-Yates: only the first `required` slots are drawn.
        let mut rng = StdRng::seed_from_u64(seed);
        for i in 0..required {
            let j = rng.gen_range(i..pool.len());
            pool.swap(i, j);
        }
        pool.truncate(required);

        let reward_per_validator = reward_pool.checked_div(required as i128)?;

        let validation = SwarmValidation {
            id: ValidationId::new(),
            gig_id,
            status: ValidationStatus::Pending,
            votes_for: 0,
            votes_against: 0,
            threshold: self.policy.threshold,
            validators: pool,
            reward_pool,
            reward_per_validator,
            seed,
            opened_at: Utc::now(),
            closed_at: None,
        };

        info!(
            "Validation {} opened for gig {}: {} validators, threshold {}, pool {}",
            validation.id,
            gig_id,
            validation.validators.len(),
            validation.threshold,
            reward_pool
        );

        self.by_gig.insert(gig_id, validation.id);
        self.rounds.insert(
            validation.id,
            ValidationRound {
                validation: validation.clone(),
                votes: Vec::new(),
            },
        );

        Ok(validation)
    }

    /// Cast a vote in an open round.
    ///
    /// Returns the recorded vote and the round status after tallying. Fails
    /// with `NotSelected` for agents outside the validator set,
    /// `AlreadyVoted` on a second vote, and `ValidationClosed` once a
    /// verdict has been reached.
    pub async fn cast_vote(
        &self,
        validation_id: &ValidationId,
        voter: AgentId,
        choice: VoteChoice,
        reasoning: Option<String>,
    ) -> Result<(SwarmVote, ValidationStatus)> {
        let mut entry = self.rounds.get_mut(validation_id).ok_or_else(|| {
            GigClearError::ValidationNotFound {
                validation_id: validation_id.to_string(),
            }
        })?;
        let round = entry.value_mut();

        if round.validation.status.is_closed() {
            return Err(GigClearError::ValidationClosed {
                validation_id: validation_id.to_string(),
                status: round.validation.status.to_string(),
            });
        }
        if !round.validation.is_validator(&voter) {
            return Err(GigClearError::NotSelected {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
            });
        }
        if round.votes.iter().any(|vote| vote.voter == voter) {
            return Err(GigClearError::AlreadyVoted {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
            });
        }

        let now = Utc::now();
        let vote = SwarmVote {
            id: VoteId::new(),
            validation_id: *validation_id,
            voter,
            choice,
            reasoning,
            reward_amount: round.validation.reward_per_validator,
            reward_claimed: false,
            cast_at: now,
        };

        match choice {
            VoteChoice::Approve => round.validation.votes_for += 1,
            VoteChoice::Reject => round.validation.votes_against += 1,
        }
        round.votes.push(vote.clone());

        debug_assert!(
            round.validation.votes_cast() <= round.validation.validators.len() as u32,
            "more votes than validators in round {}",
            validation_id
        );

        if let Some(verdict) = Self::verdict(&round.validation) {
            round.validation.status = verdict;
            round.validation.closed_at = Some(now);
            info!(
                "Validation {} closed {}: {} for / {} against",
                validation_id, verdict, round.validation.votes_for, round.validation.votes_against
            );
        }

        Ok((vote, round.validation.status))
    }

    /// Close a round that has outlived its response window.
    ///
    /// A pending round is closed `Rejected` regardless of partial tallies.
    /// Fails with `ValidationClosed` when a verdict was already reached.
    pub async fn force_close(&self, validation_id: &ValidationId) -> Result<SwarmValidation> {
        let mut entry = self.rounds.get_mut(validation_id).ok_or_else(|| {
            GigClearError::ValidationNotFound {
                validation_id: validation_id.to_string(),
            }
        })?;
        let round = entry.value_mut();

        if round.validation.status.is_closed() {
            return Err(GigClearError::ValidationClosed {
                validation_id: validation_id.to_string(),
                status: round.validation.status.to_string(),
            });
        }

        round.validation.status = ValidationStatus::Rejected;
        round.validation.closed_at = Some(Utc::now());

        warn!(
            "Validation {} force-closed rejected with {} of {} votes cast",
            validation_id,
            round.validation.votes_cast(),
            round.validation.validators.len()
        );

        Ok(round.validation.clone())
    }

    /// Claim the reward owed for a vote aligned with the final verdict.
    ///
    /// Only validators whose vote matched the round's closing status may
    /// claim, and only once.
    pub async fn claim_reward(
        &self,
        validation_id: &ValidationId,
        voter: &AgentId,
    ) -> Result<Amount> {
        let mut entry = self.rounds.get_mut(validation_id).ok_or_else(|| {
            GigClearError::ValidationNotFound {
                validation_id: validation_id.to_string(),
            }
        })?;
        let round = entry.value_mut();

        if !round.validation.status.is_closed() {
            return Err(GigClearError::ValidationNotClosed {
                validation_id: validation_id.to_string(),
            });
        }
        if !round.validation.is_validator(voter) {
            return Err(GigClearError::NotSelected {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
            });
        }

        let status = round.validation.status;
        let vote = round
            .votes
            .iter_mut()
            .find(|vote| &vote.voter == voter)
            .ok_or_else(|| GigClearError::NotEligible {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
                reason: "no vote cast in this round".to_string(),
            })?;

        if !vote.aligned_with(status) {
            return Err(GigClearError::NotEligible {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
                reason: format!("vote '{}' did not align with the {} verdict", vote.choice, status),
            });
        }
        if vote.reward_claimed {
            return Err(GigClearError::AlreadyClaimed {
                agent_id: voter.to_string(),
                validation_id: validation_id.to_string(),
            });
        }

        vote.reward_claimed = true;
        let amount = vote.reward_amount;

        info!(
            "Validator {} claimed {} for validation {}",
            voter, amount, validation_id
        );

        Ok(amount)
    }

    /// Fetch a round's current state
    pub async fn validation(&self, validation_id: &ValidationId) -> Result<SwarmValidation> {
        self.rounds
            .get(validation_id)
            .map(|round| round.validation.clone())
            .ok_or_else(|| GigClearError::ValidationNotFound {
                validation_id: validation_id.to_string(),
            })
    }

    /// Fetch a round's vote log in cast order
    pub async fn votes(&self, validation_id: &ValidationId) -> Result<Vec<SwarmVote>> {
        self.rounds
            .get(validation_id)
            .map(|round| round.votes.clone())
            .ok_or_else(|| GigClearError::ValidationNotFound {
                validation_id: validation_id.to_string(),
            })
    }

    /// The most recently opened round for a gig, if any
    pub async fn for_gig(&self, gig_id: &GigId) -> Option<SwarmValidation> {
        let validation_id = *self.by_gig.get(gig_id)?;
        self.rounds
            .get(&validation_id)
            .map(|round| round.validation.clone())
    }

    /// Reinstall a round from a snapshot and its vote log.
    ///
    /// Tallies and the verdict are re-derived from the votes and checked
    /// against the snapshot; a mismatch means the log was tampered with or
    /// truncated and the round is not installed. A round whose snapshot is
    /// `Rejected` with a `closed_at` no vote accounts for is accepted as
    /// force-closed.
    pub async fn restore(
        &self,
        validation: SwarmValidation,
        votes: Vec<SwarmVote>,
    ) -> Result<()> {
        let mut votes = votes;
        votes.sort_by_key(|vote| vote.cast_at);

        let mut replayed = validation.clone();
        replayed.status = ValidationStatus::Pending;
        replayed.votes_for = 0;
        replayed.votes_against = 0;
        replayed.closed_at = None;

        let mut seen: Vec<AgentId> = Vec::with_capacity(votes.len());
        for vote in &votes {
            if vote.validation_id != validation.id {
                return Err(GigClearError::internal(format!(
                    "invalid vote log: vote {} belongs to validation {}",
                    vote.id, vote.validation_id
                )));
            }
            if replayed.status.is_closed() {
                return Err(GigClearError::internal(format!(
                    "invalid vote log: vote {} cast after the round closed",
                    vote.id
                )));
            }
            if !replayed.is_validator(&vote.voter) {
                return Err(GigClearError::internal(format!(
                    "invalid vote log: voter {} was not selected for validation {}",
                    vote.voter, validation.id
                )));
            }
            if seen.contains(&vote.voter) {
                return Err(GigClearError::internal(format!(
                    "invalid vote log: duplicate vote by {} in validation {}",
                    vote.voter, validation.id
                )));
            }
            seen.push(vote.voter);

            match vote.choice {
                VoteChoice::Approve => replayed.votes_for += 1,
                VoteChoice::Reject => replayed.votes_against += 1,
            }
            if let Some(verdict) = Self::verdict(&replayed) {
                replayed.status = verdict;
                replayed.closed_at = Some(vote.cast_at);
            }
        }

        // A force-closed round carries a verdict no vote produced.
        if replayed.status == ValidationStatus::Pending
            && validation.status == ValidationStatus::Rejected
            && validation.closed_at.is_some()
        {
            replayed.status = ValidationStatus::Rejected;
            replayed.closed_at = validation.closed_at;
        }

        if replayed != validation {
            return Err(GigClearError::internal(format!(
                "restored validation {} diverged from its vote log",
                validation.id
            )));
        }

        info!(
            "Validation {} restored with {} votes (status: {})",
            validation.id,
            votes.len(),
            validation.status
        );

        self.by_gig.insert(validation.gig_id, validation.id);
        self.rounds
            .insert(validation.id, ValidationRound { validation, votes });

        Ok(())
    }

    /// Evaluate the closure bounds against the current tallies.
    ///
    /// Approvals at the threshold close `Approved`; rejections past the
    /// point where approval is mathematically unreachable close `Rejected`.
    /// A full tally that met neither bound also closes `Rejected`.
    fn verdict(validation: &SwarmValidation) -> Option<ValidationStatus> {
        if validation.votes_for >= validation.threshold {
            return Some(ValidationStatus::Approved);
        }
        if validation.votes_against >= validation.rejection_bound() {
            return Some(ValidationStatus::Rejected);
        }
        if validation.votes_cast() >= validation.validators.len() as u32 {
            return Some(ValidationStatus::Rejected);
        }
        None
    }
}

impl Default for SwarmConsensus {
    fn default() -> Self {
        Self::new(SwarmPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agents(n: usize) -> Vec<AgentId> {
        (0..n).map(|_| AgentId::new()).collect()
    }

    fn fixed_consensus(seed: u64) -> SwarmConsensus {
        SwarmConsensus::new(SwarmPolicy {
            validator_count: 5,
            threshold: 3,
            seed: SeedSource::Fixed(seed),
        })
    }

    async fn open_round(swarm: &SwarmConsensus) -> (SwarmValidation, Vec<AgentId>) {
        let poster = AgentId::new();
        let assignee = AgentId::new();
        let mut eligible = agents(8);
        eligible.push(poster);
        eligible.push(assignee);

        let validation = swarm
            .open_validation(GigId::new(), poster, assignee, &eligible, Amount::usdc(10.0))
            .await
            .unwrap();
        let validators = validation.validators.clone();
        (validation, validators)
    }

    #[tokio::test]
    async fn open_validation_excludes_poster_and_assignee() {
        let swarm = fixed_consensus(1);
        let poster = AgentId::new();
        let assignee = AgentId::new();
        let mut eligible = agents(8);
        eligible.push(poster);
        eligible.push(assignee);

        let validation = swarm
            .open_validation(GigId::new(), poster, assignee, &eligible, Amount::usdc(10.0))
            .await
            .unwrap();

        assert_eq!(validation.status, ValidationStatus::Pending);
        assert_eq!(validation.validators.len(), 5);
        assert!(!validation.validators.contains(&poster));
        assert!(!validation.validators.contains(&assignee));
        assert_eq!(validation.reward_per_validator, Amount::usdc(2.0));
        assert_eq!(validation.seed, 1);
    }

    #[tokio::test]
    async fn open_validation_requires_enough_validators() {
        let swarm = fixed_consensus(1);
        let poster = AgentId::new();
        let assignee = AgentId::new();
        let mut eligible = agents(4);
        eligible.push(poster);

        let err = swarm
            .open_validation(GigId::new(), poster, assignee, &eligible, Amount::usdc(10.0))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GigClearError::InsufficientValidators {
                required: 5,
                available: 4
            }
        ));
    }

    #[tokio::test]
    async fn sampling_is_deterministic_for_fixed_seed() {
        let poster = AgentId::new();
        let assignee = AgentId::new();
        let eligible = agents(12);

        // Same seed, same pool in a different order, with a duplicate thrown in.
        let mut shuffled = eligible.clone();
        shuffled.reverse();
        shuffled.push(eligible[0]);

        let first = fixed_consensus(7)
            .open_validation(GigId::new(), poster, assignee, &eligible, Amount::usdc(10.0))
            .await
            .unwrap();
        let second = fixed_consensus(7)
            .open_validation(GigId::new(), poster, assignee, &shuffled, Amount::usdc(10.0))
            .await
            .unwrap();

        assert_eq!(first.validators, second.validators);
        assert_eq!(first.seed, 7);
    }

    #[tokio::test]
    async fn approval_closes_at_threshold() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        let (_, status) = swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Pending);

        let (_, status) = swarm
            .cast_vote(&validation.id, validators[1], VoteChoice::Approve, None)
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Pending);

        let (_, status) = swarm
            .cast_vote(
                &validation.id,
                validators[2],
                VoteChoice::Approve,
                Some("meets the brief".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Approved);

        let closed = swarm.validation(&validation.id).await.unwrap();
        assert_eq!(closed.votes_for, 3);
        assert_eq!(closed.votes_against, 0);
        assert!(closed.closed_at.is_some());
    }

    #[tokio::test]
    async fn rejection_closes_when_approval_unreachable() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        // 5 validators, threshold 3: three rejections leave at most 2 approvals.
        for voter in validators.iter().take(2) {
            let (_, status) = swarm
                .cast_vote(&validation.id, *voter, VoteChoice::Reject, None)
                .await
                .unwrap();
            assert_eq!(status, ValidationStatus::Pending);
        }

        let (_, status) = swarm
            .cast_vote(&validation.id, validators[2], VoteChoice::Reject, None)
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Rejected);
    }

    #[tokio::test]
    async fn split_vote_ends_rejected() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();
        swarm
            .cast_vote(&validation.id, validators[1], VoteChoice::Approve, None)
            .await
            .unwrap();
        swarm
            .cast_vote(&validation.id, validators[2], VoteChoice::Reject, None)
            .await
            .unwrap();
        swarm
            .cast_vote(&validation.id, validators[3], VoteChoice::Reject, None)
            .await
            .unwrap();

        let (_, status) = swarm
            .cast_vote(&validation.id, validators[4], VoteChoice::Reject, None)
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Rejected);
    }

    #[tokio::test]
    async fn vote_after_close_is_rejected() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        for voter in validators.iter().take(3) {
            swarm
                .cast_vote(&validation.id, *voter, VoteChoice::Approve, None)
                .await
                .unwrap();
        }

        let err = swarm
            .cast_vote(&validation.id, validators[3], VoteChoice::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::ValidationClosed { .. }));
    }

    #[tokio::test]
    async fn non_validator_cannot_vote() {
        let swarm = fixed_consensus(2);
        let (validation, _) = open_round(&swarm).await;

        let err = swarm
            .cast_vote(&validation.id, AgentId::new(), VoteChoice::Approve, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::NotSelected { .. }));
    }

    #[tokio::test]
    async fn double_vote_is_rejected() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();
        let err = swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Reject, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::AlreadyVoted { .. }));
    }

    #[tokio::test]
    async fn force_close_rejects_pending_round() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();

        let closed = swarm.force_close(&validation.id).await.unwrap();
        assert_eq!(closed.status, ValidationStatus::Rejected);
        assert!(closed.closed_at.is_some());

        let err = swarm.force_close(&validation.id).await.unwrap_err();
        assert!(matches!(err, GigClearError::ValidationClosed { .. }));
    }

    #[tokio::test]
    async fn aligned_voters_claim_rewards() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();
        swarm
            .cast_vote(&validation.id, validators[1], VoteChoice::Reject, None)
            .await
            .unwrap();
        swarm
            .cast_vote(&validation.id, validators[2], VoteChoice::Approve, None)
            .await
            .unwrap();
        let (_, status) = swarm
            .cast_vote(&validation.id, validators[3], VoteChoice::Approve, None)
            .await
            .unwrap();
        assert_eq!(status, ValidationStatus::Approved);

        // Aligned voter gets an even split of the pool.
        let reward = swarm.claim_reward(&validation.id, &validators[0]).await.unwrap();
        assert_eq!(reward, Amount::usdc(2.0));

        // Misaligned voter is not eligible.
        let err = swarm
            .claim_reward(&validation.id, &validators[1])
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::NotEligible { .. }));

        // Second claim by the same voter.
        let err = swarm
            .claim_reward(&validation.id, &validators[0])
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::AlreadyClaimed { .. }));

        // Selected but never voted.
        let err = swarm
            .claim_reward(&validation.id, &validators[4])
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::NotEligible { .. }));

        // Outside the validator set entirely.
        let err = swarm
            .claim_reward(&validation.id, &AgentId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::NotSelected { .. }));
    }

    #[tokio::test]
    async fn claim_before_close_is_rejected() {
        let swarm = fixed_consensus(2);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();

        let err = swarm
            .claim_reward(&validation.id, &validators[0])
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::ValidationNotClosed { .. }));
    }

    #[tokio::test]
    async fn negative_reward_pool_is_rejected() {
        let swarm = fixed_consensus(1);
        let err = swarm
            .open_validation(
                GigId::new(),
                AgentId::new(),
                AgentId::new(),
                &agents(8),
                Amount::usdc(-5.0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn for_gig_returns_latest_round() {
        let swarm = fixed_consensus(3);
        let gig_id = GigId::new();
        let poster = AgentId::new();
        let assignee = AgentId::new();

        let validation = swarm
            .open_validation(gig_id, poster, assignee, &agents(8), Amount::usdc(10.0))
            .await
            .unwrap();

        let found = swarm.for_gig(&gig_id).await.unwrap();
        assert_eq!(found.id, validation.id);
        assert!(swarm.for_gig(&GigId::new()).await.is_none());
    }

    #[tokio::test]
    async fn restore_rederives_tallies() {
        let swarm = fixed_consensus(3);
        let (validation, validators) = open_round(&swarm).await;

        for voter in validators.iter().take(3) {
            swarm
                .cast_vote(&validation.id, *voter, VoteChoice::Approve, None)
                .await
                .unwrap();
        }

        let live = swarm.validation(&validation.id).await.unwrap();
        let votes = swarm.votes(&validation.id).await.unwrap();

        let fresh = SwarmConsensus::default();
        fresh.restore(live.clone(), votes.clone()).await.unwrap();

        assert_eq!(fresh.validation(&validation.id).await.unwrap(), live);
        assert_eq!(fresh.votes(&validation.id).await.unwrap(), votes);
        assert_eq!(fresh.for_gig(&live.gig_id).await.unwrap().id, live.id);
    }

    #[tokio::test]
    async fn restore_rejects_tampered_tallies() {
        let swarm = fixed_consensus(3);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();

        let mut tampered = swarm.validation(&validation.id).await.unwrap();
        tampered.votes_for += 1;
        let votes = swarm.votes(&validation.id).await.unwrap();

        let fresh = SwarmConsensus::default();
        let err = fresh.restore(tampered, votes).await.unwrap_err();
        assert!(matches!(err, GigClearError::Internal { .. }));
    }

    #[tokio::test]
    async fn restore_accepts_force_closed_round() {
        let swarm = fixed_consensus(4);
        let (validation, validators) = open_round(&swarm).await;

        swarm
            .cast_vote(&validation.id, validators[0], VoteChoice::Approve, None)
            .await
            .unwrap();
        swarm.force_close(&validation.id).await.unwrap();

        let live = swarm.validation(&validation.id).await.unwrap();
        let votes = swarm.votes(&validation.id).await.unwrap();

        let fresh = SwarmConsensus::default();
        fresh.restore(live.clone(), votes).await.unwrap();
        assert_eq!(fresh.validation(&validation.id).await.unwrap(), live);
    }
}
