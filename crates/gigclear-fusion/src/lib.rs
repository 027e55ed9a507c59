//! Reputation and risk fusion for GigClear
//!
//! Trust signals arrive from several independent sources (on-chain
//! activity, imported moltbook karma, swarm verdicts, escrow outcomes) and
//! fuse into a single score per agent through fixed per-source weights.
//! Adverse events accumulate into a risk index that decays toward zero as
//! clean days pass. Both feeds are append-only logs; the `AgentStanding`
//! held in memory is a materialized view that [`rebuild`] reproduces from
//! the logs alone.
//!
//! The engine never initiates anything. The orchestrator and the bond
//! ledger feed it, and reads come back as decayed-as-of-now projections.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::info;
use ulid::Ulid;

use gigclear_types::{
    AgentId, AgentStanding, GigClearError, GigId, GigOutcome, ReputationEvent, ReputationSource,
    Result, RiskEvent, RiskFactor,
};

/// Reputation event type recorded when a gig concludes paid
const OUTCOME_COMPLETED: &str = "gig_outcome_completed";
/// Reputation event type recorded when a gig concludes failed
const OUTCOME_FAILED: &str = "gig_outcome_failed";

/// Completion history dominates the performance projection; bond
/// reliability tempers it.
const COMPLETION_WEIGHT: f64 = 0.6;
const RELIABILITY_WEIGHT: f64 = 0.4;

/// Broadcast payload for external sinks
#[derive(Debug, Clone)]
pub enum FusionEvent {
    Reputation(ReputationEvent),
    Risk(RiskEvent),
}

/// Weights and clamps for score fusion and risk decay
#[derive(Debug, Clone)]
pub struct FusionPolicy {
    /// Weight for on-chain activity signals
    pub weight_on_chain: f64,
    /// Weight for imported moltbook karma
    pub weight_moltbook: f64,
    /// Weight for swarm validation verdicts
    pub weight_swarm: f64,
    /// Weight for escrow settlement outcomes
    pub weight_escrow: f64,
    /// Lowest fused score an agent can hold
    pub score_floor: f64,
    /// Highest fused score an agent can hold
    pub score_ceiling: f64,
    /// Fraction of the risk index shed per clean day
    pub risk_daily_decay: f64,
    /// Lowest risk index value
    pub risk_floor: f64,
    /// Highest risk index value
    pub risk_ceiling: f64,
}

impl FusionPolicy {
    /// Weight applied to score changes from `source`
    pub fn weight(&self, source: ReputationSource) -> f64 {
        match source {
            ReputationSource::OnChain => self.weight_on_chain,
            ReputationSource::Moltbook => self.weight_moltbook,
            ReputationSource::Swarm => self.weight_swarm,
            ReputationSource::Escrow => self.weight_escrow,
        }
    }
}

impl Default for FusionPolicy {
    fn default() -> Self {
        Self {
            weight_on_chain: 0.30,
            weight_moltbook: 0.10,
            weight_swarm: 0.35,
            weight_escrow: 0.25,
            score_floor: 0.0,
            score_ceiling: 1000.0,
            risk_daily_decay: 0.05,
            risk_floor: 0.0,
            risk_ceiling: 100.0,
        }
    }
}

/// An agent's standing together with the logs it is derived from
struct AgentFusionState {
    standing: AgentStanding,
    reputation_log: Vec<ReputationEvent>,
    risk_log: Vec<RiskEvent>,
}

impl AgentFusionState {
    fn new(agent_id: AgentId, at: DateTime<Utc>) -> Self {
        Self {
            standing: empty_standing(agent_id, at),
            reputation_log: Vec::new(),
            risk_log: Vec::new(),
        }
    }
}

/// Reputation and risk engine
///
/// Standings are keyed by agent; each mutation appends to that agent's log
/// and updates the materialized view under the map entry.
pub struct FusionEngine {
    policy: FusionPolicy,
    agents: Arc<DashMap<AgentId, AgentFusionState>>,
    events_tx: broadcast::Sender<FusionEvent>,
}

impl FusionEngine {
    pub fn new(policy: FusionPolicy) -> Self {
        let (events_tx, _) = broadcast::channel(4096);
        Self {
            policy,
            agents: Arc::new(DashMap::new()),
            events_tx,
        }
    }

    /// Subscribe to the fusion event feed
    pub fn subscribe(&self) -> broadcast::Receiver<FusionEvent> {
        self.events_tx.subscribe()
    }

    /// The policy this engine was built with
    pub fn policy(&self) -> &FusionPolicy {
        &self.policy
    }

    /// Record a reputation signal and apply its weighted score change.
    ///
    /// `fused_score` moves by `weight(source) * score_change`, clamped to
    /// the configured floor and ceiling.
    pub async fn record_reputation(
        &self,
        agent_id: AgentId,
        event_type: impl Into<String>,
        score_change: i64,
        source: ReputationSource,
        details: Value,
    ) -> Result<ReputationEvent> {
        let now = Utc::now();
        let mut entry = self
            .agents
            .entry(agent_id)
            .or_insert_with(|| AgentFusionState::new(agent_id, now));
        let state = entry.value_mut();

        let event = ReputationEvent {
            id: format!("repevt_{}", Ulid::new()),
            agent_id,
            event_type: event_type.into(),
            score_change,
            source,
            details,
            recorded_at: now,
        };

        apply_reputation(&mut state.standing, &event, &self.policy);
        state.reputation_log.push(event.clone());
        let _ = self.events_tx.send(FusionEvent::Reputation(event.clone()));

        info!(
            "Reputation event for {}: {} ({:+} via {}) -> fused {:.2}",
            agent_id, event.event_type, score_change, source, state.standing.fused_score
        );

        Ok(event)
    }

    /// Record an adverse (or corrective) event against the risk index
    pub async fn record_risk(
        &self,
        agent_id: AgentId,
        factor: RiskFactor,
        delta: f64,
        details: Value,
    ) -> Result<RiskEvent> {
        let event = RiskEvent {
            id: format!("riskevt_{}", Ulid::new()),
            agent_id,
            factor,
            delta,
            details,
            recorded_at: Utc::now(),
        };
        self.ingest_risk(event).await
    }

    /// Apply an already-constructed risk event, e.g. one emitted by the
    /// bond ledger alongside a slash.
    ///
    /// Pending time-decay is settled up to the event's timestamp first:
    /// each elapsed whole day multiplies the index by `1 - risk_daily_decay`
    /// and extends the clean streak. The signed delta is then accumulated
    /// and clamped. Slash events zero the clean streak.
    pub async fn ingest_risk(&self, event: RiskEvent) -> Result<RiskEvent> {
        let mut entry = self
            .agents
            .entry(event.agent_id)
            .or_insert_with(|| AgentFusionState::new(event.agent_id, event.recorded_at));
        let state = entry.value_mut();

        apply_risk(&mut state.standing, &event, &self.policy);
        state.risk_log.push(event.clone());
        let _ = self.events_tx.send(FusionEvent::Risk(event.clone()));

        info!(
            "Risk event for {}: {} {:+.2} -> index {:.2}",
            event.agent_id, event.factor, event.delta, state.standing.risk_index
        );

        Ok(event)
    }

    /// Record a gig's terminal outcome for an agent.
    ///
    /// Maintains the completion counters, lifetime earnings and last-gig
    /// marker. The outcome lands in the reputation log as a zero-score
    /// event so [`rebuild`] reproduces the counters.
    pub async fn record_outcome(
        &self,
        agent_id: AgentId,
        gig_id: GigId,
        outcome: GigOutcome,
    ) -> Result<AgentStanding> {
        let now = Utc::now();
        let mut entry = self
            .agents
            .entry(agent_id)
            .or_insert_with(|| AgentFusionState::new(agent_id, now));
        let state = entry.value_mut();

        let (event_type, details) = match outcome {
            GigOutcome::Completed { earned } => (
                OUTCOME_COMPLETED,
                serde_json::json!({ "gig_id": gig_id, "earned": earned }),
            ),
            GigOutcome::Failed => (OUTCOME_FAILED, serde_json::json!({ "gig_id": gig_id })),
        };

        let event = ReputationEvent {
            id: format!("repevt_{}", Ulid::new()),
            agent_id,
            event_type: event_type.to_string(),
            score_change: 0,
            source: ReputationSource::Escrow,
            details,
            recorded_at: now,
        };

        apply_reputation(&mut state.standing, &event, &self.policy);
        state.reputation_log.push(event.clone());
        let _ = self.events_tx.send(FusionEvent::Reputation(event));

        info!(
            "Outcome for {} on gig {}: {} completed / {} failed, {:.2} earned",
            agent_id,
            gig_id,
            state.standing.gigs_completed,
            state.standing.gigs_failed,
            state.standing.total_earned
        );

        Ok(state.standing.clone())
    }

    /// An agent's standing with risk decayed as of now.
    ///
    /// The stored state advances only when events are recorded; the decay
    /// applied here is a projection on the returned copy.
    pub async fn standing(&self, agent_id: &AgentId) -> Result<AgentStanding> {
        let entry = self
            .agents
            .get(agent_id)
            .ok_or_else(|| GigClearError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })?;

        let mut view = entry.standing.clone();
        let (risk, streak) = decayed_view(&view, Utc::now(), &self.policy);
        view.risk_index = risk;
        view.clean_streak_days = streak;
        Ok(view)
    }

    /// Derived performance projection, never stored.
    ///
    /// Combines the agent's completion rate with the bond ledger's
    /// reliability figure; agents without history score on reliability
    /// alone.
    pub async fn performance_score(&self, agent_id: &AgentId, bond_reliability: f64) -> f64 {
        let completion_rate = self
            .agents
            .get(agent_id)
            .map(|state| state.standing.completion_rate())
            .unwrap_or(0.0);
        (COMPLETION_WEIGHT * completion_rate + RELIABILITY_WEIGHT * bond_reliability) * 100.0
    }

    /// An agent's reputation log in recorded order
    pub async fn reputation_events(&self, agent_id: &AgentId) -> Result<Vec<ReputationEvent>> {
        self.agents
            .get(agent_id)
            .map(|state| state.reputation_log.clone())
            .ok_or_else(|| GigClearError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })
    }

    /// An agent's risk log in recorded order
    pub async fn risk_events(&self, agent_id: &AgentId) -> Result<Vec<RiskEvent>> {
        self.agents
            .get(agent_id)
            .map(|state| state.risk_log.clone())
            .ok_or_else(|| GigClearError::AgentNotFound {
                agent_id: agent_id.to_string(),
            })
    }

    /// Rebuild an agent's standing from logs and install it.
    pub async fn restore(
        &self,
        agent_id: AgentId,
        reputation_events: Vec<ReputationEvent>,
        risk_events: Vec<RiskEvent>,
    ) -> Result<AgentStanding> {
        let standing = rebuild(agent_id, &reputation_events, &risk_events, &self.policy)?;
        let event_count = reputation_events.len() + risk_events.len();

        self.agents.insert(
            agent_id,
            AgentFusionState {
                standing: standing.clone(),
                reputation_log: reputation_events,
                risk_log: risk_events,
            },
        );

        info!("Standing for {} restored from {} events", agent_id, event_count);
        Ok(standing)
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionPolicy::default())
    }
}

/// Replay reputation and risk logs into a fresh standing.
///
/// Each log must be in recorded order. The replay walks the same update
/// paths as live recording, so the result matches the standing the same
/// events produced.
pub fn rebuild(
    agent_id: AgentId,
    reputation_events: &[ReputationEvent],
    risk_events: &[RiskEvent],
    policy: &FusionPolicy,
) -> Result<AgentStanding> {
    let first_reputation = reputation_events.first().map(|event| event.recorded_at);
    let first_risk = risk_events.first().map(|event| event.recorded_at);
    let created_at = match (first_reputation, first_risk) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => Utc::now(),
    };

    let mut standing = empty_standing(agent_id, created_at);

    for event in reputation_events {
        if event.agent_id != agent_id {
            return Err(GigClearError::internal(format!(
                "invalid reputation log: event {} belongs to agent {}",
                event.id, event.agent_id
            )));
        }
        apply_reputation(&mut standing, event, policy);
    }

    for event in risk_events {
        if event.agent_id != agent_id {
            return Err(GigClearError::internal(format!(
                "invalid risk log: event {} belongs to agent {}",
                event.id, event.agent_id
            )));
        }
        apply_risk(&mut standing, event, policy);
    }

    Ok(standing)
}

fn empty_standing(agent_id: AgentId, at: DateTime<Utc>) -> AgentStanding {
    AgentStanding {
        agent_id,
        fused_score: 0.0,
        risk_index: 0.0,
        clean_streak_days: 0,
        gigs_completed: 0,
        gigs_failed: 0,
        total_earned: 0.0,
        last_gig_id: None,
        last_risk_update: at,
        created_at: at,
    }
}

fn apply_reputation(standing: &mut AgentStanding, event: &ReputationEvent, policy: &FusionPolicy) {
    let weighted = policy.weight(event.source) * event.score_change as f64;
    standing.fused_score =
        (standing.fused_score + weighted).clamp(policy.score_floor, policy.score_ceiling);

    match event.event_type.as_str() {
        OUTCOME_COMPLETED => {
            standing.gigs_completed += 1;
            if let Some(earned) = event.details.get("earned").and_then(Value::as_f64) {
                standing.total_earned += earned;
            }
            standing.last_gig_id = outcome_gig_id(event);
        }
        OUTCOME_FAILED => {
            standing.gigs_failed += 1;
            standing.last_gig_id = outcome_gig_id(event);
        }
        _ => {}
    }
}

fn apply_risk(standing: &mut AgentStanding, event: &RiskEvent, policy: &FusionPolicy) {
    let (risk, streak) = decayed_view(standing, event.recorded_at, policy);
    standing.risk_index = risk;
    standing.clean_streak_days = streak;
    standing.last_risk_update = event.recorded_at;

    standing.risk_index =
        (standing.risk_index + event.delta).clamp(policy.risk_floor, policy.risk_ceiling);

    if event.factor == RiskFactor::Slash {
        standing.clean_streak_days = 0;
    }
}

/// Risk index and clean streak as of `at`, with whole-day decay applied
/// since the last recorded risk event. Pure; the caller decides whether to
/// persist the result.
fn decayed_view(
    standing: &AgentStanding,
    at: DateTime<Utc>,
    policy: &FusionPolicy,
) -> (f64, u32) {
    let days = (at - standing.last_risk_update).num_days();
    if days <= 0 {
        return (standing.risk_index, standing.clean_streak_days);
    }

    let decayed =
        (standing.risk_index * (1.0 - policy.risk_daily_decay).powi(days as i32)).max(policy.risk_floor);
    let streak = standing.clean_streak_days.saturating_add(days as u32);
    (decayed, streak)
}

fn outcome_gig_id(event: &ReputationEvent) -> Option<GigId> {
    event
        .details
        .get("gig_id")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn risk_event(
        agent_id: AgentId,
        factor: RiskFactor,
        delta: f64,
        at: DateTime<Utc>,
    ) -> RiskEvent {
        RiskEvent {
            id: format!("riskevt_{}", Ulid::new()),
            agent_id,
            factor,
            delta,
            details: serde_json::json!({}),
            recorded_at: at,
        }
    }

    #[tokio::test]
    async fn weighted_reputation_update() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        fusion
            .record_reputation(agent, "swarm_approved", 100, ReputationSource::Swarm, serde_json::json!({}))
            .await
            .unwrap();
        let standing = fusion.standing(&agent).await.unwrap();
        assert!(close(standing.fused_score, 35.0));

        fusion
            .record_reputation(agent, "payment_settled", 100, ReputationSource::OnChain, serde_json::json!({}))
            .await
            .unwrap();
        let standing = fusion.standing(&agent).await.unwrap();
        assert!(close(standing.fused_score, 65.0));
    }

    #[tokio::test]
    async fn score_clamps_at_floor_and_ceiling() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        fusion
            .record_reputation(agent, "karma_dump", -10_000, ReputationSource::Moltbook, serde_json::json!({}))
            .await
            .unwrap();
        assert!(close(fusion.standing(&agent).await.unwrap().fused_score, 0.0));

        fusion
            .record_reputation(agent, "karma_spike", 10_000, ReputationSource::Swarm, serde_json::json!({}))
            .await
            .unwrap();
        assert!(close(
            fusion.standing(&agent).await.unwrap().fused_score,
            1000.0
        ));
    }

    #[tokio::test]
    async fn risk_accumulates_and_decays_daily() {
        let agent = AgentId::new();
        let t0 = Utc::now() - Duration::days(10);

        let events = vec![
            risk_event(agent, RiskFactor::Slash, 40.0, t0),
            risk_event(agent, RiskFactor::DisputeOpened, 10.0, t0 + Duration::days(2)),
        ];

        let standing = rebuild(agent, &[], &events, &FusionPolicy::default()).unwrap();

        // Two clean days shave the index before the second event lands.
        let expected = 40.0 * 0.95f64.powi(2) + 10.0;
        assert!(close(standing.risk_index, expected));
        assert_eq!(standing.clean_streak_days, 2);
    }

    #[tokio::test]
    async fn slash_zeroes_clean_streak() {
        let agent = AgentId::new();
        let t0 = Utc::now() - Duration::days(10);

        let events = vec![
            risk_event(agent, RiskFactor::DisputeOpened, 5.0, t0),
            risk_event(agent, RiskFactor::Slash, 20.0, t0 + Duration::days(3)),
            risk_event(agent, RiskFactor::DisputeOpened, 5.0, t0 + Duration::days(5)),
        ];

        let standing = rebuild(agent, &[], &events, &FusionPolicy::default()).unwrap();

        // Streak climbed to 3, the slash reset it, two days accrued since.
        assert_eq!(standing.clean_streak_days, 2);
    }

    #[tokio::test]
    async fn risk_clamps_at_ceiling() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        fusion
            .record_risk(agent, RiskFactor::Slash, 500.0, serde_json::json!({}))
            .await
            .unwrap();
        let standing = fusion.standing(&agent).await.unwrap();
        assert!(close(standing.risk_index, 100.0));
        assert_eq!(standing.clean_streak_days, 0);
    }

    #[tokio::test]
    async fn outcome_updates_counters() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();
        let first_gig = GigId::new();
        let second_gig = GigId::new();

        fusion
            .record_outcome(agent, first_gig, GigOutcome::Completed { earned: 250.0 })
            .await
            .unwrap();
        let standing = fusion
            .record_outcome(agent, second_gig, GigOutcome::Failed)
            .await
            .unwrap();

        assert_eq!(standing.gigs_completed, 1);
        assert_eq!(standing.gigs_failed, 1);
        assert!(close(standing.total_earned, 250.0));
        assert!(close(standing.completion_rate(), 0.5));
        assert_eq!(standing.last_gig_id, Some(second_gig));
    }

    #[tokio::test]
    async fn performance_score_combines_history_and_reliability() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        for _ in 0..3 {
            fusion
                .record_outcome(agent, GigId::new(), GigOutcome::Completed { earned: 10.0 })
                .await
                .unwrap();
        }
        fusion
            .record_outcome(agent, GigId::new(), GigOutcome::Failed)
            .await
            .unwrap();

        let score = fusion.performance_score(&agent, 0.8).await;
        assert!(close(score, (0.6 * 0.75 + 0.4 * 0.8) * 100.0));

        // No history: reliability carries the whole projection.
        let score = fusion.performance_score(&AgentId::new(), 0.5).await;
        assert!(close(score, 20.0));
    }

    #[tokio::test]
    async fn ingest_risk_applies_bond_events() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        let event = risk_event(agent, RiskFactor::Slash, 20.0, Utc::now());
        fusion.ingest_risk(event.clone()).await.unwrap();

        let standing = fusion.standing(&agent).await.unwrap();
        assert!(close(standing.risk_index, 20.0));
        assert_eq!(standing.clean_streak_days, 0);
        assert_eq!(fusion.risk_events(&agent).await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn rebuild_matches_live_standing() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        fusion
            .record_reputation(agent, "swarm_approved", 50, ReputationSource::Swarm, serde_json::json!({}))
            .await
            .unwrap();
        fusion
            .record_outcome(agent, GigId::new(), GigOutcome::Completed { earned: 120.0 })
            .await
            .unwrap();
        fusion
            .record_risk(agent, RiskFactor::DisputeOpened, 8.0, serde_json::json!({}))
            .await
            .unwrap();

        let live = fusion.standing(&agent).await.unwrap();
        let reputation = fusion.reputation_events(&agent).await.unwrap();
        let risk = fusion.risk_events(&agent).await.unwrap();

        let rebuilt = rebuild(agent, &reputation, &risk, fusion.policy()).unwrap();
        assert_eq!(rebuilt, live);
    }

    #[tokio::test]
    async fn rebuild_rejects_foreign_events() {
        let agent = AgentId::new();
        let foreign = risk_event(AgentId::new(), RiskFactor::Slash, 10.0, Utc::now());

        let err = rebuild(agent, &[], &[foreign], &FusionPolicy::default()).unwrap_err();
        assert!(matches!(err, GigClearError::Internal { .. }));
    }

    #[tokio::test]
    async fn restore_installs_rebuilt_state() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();

        fusion
            .record_reputation(agent, "swarm_approved", 40, ReputationSource::Swarm, serde_json::json!({}))
            .await
            .unwrap();
        fusion
            .record_risk(agent, RiskFactor::FailedGig, 12.0, serde_json::json!({}))
            .await
            .unwrap();

        let live = fusion.standing(&agent).await.unwrap();
        let reputation = fusion.reputation_events(&agent).await.unwrap();
        let risk = fusion.risk_events(&agent).await.unwrap();

        let fresh = FusionEngine::default();
        let restored = fresh.restore(agent, reputation, risk).await.unwrap();
        assert_eq!(restored, live);
        assert_eq!(fresh.standing(&agent).await.unwrap(), live);
    }

    #[tokio::test]
    async fn events_are_broadcast() {
        let fusion = FusionEngine::default();
        let agent = AgentId::new();
        let mut rx = fusion.subscribe();

        fusion
            .record_reputation(agent, "swarm_approved", 10, ReputationSource::Swarm, serde_json::json!({}))
            .await
            .unwrap();
        fusion
            .record_risk(agent, RiskFactor::Slash, 5.0, serde_json::json!({}))
            .await
            .unwrap();

        assert!(matches!(rx.recv().await.unwrap(), FusionEvent::Reputation(_)));
        assert!(matches!(rx.recv().await.unwrap(), FusionEvent::Risk(_)));
    }

    #[tokio::test]
    async fn unknown_agent_standing_errors() {
        let fusion = FusionEngine::default();
        let err = fusion.standing(&AgentId::new()).await.unwrap_err();
        assert!(matches!(err, GigClearError::AgentNotFound { .. }));
    }
}
