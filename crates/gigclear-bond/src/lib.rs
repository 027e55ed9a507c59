//! GigClear Bond - event-sourced collateral ledger
//!
//! The ledger is:
//! - Account-keyed by AgentId, one currency per deployment
//! - Append-only (the event log is the source of truth)
//! - Materialized (accounts are views and can be rebuilt by replay)
//! - Tiered (bonding tier is derived from the total, never stored)
//!
//! # Invariants
//!
//! 1. available + locked always equals total bonded
//! 2. Per-gig locks sum to the locked balance
//! 3. Slashes only ever touch locked collateral
//! 4. Every event records the balances it left behind
//!
//! All mutations for one agent serialize on that agent's map entry; no
//! await happens while an entry is held.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use ulid::Ulid;

use gigclear_types::{
    AgentId, Amount, BondAccount, BondEvent, BondEventKind, BondTier, Currency, GigClearError,
    GigId, Result, RiskEvent, RiskFactor,
};

/// Tunable parameters of the bond ledger
#[derive(Debug, Clone)]
pub struct BondPolicy {
    /// Currency all bonds are denominated in
    pub currency: Currency,
    /// Minimum total for the Bonded tier
    pub tier_bonded: Amount,
    /// Minimum total for the HighBond tier
    pub tier_high_bond: Amount,
    /// Reliability gained when a gig's lock unwinds cleanly
    pub reliability_step: f64,
    /// Multiplier applied to reliability on a slash
    pub reliability_slash_factor: f64,
    /// Flat risk added by any slash
    pub slash_risk_base: f64,
    /// Risk added per human unit slashed
    pub slash_risk_scale: f64,
    /// Extra risk when a slash empties the account
    pub depletion_risk_delta: f64,
}

impl Default for BondPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::Usdc,
            tier_bonded: Amount::usdc(50.0),
            tier_high_bond: Amount::usdc(500.0),
            reliability_step: 0.05,
            reliability_slash_factor: 0.5,
            slash_risk_base: 10.0,
            slash_risk_scale: 0.5,
            depletion_risk_delta: 15.0,
        }
    }
}

impl BondPolicy {
    /// Derive the tier a total bonded amount falls in
    pub fn tier_for(&self, total: &Amount) -> BondTier {
        if total.value >= self.tier_high_bond.value {
            BondTier::HighBond
        } else if total.value >= self.tier_bonded.value {
            BondTier::Bonded
        } else {
            BondTier::Unbonded
        }
    }
}

/// One agent's account bundled with its append-only log
struct AgentBondState {
    account: BondAccount,
    log: Vec<BondEvent>,
}

/// The GigClear bond ledger
///
/// Thread-safe and designed for concurrent access; each agent's mutations
/// serialize on their own map entry.
#[derive(Clone)]
pub struct BondLedger {
    policy: BondPolicy,
    accounts: Arc<DashMap<AgentId, AgentBondState>>,
    /// Live event broadcaster for external sinks
    events_tx: broadcast::Sender<BondEvent>,
}

impl BondLedger {
    /// Create a ledger with the given policy
    pub fn new(policy: BondPolicy) -> Self {
        let (events_tx, _) = broadcast::channel(4096);
        Self {
            policy,
            accounts: Arc::new(DashMap::new()),
            events_tx,
        }
    }

    /// Subscribe to the live event feed
    pub fn subscribe(&self) -> broadcast::Receiver<BondEvent> {
        self.events_tx.subscribe()
    }

    /// The active policy
    pub fn policy(&self) -> &BondPolicy {
        &self.policy
    }

    /// Add collateral to an agent's available balance
    ///
    /// Creates the account on first deposit.
    pub async fn deposit(&self, agent: &AgentId, amount: Amount) -> Result<BondEvent> {
        self.check_amount("bond.deposit", &amount)?;
        let now = Utc::now();

        let mut entry = self
            .accounts
            .entry(*agent)
            .or_insert_with(|| AgentBondState {
                account: new_account(*agent, self.policy.currency, now),
                log: Vec::new(),
            });

        let state = entry.value_mut();
        state.account.available = state.account.available.checked_add(amount)?;
        state.account.updated_at = now;

        let event = append_event(state, BondEventKind::Deposit, amount, None, None, now);
        drop(entry);

        info!("Bond deposit for {}: {}", agent, amount);
        let _ = self.events_tx.send(event.clone());
        Ok(event)
    }

    /// Withdraw available collateral
    pub async fn withdraw(&self, agent: &AgentId, amount: Amount) -> Result<BondEvent> {
        self.check_amount("bond.withdraw", &amount)?;
        let now = Utc::now();

        let mut entry =
            self.entry(agent)
                .ok_or_else(|| GigClearError::InsufficientAvailable {
                    agent_id: agent.to_string(),
                    requested: amount.to_human(),
                    available: 0.0,
                })?;
        let state = entry.value_mut();

        if state.account.available < amount {
            return Err(GigClearError::InsufficientAvailable {
                agent_id: agent.to_string(),
                requested: amount.to_human(),
                available: state.account.available.to_human(),
            });
        }

        state.account.available = state.account.available.checked_sub(amount)?;
        state.account.updated_at = now;

        let event = append_event(state, BondEventKind::Withdraw, amount, None, None, now);
        drop(entry);

        info!("Bond withdrawal for {}: {}", agent, amount);
        let _ = self.events_tx.send(event.clone());
        Ok(event)
    }

    /// Commit available collateral to a gig
    ///
    /// A second lock for the same gig accumulates into the same per-gig
    /// entry.
    pub async fn lock(&self, agent: &AgentId, amount: Amount, gig: &GigId) -> Result<BondEvent> {
        self.check_amount("bond.lock", &amount)?;
        let now = Utc::now();

        let mut entry =
            self.entry(agent)
                .ok_or_else(|| GigClearError::InsufficientAvailable {
                    agent_id: agent.to_string(),
                    requested: amount.to_human(),
                    available: 0.0,
                })?;
        let state = entry.value_mut();

        if state.account.available < amount {
            return Err(GigClearError::InsufficientAvailable {
                agent_id: agent.to_string(),
                requested: amount.to_human(),
                available: state.account.available.to_human(),
            });
        }

        state.account.available = state.account.available.checked_sub(amount)?;
        state.account.locked = state.account.locked.checked_add(amount)?;
        let gig_lock = state
            .account
            .gig_locks
            .entry(*gig)
            .or_insert_with(|| Amount::zero(amount.currency));
        *gig_lock = gig_lock.checked_add(amount)?;
        state.account.updated_at = now;

        let event = append_event(state, BondEventKind::Lock, amount, Some(*gig), None, now);
        drop(entry);

        info!("Bond locked for {} on gig {}: {}", agent, gig, amount);
        let _ = self.events_tx.send(event.clone());
        Ok(event)
    }

    /// Return gig collateral to the available balance
    ///
    /// An unlock that fully clears the gig's lock counts as a clean
    /// conclusion and nudges reliability up.
    pub async fn unlock(&self, agent: &AgentId, amount: Amount, gig: &GigId) -> Result<BondEvent> {
        self.check_amount("bond.unlock", &amount)?;
        let now = Utc::now();

        let mut entry = self.entry(agent).ok_or_else(|| GigClearError::InvalidAmount {
            operation: "bond.unlock".to_string(),
            amount: amount.to_human(),
        })?;
        let state = entry.value_mut();

        let held = state.account.locked_for(gig);
        if amount > held {
            return Err(GigClearError::InvalidAmount {
                operation: "bond.unlock".to_string(),
                amount: amount.to_human(),
            });
        }

        state.account.locked = state.account.locked.checked_sub(amount)?;
        state.account.available = state.account.available.checked_add(amount)?;

        let remaining = held.checked_sub(amount)?;
        if remaining.is_zero() {
            state.account.gig_locks.remove(gig);
            state.account.reliability =
                (state.account.reliability + self.policy.reliability_step).min(1.0);
        } else {
            state.account.gig_locks.insert(*gig, remaining);
        }
        state.account.updated_at = now;

        let event = append_event(state, BondEventKind::Unlock, amount, Some(*gig), None, now);
        drop(entry);

        info!("Bond unlocked for {} on gig {}: {}", agent, gig, amount);
        let _ = self.events_tx.send(event.clone());
        Ok(event)
    }

    /// Confiscate locked collateral
    ///
    /// With a gig given, that gig's lock must cover the amount; without
    /// one, the total locked balance must, and the reduction walks gig
    /// locks in key order. Available funds are never touched. Returns the
    /// ledger event together with the risk events the slash produced, for
    /// the caller to feed into risk scoring.
    pub async fn slash(
        &self,
        agent: &AgentId,
        amount: Amount,
        reason: impl Into<String>,
        gig: Option<&GigId>,
    ) -> Result<(BondEvent, Vec<RiskEvent>)> {
        self.check_amount("bond.slash", &amount)?;
        let reason = reason.into();
        let now = Utc::now();

        let mut entry = match self.accounts.get_mut(agent) {
            Some(entry) => entry,
            None => {
                return Err(GigClearError::NothingLocked {
                    agent_id: agent.to_string(),
                    requested: amount.to_human(),
                    locked: 0.0,
                })
            }
        };
        let state = entry.value_mut();

        match gig {
            Some(gig_id) => {
                let held = state.account.locked_for(gig_id);
                if amount > held {
                    return Err(GigClearError::NothingLocked {
                        agent_id: agent.to_string(),
                        requested: amount.to_human(),
                        locked: held.to_human(),
                    });
                }
                let remaining = held.checked_sub(amount)?;
                if remaining.is_zero() {
                    state.account.gig_locks.remove(gig_id);
                } else {
                    state.account.gig_locks.insert(*gig_id, remaining);
                }
            }
            None => {
                if amount > state.account.locked {
                    return Err(GigClearError::NothingLocked {
                        agent_id: agent.to_string(),
                        requested: amount.to_human(),
                        locked: state.account.locked.to_human(),
                    });
                }
                reduce_gig_locks(&mut state.account, amount)?;
            }
        }

        state.account.locked = state.account.locked.checked_sub(amount)?;
        state.account.reliability =
            (state.account.reliability * self.policy.reliability_slash_factor).clamp(0.0, 1.0);
        state.account.last_slash_at = Some(now);
        state.account.updated_at = now;

        let depleted = state.account.total()?.is_zero();

        let event = append_event(
            state,
            BondEventKind::Slash,
            amount,
            gig.copied(),
            Some(reason.clone()),
            now,
        );
        drop(entry);

        warn!(
            "Bond slashed for {}: {} ({})",
            agent, amount, reason
        );

        let mut risk_events = vec![RiskEvent {
            id: format!("riskevt_{}", Ulid::new()),
            agent_id: *agent,
            factor: RiskFactor::Slash,
            delta: self.policy.slash_risk_base + self.policy.slash_risk_scale * amount.to_human(),
            details: serde_json::json!({
                "reason": reason,
                "gig_id": gig.map(|g| g.to_string()),
                "amount": amount.to_human(),
            }),
            recorded_at: now,
        }];
        if depleted {
            risk_events.push(RiskEvent {
                id: format!("riskevt_{}", Ulid::new()),
                agent_id: *agent,
                factor: RiskFactor::BondDepletion,
                delta: self.policy.depletion_risk_delta,
                details: serde_json::json!({ "trigger": "slash" }),
                recorded_at: now,
            });
        }

        let _ = self.events_tx.send(event.clone());
        Ok((event, risk_events))
    }

    /// Get an agent's account
    ///
    /// The clean streak is refreshed to the time of the read.
    pub async fn account(&self, agent: &AgentId) -> Result<BondAccount> {
        self.accounts
            .get(agent)
            .map(|e| {
                let mut account = e.account.clone();
                account.clean_streak_days = account.streak_as_of(Utc::now());
                account
            })
            .ok_or_else(|| GigClearError::BondAccountNotFound {
                agent_id: agent.to_string(),
            })
    }

    /// Get an agent's full event log (empty if no account)
    pub async fn events(&self, agent: &AgentId) -> Vec<BondEvent> {
        self.accounts
            .get(agent)
            .map(|e| e.log.clone())
            .unwrap_or_default()
    }

    /// Derive an agent's bonding tier
    pub async fn tier(&self, agent: &AgentId) -> Result<BondTier> {
        match self.accounts.get(agent) {
            Some(entry) => Ok(self.policy.tier_for(&entry.account.total()?)),
            None => Ok(BondTier::Unbonded),
        }
    }

    /// Rebuild an agent's account from an event log and install it
    ///
    /// Used for crash recovery. Replaces any state currently held for the
    /// agent.
    pub async fn restore(&self, agent: &AgentId, events: Vec<BondEvent>) -> Result<BondAccount> {
        let account = replay(*agent, &events, &self.policy)?;
        let event_count = events.len();
        self.accounts.insert(
            *agent,
            AgentBondState {
                account: account.clone(),
                log: events,
            },
        );
        info!("Bond account restored for {} from {} events", agent, event_count);
        Ok(account)
    }

    fn check_amount(&self, operation: &str, amount: &Amount) -> Result<()> {
        if !amount.is_positive() {
            return Err(GigClearError::InvalidAmount {
                operation: operation.to_string(),
                amount: amount.to_human(),
            });
        }
        if amount.currency != self.policy.currency {
            return Err(GigClearError::CurrencyMismatch {
                expected: self.policy.currency.symbol().to_string(),
                actual: amount.currency.symbol().to_string(),
            });
        }
        Ok(())
    }

    // A missing account reads as the zero account, so each operation maps
    // the absence to the same error its zero-balance path would produce.
    fn entry<'a>(
        &'a self,
        agent: &AgentId,
    ) -> Option<dashmap::mapref::one::RefMut<'a, AgentId, AgentBondState>> {
        self.accounts.get_mut(agent)
    }
}

impl Default for BondLedger {
    fn default() -> Self {
        Self::new(BondPolicy::default())
    }
}

/// Rebuild an account by folding an event log over an empty account
///
/// Pure: touches no shared state. Each event's recorded `balance_after` is
/// cross-checked against the computed balances, so a tampered or reordered
/// log is detected instead of silently accepted.
pub fn replay(agent: AgentId, events: &[BondEvent], policy: &BondPolicy) -> Result<BondAccount> {
    let created_at = events
        .first()
        .map(|e| e.recorded_at)
        .unwrap_or_else(Utc::now);
    let mut account = new_account(agent, policy.currency, created_at);

    for event in events {
        if event.agent_id != agent {
            return Err(GigClearError::internal(format!(
                "event {} belongs to {}, not {}",
                event.id, event.agent_id, agent
            )));
        }

        match event.kind {
            BondEventKind::Deposit => {
                account.available = account.available.checked_add(event.amount)?;
            }
            BondEventKind::Withdraw => {
                if event.amount > account.available {
                    return Err(log_integrity_error(event, "withdraw exceeds available"));
                }
                account.available = account.available.checked_sub(event.amount)?;
            }
            BondEventKind::Lock => {
                let gig = require_gig(event)?;
                if event.amount > account.available {
                    return Err(log_integrity_error(event, "lock exceeds available"));
                }
                account.available = account.available.checked_sub(event.amount)?;
                account.locked = account.locked.checked_add(event.amount)?;
                let gig_lock = account
                    .gig_locks
                    .entry(gig)
                    .or_insert_with(|| Amount::zero(event.amount.currency));
                *gig_lock = gig_lock.checked_add(event.amount)?;
            }
            BondEventKind::Unlock => {
                let gig = require_gig(event)?;
                let held = account.locked_for(&gig);
                if event.amount > held {
                    return Err(log_integrity_error(event, "unlock exceeds gig lock"));
                }
                account.locked = account.locked.checked_sub(event.amount)?;
                account.available = account.available.checked_add(event.amount)?;
                let remaining = held.checked_sub(event.amount)?;
                if remaining.is_zero() {
                    account.gig_locks.remove(&gig);
                    account.reliability = (account.reliability + policy.reliability_step).min(1.0);
                } else {
                    account.gig_locks.insert(gig, remaining);
                }
            }
            BondEventKind::Slash => {
                if event.amount > account.locked {
                    return Err(log_integrity_error(event, "slash exceeds locked"));
                }
                account.locked = account.locked.checked_sub(event.amount)?;
                match event.gig_id {
                    Some(gig) => {
                        let held = account.locked_for(&gig);
                        if event.amount > held {
                            return Err(log_integrity_error(event, "slash exceeds gig lock"));
                        }
                        let remaining = held.checked_sub(event.amount)?;
                        if remaining.is_zero() {
                            account.gig_locks.remove(&gig);
                        } else {
                            account.gig_locks.insert(gig, remaining);
                        }
                    }
                    None => reduce_gig_locks(&mut account, event.amount)?,
                }
                account.reliability =
                    (account.reliability * policy.reliability_slash_factor).clamp(0.0, 1.0);
                account.last_slash_at = Some(event.recorded_at);
            }
        }
        account.clean_streak_days = account.streak_as_of(event.recorded_at);
        account.updated_at = event.recorded_at;

        if account.balances() != event.balance_after {
            return Err(GigClearError::internal(format!(
                "replay diverged from recorded balances at event {}",
                event.id
            )));
        }
    }

    Ok(account)
}

fn new_account(agent: AgentId, currency: Currency, at: DateTime<Utc>) -> BondAccount {
    let mut account = BondAccount::empty(agent, currency);
    account.created_at = at;
    account.updated_at = at;
    account
}

/// Walk per-gig locks in key order, reducing them by `amount` in total
fn reduce_gig_locks(account: &mut BondAccount, amount: Amount) -> Result<()> {
    let mut remaining = amount;
    let gig_ids: Vec<GigId> = account.gig_locks.keys().copied().collect();
    for gig_id in gig_ids {
        if remaining.is_zero() {
            break;
        }
        let held = account.locked_for(&gig_id);
        let cut = held.min(remaining);
        let left = held.checked_sub(cut)?;
        if left.is_zero() {
            account.gig_locks.remove(&gig_id);
        } else {
            account.gig_locks.insert(gig_id, left);
        }
        remaining = remaining.checked_sub(cut)?;
    }
    Ok(())
}

fn require_gig(event: &BondEvent) -> Result<GigId> {
    event.gig_id.ok_or_else(|| {
        GigClearError::internal(format!("{} event {} is missing a gig", event.kind, event.id))
    })
}

fn log_integrity_error(event: &BondEvent, what: &str) -> GigClearError {
    GigClearError::internal(format!("invalid event log: {} at event {}", what, event.id))
}

fn append_event(
    state: &mut AgentBondState,
    kind: BondEventKind,
    amount: Amount,
    gig_id: Option<GigId>,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> BondEvent {
    debug_assert_eq!(
        state
            .account
            .gig_locks
            .values()
            .map(|a| a.value)
            .sum::<i128>(),
        state.account.locked.value,
    );
    debug_assert!(state.account.available.value >= 0);
    debug_assert!(state.account.locked.value >= 0);

    state.account.clean_streak_days = state.account.streak_as_of(now);

    let event = BondEvent {
        id: format!("bevt_{}", Ulid::new()),
        agent_id: state.account.agent_id,
        kind,
        amount,
        gig_id,
        reason,
        balance_after: state.account.balances(),
        recorded_at: now,
    };
    state.log.push(event.clone());
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> BondLedger {
        BondLedger::new(BondPolicy::default())
    }

    #[tokio::test]
    async fn deposit_creates_account() {
        let ledger = ledger();
        let agent = AgentId::new();

        let event = ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        assert_eq!(event.kind, BondEventKind::Deposit);
        assert_eq!(event.balance_after.available, Amount::usdc(100.0));

        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.available, Amount::usdc(100.0));
        assert!(account.locked.is_zero());
    }

    #[tokio::test]
    async fn withdraw_respects_available() {
        let ledger = ledger();
        let agent = AgentId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();

        ledger.withdraw(&agent, Amount::usdc(40.0)).await.unwrap();
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.available, Amount::usdc(60.0));

        let err = ledger.withdraw(&agent, Amount::usdc(100.0)).await.unwrap_err();
        assert!(matches!(err, GigClearError::InsufficientAvailable { .. }));
    }

    #[tokio::test]
    async fn lock_moves_available_to_locked() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();

        ledger.lock(&agent, Amount::usdc(30.0), &gig).await.unwrap();
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.available, Amount::usdc(70.0));
        assert_eq!(account.locked, Amount::usdc(30.0));
        assert_eq!(account.locked_for(&gig), Amount::usdc(30.0));
        assert_eq!(account.total().unwrap(), Amount::usdc(100.0));

        // A second lock for the same gig accumulates
        ledger.lock(&agent, Amount::usdc(10.0), &gig).await.unwrap();
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.locked_for(&gig), Amount::usdc(40.0));
    }

    #[tokio::test]
    async fn lock_with_insufficient_available_fails() {
        let ledger = ledger();
        let agent = AgentId::new();
        ledger.deposit(&agent, Amount::usdc(10.0)).await.unwrap();

        let err = ledger
            .lock(&agent, Amount::usdc(20.0), &GigId::new())
            .await
            .unwrap_err();
        match err {
            GigClearError::InsufficientAvailable { available, .. } => assert_eq!(available, 10.0),
            other => panic!("unexpected error: {other:?}"),
        }

        // Locked funds do not count as available
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.available, Amount::usdc(10.0));
    }

    #[tokio::test]
    async fn unlock_restores_and_boosts_reliability() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(30.0), &gig).await.unwrap();

        // Partial unlock: no reliability change
        ledger.unlock(&agent, Amount::usdc(10.0), &gig).await.unwrap();
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.reliability, 1.0);
        assert_eq!(account.locked_for(&gig), Amount::usdc(20.0));

        // Clearing unlock after a slash halved reliability
        ledger
            .slash(&agent, Amount::usdc(5.0), "late delivery", Some(&gig))
            .await
            .unwrap();
        let halved = ledger.account(&agent).await.unwrap().reliability;
        assert_eq!(halved, 0.5);

        ledger.unlock(&agent, Amount::usdc(15.0), &gig).await.unwrap();
        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.reliability, 0.55);
        assert!(account.gig_locks.is_empty());
    }

    #[tokio::test]
    async fn unlock_beyond_gig_lock_rejected() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(30.0), &gig).await.unwrap();

        let err = ledger
            .unlock(&agent, Amount::usdc(50.0), &gig)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn slash_targets_locked_funds_only() {
        let ledger = ledger();
        let agent = AgentId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();

        // Nothing locked yet: slash must fail even though funds exist
        let err = ledger
            .slash(&agent, Amount::usdc(10.0), "test", None)
            .await
            .unwrap_err();
        assert!(matches!(err, GigClearError::NothingLocked { .. }));

        let gig = GigId::new();
        ledger.lock(&agent, Amount::usdc(30.0), &gig).await.unwrap();
        let (event, risks) = ledger
            .slash(&agent, Amount::usdc(20.0), "bad work", Some(&gig))
            .await
            .unwrap();
        assert_eq!(event.kind, BondEventKind::Slash);
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].factor, RiskFactor::Slash);
        assert_eq!(risks[0].delta, 10.0 + 0.5 * 20.0);

        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.available, Amount::usdc(70.0));
        assert_eq!(account.locked, Amount::usdc(10.0));
        assert_eq!(account.total().unwrap(), Amount::usdc(80.0));
        assert!(account.last_slash_at.is_some());
    }

    #[tokio::test]
    async fn slash_without_gig_walks_locks() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig_a = GigId::new();
        let gig_b = GigId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(30.0), &gig_a).await.unwrap();
        ledger.lock(&agent, Amount::usdc(40.0), &gig_b).await.unwrap();

        // Spans the first lock (in key order) into the second
        ledger
            .slash(&agent, Amount::usdc(50.0), "protocol violation", None)
            .await
            .unwrap();

        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.locked, Amount::usdc(20.0));
        assert_eq!(
            account
                .gig_locks
                .values()
                .map(|a| a.value)
                .sum::<i128>(),
            account.locked.value
        );
    }

    #[tokio::test]
    async fn slash_beyond_gig_lock_rejected() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(30.0), &gig).await.unwrap();

        let err = ledger
            .slash(&agent, Amount::usdc(40.0), "test", Some(&gig))
            .await
            .unwrap_err();
        match err {
            GigClearError::NothingLocked { locked, .. } => assert_eq!(locked, 30.0),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn depletion_emits_second_risk_event() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(25.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(25.0), &gig).await.unwrap();

        let (_, risks) = ledger
            .slash(&agent, Amount::usdc(25.0), "total loss", Some(&gig))
            .await
            .unwrap();
        assert_eq!(risks.len(), 2);
        assert_eq!(risks[1].factor, RiskFactor::BondDepletion);

        let account = ledger.account(&agent).await.unwrap();
        assert!(account.total().unwrap().is_zero());
    }

    #[tokio::test]
    async fn tier_derivation() {
        let ledger = ledger();
        let agent = AgentId::new();
        assert_eq!(ledger.tier(&agent).await.unwrap(), BondTier::Unbonded);

        ledger.deposit(&agent, Amount::usdc(49.0)).await.unwrap();
        assert_eq!(ledger.tier(&agent).await.unwrap(), BondTier::Unbonded);

        ledger.deposit(&agent, Amount::usdc(1.0)).await.unwrap();
        assert_eq!(ledger.tier(&agent).await.unwrap(), BondTier::Bonded);

        // Locked collateral still counts toward the tier
        ledger
            .lock(&agent, Amount::usdc(40.0), &GigId::new())
            .await
            .unwrap();
        assert_eq!(ledger.tier(&agent).await.unwrap(), BondTier::Bonded);

        ledger.deposit(&agent, Amount::usdc(450.0)).await.unwrap();
        assert_eq!(ledger.tier(&agent).await.unwrap(), BondTier::HighBond);
    }

    #[tokio::test]
    async fn currency_mismatch_rejected() {
        let ledger = ledger();
        let err = ledger
            .deposit(&AgentId::new(), Amount::eth(1.0))
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
    }

    #[tokio::test]
    async fn zero_and_negative_amounts_rejected() {
        let ledger = ledger();
        let agent = AgentId::new();
        assert!(ledger.deposit(&agent, Amount::usdc_zero()).await.is_err());
        assert!(ledger.deposit(&agent, Amount::usdc(-5.0)).await.is_err());
    }

    #[tokio::test]
    async fn slash_zeroes_account_clean_streak() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();

        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(40.0), &gig).await.unwrap();
        assert!(ledger.account(&agent).await.unwrap().last_slash_at.is_none());

        ledger
            .slash(&agent, Amount::usdc(40.0), "abandoned gig", Some(&gig))
            .await
            .unwrap();

        let account = ledger.account(&agent).await.unwrap();
        assert_eq!(account.clean_streak_days, 0);
        assert!(account.last_slash_at.is_some());
        // The streak re-anchors at the slash, not at account creation
        assert_eq!(
            account.streak_as_of(account.last_slash_at.unwrap() + chrono::Duration::days(4)),
            4
        );
    }

    #[tokio::test]
    async fn missing_account_errors_match_each_operation() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();

        let err = ledger.withdraw(&agent, Amount::usdc(10.0)).await.unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_AVAILABLE");

        let err = ledger.lock(&agent, Amount::usdc(10.0), &gig).await.unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_AVAILABLE");

        // Unlock overage reads as a bad amount; an absent account is the
        // zero-lock case of the same rule
        let err = ledger.unlock(&agent, Amount::usdc(10.0), &gig).await.unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
    }

    #[tokio::test]
    async fn replay_round_trip() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig_a = GigId::new();
        let gig_b = GigId::new();

        ledger.deposit(&agent, Amount::usdc(200.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(50.0), &gig_a).await.unwrap();
        ledger.lock(&agent, Amount::usdc(30.0), &gig_b).await.unwrap();
        ledger.unlock(&agent, Amount::usdc(50.0), &gig_a).await.unwrap();
        ledger
            .slash(&agent, Amount::usdc(10.0), "missed deadline", Some(&gig_b))
            .await
            .unwrap();
        ledger.withdraw(&agent, Amount::usdc(20.0)).await.unwrap();

        let live = ledger.account(&agent).await.unwrap();
        let events = ledger.events(&agent).await;
        let rebuilt = replay(agent, &events, ledger.policy()).unwrap();

        assert_eq!(live, rebuilt);
    }

    #[tokio::test]
    async fn replay_detects_tampered_log() {
        let ledger = ledger();
        let agent = AgentId::new();
        ledger.deposit(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger.withdraw(&agent, Amount::usdc(10.0)).await.unwrap();

        let mut events = ledger.events(&agent).await;
        events[1].balance_after.available = Amount::usdc(999.0);

        let err = replay(agent, &events, ledger.policy()).unwrap_err();
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[tokio::test]
    async fn restore_installs_replayed_state() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();
        ledger.deposit(&agent, Amount::usdc(80.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(20.0), &gig).await.unwrap();
        let events = ledger.events(&agent).await;
        let live = ledger.account(&agent).await.unwrap();

        // Fresh ledger, as after a crash
        let recovered = BondLedger::new(BondPolicy::default());
        let account = recovered.restore(&agent, events).await.unwrap();
        assert_eq!(account, live);
        assert_eq!(
            recovered.account(&agent).await.unwrap().locked_for(&gig),
            Amount::usdc(20.0)
        );
    }

    #[tokio::test]
    async fn events_are_broadcast() {
        let ledger = ledger();
        let mut rx = ledger.subscribe();
        let agent = AgentId::new();

        ledger.deposit(&agent, Amount::usdc(10.0)).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, BondEventKind::Deposit);
        assert_eq!(event.agent_id, agent);
    }

    #[tokio::test]
    async fn conservation_across_mixed_operations() {
        let ledger = ledger();
        let agent = AgentId::new();
        let gig = GigId::new();

        ledger.deposit(&agent, Amount::usdc(500.0)).await.unwrap();
        ledger.lock(&agent, Amount::usdc(200.0), &gig).await.unwrap();
        ledger.withdraw(&agent, Amount::usdc(100.0)).await.unwrap();
        ledger
            .slash(&agent, Amount::usdc(50.0), "partial fault", Some(&gig))
            .await
            .unwrap();
        ledger.unlock(&agent, Amount::usdc(150.0), &gig).await.unwrap();

        let account = ledger.account(&agent).await.unwrap();
        // 500 deposited - 100 withdrawn - 50 slashed
        assert_eq!(account.total().unwrap(), Amount::usdc(350.0));
        assert_eq!(account.available, Amount::usdc(350.0));
        assert!(account.locked.is_zero());
    }
}
