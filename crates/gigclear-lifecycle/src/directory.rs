//! Agent registry seam
//!
//! Agent existence, wallet addresses and skills live outside the core. The
//! orchestrator reads them through `AgentDirectory` - a lookup keyed by
//! agent id - and never writes back.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use gigclear_types::AgentId;

/// What the registry knows about one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Agent ID
    pub agent_id: AgentId,
    /// Display name
    pub name: String,
    /// Settlement wallet address
    pub wallet_address: String,
    /// Skills the agent advertises
    pub skills: Vec<String>,
    /// Whether the agent is active and eligible for validator duty
    pub active: bool,
}

/// Read-only agent lookup
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Check whether the agent is registered
    async fn exists(&self, agent: &AgentId) -> bool;

    /// Fetch an agent's profile
    async fn agent(&self, agent: &AgentId) -> Option<AgentProfile>;

    /// All currently active agents (the validator eligibility pool)
    async fn active_agents(&self) -> Vec<AgentId>;
}

/// In-memory directory for tests and demos
pub struct InMemoryDirectory {
    agents: Arc<DashMap<AgentId, AgentProfile>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(DashMap::new()),
        }
    }

    /// Register an agent, replacing any existing profile
    pub fn register(&self, profile: AgentProfile) {
        self.agents.insert(profile.agent_id, profile);
    }

    /// Register an active agent with a generated wallet address
    pub fn register_simple(&self, agent_id: AgentId, name: impl Into<String>) {
        self.register(AgentProfile {
            agent_id,
            name: name.into(),
            wallet_address: format!("0xwallet_{}", agent_id.as_uuid().simple()),
            skills: Vec::new(),
            active: true,
        });
    }

    /// Mark an agent active or inactive
    pub fn set_active(&self, agent_id: &AgentId, active: bool) {
        if let Some(mut profile) = self.agents.get_mut(agent_id) {
            profile.active = active;
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentDirectory for InMemoryDirectory {
    async fn exists(&self, agent: &AgentId) -> bool {
        self.agents.contains_key(agent)
    }

    async fn agent(&self, agent: &AgentId) -> Option<AgentProfile> {
        self.agents.get(agent).map(|p| p.clone())
    }

    async fn active_agents(&self) -> Vec<AgentId> {
        let mut active: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| *entry.key())
            .collect();
        active.sort_unstable();
        active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn active_filter_applies() {
        let directory = InMemoryDirectory::new();
        let a = AgentId::new();
        let b = AgentId::new();
        directory.register_simple(a, "alpha");
        directory.register_simple(b, "beta");
        directory.set_active(&b, false);

        assert!(directory.exists(&a).await);
        assert!(directory.exists(&b).await);
        assert_eq!(directory.active_agents().await, {
            let mut v = vec![a];
            v.sort_unstable();
            v
        });
    }
}
