//! Keyword routing of free-text tasks to registered agents.
//!
//! Every agent descriptor carries a list of trigger keywords. A task scores one point
//! per trigger that appears in it (case-insensitive substring match); agents with no
//! hits are dropped and the rest are ranked by score. Equal scores keep registry order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::prompt_template::load_builtin_prompt;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Agent registry not found at {0}")]
    NotFound(PathBuf),

    #[error("Invalid registry JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read agent registry: {0}")]
    Io(#[from] std::io::Error),
}

/// A routable agent as declared in the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub cost_per_query: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub agent_type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub avg_response_time: Option<String>,
    #[serde(default)]
    pub capabilities: BTreeMap<String, Vec<String>>,
}

impl AgentDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, triggers: &[&str]) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            model: None,
            cost_per_query: None,
            status: Some("active".to_string()),
            agent_type: None,
            path: None,
            avg_response_time: None,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

/// The static collection of agents the router chooses from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistry {
    #[serde(default)]
    pub agents: Vec<AgentDescriptor>,
    #[serde(default)]
    pub total_agents: Option<usize>,
    #[serde(default)]
    pub agent_categories: BTreeMap<String, Vec<String>>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<AgentDescriptor>) -> Self {
        Self {
            agents,
            ..Default::default()
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RouterError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// An agent whose triggers matched a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMatch {
    pub agent_id: String,
    pub agent_name: String,
    /// Number of triggers found in the task
    pub confidence: usize,
    pub matched_keywords: Vec<String>,
    pub description: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RouteDecision {
    Routed {
        agent: AgentMatch,
        alternatives: Vec<AgentMatch>,
    },
    MultipleMatches {
        message: String,
        options: Vec<AgentMatch>,
    },
    NoMatch {
        message: String,
        suggestion: String,
    },
}

impl RouteDecision {
    /// The chosen agent, when the decision is `Routed`
    pub fn selected(&self) -> Option<&AgentMatch> {
        match self {
            RouteDecision::Routed { agent, .. } => Some(agent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkforceStats {
    pub total_agents: usize,
    pub active_agents: usize,
    pub categories: BTreeMap<String, usize>,
    pub agent_types: BTreeMap<String, usize>,
    pub models_used: BTreeMap<String, usize>,
}

#[derive(Serialize)]
struct CapabilityContext<'a> {
    category: &'a str,
    items: &'a [String],
}

#[derive(Serialize)]
struct ExplainContext<'a> {
    id: &'a str,
    name: &'a str,
    description: &'a str,
    capabilities: Vec<CapabilityContext<'a>>,
    triggers: Vec<&'a str>,
    model: &'a str,
    avg_response_time: &'a str,
    cost_per_query: &'a str,
    path: &'a str,
}

/// Stateless routing over a registry snapshot
#[derive(Debug, Clone, Default)]
pub struct TaskRouter {
    registry: AgentRegistry,
}

impl TaskRouter {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RouterError> {
        Ok(Self::new(AgentRegistry::load(path)?))
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn list_agents(&self) -> &[AgentDescriptor] {
        &self.registry.agents
    }

    /// Agents listed under `category` in the registry, in registry order
    pub fn list_agents_in_category(&self, category: &str) -> Vec<&AgentDescriptor> {
        let Some(ids) = self.registry.agent_categories.get(category) else {
            return Vec::new();
        };
        self.registry
            .agents
            .iter()
            .filter(|agent| ids.contains(&agent.id))
            .collect()
    }

    pub fn get_agent_by_id(&self, agent_id: &str) -> Option<&AgentDescriptor> {
        self.registry.agents.iter().find(|agent| agent.id == agent_id)
    }

    /// Score every agent against the task, best first.
    ///
    /// Empty trigger strings are ignored. A registry entry with `""` in its
    /// triggers would otherwise match, and gain a point on, every task.
    pub fn find_agent_for_task(&self, task: &str) -> Vec<AgentMatch> {
        let task_lower = task.to_lowercase();

        let mut matches: Vec<AgentMatch> = self
            .registry
            .agents
            .iter()
            .filter_map(|agent| {
                let matched_keywords: Vec<String> = agent
                    .triggers
                    .iter()
                    .filter(|trigger| !trigger.is_empty())
                    .filter(|trigger| task_lower.contains(&trigger.to_lowercase()))
                    .cloned()
                    .collect();

                if matched_keywords.is_empty() {
                    return None;
                }
                Some(AgentMatch {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    confidence: matched_keywords.len(),
                    matched_keywords,
                    description: agent.description.clone(),
                    path: agent.path.clone(),
                })
            })
            .collect();

        // Stable: equal scores keep registry order
        matches.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        matches
    }

    pub fn route(&self, task: &str, auto_select: bool) -> RouteDecision {
        let mut matches = self.find_agent_for_task(task);
        debug!(matches = matches.len(), auto_select, "routed task");

        if matches.is_empty() {
            return RouteDecision::NoMatch {
                message: "No specialized agent found for this task".to_string(),
                suggestion: "Consider handling with general capabilities or creating new agent"
                    .to_string(),
            };
        }

        if auto_select || matches.len() == 1 {
            let agent = matches.remove(0);
            return RouteDecision::Routed {
                agent,
                alternatives: matches,
            };
        }

        RouteDecision::MultipleMatches {
            message: "Multiple agents can handle this task".to_string(),
            options: matches,
        }
    }

    pub fn stats(&self) -> WorkforceStats {
        let agents = &self.registry.agents;
        let mut stats = WorkforceStats {
            total_agents: self.registry.total_agents.unwrap_or(agents.len()),
            active_agents: agents.iter().filter(|agent| agent.is_active()).count(),
            categories: self
                .registry
                .agent_categories
                .iter()
                .map(|(category, ids)| (category.clone(), ids.len()))
                .collect(),
            ..Default::default()
        };

        for agent in agents {
            let agent_type = agent.agent_type.clone().unwrap_or_else(|| "unknown".to_string());
            *stats.agent_types.entry(agent_type).or_default() += 1;
            if let Some(model) = &agent.model {
                *stats.models_used.entry(model.clone()).or_default() += 1;
            }
        }
        stats
    }

    /// Human-readable summary of an agent's capabilities
    pub fn explain_capabilities(&self, agent_id: &str) -> String {
        let Some(agent) = self.get_agent_by_id(agent_id) else {
            return format!("Agent '{}' not found", agent_id);
        };

        let context = ExplainContext {
            id: &agent.id,
            name: &agent.name,
            description: &agent.description,
            capabilities: agent
                .capabilities
                .iter()
                .map(|(category, items)| CapabilityContext { category, items })
                .collect(),
            triggers: agent.triggers.iter().take(10).map(String::as_str).collect(),
            model: agent.model.as_deref().unwrap_or("N/A"),
            avg_response_time: agent.avg_response_time.as_deref().unwrap_or("N/A"),
            cost_per_query: agent.cost_per_query.as_deref().unwrap_or("N/A"),
            path: agent.path.as_deref().unwrap_or("N/A"),
        };

        load_builtin_prompt("capabilities.md", &context)
            .unwrap_or_else(|err| format!("{} ({}): {}", agent.name, agent.id, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> TaskRouter {
        let mut vps = AgentDescriptor::new("vps-monitor", "VPS Monitor", &["cpu", "memory", "nginx"]);
        vps.agent_type = Some("monitoring".to_string());
        vps.model = Some("claude-3-haiku-20240307".to_string());
        vps.capabilities.insert(
            "system_metrics".to_string(),
            vec!["CPU usage".to_string(), "Memory usage".to_string()],
        );
        let mut neon = AgentDescriptor::new("neon-database", "Neon Database", &["database", "sql", "contractors"]);
        neon.agent_type = Some("database".to_string());
        neon.model = Some("claude-3-haiku-20240307".to_string());
        let mut convex = AgentDescriptor::new("convex-database", "Convex Database", &["convex", "database"]);
        convex.status = Some("inactive".to_string());

        let mut registry = AgentRegistry::new(vec![vps, neon, convex]);
        registry
            .agent_categories
            .insert("infrastructure".to_string(), vec!["vps-monitor".to_string()]);
        registry.agent_categories.insert(
            "data".to_string(),
            vec!["neon-database".to_string(), "convex-database".to_string()],
        );
        TaskRouter::new(registry)
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let matches = router().find_agent_for_task("What's the CPU usage and MEMORY?");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].agent_id, "vps-monitor");
        assert_eq!(matches[0].confidence, 2);
        assert_eq!(matches[0].matched_keywords, vec!["cpu", "memory"]);
    }

    #[test]
    fn test_empty_triggers_never_match() {
        let router = TaskRouter::new(AgentRegistry::new(vec![
            AgentDescriptor::new("catch-all", "Catch All", &["", "cpu"]),
            AgentDescriptor::new("vps-monitor", "VPS Monitor", &["cpu", "memory"]),
        ]));

        assert!(router.find_agent_for_task("tell me a joke").is_empty());

        let matches = router.find_agent_for_task("cpu and memory");
        assert_eq!(matches[0].agent_id, "vps-monitor");
        assert_eq!(matches[1].confidence, 1);
        assert_eq!(matches[1].matched_keywords, vec!["cpu"]);
    }

    #[test]
    fn test_ties_keep_registry_order() {
        let matches = router().find_agent_for_task("which database?");
        let ids: Vec<&str> = matches.iter().map(|m| m.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["neon-database", "convex-database"]);
    }

    #[test]
    fn test_auto_select_picks_best_and_keeps_rest() {
        let decision = router().route("query the convex database", true);
        match decision {
            RouteDecision::Routed { agent, alternatives } => {
                assert_eq!(agent.agent_id, "convex-database");
                assert_eq!(agent.confidence, 2);
                assert_eq!(alternatives.len(), 1);
                assert_eq!(alternatives[0].agent_id, "neon-database");
            }
            other => panic!("expected routed, got {other:?}"),
        }
    }

    #[test]
    fn test_decision_serializes_with_status_tag() {
        let value = serde_json::to_value(router().route("tell me a joke", false)).unwrap();
        assert_eq!(value["status"], "no_match");
        assert_eq!(value["message"], "No specialized agent found for this task");

        let value = serde_json::to_value(router().route("cpu", false)).unwrap();
        assert_eq!(value["status"], "routed");
        assert_eq!(value["agent"]["agent_id"], "vps-monitor");
        assert_eq!(value["alternatives"], json!([]));
    }

    #[test]
    fn test_stats() {
        let stats = router().stats();
        assert_eq!(stats.total_agents, 3);
        assert_eq!(stats.active_agents, 2);
        assert_eq!(stats.categories["data"], 2);
        assert_eq!(stats.agent_types["monitoring"], 1);
        assert_eq!(stats.agent_types["unknown"], 1);
        assert_eq!(stats.models_used["claude-3-haiku-20240307"], 2);
    }

    #[test]
    fn test_list_agents_in_category() {
        let router = router();
        let data: Vec<&str> = router
            .list_agents_in_category("data")
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(data, vec!["neon-database", "convex-database"]);
        assert!(router.list_agents_in_category("missing").is_empty());
    }

    #[test]
    fn test_explain_capabilities() {
        let router = router();
        let text = router.explain_capabilities("vps-monitor");
        assert!(text.contains("VPS Monitor (vps-monitor)"));
        assert!(text.contains("System Metrics:"));
        assert!(text.contains("- CPU usage"));
        assert!(text.contains("cpu, memory, nginx"));
        assert!(text.contains("Cost per query: N/A"));

        assert_eq!(router.explain_capabilities("nope"), "Agent 'nope' not found");
    }

    #[test]
    fn test_registry_deserializes_original_layout() {
        let raw = json!({
            "total_agents": 1,
            "agent_categories": {"infrastructure": ["vps-monitor"]},
            "agents": [{
                "id": "vps-monitor",
                "name": "VPS Monitor",
                "type": "monitoring",
                "status": "active",
                "description": "Monitors the VPS",
                "triggers": ["cpu"],
                "model": "claude-3-haiku-20240307",
                "cost_per_query": "$0.001",
                "path": "agents/vps-monitor"
            }]
        });
        let registry: AgentRegistry = serde_json::from_value(raw).unwrap();
        assert_eq!(registry.agents[0].agent_type.as_deref(), Some("monitoring"));
        assert_eq!(registry.agents[0].cost_per_query.as_deref(), Some("$0.001"));
    }
}
