use indoc::indoc;
use std::fs;
use tempfile::TempDir;

use fibreflow::router::{AgentRegistry, RouteDecision, RouterError, TaskRouter};

const REGISTRY: &str = indoc! {r#"
    {
      "total_agents": 3,
      "agent_categories": {
        "infrastructure": ["vps-monitor"],
        "data": ["neon-database"],
        "knowledge": ["knowledge-base"]
      },
      "agents": [
        {
          "id": "vps-monitor",
          "name": "VPS Monitor",
          "type": "monitoring",
          "status": "active",
          "description": "Monitors server health",
          "triggers": ["cpu", "memory", "disk"],
          "model": "claude-3-haiku-20240307",
          "cost_per_query": "$0.001"
        },
        {
          "id": "neon-database",
          "name": "Neon Database",
          "type": "database",
          "status": "active",
          "description": "Answers questions about project data",
          "triggers": ["database", "sql", "memory usage"],
          "model": "claude-3-haiku-20240307"
        },
        {
          "id": "knowledge-base",
          "name": "Knowledge Base",
          "type": "knowledge",
          "status": "active",
          "triggers": ["document", "knowledge"]
        }
      ]
    }
"#};

fn load_router() -> (TempDir, TaskRouter) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.json");
    fs::write(&path, REGISTRY).unwrap();
    let router = TaskRouter::from_path(&path).unwrap();
    (dir, router)
}

#[test]
fn routes_single_match_to_agent() {
    let (_dir, router) = load_router();

    match router.route("check cpu usage", false) {
        RouteDecision::Routed { agent, alternatives } => {
            assert_eq!(agent.agent_id, "vps-monitor");
            assert_eq!(agent.matched_keywords, vec!["cpu"]);
            assert!(alternatives.is_empty());
        }
        other => panic!("expected routed, got {other:?}"),
    }
}

#[test]
fn unmatched_task_is_no_match() {
    let (_dir, router) = load_router();

    match router.route("tell me a joke", true) {
        RouteDecision::NoMatch { message, suggestion } => {
            assert_eq!(message, "No specialized agent found for this task");
            assert!(!suggestion.is_empty());
        }
        other => panic!("expected no match, got {other:?}"),
    }
}

#[test]
fn several_matches_without_auto_select_are_listed_best_first() {
    let (_dir, router) = load_router();

    // "memory usage" hits two neon triggers ("memory usage", "database") and one vps trigger
    match router.route("database memory usage report", false) {
        RouteDecision::MultipleMatches { options, .. } => {
            let ids: Vec<&str> = options.iter().map(|o| o.agent_id.as_str()).collect();
            assert_eq!(ids, vec!["neon-database", "vps-monitor"]);
            assert_eq!(options[0].confidence, 2);
            assert_eq!(options[1].confidence, 1);
        }
        other => panic!("expected multiple matches, got {other:?}"),
    }
}

#[test]
fn routing_is_deterministic() {
    let (_dir, router) = load_router();
    let task = "memory and disk on the database host";
    let first = router.route(task, false);
    for _ in 0..10 {
        assert_eq!(router.route(task, false), first);
    }
}

#[test]
fn missing_and_invalid_registries_are_distinct_errors() {
    let dir = tempfile::tempdir().unwrap();

    let missing = AgentRegistry::load(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, RouterError::NotFound(_)));

    let broken = dir.path().join("broken.json");
    fs::write(&broken, "{ agents: ").unwrap();
    let invalid = AgentRegistry::load(&broken).unwrap_err();
    assert!(matches!(invalid, RouterError::InvalidJson(_)));
}

#[test]
fn lookups_and_stats_use_the_loaded_registry() {
    let (_dir, router) = load_router();

    assert_eq!(router.list_agents().len(), 3);
    assert_eq!(
        router.get_agent_by_id("knowledge-base").map(|a| a.name.as_str()),
        Some("Knowledge Base")
    );
    assert!(router.get_agent_by_id("unknown").is_none());

    let stats = router.stats();
    assert_eq!(stats.total_agents, 3);
    assert_eq!(stats.active_agents, 3);
    assert_eq!(stats.categories.len(), 3);
    assert_eq!(stats.models_used["claude-3-haiku-20240307"], 2);
}
