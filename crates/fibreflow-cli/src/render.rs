use anyhow::{anyhow, Result};
use bat::WrappingMode;
use console::style;
use fibreflow::agent::{ChatOutcome, ChatReply, ToolCallRecord};
use fibreflow::router::{AgentDescriptor, AgentMatch, RouteDecision, WorkforceStats};
use std::collections::BTreeMap;
use std::fmt::Write;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggle(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn bat_theme(self) -> &'static str {
        match self {
            Theme::Light => "GitHub",
            Theme::Dark => "zenburn",
        }
    }
}

fn pretty(content: &str, theme: Theme, language: &str, header: Option<String>) -> Result<()> {
    let mut input = bat::Input::from_bytes(content.as_bytes());
    let framed = header.is_some();
    if let Some(name) = header {
        input = input.name(name);
    }
    bat::PrettyPrinter::new()
        .input(input)
        .theme(theme.bat_theme())
        .language(language)
        .grid(framed)
        .header(framed)
        .wrapping_mode(WrappingMode::Character)
        .print()
        .map_err(|e| anyhow!("failed to render output: {}", e))?;
    Ok(())
}

pub fn print_markdown(content: &str, theme: Theme) -> Result<()> {
    pretty(content, theme, "Markdown", None)?;
    println!();
    Ok(())
}

/// Text tool output is shown unquoted, structured output as JSON
fn tool_output(result: &serde_json::Value) -> (String, &'static str) {
    match result {
        serde_json::Value::String(text) => (text.clone(), "Markdown"),
        other => (
            serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            "JSON",
        ),
    }
}

pub fn print_tool_call(call: &ToolCallRecord, theme: Theme) -> Result<()> {
    let arguments =
        serde_json::to_string_pretty(&call.arguments).unwrap_or_else(|_| call.arguments.to_string());
    pretty(
        &arguments,
        theme,
        "JSON",
        Some(format!("Tool Request: {}", call.name)),
    )?;

    let (output, language) = tool_output(&call.result);
    let title = if call.is_error {
        "Tool Error:"
    } else {
        "Tool Response:"
    };
    pretty(&output, theme, language, Some(title.to_string()))
}

pub fn print_reply(reply: &ChatReply, theme: Theme) -> Result<()> {
    for call in &reply.tool_calls {
        print_tool_call(call, theme)?;
    }
    print_markdown(&reply.text, theme)?;
    match &reply.outcome {
        ChatOutcome::Completed => {}
        ChatOutcome::TurnsExhausted => println!(
            "{}",
            style(format!("stopped after {} turns", reply.turns)).yellow()
        ),
        ChatOutcome::UnexpectedStop(reason) => {
            println!("{}", style(format!("model stopped: {}", reason)).yellow())
        }
    }
    Ok(())
}

fn describe_match(out: &mut String, m: &AgentMatch) {
    let _ = writeln!(
        out,
        "  {} ({}) confidence {} [{}]",
        m.agent_name,
        m.agent_id,
        m.confidence,
        m.matched_keywords.join(", ")
    );
}

pub fn describe_decision(decision: &RouteDecision) -> String {
    let mut out = String::new();
    match decision {
        RouteDecision::Routed {
            agent,
            alternatives,
        } => {
            let _ = writeln!(out, "Routed to:");
            describe_match(&mut out, agent);
            if !alternatives.is_empty() {
                let _ = writeln!(out, "Alternatives:");
                for alt in alternatives {
                    describe_match(&mut out, alt);
                }
            }
        }
        RouteDecision::MultipleMatches { message, options } => {
            let _ = writeln!(out, "{}:", message);
            for option in options {
                describe_match(&mut out, option);
            }
        }
        RouteDecision::NoMatch {
            message,
            suggestion,
        } => {
            let _ = writeln!(out, "{}", message);
            let _ = writeln!(out, "{}", suggestion);
        }
    }
    out
}

pub fn describe_agents(agents: &[&AgentDescriptor]) -> String {
    if agents.is_empty() {
        return "No agents found\n".to_string();
    }
    let mut out = String::new();
    for agent in agents {
        let _ = writeln!(
            out,
            "{:<24} {:<10} {}",
            agent.id,
            agent.status.as_deref().unwrap_or("unknown"),
            agent.description
        );
    }
    out
}

fn describe_counts(out: &mut String, title: &str, counts: &BTreeMap<String, usize>) {
    let _ = writeln!(out, "{}:", title);
    for (key, count) in counts {
        let _ = writeln!(out, "  {:<22} {}", key, count);
    }
}

pub fn describe_stats(stats: &WorkforceStats) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} agents, {} active",
        stats.total_agents, stats.active_agents
    );
    describe_counts(&mut out, "Categories", &stats.categories);
    describe_counts(&mut out, "Types", &stats.agent_types);
    describe_counts(&mut out, "Models", &stats.models_used);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use fibreflow::router::{AgentRegistry, TaskRouter};
    use serde_json::json;

    fn router() -> TaskRouter {
        TaskRouter::new(AgentRegistry::new(vec![
            AgentDescriptor::new("vps-monitor", "VPS Monitor", &["cpu", "server"]),
            AgentDescriptor::new("knowledge-base", "Knowledge Base", &["document"]),
        ]))
    }

    #[test]
    fn test_describe_routed_decision() {
        let text = describe_decision(&router().route("check server cpu", false));
        assert!(text.starts_with("Routed to:"));
        assert!(text.contains("VPS Monitor (vps-monitor) confidence 2 [cpu, server]"));
        assert!(!text.contains("Alternatives"));
    }

    #[test]
    fn test_describe_multiple_matches() {
        let text = describe_decision(&router().route("server document", false));
        assert!(text.starts_with("Multiple agents can handle this task:"));
        assert!(text.contains("vps-monitor"));
        assert!(text.contains("knowledge-base"));
    }

    #[test]
    fn test_describe_no_match() {
        let text = describe_decision(&router().route("bake a cake", false));
        assert!(text.contains("No specialized agent found for this task"));
    }

    #[test]
    fn test_describe_agents_and_stats() {
        let router = router();
        let agents: Vec<_> = router.list_agents().iter().collect();
        let listing = describe_agents(&agents);
        assert_eq!(listing.lines().count(), 2);
        assert!(listing.contains("active"));
        assert_eq!(describe_agents(&[]), "No agents found\n");

        let stats = describe_stats(&router.stats());
        assert!(stats.starts_with("2 agents, 2 active"));
    }

    #[test]
    fn test_tool_output_languages() {
        assert_eq!(
            tool_output(&json!("plain text")),
            ("plain text".to_string(), "Markdown")
        );
        let (text, language) = tool_output(&json!({"documents": []}));
        assert_eq!(language, "JSON");
        assert!(text.contains("\"documents\""));
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Dark.toggle(), Theme::Light);
        assert_eq!(Theme::Light.bat_theme(), "GitHub");
    }
}
