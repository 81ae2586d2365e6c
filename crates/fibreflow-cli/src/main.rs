mod render;
mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use fibreflow::agent::{Agent, DEFAULT_MAX_TURNS};
use fibreflow::knowledge_base::{default_documents_dir, expand_path, KnowledgeBaseBehavior};
use fibreflow::providers::anthropic::AnthropicProvider;
use fibreflow::providers::configs::AnthropicProviderConfig;
use fibreflow::router::TaskRouter;
use fibreflow::state::DomainState;
use serde_json::Map;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::render::{describe_agents, describe_decision, describe_stats};
use crate::session::ChatSession;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Agent registry file
    #[arg(
        long,
        global = true,
        env = "FIBREFLOW_REGISTRY",
        default_value = "orchestrator/registry.json"
    )]
    registry: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find the agent best suited to a task
    Route {
        task: String,

        /// Pick the highest scoring agent instead of listing ties
        #[arg(long)]
        auto_select: bool,

        /// Print the decision as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered agents
    Agents {
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Workforce statistics
    Stats,
    /// Describe one agent's capabilities
    Explain { agent_id: String },
    /// Chat with the knowledge base agent
    Chat {
        /// Where documents are stored (defaults to ~/velocity-fibre-knowledge/documents)
        #[arg(long)]
        documents_dir: Option<String>,

        #[arg(long, default_value_t = DEFAULT_MAX_TURNS)]
        max_turns: usize,

        /// Keep the agent's domain memory in this JSON file
        #[arg(long, env = "FIBREFLOW_STATE_FILE")]
        state_file: Option<String>,

        /// Anthropic API key (can also be set via ANTHROPIC_API_KEY environment variable)
        #[arg(long)]
        api_key: Option<String>,

        /// Model to use (can also be set via ANTHROPIC_MODEL environment variable)
        #[arg(short, long)]
        model: Option<String>,
    },
}

fn load_router(path: &Path) -> Result<TaskRouter> {
    TaskRouter::from_path(path)
        .with_context(|| format!("failed to load registry {}", path.display()))
}

fn provider_config(api_key: Option<String>, model: Option<String>) -> Result<AnthropicProviderConfig> {
    let mut config = match api_key {
        Some(key) => {
            let mut config = AnthropicProviderConfig::from_env()
                .unwrap_or_else(|_| AnthropicProviderConfig::new(key.clone()));
            config.api_key = key;
            config
        }
        None => AnthropicProviderConfig::from_env()?,
    };
    if let Some(model) = model {
        config = config.with_model(model);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Route {
            task,
            auto_select,
            json,
        } => {
            let decision = load_router(&cli.registry)?.route(&task, auto_select);
            if json {
                println!("{}", serde_json::to_string_pretty(&decision)?);
            } else {
                print!("{}", describe_decision(&decision));
            }
        }
        Command::Agents { category } => {
            let router = load_router(&cli.registry)?;
            let agents = match category.as_deref() {
                Some(category) => router.list_agents_in_category(category),
                None => router.list_agents().iter().collect(),
            };
            print!("{}", describe_agents(&agents));
        }
        Command::Stats => {
            print!("{}", describe_stats(&load_router(&cli.registry)?.stats()));
        }
        Command::Explain { agent_id } => {
            println!("{}", load_router(&cli.registry)?.explain_capabilities(&agent_id));
        }
        Command::Chat {
            documents_dir,
            max_turns,
            state_file,
            api_key,
            model,
        } => {
            let documents_dir = documents_dir
                .map(|dir| expand_path(&dir))
                .unwrap_or_else(default_documents_dir);
            let provider = AnthropicProvider::new(provider_config(api_key, model)?)?;
            println!(
                "{}",
                style(format!(
                    "model {} / documents in {}",
                    provider.model(),
                    documents_dir.display()
                ))
                .dim()
            );

            let behavior = KnowledgeBaseBehavior::new(documents_dir)?;
            let mut agent = Agent::new(Box::new(behavior), Box::new(provider));
            if let Some(path) = state_file {
                agent = agent.with_state(DomainState::load(expand_path(&path), Map::new()));
            }
            ChatSession::new(agent, max_turns).start().await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_arguments() {
        let cli = Cli::try_parse_from(["fibreflow", "route", "check cpu", "--auto-select"]).unwrap();
        assert_eq!(cli.registry, PathBuf::from("orchestrator/registry.json"));
        match cli.command {
            Command::Route {
                task,
                auto_select,
                json,
            } => {
                assert_eq!(task, "check cpu");
                assert!(auto_select);
                assert!(!json);
            }
            _ => panic!("expected route"),
        }
    }

    #[test]
    fn test_registry_flag_is_global() {
        let cli = Cli::try_parse_from(["fibreflow", "stats", "--registry", "/tmp/r.json"]).unwrap();
        assert_eq!(cli.registry, PathBuf::from("/tmp/r.json"));
    }

    #[test]
    fn test_chat_defaults() {
        let cli = Cli::try_parse_from(["fibreflow", "chat"]).unwrap();
        match cli.command {
            Command::Chat {
                documents_dir,
                max_turns,
                state_file,
                api_key,
                model,
            } => {
                assert!(documents_dir.is_none());
                assert!(state_file.is_none());
                assert_eq!(max_turns, DEFAULT_MAX_TURNS);
                assert!(api_key.is_none());
                assert!(model.is_none());
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_explain_requires_agent_id() {
        assert!(Cli::try_parse_from(["fibreflow", "explain"]).is_err());
    }

    #[test]
    fn test_explicit_api_key_and_model() {
        let config =
            provider_config(Some("sk-test".to_string()), Some("claude-3-5-sonnet".to_string()))
                .unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, "claude-3-5-sonnet");
    }

    #[test]
    fn test_unknown_registry_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_router(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("failed to load registry"));
    }
}
