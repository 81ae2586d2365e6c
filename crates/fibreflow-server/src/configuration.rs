use crate::error::{to_env_var, ConfigError};
use config::{Config, Environment};
use fibreflow::providers::configs::{
    AnthropicProviderConfig, ANTHROPIC_HOST, ANTHROPIC_MAX_TOKENS, ANTHROPIC_MODEL,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default = "default_anthropic_host")]
    pub host: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl ProviderSettings {
    pub fn into_config(self, api_key: String) -> AnthropicProviderConfig {
        AnthropicProviderConfig {
            host: self.host,
            api_key,
            model: self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    /// Seconds a loaded registry is served before it is read again
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Seconds a chat session may sit idle before it is dropped
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
            cache_ttl_secs: default_cache_ttl_secs(),
            max_turns: default_max_turns(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct KnowledgeBaseSettings {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: String,
    /// Where knowledge base agents keep their domain memory. Unset keeps none.
    #[serde(default)]
    pub state_file: Option<String>,
}

impl Default for KnowledgeBaseSettings {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            state_file: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthSettings {
    /// When set, every orchestrator and agent route requires `Authorization: Bearer <key>`
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsSettings {
    #[serde(default = "default_metrics_dir")]
    pub dir: PathBuf,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            dir: default_metrics_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub knowledge_base: KnowledgeBaseSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub metrics: MetricsSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load_and_validate()
    }

    /// The provider API key, falling back to `ANTHROPIC_API_KEY`
    pub fn provider_api_key(&self) -> Result<String, ConfigError> {
        self.provider
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar {
                env_var: to_env_var("provider.api_key"),
            })
    }

    fn load_and_validate() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("provider.host", default_anthropic_host())?
            .set_default("provider.model", default_model())?
            .set_default("provider.max_tokens", i64::from(default_max_tokens()))?
            .add_source(
                Environment::with_prefix("FIBREFLOW")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let result: Result<Self, config::ConfigError> = config.try_deserialize();

        let settings = match result {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!("Configuration error: {:?}", &err);

                let error_str = err.to_string();
                if error_str.starts_with("missing field") {
                    let field = error_str
                        .trim_start_matches("missing field `")
                        .trim_end_matches('`');
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                } else if let config::ConfigError::NotFound(field) = &err {
                    return Err(ConfigError::MissingEnvVar {
                        env_var: to_env_var(field),
                    });
                }
                return Err(ConfigError::Other(err));
            }
        };

        settings.provider_api_key()?;
        Ok(settings)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_anthropic_host() -> String {
    ANTHROPIC_HOST.to_string()
}

fn default_model() -> String {
    ANTHROPIC_MODEL.to_string()
}

fn default_max_tokens() -> i32 {
    ANTHROPIC_MAX_TOKENS
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("orchestrator/registry.json")
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_max_turns() -> usize {
    fibreflow::agent::DEFAULT_MAX_TURNS
}

fn default_session_ttl_secs() -> u64 {
    1800
}

fn default_documents_dir() -> String {
    "~/velocity-fibre-knowledge/documents".to_string()
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from("metrics")
}
