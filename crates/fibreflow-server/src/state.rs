use fibreflow::agent::Agent;
use fibreflow::errors::AgentError;
use fibreflow::knowledge_base::{expand_path, KnowledgeBaseBehavior, KNOWLEDGE_BASE_AGENT_ID};
use fibreflow::metrics::MetricsCollector;
use fibreflow::providers::anthropic::AnthropicProvider;
use fibreflow::providers::base::Provider;
use fibreflow::router::TaskRouter;
use fibreflow::state::DomainState;
use serde_json::Map;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::configuration::Settings;
use crate::error::ApiError;

/// Builds a fresh provider for every new agent
pub type ProviderFactory = Arc<dyn Fn() -> anyhow::Result<Box<dyn Provider>> + Send + Sync>;

struct CachedRegistry {
    loaded_at: Instant,
    router: Arc<TaskRouter>,
}

/// The agent registry file, re-read once the cached copy is older than `ttl`.
///
/// A failed reload keeps serving the previous copy.
pub struct RegistryCache {
    path: PathBuf,
    ttl: Duration,
    cached: RwLock<Option<CachedRegistry>>,
}

impl RegistryCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
            cached: RwLock::new(None),
        }
    }

    pub async fn router(&self) -> Result<Arc<TaskRouter>, ApiError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.router.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have reloaded while we waited for the lock
        if let Some(fresh) = cached.as_ref().filter(|c| c.loaded_at.elapsed() < self.ttl) {
            return Ok(fresh.router.clone());
        }

        match TaskRouter::from_path(&self.path) {
            Ok(router) => {
                info!(path = %self.path.display(), agents = router.list_agents().len(), "registry loaded");
                let router = Arc::new(router);
                *cached = Some(CachedRegistry {
                    loaded_at: Instant::now(),
                    router: router.clone(),
                });
                Ok(router)
            }
            Err(err) => match cached.as_ref() {
                Some(stale) => {
                    warn!(error = %err, "failed to reload registry, using stale copy");
                    Ok(stale.router.clone())
                }
                None => Err(ApiError::Registry(err.to_string())),
            },
        }
    }
}

struct Session {
    agent_id: String,
    agent: Arc<Mutex<Agent>>,
    last_used: Instant,
}

/// Conversations keyed by session id. Each session owns its agent.
///
/// Sessions idle for longer than `idle_ttl` are dropped on the next lookup,
/// unless a request is still holding their agent.
pub struct SessionStore {
    idle_ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            idle_ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn evict_idle(&self, sessions: &mut HashMap<String, Session>) {
        let before = sessions.len();
        sessions.retain(|_, session| {
            session.last_used.elapsed() < self.idle_ttl || Arc::strong_count(&session.agent) > 1
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
    }

    fn checkout(
        session: &mut Session,
        agent_id: &str,
        session_id: &str,
    ) -> Result<Arc<Mutex<Agent>>, ApiError> {
        if session.agent_id != agent_id {
            return Err(ApiError::Validation(format!(
                "session '{}' belongs to agent '{}'",
                session_id, session.agent_id
            )));
        }
        session.last_used = Instant::now();
        Ok(session.agent.clone())
    }

    /// The agent for `session_id`, created with `create` on first use.
    ///
    /// `create` runs without holding the store lock.
    pub async fn get_or_create<F>(
        &self,
        session_id: &str,
        agent_id: &str,
        create: F,
    ) -> Result<Arc<Mutex<Agent>>, ApiError>
    where
        F: FnOnce() -> Result<Agent, ApiError>,
    {
        {
            let mut sessions = self.sessions.lock().await;
            self.evict_idle(&mut sessions);
            if let Some(session) = sessions.get_mut(session_id) {
                return Self::checkout(session, agent_id, session_id);
            }
        }

        let agent = create()?;

        let mut sessions = self.sessions.lock().await;
        // A concurrent request may have created the session in the meantime
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                agent_id: agent_id.to_string(),
                agent: Arc::new(Mutex::new(agent)),
                last_used: Instant::now(),
            });
        Self::checkout(session, agent_id, session_id)
    }

    pub async fn get(&self, session_id: &str) -> Option<Arc<Mutex<Agent>>> {
        let mut sessions = self.sessions.lock().await;
        self.evict_idle(&mut sessions);
        sessions.get_mut(session_id).map(|session| {
            session.last_used = Instant::now();
            session.agent.clone()
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RegistryCache>,
    pub sessions: Arc<SessionStore>,
    pub metrics: Arc<MetricsCollector>,
    pub providers: ProviderFactory,
    pub documents_dir: PathBuf,
    /// Domain memory file for knowledge base agents
    pub state_file: Option<PathBuf>,
    pub api_key: Option<String>,
    pub max_turns: usize,
}

impl AppState {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.provider_api_key()?;
        let provider_config = settings.provider.clone().into_config(api_key);

        let providers: ProviderFactory = Arc::new(move || {
            let provider = AnthropicProvider::new(provider_config.clone())?;
            Ok(Box::new(provider) as Box<dyn Provider>)
        });

        Ok(Self {
            registry: Arc::new(RegistryCache::new(
                settings.orchestrator.registry_path.clone(),
                Duration::from_secs(settings.orchestrator.cache_ttl_secs),
            )),
            sessions: Arc::new(SessionStore::new(Duration::from_secs(
                settings.orchestrator.session_ttl_secs,
            ))),
            metrics: Arc::new(MetricsCollector::new()),
            providers,
            documents_dir: expand_path(&settings.knowledge_base.documents_dir),
            state_file: settings
                .knowledge_base
                .state_file
                .as_deref()
                .filter(|path| !path.is_empty())
                .map(expand_path),
            api_key: settings.auth.api_key.clone().filter(|key| !key.is_empty()),
            max_turns: settings.orchestrator.max_turns,
        })
    }

    /// Whether a registry id has a behavior this server can run
    pub fn is_runnable(agent_id: &str) -> bool {
        agent_id == KNOWLEDGE_BASE_AGENT_ID
    }

    /// Build a new agent for a registry id
    pub fn build_agent(&self, agent_id: &str) -> Result<Agent, ApiError> {
        let behavior = match agent_id {
            KNOWLEDGE_BASE_AGENT_ID => KnowledgeBaseBehavior::new(&self.documents_dir)?,
            _ => {
                return Err(ApiError::NotFound(format!(
                    "agent '{}' is not runnable",
                    agent_id
                )))
            }
        };
        let provider =
            (self.providers)().map_err(|e| AgentError::Provider(e.to_string()))?;
        let agent = Agent::new(Box::new(behavior), provider);
        Ok(match &self.state_file {
            Some(path) => agent.with_state(DomainState::load(path, Map::new())),
            None => agent,
        })
    }
}
