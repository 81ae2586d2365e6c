//! In-process performance metrics for agent calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub timestamp: DateTime<Utc>,
    pub metric_type: String,
    pub name: String,
    pub operation: String,
    pub duration_ms: f64,
    pub success: bool,
    pub tokens_used: Option<u64>,
    pub error_type: Option<String>,
}

#[derive(Debug, Default)]
struct AgentStats {
    total_calls: u64,
    success_count: u64,
    total_duration_ms: f64,
    total_tokens: u64,
    errors: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentSummary {
    NoData {
        agent: String,
    },
    Active {
        agent: String,
        total_calls: u64,
        success_rate: f64,
        avg_duration_ms: f64,
        avg_tokens: f64,
        errors: BTreeMap<String, u64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub agents: Vec<AgentSummary>,
    pub events_last_hour: usize,
    pub events_last_day: usize,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<MetricEvent>,
    agents: BTreeMap<String, AgentStats>,
}

/// Thread-safe collector of agent call metrics.
///
/// Aggregates survive [`MetricsCollector::flush_to_disk`]; only the raw event buffer is
/// written out and cleared.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves the data consistent enough to keep counting
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_agent_call(
        &self,
        agent_name: &str,
        operation: &str,
        duration_ms: f64,
        success: bool,
        tokens_used: Option<u64>,
        error_type: Option<&str>,
    ) {
        let event = MetricEvent {
            timestamp: Utc::now(),
            metric_type: "agent".to_string(),
            name: agent_name.to_string(),
            operation: operation.to_string(),
            duration_ms,
            success,
            tokens_used,
            error_type: error_type.map(str::to_string),
        };

        let mut inner = self.lock();
        inner.events.push(event);

        let stats = inner.agents.entry(agent_name.to_string()).or_default();
        stats.total_calls += 1;
        if success {
            stats.success_count += 1;
        }
        stats.total_duration_ms += duration_ms;
        stats.total_tokens += tokens_used.unwrap_or(0);
        if let Some(error_type) = error_type {
            *stats.errors.entry(error_type.to_string()).or_default() += 1;
        }
    }

    pub fn agent_summary(&self, agent_name: &str) -> AgentSummary {
        summarize(agent_name, self.lock().agents.get(agent_name))
    }

    /// Summaries for every agent seen so far, ordered by name
    pub fn all_agents_summary(&self) -> Vec<AgentSummary> {
        self.lock()
            .agents
            .iter()
            .map(|(name, stats)| summarize(name, Some(stats)))
            .collect()
    }

    /// Buffered events newer than `minutes` ago
    pub fn recent_events(&self, minutes: i64) -> Vec<MetricEvent> {
        let cutoff = Utc::now() - Duration::minutes(minutes);
        self.lock()
            .events
            .iter()
            .filter(|event| event.timestamp > cutoff)
            .cloned()
            .collect()
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            generated_at: Utc::now(),
            agents: self.all_agents_summary(),
            events_last_hour: self.recent_events(60).len(),
            events_last_day: self.recent_events(24 * 60).len(),
        }
    }

    /// Append buffered events to `metrics_<YYYYMMDD>.jsonl` under `dir` and clear the buffer.
    ///
    /// Returns the file written to. On error the buffer is kept.
    pub fn flush_to_disk(&self, dir: impl AsRef<Path>) -> io::Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("metrics_{}.jsonl", Utc::now().format("%Y%m%d")));

        let mut inner = self.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        for event in &inner.events {
            let line = serde_json::to_string(event)?;
            writeln!(file, "{}", line)?;
        }
        debug!(events = inner.events.len(), path = %path.display(), "flushed metrics");
        inner.events.clear();
        Ok(path)
    }
}

fn summarize(agent_name: &str, stats: Option<&AgentStats>) -> AgentSummary {
    let Some(stats) = stats.filter(|s| s.total_calls > 0) else {
        return AgentSummary::NoData {
            agent: agent_name.to_string(),
        };
    };

    let calls = stats.total_calls as f64;
    AgentSummary::Active {
        agent: agent_name.to_string(),
        total_calls: stats.total_calls,
        success_rate: stats.success_count as f64 / calls,
        avg_duration_ms: stats.total_duration_ms / calls,
        avg_tokens: stats.total_tokens as f64 / calls,
        errors: stats.errors.clone(),
    }
}
