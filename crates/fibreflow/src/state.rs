use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Domain memory that survives across sessions.
///
/// A flat JSON object persisted to a file. Loading and saving never fail: problems
/// with the file are logged and the agent carries on with what it has in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainState {
    path: Option<PathBuf>,
    initial: Map<String, Value>,
    values: Map<String, Value>,
}

impl DomainState {
    /// State that lives only in memory
    pub fn in_memory(initial: Map<String, Value>) -> Self {
        Self {
            path: None,
            values: initial.clone(),
            initial,
        }
    }

    /// Read state from `path`, or initialise it there when the file does not exist yet
    pub fn load(path: impl Into<PathBuf>, initial: Map<String, Value>) -> Self {
        let path = path.into();
        let mut state = Self {
            path: Some(path.clone()),
            values: initial.clone(),
            initial,
        };

        if !path.exists() {
            info!(path = %path.display(), "initialising domain state");
            state.save();
            return state;
        }

        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<Map<String, Value>>(&raw).map_err(|e| e.to_string()))
        {
            Ok(values) => state.values = values,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "could not load domain state");
                state.values = Map::new();
            }
        }
        state
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the state to disk, creating parent directories as needed
    pub fn save(&self) {
        let Some(path) = &self.path else {
            return;
        };

        let result = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .map_err(|e| e.to_string())
            .and_then(|_| serde_json::to_string_pretty(&self.values).map_err(|e| e.to_string()))
            .and_then(|raw| fs::write(path, raw).map_err(|e| e.to_string()));

        if let Err(err) = result {
            warn!(path = %path.display(), error = %err, "could not save domain state");
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set a value in memory. Call [`DomainState::save`] to persist.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Merge several values in memory. Call [`DomainState::save`] to persist.
    pub fn update(&mut self, updates: Map<String, Value>) {
        self.values.extend(updates);
    }

    /// Reset to the initial structure and persist it
    pub fn clear(&mut self) {
        self.values = self.initial.clone();
        self.save();
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }
}
