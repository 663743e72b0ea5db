//! File-backed configuration store over an isolated dataset copy.

use arena_env::{
    ConfigStore, ConnectionTotals, GameServerConfig, HarnessError, ServerId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// On-disk shape of the fleet dataset.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Dataset {
    servers: Vec<GameServerConfig>,
}

struct StoreState {
    dataset: Dataset,
    closed: bool,
}

/// Configuration store persisted as a JSON document.
///
/// Opened on the isolated snapshot path, passed in explicitly. There is no
/// process-wide channel for the path, so concurrent environments in one
/// process never interfere. Rows keep their file order, which is the
/// hydration order. Mutations write through to the same path.
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonStore {
    /// Opens the store on a dataset file.
    ///
    /// A missing or empty file is an empty fleet; malformed JSON is fatal.
    pub fn open(path: &Path) -> Result<Self, HarnessError> {
        let dataset = match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Dataset::default(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                HarnessError::store(format!("malformed dataset {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Dataset::default(),
            Err(e) => return Err(e.into()),
        };

        debug!(
            "Opened store on {} with {} configs",
            path.display(),
            dataset.servers.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(StoreState {
                dataset,
                closed: false,
            }),
        })
    }

    /// Inserts a configuration, or replaces the row with the same id.
    pub fn upsert_config(&self, config: GameServerConfig) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_open(&state)?;

        match state.dataset.servers.iter_mut().find(|c| c.id == config.id) {
            Some(row) => *row = config,
            None => state.dataset.servers.push(config),
        }
        self.persist(&state.dataset)
    }

    /// Writes the resolved port back onto an existing row.
    pub fn resolve_port(&self, id: &ServerId, port: u16) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_open(&state)?;

        let row = state
            .dataset
            .servers
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| HarnessError::store(format!("no row for server {id}")))?;
        row.port = port;
        self.persist(&state.dataset)
    }

    fn ensure_open(state: &StoreState) -> Result<(), HarnessError> {
        if state.closed {
            return Err(HarnessError::store("store is closed"));
        }
        Ok(())
    }

    fn persist(&self, dataset: &Dataset) -> Result<(), HarnessError> {
        let json = serde_json::to_string_pretty(dataset)
            .map_err(|e| HarnessError::store(format!("serialize dataset: {e}")))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for JsonStore {
    async fn all_configs(&self) -> Result<Vec<GameServerConfig>, HarnessError> {
        let state = self.state.lock().unwrap();
        Self::ensure_open(&state)?;
        Ok(state.dataset.servers.clone())
    }

    async fn config_by_id(
        &self,
        id: &ServerId,
    ) -> Result<Option<GameServerConfig>, HarnessError> {
        let state = self.state.lock().unwrap();
        Self::ensure_open(&state)?;
        Ok(state.dataset.servers.iter().find(|c| &c.id == id).cloned())
    }

    async fn total_connections(&self) -> ConnectionTotals {
        let state = self.state.lock().unwrap();
        ConnectionTotals {
            servers: state.dataset.servers.len(),
            connections: state
                .dataset
                .servers
                .iter()
                .map(|c| u64::from(c.connections))
                .sum(),
        }
    }

    async fn close(&self) -> Result<(), HarnessError> {
        let mut state = self.state.lock().unwrap();
        Self::ensure_open(&state)?;
        self.persist(&state.dataset)?;
        state.closed = true;
        debug!("Closed store on {}", self.path.display());
        Ok(())
    }
}
