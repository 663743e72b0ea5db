//! Error type shared by the harness and its collaborators.

use crate::types::ServerId;
use thiserror::Error;

/// A fatal harness error.
///
/// Fixture setup is fail-fast: the first failure at any bootstrap stage
/// aborts the whole bootstrap or batch. Callers propagate these with `?`
/// and the top-level test or CLI decides how to abort.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// File copy, dataset read/write, or port probing failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration store operation failed
    #[error("Store error: {0}")]
    Store(String),

    /// Backing-server creation or readiness wait failed
    #[error("Provisioning error: {0}")]
    Provision(String),

    /// Matchmaking listener failed to bind or serve
    #[error("Matchmaking error: {0}")]
    Matchmaking(String),

    /// A simulated client could not establish its connection
    #[error("Connect error: {0}")]
    Connect(String),

    /// A created server was not immediately queryable in the store
    #[error("No configuration for server {0}")]
    MissingConfig(ServerId),

    /// The cancellation context ended before the operation completed
    #[error("Operation cancelled")]
    Cancelled,
}

impl HarnessError {
    /// Creates a store error.
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Creates a provisioning error.
    pub fn provision(msg: impl Into<String>) -> Self {
        Self::Provision(msg.into())
    }

    /// Creates a matchmaking error.
    pub fn matchmaking(msg: impl Into<String>) -> Self {
        Self::Matchmaking(msg.into())
    }

    /// Creates a connect error.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }
}
