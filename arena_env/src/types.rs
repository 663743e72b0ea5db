//! Common types shared by the harness and its collaborators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a backing game server, unique within one environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerId(pub String);

impl ServerId {
    /// Creates a ServerId from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ServerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a simulated client connection.
///
/// Uses UUID v4 for uniqueness without coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnId(pub Uuid);

impl ConnId {
    /// Creates a new random ConnId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// One persisted server configuration: declared client demand plus the
/// network port assigned to the backing server.
///
/// A port of 0 means "not yet resolved"; the server manager assigns an
/// ephemeral port at create time and writes it back to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameServerConfig {
    /// Backing-server identifier
    pub id: ServerId,

    /// Declared number of client connections for this server
    pub connections: u32,

    /// Assigned network port (0 until resolved)
    pub port: u16,
}

impl std::fmt::Display for GameServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server {} port={} connections={}",
            self.id, self.port, self.connections
        )
    }
}

/// Renderable connection summary returned by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTotals {
    /// Number of persisted server configurations
    pub servers: usize,

    /// Sum of declared connection counts across all configurations
    pub connections: u64,
}

impl std::fmt::Display for ConnectionTotals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} connections across {} servers",
            self.connections, self.servers
        )
    }
}

/// Construction parameters for the backing-server manager.
#[derive(Debug, Clone, Copy)]
pub struct ServerParams {
    /// Hard cap on concurrently live backing servers
    pub max_servers: usize,
}

impl Default for ServerParams {
    fn default() -> Self {
        Self { max_servers: 16 }
    }
}
