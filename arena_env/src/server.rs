//! Backing-server manager and matchmaking listener contracts.

use crate::error::HarnessError;
use crate::types::ServerId;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Lifecycle contract of the backing-server manager.
///
/// The manager owns the backing game servers for one environment. Internal
/// scheduling is the implementation's business; the harness only drives
/// create → ready and final teardown.
#[async_trait]
pub trait ServerManager: Send + Sync + 'static {
    /// Requests a new backing server and returns its identifier.
    async fn create_server(&self, cancel: &CancellationToken) -> Result<ServerId, HarnessError>;

    /// Blocks until the given server is accepting work.
    ///
    /// Returns [`HarnessError::Cancelled`] if the context ends first.
    async fn wait_for_ready(
        &self,
        cancel: &CancellationToken,
        id: &ServerId,
    ) -> Result<(), HarnessError>;

    /// Releases every backing server owned by this manager.
    async fn close(&self);
}

/// Lifecycle contract of the matchmaking listener.
#[async_trait]
pub trait Matchmaker: Send + Sync + 'static {
    /// Serves until the token is cancelled.
    ///
    /// Intended to run as a long-lived background task; the serve loop is
    /// the only place the listener socket lives.
    async fn run(&self, cancel: CancellationToken) -> Result<(), HarnessError>;

    /// Blocks until the listener is accepting connections.
    ///
    /// Returns [`HarnessError::Cancelled`] if the context ends first.
    async fn wait_for_ready(&self, cancel: &CancellationToken) -> Result<(), HarnessError>;

    /// Stops serving.
    async fn close(&self);
}
