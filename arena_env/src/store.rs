//! Persisted configuration store contract.

use crate::error::HarnessError;
use crate::types::{ConnectionTotals, GameServerConfig, ServerId};
use async_trait::async_trait;

/// Read surface of the persisted configuration store.
///
/// The harness consumes the store strictly through this contract; the
/// schema and query engine behind it stay with the implementation.
///
/// # Ordering
///
/// [`all_configs`](ConfigStore::all_configs) returns configurations in a
/// stable store order. Hydration walks that order, so it is the order in
/// which backing servers come up.
#[async_trait]
pub trait ConfigStore: Send + Sync + 'static {
    /// Returns every persisted server configuration, in store order.
    async fn all_configs(&self) -> Result<Vec<GameServerConfig>, HarnessError>;

    /// Looks up one configuration by server identifier.
    ///
    /// `Ok(None)` means the identifier is unknown; during hydration the
    /// harness treats that as fatal, since every created server must be
    /// immediately queryable.
    async fn config_by_id(
        &self,
        id: &ServerId,
    ) -> Result<Option<GameServerConfig>, HarnessError>;

    /// Returns a renderable summary of the declared connection demand.
    async fn total_connections(&self) -> ConnectionTotals;

    /// Releases the store handle.
    ///
    /// Closing twice is an error.
    async fn close(&self) -> Result<(), HarnessError>;
}
