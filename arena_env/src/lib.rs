//! Arena Environment Contracts
//!
//! This crate defines the collaborator interfaces consumed by the arena
//! test-environment harness: the persisted configuration store, the backing
//! server manager, and the matchmaking listener. The harness in `arena_sim`
//! drives these contracts; production services and in-process test doubles
//! both implement them.
//!
//! # Core Concept: Explicit Collaborators
//!
//! Every bootstrap stage talks to a collaborator through one of these traits
//! and a [`CancellationToken`](tokio_util::sync::CancellationToken), so a
//! test can substitute any collaborator and every blocking wait can be
//! interrupted.
//!
//! # Example
//!
//! ```ignore
//! use arena_env::{ConfigStore, ServerManager};
//! use tokio_util::sync::CancellationToken;
//!
//! async fn provision<S: ConfigStore, M: ServerManager>(
//!     store: &S,
//!     manager: &M,
//!     cancel: &CancellationToken,
//! ) -> Result<(), arena_env::HarnessError> {
//!     let id = manager.create_server(cancel).await?;
//!     manager.wait_for_ready(cancel, &id).await?;
//!     let _config = store.config_by_id(&id).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod server;
mod store;
mod types;

pub use error::HarnessError;
pub use server::{Matchmaker, ServerManager};
pub use store::ConfigStore;
pub use types::{ConnId, ConnectionTotals, GameServerConfig, ServerId, ServerParams};
