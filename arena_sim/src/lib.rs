//! Arena Test-Environment Harness
//!
//! This crate builds an isolated, disposable instance of a matchmaking +
//! backing-game-server stack for integration tests, then populates it with a
//! controlled number of concurrently-connecting simulated clients.
//!
//! Each bootstrap gets:
//! - a private copy-on-write snapshot of the persisted fleet dataset,
//! - its own matchmaking listener on a fresh ephemeral port,
//! - one backing server per persisted configuration, and
//! - exactly the declared number of client connections per server.
//!
//! # Data Flow
//!
//! ```text
//! isolate dataset ──► open store ──► server manager ──► matchmaking
//!                                                          │ (ready)
//!        ┌─────────────────────────────────────────────────┘
//!        ▼
//! for each persisted config:
//!     create server ──► wait ready ──► fetch resolved config
//!                                          │
//!                                          ▼
//!                          connect batch of N clients (concurrent)
//! ```
//!
//! # Failure Policy
//!
//! Fail-fast: the first failure at any stage aborts the whole bootstrap or
//! batch with a [`HarnessError`](arena_env::HarnessError). Only
//! [`Environment::describe`] tolerates failure, embedding the error text in
//! its output.
//!
//! # Usage
//!
//! ```ignore
//! use arena_env::ServerParams;
//! use arena_sim::create_environment;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let mut env = create_environment(&cancel, dataset.as_ref(), ServerParams::default()).await?;
//! assert_eq!(env.clients(&"a".into()).unwrap().len(), 2);
//! env.close().await?;
//! ```

mod client;
mod env;
mod manager;
mod matchmaking;
mod net;
mod snapshot;
mod store;

pub use client::{ClientFactory, SimClient};
pub use env::{create_environment, ConnMap, Environment, SimEnvironment};
pub use manager::LocalServers;
pub use matchmaking::{MatchmakingParams, MatchmakingServer};
pub use net::free_port;
pub use snapshot::{DatasetSnapshot, SHM_SUFFIX, WAL_SUFFIX};
pub use store::JsonStore;
