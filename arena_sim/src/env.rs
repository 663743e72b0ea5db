//! Environment bootstrap and client hydration.
//!
//! [`create_environment`] sequences dataset isolation, collaborator
//! construction, matchmaking startup, and per-server client hydration into
//! one call; [`Environment`] is the resulting aggregate handle.

use crate::client::{ClientFactory, SimClient};
use crate::manager::LocalServers;
use crate::matchmaking::{MatchmakingParams, MatchmakingServer};
use crate::net::free_port;
use crate::snapshot::DatasetSnapshot;
use crate::store::JsonStore;
use arena_env::{
    ConfigStore, GameServerConfig, HarnessError, Matchmaker, ServerId, ServerManager,
    ServerParams,
};
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Clients attached to each backing server, in hydration order.
pub type ConnMap = Vec<(ServerId, Vec<SimClient>)>;

/// The environment built by [`create_environment`] against the in-process
/// collaborator stack.
pub type SimEnvironment = Environment<JsonStore, LocalServers, MatchmakingServer<LocalServers>>;

/// A fully bootstrapped, disposable environment.
///
/// Bundles the live collaborator handles, the matchmaking port, the client
/// factory, and the server→clients mapping. The mapping is populated once
/// during hydration and read-only afterwards.
pub struct Environment<S, M, K> {
    store: Arc<S>,
    manager: Arc<M>,
    matchmaking: Arc<K>,

    /// Matchmaking listening port
    pub port: u16,

    /// Client factory bound to the matchmaking listener
    pub factory: ClientFactory,

    conns: ConnMap,
    serve_task: Option<JoinHandle<Result<(), HarnessError>>>,
    serve_cancel: CancellationToken,
    _snapshot: Option<DatasetSnapshot>,
}

impl<S, M, K> Environment<S, M, K>
where
    S: ConfigStore,
    M: ServerManager,
    K: Matchmaker,
{
    /// Assembles an aggregate from already-constructed collaborators.
    ///
    /// [`create_environment`] is the usual entry point; this exists so tests
    /// can drive the aggregate against substitute collaborators.
    pub fn new(
        store: Arc<S>,
        manager: Arc<M>,
        matchmaking: Arc<K>,
        port: u16,
        factory: ClientFactory,
    ) -> Self {
        Self {
            store,
            manager,
            matchmaking,
            port,
            factory,
            conns: ConnMap::new(),
            serve_task: None,
            serve_cancel: CancellationToken::new(),
            _snapshot: None,
        }
    }

    /// The clients attached to one backing server, in dispatch order.
    pub fn clients(&self, id: &ServerId) -> Option<&[SimClient]> {
        self.conns
            .iter()
            .find(|(server, _)| server == id)
            .map(|(_, clients)| clients.as_slice())
    }

    /// The full server→clients mapping, in hydration order.
    pub fn conns(&self) -> &ConnMap {
        &self.conns
    }

    /// Releases all resources, in strict order: matchmaking, then the server
    /// manager and its backing servers, then the store.
    ///
    /// A store-close failure propagates; everything earlier is torn down
    /// regardless.
    pub async fn close(&mut self) -> Result<(), HarnessError> {
        self.matchmaking.close().await;
        self.serve_cancel.cancel();
        if let Some(task) = self.serve_task.take() {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Matchmaking serve loop exited with error: {}", e),
                Err(e) => warn!("Matchmaking serve task failed: {}", e),
            }
        }

        self.manager.close().await;
        self.store.close().await
    }

    /// Renders a diagnostic summary of the environment.
    ///
    /// The one place failures are tolerated: if configurations cannot be
    /// enumerated, the error text is embedded in the output instead of
    /// propagating.
    pub async fn describe(&self) -> String {
        let totals = self.store.total_connections().await;

        let mut out = String::new();
        let _ = writeln!(out, "Environment on port {}:", self.port);
        let _ = writeln!(out, "Connections: {}", totals);
        let _ = writeln!(out, "Servers:");
        match self.store.all_configs().await {
            Ok(configs) => {
                for config in &configs {
                    let _ = writeln!(out, "  {}", config);
                }
            }
            Err(e) => {
                let _ = writeln!(out, "  unable to enumerate server configs: {}", e);
            }
        }
        out
    }
}

/// Bootstraps a complete disposable environment from a dataset file.
///
/// Strictly ordered, each step gating the next: isolate the dataset, allocate
/// a matchmaking port, open the store on the isolated copy, construct the
/// server manager and matchmaking listener, start the serve loop and await
/// readiness, then hydrate every persisted configuration. The first failure
/// anywhere aborts the whole bootstrap.
pub async fn create_environment(
    cancel: &CancellationToken,
    dataset: &Path,
    params: ServerParams,
) -> Result<SimEnvironment, HarnessError> {
    info!("Isolating dataset {}", dataset.display());
    let snapshot = DatasetSnapshot::isolate(dataset).await?;

    let port = free_port()?;

    info!("Opening store on {}", snapshot.path().display());
    let store = Arc::new(JsonStore::open(snapshot.path())?);

    debug!("Creating server manager with {:?}", params);
    let manager = Arc::new(LocalServers::new(Arc::clone(&store), params));

    info!("Starting matchmaking on port {}", port);
    let matchmaking = Arc::new(MatchmakingServer::new(MatchmakingParams {
        port,
        manager: Arc::clone(&manager),
    }));
    let serve_cancel = cancel.child_token();
    let mut serve_task = tokio::spawn({
        let matchmaking = Arc::clone(&matchmaking);
        let serve_cancel = serve_cancel.clone();
        async move { matchmaking.run(serve_cancel).await }
    });

    // Readiness raced against the serve loop so a failed bind aborts the
    // bootstrap instead of stalling it.
    tokio::select! {
        res = matchmaking.wait_for_ready(cancel) => res?,
        join = &mut serve_task => {
            return Err(match join {
                Ok(Err(e)) => e,
                Ok(Ok(())) => HarnessError::matchmaking("serve loop exited before ready"),
                Err(e) => HarnessError::matchmaking(format!("serve task failed: {e}")),
            });
        }
    }

    let factory = ClientFactory::new("127.0.0.1", port);

    let mut env = Environment {
        store,
        manager,
        matchmaking,
        port,
        factory,
        conns: ConnMap::new(),
        serve_task: Some(serve_task),
        serve_cancel,
        _snapshot: Some(snapshot),
    };

    env.conns = hydrate_servers(cancel, &env).await?;

    info!("Environment fully created on port {}", env.port);
    Ok(env)
}

/// Brings up one backing server per persisted configuration, sequentially in
/// store order, attaching the declared number of clients to each.
async fn hydrate_servers<S, M, K>(
    cancel: &CancellationToken,
    env: &Environment<S, M, K>,
) -> Result<ConnMap, HarnessError>
where
    S: ConfigStore,
    M: ServerManager,
    K: Matchmaker,
{
    let configs = env.store.all_configs().await?;
    info!("Hydrating {} servers", configs.len());

    let mut conns = ConnMap::new();
    for config in configs {
        debug!("Hydrating from persisted config: {}", config);

        let (id, resolved) = create_server(cancel, env).await?;
        let factory = env.factory.with_port(resolved.port);
        let clients = factory.connect_batch(cancel, config.connections).await?;

        conns.push((id, clients));
    }

    Ok(conns)
}

/// Drives one backing server through create → ready → configured.
async fn create_server<S, M, K>(
    cancel: &CancellationToken,
    env: &Environment<S, M, K>,
) -> Result<(ServerId, GameServerConfig), HarnessError>
where
    S: ConfigStore,
    M: ServerManager,
    K: Matchmaker,
{
    let id = env.manager.create_server(cancel).await?;
    debug!("Created server {}, waiting for readiness", id);

    env.manager.wait_for_ready(cancel, &id).await?;

    let config = env
        .store
        .config_by_id(&id)
        .await?
        .ok_or_else(|| HarnessError::MissingConfig(id.clone()))?;
    debug!("Server {} ready on port {}", id, config.port);

    Ok((id, config))
}
