//! Local backing-server manager.
//!
//! Materializes the persisted fleet: each create call brings up the next
//! declared server as a loopback listener, resolves its port back into the
//! store, and keeps the accept loop running until teardown. Connected client
//! sockets are held open; everything past accepting (sessions, game state)
//! stays with the production server.

use crate::store::JsonStore;
use arena_env::{ConfigStore, HarnessError, ServerId, ServerManager, ServerParams};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct ServerHandle {
    ready: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

/// In-process manager of backing game servers.
pub struct LocalServers {
    store: Arc<JsonStore>,
    params: ServerParams,
    live: Mutex<HashMap<ServerId, ServerHandle>>,
    cancel: CancellationToken,
}

impl LocalServers {
    /// Creates a manager bound to a store and construction parameters.
    pub fn new(store: Arc<JsonStore>, params: ServerParams) -> Self {
        Self {
            store,
            params,
            live: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Number of currently live backing servers.
    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

#[async_trait]
impl ServerManager for LocalServers {
    async fn create_server(&self, cancel: &CancellationToken) -> Result<ServerId, HarnessError> {
        if cancel.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }

        let configs = self.store.all_configs().await?;
        let config = {
            let live = self.live.lock().unwrap();
            if live.len() >= self.params.max_servers {
                return Err(HarnessError::provision(format!(
                    "server cap reached ({})",
                    self.params.max_servers
                )));
            }
            configs.into_iter().find(|c| !live.contains_key(&c.id))
        };
        let config = config.ok_or_else(|| {
            HarnessError::provision("every persisted server configuration is already live")
        })?;

        let addr = format!("127.0.0.1:{}", config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| HarnessError::provision(format!("bind {addr}: {e}")))?;
        let port = listener.local_addr()?.port();
        if port != config.port {
            self.store.resolve_port(&config.id, port)?;
        }

        let (ready_tx, ready_rx) = watch::channel(false);
        let id = config.id.clone();
        let task = tokio::spawn(accept_loop(
            listener,
            ready_tx,
            self.cancel.child_token(),
            id.clone(),
        ));

        self.live.lock().unwrap().insert(
            id.clone(),
            ServerHandle {
                ready: ready_rx,
                task,
            },
        );

        info!("Created backing server {} on port {}", id, port);
        Ok(id)
    }

    async fn wait_for_ready(
        &self,
        cancel: &CancellationToken,
        id: &ServerId,
    ) -> Result<(), HarnessError> {
        let mut ready = {
            let live = self.live.lock().unwrap();
            let handle = live
                .get(id)
                .ok_or_else(|| HarnessError::provision(format!("unknown server {id}")))?;
            handle.ready.clone()
        };

        tokio::select! {
            res = ready.wait_for(|accepting| *accepting) => match res {
                Ok(_) => Ok(()),
                Err(_) => Err(HarnessError::provision(format!(
                    "server {id} went away before becoming ready"
                ))),
            },
            _ = cancel.cancelled() => Err(HarnessError::Cancelled),
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
        let drained: Vec<(ServerId, ServerHandle)> = {
            let mut live = self.live.lock().unwrap();
            live.drain().collect()
        };
        for (id, handle) in drained {
            let _ = handle.task.await;
            debug!("Backing server {} stopped", id);
        }
    }
}

/// Accepts and holds connections until the token is cancelled.
async fn accept_loop(
    listener: TcpListener,
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
    id: ServerId,
) {
    let _ = ready.send(true);
    let mut held = Vec::new();
    loop {
        tokio::select! {
            res = listener.accept() => match res {
                Ok((stream, peer)) => {
                    debug!("Server {} accepted connection from {}", id, peer);
                    held.push(stream);
                }
                Err(e) => debug!("Server {} accept failed: {}", id, e),
            },
            _ = cancel.cancelled() => break,
        }
    }
}
