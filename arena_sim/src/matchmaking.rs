//! Matchmaking listener lifecycle.
//!
//! Only the lifecycle surface lives here: bind, report readiness, accept and
//! hold connections until shutdown. Acceptance and session routing stay with
//! the production matchmaking service; the harness only needs a listener
//! that clients can reach.

use arena_env::{HarnessError, Matchmaker, ServerManager};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Construction parameters for the matchmaking server.
pub struct MatchmakingParams<M> {
    /// Port to listen on
    pub port: u16,

    /// The backing-server manager this listener routes into
    pub manager: Arc<M>,
}

/// In-process matchmaking listener.
pub struct MatchmakingServer<M> {
    port: u16,
    manager: Arc<M>,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl<M: ServerManager> MatchmakingServer<M> {
    /// Pure construction; nothing is bound until [`run`](Matchmaker::run).
    pub fn new(params: MatchmakingParams<M>) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            port: params.port,
            manager: params.manager,
            ready_tx,
            ready_rx,
            cancel: CancellationToken::new(),
        }
    }

    /// The configured listening port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The backing-server manager this listener routes into.
    pub fn manager(&self) -> &Arc<M> {
        &self.manager
    }
}

#[async_trait]
impl<M: ServerManager> Matchmaker for MatchmakingServer<M> {
    async fn run(&self, cancel: CancellationToken) -> Result<(), HarnessError> {
        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| HarnessError::matchmaking(format!("bind {addr}: {e}")))?;

        let _ = self.ready_tx.send(true);
        info!("Matchmaking listening on {}", addr);

        let mut held = Vec::new();
        loop {
            tokio::select! {
                res = listener.accept() => match res {
                    Ok((stream, peer)) => {
                        debug!("Matchmaking accepted connection from {}", peer);
                        held.push(stream);
                    }
                    Err(e) => debug!("Matchmaking accept failed: {}", e),
                },
                _ = cancel.cancelled() => break,
                _ = self.cancel.cancelled() => break,
            }
        }

        info!("Matchmaking stopped");
        Ok(())
    }

    async fn wait_for_ready(&self, cancel: &CancellationToken) -> Result<(), HarnessError> {
        let mut ready = self.ready_rx.clone();
        tokio::select! {
            res = ready.wait_for(|accepting| *accepting) => match res {
                Ok(_) => Ok(()),
                Err(_) => Err(HarnessError::matchmaking("serve loop went away before ready")),
            },
            _ = cancel.cancelled() => Err(HarnessError::Cancelled),
        }
    }

    async fn close(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::LocalServers;
    use crate::net::free_port;
    use crate::store::JsonStore;
    use arena_env::ServerParams;
    use tokio::net::TcpStream;

    fn server(port: u16) -> Arc<MatchmakingServer<LocalServers>> {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(&dir.path().join("fleet.json")).unwrap());
        let manager = Arc::new(LocalServers::new(store, ServerParams::default()));
        Arc::new(MatchmakingServer::new(MatchmakingParams { port, manager }))
    }

    #[tokio::test]
    async fn test_run_reports_ready_and_accepts() {
        let port = free_port().unwrap();
        let mm = server(port);
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let mm = Arc::clone(&mm);
            let cancel = cancel.child_token();
            async move { mm.run(cancel).await }
        });

        mm.wait_for_ready(&cancel).await.unwrap();

        let stream = TcpStream::connect(("127.0.0.1", port)).await;
        assert!(stream.is_ok());

        mm.close().await;
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_fatal() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();
        let mm = server(port);

        let result = mm.run(CancellationToken::new()).await;
        assert!(matches!(result, Err(HarnessError::Matchmaking(_))));
    }

    #[tokio::test]
    async fn test_wait_for_ready_observes_cancellation() {
        let mm = server(free_port().unwrap());
        let cancel = CancellationToken::new();
        cancel.cancel();

        // run() was never started, so only cancellation can end the wait
        let result = mm.wait_for_ready(&cancel).await;
        assert!(matches!(result, Err(HarnessError::Cancelled)));
    }
}
