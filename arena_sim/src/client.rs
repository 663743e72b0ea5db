//! Simulated clients and the concurrent client factory.

use arena_env::{ConnId, HarnessError};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A simulated matchmaking client.
///
/// Owns a connection identifier from construction and a live transport
/// connection once [`connect`](SimClient::connect) succeeds. The wire-level
/// handshake beyond connection establishment stays with the production
/// client.
pub struct SimClient {
    conn_id: ConnId,
    host: String,
    port: u16,
    stream: Option<TcpStream>,
}

impl SimClient {
    /// Constructs an unconnected client bound to a host/port.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            conn_id: ConnId::new(),
            host: host.to_string(),
            port,
            stream: None,
        }
    }

    /// This client's connection identifier.
    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    /// Whether the transport connection is established.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Establishes the transport connection.
    ///
    /// Blocks until connected, fails fatally on refusal, and returns
    /// [`HarnessError::Cancelled`] if the context ends first.
    pub async fn connect(&mut self, cancel: &CancellationToken) -> Result<(), HarnessError> {
        if cancel.is_cancelled() {
            return Err(HarnessError::Cancelled);
        }

        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::select! {
            res = TcpStream::connect(&addr) => {
                res.map_err(|e| HarnessError::connect(format!("{addr}: {e}")))?
            }
            _ = cancel.cancelled() => return Err(HarnessError::Cancelled),
        };

        self.stream = Some(stream);
        Ok(())
    }
}

/// Builds simulated clients bound to one host/port.
///
/// An immutable-update value: [`with_port`](ClientFactory::with_port)
/// returns a rebound copy and never mutates the original, so one factory can
/// serve the matchmaking port while rebound copies target individual backing
/// servers.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    host: String,
    port: u16,
}

impl ClientFactory {
    /// Creates a factory bound to a host/port.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    /// The port this factory dials.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns a copy of this factory bound to a different port.
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            host: self.host.clone(),
            port,
        }
    }

    /// Constructs a client and connects it synchronously.
    pub async fn new_client(&self, cancel: &CancellationToken) -> Result<SimClient, HarnessError> {
        let mut client = SimClient::new(&self.host, self.port);
        debug!("Connecting client {}", client.conn_id());
        client.connect(cancel).await?;
        debug!("Client {} connected", client.conn_id());
        Ok(client)
    }

    /// Constructs a client and dispatches its connect on an independent task.
    ///
    /// The returned handle resolves to the connected client, or to the
    /// connect failure; no error is swallowed.
    pub fn spawn_client(
        &self,
        cancel: &CancellationToken,
    ) -> (ConnId, JoinHandle<Result<SimClient, HarnessError>>) {
        let mut client = SimClient::new(&self.host, self.port);
        let conn_id = client.conn_id();
        let cancel = cancel.clone();

        debug!("Dispatching connect for client {}", conn_id);
        let handle = tokio::spawn(async move {
            client.connect(&cancel).await?;
            debug!("Client {} connected", client.conn_id());
            Ok(client)
        });

        (conn_id, handle)
    }

    /// Connects `count` clients concurrently and returns them in dispatch
    /// order.
    ///
    /// Dispatches one connect task per client, then joins every task; the
    /// call does not return until all `count` connects completed. Any single
    /// failure fails the whole batch (remaining in-flight connects are
    /// aborted); there is no partial success. `count == 0` returns an empty
    /// vec immediately.
    pub async fn connect_batch(
        &self,
        cancel: &CancellationToken,
        count: u32,
    ) -> Result<Vec<SimClient>, HarnessError> {
        info!("Connecting batch of {} clients to port {}", count, self.port);

        let mut pending = Vec::with_capacity(count as usize);
        for _ in 0..count {
            pending.push(self.spawn_client(cancel));
        }

        let mut clients = Vec::with_capacity(pending.len());
        let mut pending = pending.into_iter();
        while let Some((conn_id, handle)) = pending.next() {
            let joined = handle.await.map_err(|e| {
                HarnessError::connect(format!("connect task for client {conn_id} failed: {e}"))
            });
            match joined.and_then(|res| res) {
                Ok(client) => clients.push(client),
                Err(e) => {
                    for (_, rest) in pending {
                        rest.abort();
                    }
                    return Err(e);
                }
            }
        }

        info!("Batch of {} clients connected", clients.len());
        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::free_port;
    use tokio::net::TcpListener;

    /// Accepts connections forever, holding the sockets open.
    async fn spawn_listener() -> (u16, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        (port, task)
    }

    #[test]
    fn test_with_port_leaves_original_unchanged() {
        let factory = ClientFactory::new("127.0.0.1", 6000);
        let rebound = factory.with_port(7000);

        assert_eq!(factory.port(), 6000);
        assert_eq!(rebound.port(), 7000);
    }

    #[tokio::test]
    async fn test_new_client_connects() {
        let (port, task) = spawn_listener().await;
        let factory = ClientFactory::new("127.0.0.1", port);
        let cancel = CancellationToken::new();

        let client = factory.new_client(&cancel).await.unwrap();
        assert!(client.is_connected());

        task.abort();
    }

    #[tokio::test]
    async fn test_spawn_client_reports_through_handle() {
        let (port, task) = spawn_listener().await;
        let factory = ClientFactory::new("127.0.0.1", port);
        let cancel = CancellationToken::new();

        let (conn_id, handle) = factory.spawn_client(&cancel);
        let client = handle.await.unwrap().unwrap();

        assert_eq!(client.conn_id(), conn_id);
        assert!(client.is_connected());

        task.abort();
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        // Port doesn't matter: no connect is dispatched
        let factory = ClientFactory::new("127.0.0.1", 1);
        let cancel = CancellationToken::new();

        let clients = factory.connect_batch(&cancel, 0).await.unwrap();
        assert!(clients.is_empty());
    }

    #[tokio::test]
    async fn test_batch_returns_all_clients_connected() {
        let (port, task) = spawn_listener().await;
        let factory = ClientFactory::new("127.0.0.1", port);
        let cancel = CancellationToken::new();

        let clients = factory.connect_batch(&cancel, 5).await.unwrap();

        assert_eq!(clients.len(), 5);
        assert!(clients.iter().all(|c| c.is_connected()));

        task.abort();
    }

    #[tokio::test]
    async fn test_batch_fails_fast_on_any_connect_failure() {
        // Nothing listens on this port, so every connect is refused and the
        // batch must fail as a whole rather than return partial successes.
        let port = free_port().unwrap();
        let factory = ClientFactory::new("127.0.0.1", port);
        let cancel = CancellationToken::new();

        let result = factory.connect_batch(&cancel, 5).await;
        assert!(matches!(result, Err(HarnessError::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_observes_prior_cancellation() {
        let (port, task) = spawn_listener().await;
        let factory = ClientFactory::new("127.0.0.1", port);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = factory.new_client(&cancel).await;
        assert!(matches!(result, Err(HarnessError::Cancelled)));

        task.abort();
    }

    mod batch_properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(8))]

            /// A batch of size n yields exactly n connected handles.
            #[test]
            fn batch_size_is_echoed(n in 0u32..6) {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let (port, task) = spawn_listener().await;
                    let factory = ClientFactory::new("127.0.0.1", port);
                    let cancel = CancellationToken::new();

                    let clients = factory.connect_batch(&cancel, n).await.unwrap();
                    prop_assert_eq!(clients.len(), n as usize);
                    prop_assert!(clients.iter().all(|c| c.is_connected()));

                    task.abort();
                    Ok(())
                })?;
            }
        }
    }
}
