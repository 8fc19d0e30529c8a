//! TCP listener: one handler task per inbound connection.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use arbor_protocol::Address;

use crate::context::NodeContext;
use crate::handler::ConnectionHandler;

pub struct NodeServer {
    listener: TcpListener,
    ctx: NodeContext,
    /// Maximum concurrent connections.
    max_connections: usize,
}

impl NodeServer {
    pub async fn bind(
        addr: SocketAddr,
        ctx: NodeContext,
        max_connections: usize,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, ctx, max_connections })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve forever.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. In-flight handlers run to completion.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), anyhow::Error> {
        tracing::info!(addr = %self.local_addr()?, "Node listening");

        let semaphore = Arc::new(Semaphore::new(self.max_connections));
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        let delay = accept_retry_delay(&e);
                        tracing::warn!(error = %e, retry_ms = delay.as_millis() as u64, "Accept failed");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("Listener shutting down");
                    return Ok(());
                }
            };
            tracing::debug!(peer = %peer_addr, "Connection accepted");

            let permit = semaphore.clone().acquire_owned().await?;
            let handler = ConnectionHandler::new(self.ctx.clone(), stream, Address::from(peer_addr));

            tokio::spawn(async move {
                handler.run().await;
                drop(permit);
            });
        }
    }
}

/// Back-off before the next `accept` after a failure.
///
/// Errors tied to one aborted connection retry at once. Anything else
/// (typically descriptor exhaustion) waits so the loop does not spin.
fn accept_retry_delay(error: &std::io::Error) -> Duration {
    use std::io::ErrorKind;
    match error.kind() {
        ErrorKind::ConnectionAborted | ErrorKind::ConnectionReset | ErrorKind::Interrupted => {
            Duration::ZERO
        }
        _ => Duration::from_millis(100),
    }
}
