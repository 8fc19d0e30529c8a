//! Plain TCP transport.
//!
//! One message per direction per connection. The receiver waits for the
//! first chunk, then takes whatever else has already arrived, up to
//! `buffer_size` bytes. It never waits for EOF, so peers that keep their
//! side open after writing are served. Senders still half-close after
//! writing.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use arbor_protocol::{Address, DEFAULT_BUFFER_SIZE};

use crate::NetworkError;

/// Configuration for the transport layer.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound on bytes read per request or response.
    pub buffer_size: usize,
    /// How long to wait for an outbound connection.
    pub connect_timeout: Duration,
    /// How long a single read or write may take.
    pub io_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(60),
        }
    }
}

/// Outbound client. Holds no connection between calls.
#[derive(Debug, Clone, Default)]
pub struct Transport {
    config: TransportConfig,
    destination: Option<Address>,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config, destination: None }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn destination(&self) -> Option<Address> {
        self.destination
    }

    /// Retarget subsequent [`Transport::send_message`] calls.
    pub fn change_destination(&mut self, address: Address) {
        self.destination = Some(address);
    }

    /// Send `text` to the configured destination and return its reply.
    pub async fn send_message(&self, text: &str) -> Result<String, NetworkError> {
        let destination = self.destination.ok_or(NetworkError::NoDestination)?;
        self.send_message_to(destination, text).await
    }

    /// Open a fresh connection to `destination`, send `text`, read one reply.
    pub async fn send_message_to(
        &self,
        destination: Address,
        text: &str,
    ) -> Result<String, NetworkError> {
        let connect = TcpStream::connect(destination.socket_addr());
        let mut stream = with_timeout("connect", self.config.connect_timeout, connect)
            .await?
            .map_err(|source| NetworkError::Connect { addr: destination, source })?;

        self.write_all(&mut stream, text).await?;
        let reply = self.receive(&mut stream).await?;
        tracing::trace!(peer = %destination, bytes = reply.len(), "Reply received");
        Ok(reply)
    }

    /// Write `text` back on an already-open inbound connection.
    pub async fn direct_reply(&self, stream: &mut TcpStream, text: &str) -> Result<(), NetworkError> {
        self.write_all(stream, text).await
    }

    /// Read one bounded message from `stream`.
    pub async fn receive(&self, stream: &mut TcpStream) -> Result<String, NetworkError> {
        let limit = self.config.buffer_size;
        let mut buf = vec![0u8; limit];
        let mut filled =
            with_timeout("read", self.config.io_timeout, stream.read(&mut buf)).await??;

        // Drain what is already buffered without waiting for more.
        while filled > 0 && filled < limit {
            match stream.try_read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        buf.truncate(filled);
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    async fn write_all(&self, stream: &mut TcpStream, text: &str) -> Result<(), NetworkError> {
        let write = async {
            stream.write_all(text.as_bytes()).await?;
            stream.shutdown().await
        };
        with_timeout("write", self.config.io_timeout, write).await??;
        Ok(())
    }
}

async fn with_timeout<T>(
    op: &'static str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, NetworkError> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| NetworkError::Timeout { op, timeout_ms: limit.as_millis() })
}
