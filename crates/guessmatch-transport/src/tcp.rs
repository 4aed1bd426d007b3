//! TCP transport implementation.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Size of the per-read buffer.
const READ_BUFFER_SIZE: usize = 1024;

/// A TCP [`Transport`] that listens for incoming stream connections.
pub struct TcpTransport {
    listener: TcpListener,
    next_id: AtomicU64,
}

impl TcpTransport {
    /// Binds a new TCP transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "TCP transport listening");
        Ok(Self {
            listener,
            next_id: AtomicU64::new(1),
        })
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        // Frames are small and latency matters more than throughput.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }

        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %addr, "accepted TCP connection");

        let (read, write) = stream.into_split();
        Ok(TcpConnection {
            id,
            peer: addr,
            read: Mutex::new(read),
            write: Mutex::new(write),
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A single TCP connection.
///
/// The read and write halves are locked separately so a reader task
/// parked in `recv` never blocks a writer task in `send`.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    read: Mutex<OwnedReadHalf>,
    write: Mutex<OwnedWriteHalf>,
}

impl TcpConnection {
    /// Returns the remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn write_error(&self, source: std::io::Error) -> TransportError {
        TransportError::Write {
            peer: self.peer,
            source,
        }
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let mut write = self.write.lock().await;
        write.write_all(data).await.map_err(|e| self.write_error(e))?;
        write.flush().await.map_err(|e| self.write_error(e))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let n = self
            .read
            .lock()
            .await
            .read(&mut buf)
            .await
            .map_err(|source| TransportError::Read {
                peer: self.peer,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.write
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| self.write_error(e))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
