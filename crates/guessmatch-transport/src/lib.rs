//! Byte-stream transport for Guessmatch.
//!
//! The server sees sockets only through two traits: [`Transport`] hands
//! out new connections, [`Connection`] moves raw bytes. Message framing
//! is not this crate's concern; `guessmatch-protocol` does it on top.
//!
//! Each connection is driven by two tasks at once (one parked in
//! [`Connection::recv`], one draining an outbox into
//! [`Connection::send`]), so both methods take `&self`. [`TcpConnection`]
//! gets there by splitting the socket and locking each half on its own.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{TcpConnection, TcpTransport};

use std::fmt;
use std::net::SocketAddr;

/// Server-assigned number identifying one accepted socket.
///
/// Never reused within a process, so a stale id can't be mistaken for
/// a newer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A listening endpoint.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next accepted connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// The bound address; useful after binding to port 0.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// One peer's byte stream.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes the whole buffer.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Returns whatever bytes arrived next.
    ///
    /// Chunk boundaries mean nothing: a chunk may end mid-frame or carry
    /// several frames. `Ok(None)` is end-of-stream.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Half-closes the stream so the peer reads end-of-stream.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_get_returns_raw_value() {
        assert_eq!(ConnectionId::new(42).get(), 42);
    }

    #[test]
    fn test_connection_id_display_is_prefixed() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_orders_by_accept_sequence() {
        let mut ids = vec![ConnectionId::new(3), ConnectionId::new(1), ConnectionId::new(2)];
        ids.sort();
        assert_eq!(ids, [1, 2, 3].map(ConnectionId::new));
    }
}
