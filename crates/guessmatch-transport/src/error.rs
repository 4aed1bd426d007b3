use std::net::SocketAddr;

/// Errors raised by the TCP transport.
///
/// Every variant wraps the underlying socket error; callers mostly log
/// it and treat the connection as gone.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The listener could not be bound.
    #[error("cannot listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// `accept(2)` on the listener failed.
    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// Writing to a peer failed.
    #[error("write to {peer} failed: {source}")]
    Write {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Reading from a peer failed.
    #[error("read from {peer} failed: {source}")]
    Read {
        peer: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}
