//! Error types for the protocol layer.
//!
//! Decoding a frame never fails (unknown input becomes a `Default`
//! message), so these errors come from encoding and from the typed
//! payload parsers.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The payload contains the frame terminator and cannot be sent.
    #[error("payload contains the frame terminator")]
    TerminatorInPayload,

    /// The `<Kind>` header names no known message kind.
    #[error("unknown message kind: {0}")]
    UnknownKind(String),

    /// The payload does not have the shape its message kind requires.
    ///
    /// For example a guess that is not a number, or credentials without
    /// the `;` separator.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}
