//! Wire protocol for Guessmatch.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Types** ([`Message`], [`MessageKind`], [`PlayerId`], [`GameMode`],
//!   etc.): the closed set of messages and the typed payload views.
//! - **Codec** ([`encode`], [`FrameDecoder`]): `<Kind>payload\t` framing
//!   over a byte stream, including pipelined and split reads.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding or
//!   interpreting a payload.
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Message) → Session / Game (player context)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{encode, parse_frame, FrameDecoder, Frames, MAX_FRAME_LEN, TERMINATOR};
pub use error::ProtocolError;
pub use types::{
    parse_guess, Credentials, GameId, GameMode, Message, MessageKind, ModeSelection, PlayerId,
    FIELD_SEPARATOR,
};
