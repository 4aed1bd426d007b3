//! Framing: turning [`Message`]s into bytes and a byte stream back into
//! [`Message`]s.
//!
//! A frame is `<Kind>payload` followed by [`TERMINATOR`]. The stream
//! carries no other boundaries, so a single socket read may contain
//! half a frame, exactly one, or several back to back ("pipelining").
//! [`FrameDecoder`] owns the bytes that have arrived but not yet been
//! consumed and hands complete frames out lazily through [`Frames`].

use crate::{Message, MessageKind, ProtocolError};

/// The reserved byte that ends every frame. Never valid inside a payload.
pub const TERMINATOR: u8 = b'\t';

/// Upper bound on a single buffered frame.
///
/// A peer that streams more than this without a terminator is either
/// broken or hostile; the partial frame is dropped and decoding
/// resynchronises on the next terminator.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Encodes a message as `<Kind>payload\t`.
///
/// # Errors
/// Returns [`ProtocolError::TerminatorInPayload`] if the payload contains
/// the terminator byte, since that would split the frame in two.
pub fn encode(message: &Message) -> Result<Vec<u8>, ProtocolError> {
    if message.payload.as_bytes().contains(&TERMINATOR) {
        return Err(ProtocolError::TerminatorInPayload);
    }
    let kind = message.kind.as_str();
    let mut out = Vec::with_capacity(kind.len() + message.payload.len() + 3);
    out.push(b'<');
    out.extend_from_slice(kind.as_bytes());
    out.push(b'>');
    out.extend_from_slice(message.payload.as_bytes());
    out.push(TERMINATOR);
    Ok(out)
}

/// Parses the body of one frame (terminator already stripped).
///
/// Never fails: a body without a recognised `<Kind>` header decodes to
/// [`MessageKind::Default`] carrying the whole body as payload.
pub fn parse_frame(body: &[u8]) -> Message {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();

    let header = text
        .strip_prefix('<')
        .and_then(|rest| rest.split_once('>'));

    match header {
        Some((name, payload)) => match name.parse::<MessageKind>() {
            Ok(kind) => Message::new(kind, payload),
            Err(_) => {
                tracing::debug!(header = name, "unrecognised message kind");
                Message::new(MessageKind::Default, text)
            }
        },
        None => {
            tracing::debug!(len = text.len(), "frame without header");
            Message::new(MessageKind::Default, text)
        }
    }
}

/// Incremental decoder for one connection's inbound byte stream.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Set after an oversize partial frame was dropped: inbound bytes up
    /// to and including the next terminator still belong to that frame.
    discarding: bool,
    max_frame_len: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
            max_frame_len,
        }
    }

    /// Appends freshly read bytes and returns the frames now available.
    ///
    /// The returned iterator is lazy: frames are cut out of the buffer
    /// only as it is advanced. Frames left unconsumed when it is dropped
    /// stay buffered and come out of the next [`feed`](Self::feed) or
    /// [`frames`](Self::frames) call, as does any trailing partial frame.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        let mut bytes = bytes;
        if self.discarding {
            match bytes.iter().position(|&b| b == TERMINATOR) {
                Some(end) => {
                    self.discarding = false;
                    bytes = &bytes[end + 1..];
                }
                None => bytes = &[],
            }
        }
        self.buffer.extend_from_slice(bytes);
        self.enforce_limit();
        self.frames()
    }

    /// Iterates over the complete frames already buffered.
    pub fn frames(&mut self) -> Frames<'_> {
        Frames { decoder: self }
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn enforce_limit(&mut self) {
        let partial_len = match self.buffer.iter().rposition(|&b| b == TERMINATOR) {
            Some(last) => self.buffer.len() - last - 1,
            None => self.buffer.len(),
        };
        if partial_len > self.max_frame_len {
            tracing::warn!(
                len = partial_len,
                max = self.max_frame_len,
                "oversize frame dropped"
            );
            let keep = self.buffer.len() - partial_len;
            self.buffer.truncate(keep);
            self.discarding = true;
        }
    }

    fn next_frame(&mut self) -> Option<Message> {
        loop {
            let end = self.buffer.iter().position(|&b| b == TERMINATOR)?;
            let frame: Vec<u8> = self.buffer.drain(..=end).collect();
            let body = &frame[..end];
            if body.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(parse_frame(body));
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the complete frames in a [`FrameDecoder`].
///
/// Finite: it ends as soon as no terminator remains in the buffer.
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
}

impl Iterator for Frames<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        self.decoder.next_frame()
    }
}
