//! Binary frame layout of the device connection.
//!
//! Every WebSocket binary frame is one of:
//! - control: `AAPI` marker followed by a protobuf message
//! - audio: 4-byte big-endian stream id followed by the raw payload

use bytes::{BufMut, Bytes, BytesMut};
use prost::Message;
use thiserror::Error;

use super::messages::{ClientMessage, ServerMessage};

/// Prefix of control frames, ASCII `AAPI`.
pub const CONTROL_MARKER: [u8; 4] = *b"AAPI";

/// Outbound stream ids start above this value; devices allocate below it.
pub const SERVER_STREAM_ID_BASE: u32 = 1024;

/// Errors decoding an inbound frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Frame too short: {0} bytes")]
    Truncated(usize),

    #[error("Malformed control message: {0}")]
    MalformedControl(#[from] prost::DecodeError),
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Control(ClientMessage),
    Audio { stream_id: u32, payload: Bytes },
}

/// Classify and decode one inbound binary frame.
pub fn decode_frame(frame: Bytes) -> Result<InboundFrame, FrameError> {
    if frame.len() < 4 {
        return Err(FrameError::Truncated(frame.len()));
    }

    if frame[..4] == CONTROL_MARKER {
        let message = ClientMessage::decode(frame.slice(4..))?;
        return Ok(InboundFrame::Control(message));
    }

    let stream_id = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]);
    Ok(InboundFrame::Audio {
        stream_id,
        payload: frame.slice(4..),
    })
}

/// Encode a server message as a control frame.
pub fn encode_control(message: &ServerMessage) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + message.encoded_len());
    out.put_slice(&CONTROL_MARKER);
    message.encode_raw(&mut out);
    out.freeze()
}

/// Encode an audio payload for `stream_id`.
pub fn encode_audio(stream_id: u32, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_u32(stream_id);
    out.put_slice(payload);
    out.freeze()
}

/// Encode a client message as a control frame. Used by device-side tooling
/// and tests.
pub fn encode_client_control(message: &ClientMessage) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + message.encoded_len());
    out.put_slice(&CONTROL_MARKER);
    message.encode_raw(&mut out);
    out.freeze()
}

/// Decode a server control frame. Used by device-side tooling and tests.
pub fn decode_server_control(frame: &[u8]) -> Result<ServerMessage, FrameError> {
    if frame.len() < 4 {
        return Err(FrameError::Truncated(frame.len()));
    }
    Ok(ServerMessage::decode(&frame[4..])?)
}

/// Per-connection allocator for server-originated audio stream ids.
#[derive(Debug, Clone)]
pub struct StreamIdAllocator {
    current: u32,
}

impl StreamIdAllocator {
    pub fn new() -> Self {
        Self {
            current: SERVER_STREAM_ID_BASE,
        }
    }

    /// Next id, strictly greater than every id handed out before until the
    /// id space runs out, then numbering restarts just above the base.
    pub fn allocate(&mut self) -> u32 {
        self.current = self
            .current
            .checked_add(1)
            .unwrap_or(SERVER_STREAM_ID_BASE + 1);
        self.current
    }
}

impl Default for StreamIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
