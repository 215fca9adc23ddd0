//! Device protocol WebSocket handlers
//!
//! One WebSocket connection carries a device's whole dialogue. Every frame is
//! binary and either a control message or a chunk of an audio stream (see
//! [`crate::protocol`]).
//!
//! ## Client → Server
//!
//! - **VoiceInput** event: opens an inbound Opus stream and starts an utterance
//! - **Binary audio frames** on that stream
//! - **StreamControl** close: ends (`SUCCESS`/`ERROR`) or cancels (`CANCEL`) the utterance
//! - **LogSpotter** event: acknowledged with `LogAck`
//! - **MatchedUser** event: speaker classification merged into the request metadata
//!
//! ## Server → Client
//!
//! - **InputStartAck**, interim and final **AsrResult**
//! - **AssistantResponse** with client directives
//! - **TtsSpeak** followed by the synthesized audio on a new stream and its close

pub mod connection;
mod handler;
pub mod messages;

pub use connection::{ConnectionCoordinator, ProtocolError};
pub use handler::uniproxy_handler;
pub use messages::MessageRoute;
