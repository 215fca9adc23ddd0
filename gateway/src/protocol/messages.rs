//! Control channel messages.
//!
//! Hand-declared protobuf schemas for the subset of the uniproxy protocol
//! the emulator speaks. Field tags are stable wire identifiers.

use prost_types::Struct;

// =============================================================================
// Shared
// =============================================================================

/// Reason carried by a stream close.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum CloseReason {
    Unspecified = 0,
    Success = 1,
    Cancel = 2,
    Error = 3,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamClose {
    #[prost(enumeration = "CloseReason", tag = "1")]
    pub reason: i32,
}

/// Lifecycle control of one logical audio stream.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamControl {
    #[prost(uint32, tag = "1")]
    pub stream_id: u32,
    #[prost(string, tag = "2")]
    pub message_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "3")]
    pub close: ::core::option::Option<StreamClose>,
}

impl StreamControl {
    /// Declared close reason, if the message closes the stream with one.
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close
            .as_ref()
            .and_then(|close| CloseReason::try_from(close.reason).ok())
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EventHeader {
    #[prost(string, tag = "1")]
    pub message_id: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub ref_message_id: ::prost::alloc::string::String,
    #[prost(uint32, optional, tag = "3")]
    pub stream_id: ::core::option::Option<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timestamp {
    #[prost(int64, tag = "1")]
    pub seconds: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timings {
    #[prost(message, optional, tag = "1")]
    pub sending_time: ::core::option::Option<Timestamp>,
}

// =============================================================================
// Client -> Server
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientMessage {
    #[prost(message, optional, tag = "1")]
    pub stream_control: ::core::option::Option<StreamControl>,
    #[prost(message, optional, tag = "2")]
    pub event: ::core::option::Option<ClientEvent>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientEvent {
    #[prost(message, optional, tag = "1")]
    pub header: ::core::option::Option<EventHeader>,
    #[prost(message, optional, tag = "2")]
    pub voice_input: ::core::option::Option<VoiceInput>,
    #[prost(message, optional, tag = "3")]
    pub log_spotter: ::core::option::Option<LogSpotter>,
    #[prost(message, optional, tag = "4")]
    pub matched_user: ::core::option::Option<MatchedUser>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestHeader {
    #[prost(string, tag = "1")]
    pub request_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub sequence_number: u32,
}

/// Start of a spoken request. Audio follows on `EventHeader::stream_id`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VoiceInput {
    #[prost(message, optional, tag = "1")]
    pub header: ::core::option::Option<RequestHeader>,
    /// MIME type of the audio, e.g. `audio/opus`
    #[prost(string, tag = "2")]
    pub format: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogSpotter {
    #[prost(bytes = "bytes", tag = "1")]
    pub payload: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClassificationResult {
    #[prost(string, tag = "1")]
    pub tag: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub class_name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BiometryClassification {
    #[prost(message, repeated, tag = "1")]
    pub simple: ::prost::alloc::vec::Vec<ClassificationResult>,
}

/// Speaker classification produced on the device.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MatchedUser {
    #[prost(message, optional, tag = "1")]
    pub biometry_classification: ::core::option::Option<BiometryClassification>,
}

// =============================================================================
// Server -> Client
// =============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerMessage {
    #[prost(message, optional, tag = "1")]
    pub stream_control: ::core::option::Option<StreamControl>,
    #[prost(message, optional, tag = "2")]
    pub event: ::core::option::Option<ServerEvent>,
    #[prost(message, optional, tag = "3")]
    pub timings: ::core::option::Option<Timings>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ServerEvent {
    #[prost(message, optional, tag = "1")]
    pub header: ::core::option::Option<EventHeader>,
    #[prost(message, optional, tag = "2")]
    pub input_start_ack: ::core::option::Option<InputStartAck>,
    #[prost(message, optional, tag = "3")]
    pub asr_result: ::core::option::Option<AsrResult>,
    #[prost(message, optional, tag = "4")]
    pub assistant_response: ::core::option::Option<AssistantResponse>,
    #[prost(message, optional, tag = "5")]
    pub tts_speak: ::core::option::Option<TtsSpeak>,
    #[prost(message, optional, tag = "6")]
    pub log_ack: ::core::option::Option<LogAck>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InputStartAck {
    /// Microseconds since the Unix epoch
    #[prost(uint64, tag = "1")]
    pub request_start_time: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Word {
    #[prost(string, tag = "1")]
    pub value: ::prost::alloc::string::String,
    #[prost(float, tag = "2")]
    pub confidence: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Recognition {
    #[prost(message, repeated, tag = "1")]
    pub words: ::prost::alloc::vec::Vec<Word>,
    #[prost(float, tag = "2")]
    pub confidence: f32,
    #[prost(string, tag = "3")]
    pub normalized: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub parent_model: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AsrResult {
    #[prost(bool, tag = "1")]
    pub end_of_utt: bool,
    #[prost(uint32, tag = "2")]
    pub messages_count: u32,
    #[prost(int32, tag = "3")]
    pub response_code: i32,
    #[prost(message, repeated, tag = "4")]
    pub recognition: ::prost::alloc::vec::Vec<Recognition>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseHeader {
    #[prost(string, tag = "1")]
    pub request_id: ::prost::alloc::string::String,
    #[prost(uint32, tag = "2")]
    pub sequence_number: u32,
    #[prost(string, tag = "3")]
    pub response_id: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub dialog_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputSpeech {
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VoiceResponse {
    #[prost(message, optional, tag = "1")]
    pub output_speech: ::core::option::Option<OutputSpeech>,
    #[prost(bool, tag = "2")]
    pub should_listen: bool,
    #[prost(bool, tag = "3")]
    pub has_voice_response: bool,
}

/// Client-side action attached to a response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DirectiveMessage {
    #[prost(string, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub analytics_type: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "4")]
    pub payload: ::core::option::Option<Struct>,
    #[prost(bool, tag = "5")]
    pub is_led_silent: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResponseBody {
    #[prost(message, repeated, tag = "1")]
    pub directives: ::prost::alloc::vec::Vec<DirectiveMessage>,
    #[prost(bool, tag = "2")]
    pub is_streaming: bool,
    #[prost(bool, tag = "3")]
    pub force_server_request: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssistantResponse {
    #[prost(message, optional, tag = "1")]
    pub header: ::core::option::Option<ResponseHeader>,
    #[prost(message, optional, tag = "2")]
    pub voice_response: ::core::option::Option<VoiceResponse>,
    #[prost(message, optional, tag = "3")]
    pub response: ::core::option::Option<ResponseBody>,
}

/// Announces synthesized audio on `EventHeader::stream_id`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TtsSpeak {
    #[prost(string, tag = "1")]
    pub format: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub lazy_tts_streaming: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LogAck {}
