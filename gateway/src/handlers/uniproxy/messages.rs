//! Outbound routing and server message builders.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use uuid::Uuid;

use crate::core::backends::{ProcessingResponse, SynthesisResponse};
use crate::protocol::directives::tts_play_placeholder;
use crate::protocol::messages::{
    AsrResult, AssistantResponse, CloseReason, EventHeader, InputStartAck, LogAck, OutputSpeech,
    Recognition, ResponseBody, ResponseHeader, ServerEvent, ServerMessage, StreamClose,
    StreamControl, Timestamp, Timings, TtsSpeak, VoiceResponse, Word,
};

/// Name reported as the recognizing model.
pub const PARENT_MODEL: &str = "speechkit-emu";

/// Confidence reported for every hypothesis.
pub const RECOGNITION_CONFIDENCE: f32 = 0.999;

/// Work item for the WebSocket sender task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageRoute {
    /// Binary frame, already framed
    Frame(Bytes),
    Close,
}

/// Identifiers of the voice-input event an utterance answers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VoiceInputContext {
    pub message_id: String,
    pub request_id: String,
    pub sequence_number: u32,
}

fn timings() -> Option<Timings> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    Some(Timings {
        sending_time: Some(Timestamp { seconds }),
    })
}

fn header(ref_message_id: &str, stream_id: Option<u32>) -> Option<EventHeader> {
    Some(EventHeader {
        message_id: Uuid::new_v4().to_string(),
        ref_message_id: ref_message_id.to_string(),
        stream_id,
    })
}

fn event_message(event: ServerEvent) -> ServerMessage {
    ServerMessage {
        stream_control: None,
        event: Some(event),
        timings: timings(),
    }
}

fn recognition(text: &str) -> Recognition {
    Recognition {
        words: text
            .split(' ')
            .map(|word| Word {
                value: word.to_string(),
                confidence: RECOGNITION_CONFIDENCE,
            })
            .collect(),
        confidence: RECOGNITION_CONFIDENCE,
        normalized: text.to_string(),
        parent_model: PARENT_MODEL.to_string(),
    }
}

pub fn input_start_ack(ref_message_id: &str) -> ServerMessage {
    let request_start_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or_default();
    event_message(ServerEvent {
        header: header(ref_message_id, None),
        input_start_ack: Some(InputStartAck { request_start_time }),
        ..Default::default()
    })
}

/// Interim hypothesis.
pub fn partial_asr_result(ref_message_id: &str, text: &str) -> ServerMessage {
    event_message(ServerEvent {
        header: header(ref_message_id, None),
        asr_result: Some(AsrResult {
            end_of_utt: false,
            messages_count: 1,
            response_code: 0,
            recognition: vec![recognition(text)],
        }),
        ..Default::default()
    })
}

/// End of recognition. Carries the final text only when it will be processed.
pub fn final_asr_result(ref_message_id: &str, text: &str, will_process: bool) -> ServerMessage {
    let recognition = if will_process {
        vec![recognition(text)]
    } else {
        Vec::new()
    };
    event_message(ServerEvent {
        header: header(ref_message_id, None),
        asr_result: Some(AsrResult {
            end_of_utt: true,
            messages_count: 0,
            response_code: 0,
            recognition,
        }),
        ..Default::default()
    })
}

pub fn assistant_response(context: &VoiceInputContext, response: &ProcessingResponse) -> ServerMessage {
    let mut directives: Vec<_> = response
        .directives
        .iter()
        .map(|directive| directive.to_message())
        .collect();
    directives.push(tts_play_placeholder());

    event_message(ServerEvent {
        header: header(&context.message_id, None),
        assistant_response: Some(AssistantResponse {
            header: Some(ResponseHeader {
                request_id: context.request_id.clone(),
                sequence_number: context.sequence_number,
                response_id: Uuid::new_v4().to_string(),
                dialog_id: Uuid::new_v4().to_string(),
            }),
            voice_response: Some(VoiceResponse {
                output_speech: Some(OutputSpeech {
                    text: response.text.clone(),
                }),
                should_listen: response.require_more_input,
                has_voice_response: true,
            }),
            response: Some(ResponseBody {
                directives,
                is_streaming: false,
                force_server_request: false,
            }),
        }),
        ..Default::default()
    })
}

/// Announces synthesized audio on `stream_id`.
pub fn tts_speak(ref_message_id: &str, stream_id: u32, response: &SynthesisResponse) -> ServerMessage {
    event_message(ServerEvent {
        header: header(ref_message_id, Some(stream_id)),
        tts_speak: Some(TtsSpeak {
            format: response.format.mime_type().to_string(),
            lazy_tts_streaming: false,
        }),
        ..Default::default()
    })
}

/// Closes an outbound audio stream after its last frame.
pub fn stream_closed(stream_id: u32) -> ServerMessage {
    ServerMessage {
        stream_control: Some(StreamControl {
            stream_id,
            message_id: Uuid::new_v4().to_string(),
            close: Some(StreamClose {
                reason: CloseReason::Success as i32,
            }),
        }),
        event: None,
        timings: timings(),
    }
}

pub fn log_ack(ref_message_id: &str) -> ServerMessage {
    event_message(ServerEvent {
        header: header(ref_message_id, None),
        log_ack: Some(LogAck {}),
        ..Default::default()
    })
}
