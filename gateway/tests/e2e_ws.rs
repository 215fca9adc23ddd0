//! Served router exercised over a real WebSocket.

mod common;

use std::net::SocketAddr;

use axum::body::Body;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use common::{Mocks, STEP_TIMEOUT, eventually};
use uniproxy_gateway::protocol::framing::{decode_server_control, encode_client_control};
use uniproxy_gateway::protocol::messages::{
    ClientEvent, ClientMessage, CloseReason, EventHeader, RequestHeader, ServerMessage, VoiceInput,
};
use uniproxy_gateway::protocol::{CONTROL_MARKER, encode_audio};
use uniproxy_gateway::{AppState, ServerConfig, routes};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(config: ServerConfig, mocks: &Mocks) -> SocketAddr {
    let state = AppState::with_backends(config, mocks.backends());
    let app = routes::uniproxy::create_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}")).await.unwrap();
    client
}

async fn next_binary(client: &mut Client) -> Bytes {
    loop {
        let message = timeout(STEP_TIMEOUT, client.next())
            .await
            .expect("no frame in time")
            .expect("connection closed")
            .unwrap();
        if let Message::Binary(frame) = message {
            return frame;
        }
    }
}

async fn next_control(client: &mut Client) -> ServerMessage {
    let frame = next_binary(client).await;
    assert_eq!(frame[..4], CONTROL_MARKER);
    decode_server_control(&frame).unwrap()
}

fn voice_input(message_id: &str, stream_id: u32) -> Bytes {
    encode_client_control(&ClientMessage {
        stream_control: None,
        event: Some(ClientEvent {
            header: Some(EventHeader {
                message_id: message_id.to_string(),
                ref_message_id: String::new(),
                stream_id: Some(stream_id),
            }),
            voice_input: Some(VoiceInput {
                header: Some(RequestHeader {
                    request_id: format!("req-{message_id}"),
                    sequence_number: 1,
                }),
                format: "audio/opus".to_string(),
            }),
            ..Default::default()
        }),
    })
}

#[tokio::test]
async fn test_health_check() {
    let mocks = Mocks::default();
    let app = routes::uniproxy::create_app(AppState::with_backends(
        ServerConfig::default(),
        mocks.backends(),
    ));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json, serde_json::json!({"status": "OK"}));
}

#[tokio::test]
async fn test_voice_turn_over_websocket() {
    let mocks = Mocks::default();
    let config = ServerConfig::default();
    let path = config.uniproxy_path.clone();
    let addr = serve(config, &mocks).await;
    let mut client = connect(addr, &path).await;

    client
        .send(Message::Binary(voice_input("m1", 1)))
        .await
        .unwrap();
    let ack = next_control(&mut client).await.event.unwrap();
    assert!(ack.input_start_ack.is_some());
    assert_eq!(ack.header.unwrap().ref_message_id, "m1");

    client
        .send(Message::Binary(encode_audio(1, b"opus-1")))
        .await
        .unwrap();
    eventually(|| mocks.recognition.chunks().len() == 1).await;
    mocks.recognition.emit("два плюс два", true);

    // Hypotheses until the end of utterance, then the assistant reply
    let mut message = next_control(&mut client).await;
    let mut last_asr = None;
    while let Some(asr) = message.event.as_mut().and_then(|event| event.asr_result.take()) {
        last_asr = Some(asr);
        message = next_control(&mut client).await;
    }
    let last_asr = last_asr.expect("no recognition result");
    assert!(last_asr.end_of_utt);
    assert_eq!(last_asr.recognition[0].normalized, "два плюс два");

    let assistant = message.event.unwrap().assistant_response.unwrap();
    assert_eq!(assistant.voice_response.unwrap().output_speech.unwrap().text, "Четыре");

    let speak = next_control(&mut client).await.event.unwrap();
    assert_eq!(speak.header.unwrap().stream_id, Some(1025));

    let audio = next_binary(&mut client).await;
    assert_eq!(audio[..4], 1025u32.to_be_bytes());
    assert_eq!(audio.slice(4..), mocks.synthesis.audio);

    let close = next_control(&mut client).await.stream_control.unwrap();
    assert_eq!(close.stream_id, 1025);
    assert_eq!(close.close_reason(), Some(CloseReason::Success));

    assert_eq!(mocks.processing.requests()[0].text, "два плюс два");
    client.close(None).await.unwrap();
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let mocks = Mocks::default();
    let config = ServerConfig {
        idle_timeout_seconds: 1,
        ..Default::default()
    };
    let path = config.uniproxy_path.clone();
    let addr = serve(config, &mocks).await;
    let mut client = connect(addr, &path).await;

    let closed = timeout(STEP_TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "idle connection was not closed");
}

#[tokio::test]
async fn test_unknown_path_is_not_found() {
    let mocks = Mocks::default();
    let app = routes::uniproxy::create_app(AppState::with_backends(
        ServerConfig::default(),
        mocks.backends(),
    ));

    let response = app
        .oneshot(Request::builder().uri("/ws").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
