//! Device WebSocket transport loop

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::{select, time::Duration};
use tracing::{debug, error, info, warn};

use super::connection::ConnectionCoordinator;
use super::messages::MessageRoute;
use crate::state::AppState;

/// Channel buffer between the control loop and the sender task
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How often an idle connection is checked
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Time the sender task gets to flush queued frames on shutdown
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Device protocol WebSocket handler
///
/// Upgrades the HTTP connection to a WebSocket driven by one
/// [`ConnectionCoordinator`].
pub async fn uniproxy_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    debug!("Uniproxy WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_uniproxy_socket(socket, state))
}

async fn handle_uniproxy_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("Uniproxy WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<MessageRoute>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing frames
    let mut sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let result = match route {
                MessageRoute::Frame(frame) => sender.send(Message::Binary(frame)).await,
                MessageRoute::Close => {
                    let result = sender.send(Message::Close(None)).await;
                    if let Err(e) = result {
                        debug!("Failed to send close frame: {}", e);
                    }
                    break;
                }
            };

            if let Err(e) = result {
                error!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    let (mut coordinator, mut events_rx) = ConnectionCoordinator::new(
        app_state.backends.clone(),
        message_tx.clone(),
        app_state.config.session_watchdog(),
    );

    let idle_timeout = app_state.config.idle_timeout();
    let check_interval = idle_timeout.min(IDLE_CHECK_INTERVAL);
    let mut last_activity = Instant::now();

    loop {
        select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(Message::Binary(frame))) => {
                        if let Err(e) = coordinator.handle_frame(frame).await {
                            warn!("Rejected inbound message: {}", e);
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!(bytes = text.len(), "Ignoring text frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(?frame, "Uniproxy WebSocket closed by client");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Uniproxy WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!("Uniproxy WebSocket connection closed by client");
                        break;
                    }
                }
            }
            Some(envelope) = events_rx.recv() => {
                coordinator.handle_session_event(envelope).await;
            }
            _ = tokio::time::sleep(check_interval) => {
                if last_activity.elapsed() >= idle_timeout {
                    warn!(
                        "Uniproxy WebSocket connection idle for {}s, closing stale connection",
                        last_activity.elapsed().as_secs()
                    );
                    let _ = message_tx.send(MessageRoute::Close).await;
                    break;
                }
                debug!("Uniproxy WebSocket connection idle check - still active");
            }
        }
    }

    // Cleanup
    coordinator.shutdown().await;
    drop(coordinator);
    drop(message_tx);

    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task)
        .await
        .is_err()
    {
        sender_task.abort();
    }

    info!("Uniproxy WebSocket connection terminated");
}
