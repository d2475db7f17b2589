//! Realtime voice API client.
//!
//! Opens the WebSocket to the voice API, initializes the session, and
//! exposes the connection as a pair of channels: an mpsc sender of
//! [`ClientEvent`]s draining into the socket sink, and an mpsc receiver of
//! parsed [`VoiceEvent`]s read from the socket stream.
//!
//! There is no reconnection: the voice channel lives exactly as long as one
//! call, and losing it is terminal for that call's bridge. When the socket
//! closes, the event receiver yields `None`.

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{REALTIME_HOST, SessionOptions};
use super::messages::{ClientEvent, VoiceEvent};

/// Channel capacity for WebSocket message plumbing.
const WS_CHANNEL_CAPACITY: usize = 256;

/// Errors that can occur while opening the voice channel.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Connection to the voice API failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),
}

/// Result type for voice channel operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

/// A live voice channel: events out, commands in.
///
/// Dropping `commands` (or the far end closing the socket) ends the
/// connection task; `events` then yields `None`.
pub struct VoiceLink {
    /// Sender for outgoing client events
    pub commands: mpsc::Sender<ClientEvent>,
    /// Receiver of parsed server events
    pub events: mpsc::Receiver<VoiceEvent>,
}

/// Connect to the voice API and initialize the session.
///
/// The `session.update` initialization event (instructions, voice, audio
/// format, turn detection, temperature) is queued before this function
/// returns, so it is the first event the API sees.
pub async fn connect(options: &SessionOptions) -> VoiceResult<VoiceLink> {
    if options.api_key.is_empty() {
        return Err(VoiceError::AuthenticationFailed(
            "API key is required".to_string(),
        ));
    }

    let url = options.ws_url();
    let request = http::Request::builder()
        .uri(&url)
        .header("Authorization", format!("Bearer {}", options.api_key))
        .header("OpenAI-Beta", "realtime=v1")
        .header(
            "Sec-WebSocket-Key",
            tungstenite::handshake::client::generate_key(),
        )
        .header("Sec-WebSocket-Version", "13")
        .header("Connection", "Upgrade")
        .header("Upgrade", "websocket")
        .header("Host", REALTIME_HOST)
        .body(())
        .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| VoiceError::ConnectionFailed(e.to_string()))?;

    tracing::info!(model = %options.model, "Connected to realtime voice API");

    let (mut ws_sink, mut ws_stream) = ws_stream.split();

    let (command_tx, mut command_rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::channel::<VoiceEvent>(WS_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                // Drain outgoing events into the socket
                outgoing = command_rx.recv() => {
                    let Some(event) = outgoing else {
                        break;
                    };
                    let json = match serde_json::to_string(&event) {
                        Ok(j) => j,
                        Err(e) => {
                            tracing::error!("Failed to serialize client event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                        tracing::error!("Failed to send voice event: {}", e);
                        break;
                    }
                }

                // Read incoming events from the socket
                incoming = ws_stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(event) = VoiceEvent::parse(&text)
                                && event_tx.send(event).await.is_err()
                            {
                                // The bridge went away; nothing left to do.
                                break;
                            }
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Voice channel closed by server");
                            break;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                tracing::error!("Failed to send pong: {}", e);
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("Voice channel error: {}", e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }
            }
        }
        // Dropping event_tx signals closure to the bridge.
        tracing::info!("Voice channel connection task ended");
    });

    let init = ClientEvent::SessionUpdate {
        session: options.session_config(),
    };
    command_tx
        .send(init)
        .await
        .map_err(|e| VoiceError::WebSocketError(e.to_string()))?;

    Ok(VoiceLink {
        commands: command_tx,
        events: event_rx,
    })
}

// =============================================================================
// Tests
// =============================================================================
