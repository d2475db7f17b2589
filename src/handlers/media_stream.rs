//! Telephony media-stream WebSocket handler.
//!
//! The telephony provider connects here once a call is answered. The
//! handler resolves the per-call conversation profile, opens the voice
//! channel, and hands both connections to a [`MediaBridge`] that runs for
//! the lifetime of the call.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::bridge::{BridgeChannels, MediaBridge};
use crate::core::realtime::{self, SessionOptions};
use crate::core::telephony::{TelephonyFrame, TelephonyRoute};
use crate::state::AppState;

/// Channel buffer size for audio-heavy workloads.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB); media frames are a few KB.
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB).
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Query parameters selecting the conversation language and voice.
#[derive(Debug, Default, Deserialize)]
pub struct MediaStreamParams {
    /// Language tag for the prompt resolver
    #[serde(default)]
    pub language: Option<String>,
    /// Voice override
    #[serde(default)]
    pub voice: Option<String>,
}

/// Media-stream WebSocket handler.
///
/// Upgrades the HTTP connection and runs one bridge per connection.
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<MediaStreamParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!(
        language = ?params.language,
        voice = ?params.voice,
        "Media stream connection upgrade requested"
    );

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_socket(socket, state, params))
}

/// Run one call: open the voice channel, plumb the sockets into channels,
/// and drive the bridge to completion.
async fn handle_media_socket(socket: WebSocket, app_state: Arc<AppState>, params: MediaStreamParams) {
    let call_id = Uuid::new_v4();
    let profile = app_state.call_profile(params.language.as_deref(), params.voice.as_deref());
    info!(%call_id, language = %profile.language, voice = %profile.voice, "Media stream connected");

    let mut options = SessionOptions::new(
        app_state.config.openai_api_key.clone(),
        profile.instructions.clone(),
    );
    options.model = app_state.config.model;
    options.voice = profile.voice;

    let voice_link = match realtime::connect(&options).await {
        Ok(link) => link,
        Err(e) => {
            error!(%call_id, "Failed to open voice channel: {}", e);
            return;
        }
    };

    let (mut ws_sink, mut ws_stream) = socket.split();

    // Sender task: owns the telephony sink, drains outbound frames, and
    // performs the close handshake when asked.
    let (telephony_tx, mut telephony_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);
    let sender_task = tokio::spawn(async move {
        while let Some(route) = telephony_rx.recv().await {
            match route {
                TelephonyRoute::Frame(frame) => {
                    let json = match serde_json::to_string(&frame) {
                        Ok(json) => json,
                        Err(e) => {
                            error!("Failed to serialize outbound frame: {}", e);
                            continue;
                        }
                    };
                    if ws_sink.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                TelephonyRoute::Close => {
                    info!("Closing telephony connection");
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Reader task: parses inbound wire text into frames; malformed frames
    // are absorbed at this boundary. Dropping the sender ends the bridge's
    // inbound relay.
    let (frame_tx, frame_rx) = mpsc::channel::<TelephonyFrame>(CHANNEL_BUFFER_SIZE);
    let reader_task = tokio::spawn(async move {
        while let Some(message) = ws_stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    if let Some(frame) = TelephonyFrame::parse(&text)
                        && frame_tx.send(frame).await.is_err()
                    {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!("Telephony connection closed by peer");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Telephony WebSocket error: {}", e);
                    break;
                }
            }
        }
    });

    let bridge = MediaBridge::new(app_state.config.bridge_config(profile.goodbye));
    bridge
        .run(BridgeChannels {
            telephony_rx: frame_rx,
            telephony_tx,
            voice_rx: voice_link.events,
            voice_tx: voice_link.commands,
        })
        .await;

    reader_task.abort();
    sender_task.abort();
    info!(%call_id, "Media stream terminated");
}
