//! The media bridge engine.
//!
//! One [`MediaBridge`] manages the streaming lifecycle of exactly one call.
//! It runs three cooperative loops to completion:
//!
//! - the inbound relay, reading telephony frames and forwarding caller
//!   audio to the voice channel;
//! - the outbound relay, reading voice-channel events, forwarding
//!   assistant audio to telephony, enforcing the usage budget, and
//!   handling barge-in;
//! - the silence watchdog, which turns caller silence into a
//!   commit-and-respond trigger and prolonged silence into teardown.
//!
//! The loops communicate with the two sockets through mpsc channels (a
//! dedicated sender task owns each sink) and share one [`SharedState`].
//! Any loop can end the call by latching the state inactive; the others
//! observe the cancellation and stop. Channel closure in either direction
//! is terminal: there is no reconnection inside a call.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::core::realtime::{ClientEvent, Voice, VoiceApiError, VoiceEvent};
use crate::core::telephony::{OutboundFrame, RESPONSE_MARK, TelephonyFrame, TelephonyRoute};

use super::session::Session;
use super::state::{SharedState, WatchdogVerdict};
use super::translate;

/// Default estimated-token budget per call.
pub const DEFAULT_SESSION_BUDGET: f64 = 250.0;

/// Caller silence that ends their turn and requests a reply.
pub const SILENCE_THRESHOLD: Duration = Duration::from_millis(500);

/// Caller silence after which the call is considered dropped.
pub const DISCONNECT_THRESHOLD: Duration = Duration::from_secs(5);

/// Watchdog polling interval.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Configuration
// =============================================================================

/// How far into a response a barge-in truncates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncationMode {
    /// Truncate at offset 0, discarding the whole response (default).
    /// Abrupt but safe: nothing stale can play after the cut.
    #[default]
    Immediate,
    /// Truncate at the computed playback offset, keeping what the caller
    /// already heard.
    Elapsed,
}

impl TruncationMode {
    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "elapsed" => Self::Elapsed,
            _ => Self::Immediate,
        }
    }
}

/// Resolved conversation inputs for one call.
///
/// Produced by an upstream prompt resolver from a language tag; the bridge
/// treats all of it as opaque input.
#[derive(Debug, Clone)]
pub struct CallProfile {
    /// System instructions for the assistant
    pub instructions: String,
    /// Language code (e.g. "en-US")
    pub language: String,
    /// Voice for spoken responses
    pub voice: Voice,
    /// Localized parting message spoken when the budget runs out
    pub goodbye: String,
}

/// Per-call bridge configuration.
///
/// Passed explicitly into the bridge constructor; bridges share nothing.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Estimated-token budget before the call is wound down
    pub session_budget: f64,
    /// Caller silence that ends their turn
    pub silence_threshold: Duration,
    /// Caller silence after which the call counts as dropped
    pub disconnect_threshold: Duration,
    /// Watchdog polling interval
    pub watchdog_interval: Duration,
    /// Pause between committing the input buffer and requesting a response
    pub response_trigger_delay: Duration,
    /// Time allowed for the goodbye message to flush before closing
    pub goodbye_flush: Duration,
    /// Barge-in truncation behavior
    pub truncation: TruncationMode,
    /// Parting message spoken when the budget runs out
    pub goodbye: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            session_budget: DEFAULT_SESSION_BUDGET,
            silence_threshold: SILENCE_THRESHOLD,
            disconnect_threshold: DISCONNECT_THRESHOLD,
            watchdog_interval: WATCHDOG_INTERVAL,
            response_trigger_delay: Duration::from_millis(100),
            goodbye_flush: Duration::from_secs(1),
            truncation: TruncationMode::default(),
            goodbye: "I apologize, but our conversation time has ended. \
                      Please call again for further assistance."
                .to_string(),
        }
    }
}

/// The four channel endpoints one bridge instance drives.
pub struct BridgeChannels {
    /// Parsed frames arriving from the telephony socket
    pub telephony_rx: mpsc::Receiver<TelephonyFrame>,
    /// Outbound frames (and the close request) for the telephony sender task
    pub telephony_tx: mpsc::Sender<TelephonyRoute>,
    /// Parsed events arriving from the voice channel
    pub voice_rx: mpsc::Receiver<VoiceEvent>,
    /// Client events for the voice channel sender task
    pub voice_tx: mpsc::Sender<ClientEvent>,
}

// =============================================================================
// Error classification
// =============================================================================

/// How the outbound relay should react to a voice API error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceErrorKind {
    /// A response was requested while one was already active; benign race
    ActiveResponseRace,
    /// The input buffer was committed before enough audio accumulated;
    /// the watchdog may retry once more audio arrives
    BufferTooSmall,
    /// Anything else; reported, not fatal
    Other,
}

/// Classify a voice API error event.
///
/// Prefers the structured error code; the realtime protocol still reports
/// some conditions only as free text, so substring matching on the message
/// remains as the fallback, isolated here.
pub fn classify_voice_error(error: &VoiceApiError) -> VoiceErrorKind {
    if let Some(code) = error.code.as_deref() {
        match code {
            "conversation_already_has_active_response" => {
                return VoiceErrorKind::ActiveResponseRace;
            }
            "input_audio_buffer_commit_empty" => return VoiceErrorKind::BufferTooSmall,
            _ => {}
        }
    }
    if error.message.contains("already has an active response") {
        VoiceErrorKind::ActiveResponseRace
    } else if error.message.contains("buffer too small") {
        VoiceErrorKind::BufferTooSmall
    } else {
        VoiceErrorKind::Other
    }
}

// =============================================================================
// Bridge
// =============================================================================

/// The bridge for one call.
pub struct MediaBridge {
    config: Arc<BridgeConfig>,
    state: Arc<SharedState>,
}

impl MediaBridge {
    /// Create a bridge with fresh stream state.
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: Arc::new(SharedState::new()),
        }
    }

    /// Handle to the shared stream state, for observation.
    pub fn state(&self) -> Arc<SharedState> {
        self.state.clone()
    }

    /// Run the bridge to completion.
    ///
    /// Returns once all three loops have stopped: after a `stop` frame,
    /// budget exhaustion, abandonment, or either channel closing.
    pub async fn run(self, channels: BridgeChannels) {
        let MediaBridge { config, state } = self;
        let BridgeChannels {
            telephony_rx,
            telephony_tx,
            voice_rx,
            voice_tx,
        } = channels;

        tokio::join!(
            inbound_relay(
                config.clone(),
                state.clone(),
                telephony_rx,
                voice_tx.clone(),
                telephony_tx.clone(),
            ),
            outbound_relay(
                config.clone(),
                state.clone(),
                voice_rx,
                voice_tx.clone(),
                telephony_tx.clone(),
            ),
            silence_watchdog(config.clone(), state.clone(), voice_tx, telephony_tx),
        );

        if let Some(session) = state.end_stream() {
            info!(
                stream_sid = session.id(),
                estimated_usage = session.usage_count(),
                "Bridge finished"
            );
        } else {
            info!("Bridge finished");
        }
    }
}

// =============================================================================
// Inbound relay (telephony -> voice)
// =============================================================================

async fn inbound_relay(
    config: Arc<BridgeConfig>,
    state: Arc<SharedState>,
    mut frames: mpsc::Receiver<TelephonyFrame>,
    voice_tx: mpsc::Sender<ClientEvent>,
    telephony_tx: mpsc::Sender<TelephonyRoute>,
) {
    let shutdown = state.shutdown_token();
    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => {
                    // Telephony socket closed underneath us.
                    debug!("Telephony stream ended");
                    state.end_stream();
                    state.deactivate();
                    break;
                }
            },
        };

        match frame {
            TelephonyFrame::Connected => {
                debug!("Telephony stream connected");
            }
            TelephonyFrame::Start { start } => {
                info!(stream_sid = %start.stream_sid, "Incoming stream started");
                let session = Session::new(start.stream_sid.clone(), config.session_budget);
                state.start_stream(start.stream_sid, session);
            }
            TelephonyFrame::Stop => {
                if let Some(session) = state.end_stream() {
                    info!(
                        stream_sid = session.id(),
                        estimated_usage = session.usage_count(),
                        "Call ended by telephony stop"
                    );
                }
                if state.deactivate() {
                    let _ = telephony_tx.send(TelephonyRoute::Close).await;
                }
                break;
            }
            TelephonyFrame::Media { media } => {
                state.note_media(media.timestamp);
                if state.session_active() {
                    let frame = TelephonyFrame::Media { media };
                    if let Some(event) = translate::frame_to_voice_event(&frame)
                        && voice_tx.send(event).await.is_err()
                    {
                        warn!("Voice channel closed while forwarding audio");
                        state.deactivate();
                        break;
                    }
                } else {
                    // Budget exhausted (or stream not started): keep
                    // acknowledging frames so the telephony side does not
                    // error while we wind down, but forward nothing.
                    debug!("Dropping inbound audio for inactive session");
                }
            }
            TelephonyFrame::Mark { mark } => {
                debug!(name = %mark.name, "Mark acknowledged");
                state.pop_ack();
            }
        }
    }
}

// =============================================================================
// Outbound relay (voice -> telephony)
// =============================================================================

async fn outbound_relay(
    config: Arc<BridgeConfig>,
    state: Arc<SharedState>,
    mut events: mpsc::Receiver<VoiceEvent>,
    voice_tx: mpsc::Sender<ClientEvent>,
    telephony_tx: mpsc::Sender<TelephonyRoute>,
) {
    let shutdown = state.shutdown_token();
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    debug!("Voice channel ended");
                    if state.deactivate() {
                        let _ = telephony_tx.send(TelephonyRoute::Close).await;
                    }
                    break;
                }
            },
        };

        match &event {
            VoiceEvent::SessionCreated { session } => {
                info!(voice_session = %session.id, "Voice session created");
            }
            VoiceEvent::SessionUpdated { session } => {
                debug!(voice_session = %session.id, "Voice session updated");
            }
            VoiceEvent::ContentPart { content } => {
                if state.record_usage(content) == Some(false) {
                    end_call(&config, &state, &voice_tx, &telephony_tx).await;
                }
            }
            VoiceEvent::ContentDone => {
                debug!("Response content complete");
            }
            VoiceEvent::ResponseStarted => {
                state.begin_response();
            }
            VoiceEvent::ResponseDone { response } => {
                state.end_response();
                if let Some(usage) = response.as_ref().and_then(|r| r.usage.as_ref()) {
                    debug!(
                        total_tokens = usage.total_tokens,
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        "Voice API reported usage"
                    );
                }
            }
            VoiceEvent::AudioDelta { item_id, .. } => {
                let Some(stream_sid) = state.stream_sid() else {
                    debug!("Audio delta before stream start, dropping");
                    continue;
                };
                if let Some(frame) = translate::event_to_media_frame(&event, &stream_sid)
                    && telephony_tx
                        .send(TelephonyRoute::Frame(frame))
                        .await
                        .is_err()
                {
                    state.deactivate();
                    break;
                }
                state.note_audio_delta(item_id.as_deref());
                // Boundary marker: lets us learn when the far end has
                // finished playing the audio buffered so far.
                if telephony_tx
                    .send(TelephonyRoute::Frame(OutboundFrame::mark(&stream_sid)))
                    .await
                    .is_ok()
                {
                    state.push_ack(RESPONSE_MARK);
                } else {
                    state.deactivate();
                    break;
                }
            }
            VoiceEvent::SpeechStarted { .. } => {
                debug!("Caller speech detected");
                if let Some(snapshot) = state.begin_interrupt() {
                    let audio_end_ms = match config.truncation {
                        TruncationMode::Immediate => 0,
                        TruncationMode::Elapsed => snapshot.elapsed_ms,
                    };
                    debug!(
                        item_id = %snapshot.item_id,
                        elapsed_ms = snapshot.elapsed_ms,
                        audio_end_ms,
                        "Barge-in, truncating in-flight response"
                    );
                    let _ = voice_tx
                        .send(ClientEvent::truncate(&snapshot.item_id, audio_end_ms))
                        .await;
                    if let Some(stream_sid) = state.stream_sid() {
                        let _ = telephony_tx
                            .send(TelephonyRoute::Frame(OutboundFrame::clear(&stream_sid)))
                            .await;
                    }
                }
            }
            VoiceEvent::SpeechStopped { .. } => {
                debug!("Caller speech stopped");
            }
            VoiceEvent::Committed { item_id } => {
                debug!(?item_id, "Input audio buffer committed");
            }
            VoiceEvent::RateLimitsUpdated { rate_limits } => {
                for limit in rate_limits {
                    debug!(
                        name = %limit.name,
                        remaining = limit.remaining,
                        limit = limit.limit,
                        "Rate limit updated"
                    );
                }
            }
            VoiceEvent::Error { error } => match classify_voice_error(error) {
                VoiceErrorKind::ActiveResponseRace => {
                    debug!("Ignoring duplicate response request");
                }
                VoiceErrorKind::BufferTooSmall => {
                    debug!("Commit rejected, waiting for more audio");
                    state.end_response();
                }
                VoiceErrorKind::Other => {
                    warn!(code = ?error.code, "Voice API error: {}", error.message);
                }
            },
        }
    }
}

/// End-of-session procedure: speak the goodbye, give it a moment to flush,
/// then close the telephony connection. Runs at most once per call.
async fn end_call(
    config: &BridgeConfig,
    state: &SharedState,
    voice_tx: &mpsc::Sender<ClientEvent>,
    telephony_tx: &mpsc::Sender<TelephonyRoute>,
) {
    if !state.deactivate() {
        return;
    }
    info!("Session budget exhausted, ending call");
    let _ = voice_tx.send(ClientEvent::goodbye(&config.goodbye)).await;
    tokio::time::sleep(config.goodbye_flush).await;
    let _ = telephony_tx.send(TelephonyRoute::Close).await;
}

// =============================================================================
// Silence watchdog
// =============================================================================

async fn silence_watchdog(
    config: Arc<BridgeConfig>,
    state: Arc<SharedState>,
    voice_tx: mpsc::Sender<ClientEvent>,
    telephony_tx: mpsc::Sender<TelephonyRoute>,
) {
    let shutdown = state.shutdown_token();
    let mut ticker = tokio::time::interval(config.watchdog_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match state.watchdog_tick(config.silence_threshold, config.disconnect_threshold) {
            WatchdogVerdict::Idle => {}
            WatchdogVerdict::Abandon => {
                if let Some(session) = state.end_stream() {
                    warn!(
                        stream_sid = session.id(),
                        "No media for {:?}, assuming the call was dropped",
                        config.disconnect_threshold
                    );
                }
                if state.deactivate() {
                    let _ = telephony_tx.send(TelephonyRoute::Close).await;
                }
                break;
            }
            WatchdogVerdict::TriggerResponse => {
                debug!("Caller went quiet, requesting a response");
                if voice_tx.send(ClientEvent::InputAudioBufferCommit).await.is_err() {
                    state.deactivate();
                    break;
                }
                tokio::time::sleep(config.response_trigger_delay).await;
                if voice_tx.send(ClientEvent::ResponseCreate).await.is_err() {
                    state.deactivate();
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
