//! Realtime voice API WebSocket event types.
//!
//! All events are JSON-encoded and exchanged over the voice channel.
//!
//! Client events (sent to the API):
//! - session.update - initialize/update session configuration
//! - input_audio_buffer.append - append caller audio to the input buffer
//! - input_audio_buffer.commit - commit the input buffer as a turn
//! - response.create - request a spoken response
//! - conversation.item.truncate - cut a playing response short (barge-in)
//! - conversation.item.add - inject an assistant-authored item (goodbye)
//!
//! Server events (received from the API):
//! - session.created / session.updated
//! - response.content.part / response.content.done
//! - response.create.done (response generation started)
//! - response.done (response generation finished, carries usage)
//! - response.audio.delta (one chunk of assistant audio)
//! - input_audio_buffer.speech_started / speech_stopped / committed
//! - rate_limits.updated
//! - error

use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Payload of the `session.update` initialization event.
///
/// Unlike a general-purpose client, the bridge always initializes every
/// field, so none of them are optional here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    pub modalities: Vec<String>,
    /// System instructions for the assistant
    pub instructions: String,
    /// Voice for audio output
    pub voice: String,
    /// Input audio format
    pub input_audio_format: String,
    /// Output audio format
    pub output_audio_format: String,
    /// Turn detection configuration
    pub turn_detection: TurnDetection,
    /// Sampling temperature
    pub temperature: f32,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        threshold: f32,
        /// Audio prefix padding in ms
        prefix_padding_ms: u32,
        /// Silence duration in ms
        silence_duration_ms: u32,
        /// Whether the server creates a response on turn end
        create_response: bool,
        /// Whether detected speech interrupts a playing response
        interrupt_response: bool,
    },
}

// =============================================================================
// Client Events (sent to the API)
// =============================================================================

/// Client events sent over the voice channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Initialize or update the session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append caller audio to the input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio, passed through opaque
        audio: String,
    },

    /// Commit the input audio buffer as the caller's turn
    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    /// Request a spoken response
    #[serde(rename = "response.create")]
    ResponseCreate,

    /// Cut a previously started response short
    #[serde(rename = "conversation.item.truncate")]
    ConversationItemTruncate {
        /// Item to truncate
        item_id: String,
        /// Content index within the item
        content_index: u32,
        /// Playback offset to cut at, in ms
        audio_end_ms: u64,
    },

    /// Inject an assistant-authored conversation item
    #[serde(rename = "conversation.item.add")]
    ConversationItemAdd {
        /// Item to add
        item: AssistantItem,
    },
}

/// An assistant-authored conversation item, used for the parting message
/// sent before teardown.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantItem {
    /// Item role (always "assistant")
    pub role: String,
    /// Spoken content
    pub content: String,
}

impl ClientEvent {
    /// Build an audio append event from an opaque base64 payload.
    pub fn audio_append(payload: String) -> Self {
        ClientEvent::InputAudioBufferAppend { audio: payload }
    }

    /// Build a truncate event for the given item.
    pub fn truncate(item_id: &str, audio_end_ms: u64) -> Self {
        ClientEvent::ConversationItemTruncate {
            item_id: item_id.to_string(),
            content_index: 0,
            audio_end_ms,
        }
    }

    /// Build the assistant-authored goodbye item.
    pub fn goodbye(message: &str) -> Self {
        ClientEvent::ConversationItemAdd {
            item: AssistantItem {
                role: "assistant".to_string(),
                content: message.to_string(),
            },
        }
    }
}

// =============================================================================
// Server Events (received from the API)
// =============================================================================

/// Server events received over the voice channel.
///
/// Only the events the bridge reacts to are modeled; anything else fails to
/// parse and is dropped with a diagnostic at the channel boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum VoiceEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: VoiceApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: SessionInfo,
    },

    /// Session configuration updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: SessionInfo,
    },

    /// One chunk of response text content
    #[serde(rename = "response.content.part")]
    ContentPart {
        /// Text content of the chunk
        #[serde(default)]
        content: String,
    },

    /// Response content complete
    #[serde(rename = "response.content.done")]
    ContentDone,

    /// Response generation started
    #[serde(rename = "response.create.done")]
    ResponseStarted,

    /// Response generation finished
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response summary, including authoritative usage when reported
        #[serde(default)]
        response: Option<ResponseSummary>,
    },

    /// One chunk of assistant audio
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded audio, passed through opaque
        delta: String,
        /// Spoken item this chunk belongs to
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Caller started speaking (barge-in signal)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        /// Audio offset of detected speech, in ms
        #[serde(default)]
        audio_start_ms: Option<u64>,
        /// Item the detected speech belongs to
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Caller stopped speaking
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        /// Audio offset of detected silence, in ms
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    /// Input audio buffer committed
    #[serde(rename = "input_audio_buffer.committed")]
    Committed {
        /// Item the committed audio became
        #[serde(default)]
        item_id: Option<String>,
    },

    /// Rate limits updated
    #[serde(rename = "rate_limits.updated")]
    RateLimitsUpdated {
        /// Rate limit information
        #[serde(default)]
        rate_limits: Vec<RateLimit>,
    },
}

impl VoiceEvent {
    /// Parse one event of wire text.
    ///
    /// Unknown event types and malformed payloads are absorbed here with a
    /// diagnostic; a single bad event must not tear down the call.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!("Skipping unhandled or malformed voice event: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    /// Structured error code, when the API provides one
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable error message
    pub message: String,
}

/// Minimal session information.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionInfo {
    /// Session ID
    pub id: String,
}

/// Summary of a finished response.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseSummary {
    /// Response ID
    #[serde(default)]
    pub id: Option<String>,
    /// Authoritative usage figures, when reported
    #[serde(default)]
    pub usage: Option<Usage>,
}

/// Usage information reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Total tokens
    #[serde(default)]
    pub total_tokens: u64,
    /// Input tokens
    #[serde(default)]
    pub input_tokens: u64,
    /// Output tokens
    #[serde(default)]
    pub output_tokens: u64,
}

/// Rate limit information.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimit {
    /// Rate limit name
    pub name: String,
    /// Limit value
    pub limit: u64,
    /// Remaining value
    pub remaining: u64,
    /// Seconds until the limit resets
    pub reset_seconds: f64,
}

// =============================================================================
// Tests
// =============================================================================
