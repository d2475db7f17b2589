//! Realtime voice API configuration types.
//!
//! This module contains the connection-time configuration for the voice
//! channel: model and voice selection, audio format, and the per-call
//! session options the initialization event is built from.

use serde::{Deserialize, Serialize};

use super::messages::{SessionConfig, TurnDetection};

/// Realtime API WebSocket endpoint.
pub const REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Host header value for the realtime endpoint.
pub const REALTIME_HOST: &str = "api.openai.com";

// =============================================================================
// Models
// =============================================================================

/// Supported realtime models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RealtimeModel {
    /// GPT-4o Realtime Preview 2024-10-01
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview-2024-10-01")]
    Gpt4oRealtimePreview20241001,
    /// GPT-4o Realtime Preview (floating alias)
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
}

impl RealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview20241001 => "gpt-4o-realtime-preview-2024-10-01",
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "gpt-4o-realtime-preview-2024-10-01" => Self::Gpt4oRealtimePreview20241001,
            "gpt-4o-realtime-preview" => Self::Gpt4oRealtimePreview,
            "gpt-4o-mini-realtime-preview" => Self::Gpt4oMiniRealtimePreview,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for RealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Available voices for spoken responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    /// Ash voice
    Ash,
    /// Ballad voice
    Ballad,
    /// Coral voice
    Coral,
    /// Echo voice
    Echo,
    /// Sage voice
    Sage,
    /// Shimmer voice
    Shimmer,
    /// Verse voice
    Verse,
}

impl Voice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "alloy" => Self::Alloy,
            "ash" => Self::Ash,
            "ballad" => Self::Ballad,
            "coral" => Self::Coral,
            "echo" => Self::Echo,
            "sage" => Self::Sage,
            "shimmer" => Self::Shimmer,
            "verse" => Self::Verse,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for Voice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Audio Formats
// =============================================================================

/// Audio formats the voice channel can be initialized with.
///
/// The telephony side delivers G.711 mu-law, so that is the default in both
/// directions; the bridge passes payloads through without transcoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioFormat {
    /// G.711 mu-law (default, matches the telephony media stream)
    #[default]
    #[serde(rename = "g711_ulaw")]
    G711Ulaw,
    /// G.711 A-law
    #[serde(rename = "g711_alaw")]
    G711Alaw,
    /// PCM 16-bit, 24kHz, mono, little-endian
    #[serde(rename = "pcm16")]
    Pcm16,
}

impl AudioFormat {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G711Ulaw => "g711_ulaw",
            Self::G711Alaw => "g711_alaw",
            Self::Pcm16 => "pcm16",
        }
    }
}

// =============================================================================
// Session Options
// =============================================================================

/// Voice activity detection settings sent with the initialization event.
///
/// The thresholds are deliberately eager: the bridge runs its own
/// silence-based turn taking and only relies on the server VAD for the
/// speech-started barge-in signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadSettings {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,
    /// Audio included before detected speech (ms)
    pub prefix_padding_ms: u32,
    /// Silence ending a detected utterance (ms)
    pub silence_duration_ms: u32,
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            prefix_padding_ms: 11,
            silence_duration_ms: 10,
        }
    }
}

/// Per-call options for opening the voice channel.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// API key for authentication
    pub api_key: String,
    /// Model to use
    pub model: RealtimeModel,
    /// Voice for spoken responses
    pub voice: Voice,
    /// System instructions for the assistant
    pub instructions: String,
    /// Audio format in both directions
    pub audio_format: AudioFormat,
    /// Sampling temperature
    pub temperature: f32,
    /// Server VAD settings
    pub vad: VadSettings,
}

impl SessionOptions {
    /// Create options with the given credentials and instructions, using
    /// defaults for everything else.
    pub fn new(api_key: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: RealtimeModel::default(),
            voice: Voice::default(),
            instructions: instructions.into(),
            audio_format: AudioFormat::default(),
            temperature: 0.8,
            vad: VadSettings::default(),
        }
    }

    /// Build the WebSocket URL with the model parameter.
    pub fn ws_url(&self) -> String {
        format!("{}?model={}", REALTIME_URL, self.model.as_str())
    }

    /// Build the initialization payload for the `session.update` event.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: self.instructions.clone(),
            voice: self.voice.as_str().to_string(),
            input_audio_format: self.audio_format.as_str().to_string(),
            output_audio_format: self.audio_format.as_str().to_string(),
            turn_detection: TurnDetection::ServerVad {
                threshold: self.vad.threshold,
                prefix_padding_ms: self.vad.prefix_padding_ms,
                silence_duration_ms: self.vad.silence_duration_ms,
                create_response: true,
                interrupt_response: true,
            },
            temperature: self.temperature,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_round_trip() {
        assert_eq!(
            RealtimeModel::from_str_or_default("gpt-4o-mini-realtime-preview"),
            RealtimeModel::Gpt4oMiniRealtimePreview
        );
        assert_eq!(
            RealtimeModel::from_str_or_default("something-else"),
            RealtimeModel::default()
        );
    }

    #[test]
    fn test_voice_parsing() {
        assert_eq!(Voice::from_str_or_default("sage"), Voice::Sage);
        assert_eq!(Voice::from_str_or_default("SHIMMER"), Voice::Shimmer);
        assert_eq!(Voice::from_str_or_default("robotic"), Voice::Alloy);
    }

    #[test]
    fn test_default_audio_format_is_ulaw() {
        assert_eq!(AudioFormat::default().as_str(), "g711_ulaw");
    }

    #[test]
    fn test_ws_url_contains_model() {
        let options = SessionOptions::new("sk-test", "Be brief.");
        let url = options.ws_url();
        assert!(url.starts_with("wss://api.openai.com/v1/realtime?model="));
        assert!(url.contains("gpt-4o-realtime-preview-2024-10-01"));
    }

    #[test]
    fn test_session_config_defaults() {
        let options = SessionOptions::new("sk-test", "Be brief.");
        let config = options.session_config();
        assert_eq!(config.voice, "alloy");
        assert_eq!(config.input_audio_format, "g711_ulaw");
        assert_eq!(config.output_audio_format, "g711_ulaw");
        assert_eq!(config.temperature, 0.8);
        assert_eq!(config.modalities, vec!["text", "audio"]);
    }
}
