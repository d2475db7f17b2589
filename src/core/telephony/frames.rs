//! Telephony media-stream wire types.
//!
//! The phone side of the bridge speaks a JSON-per-frame protocol over a
//! persistent WebSocket. Inbound frames carry lifecycle signals and
//! base64-encoded caller audio; outbound frames carry assistant audio,
//! boundary markers, and playback-buffer control.
//!
//! # Protocol Overview
//!
//! Inbound frames (telephony -> bridge):
//! - `connected` - connection preamble, sent before `start`
//! - `start` - stream metadata, including the stream identifier
//! - `media` - one chunk of caller audio with a millisecond timestamp
//! - `mark` - acknowledgment that a previously sent mark finished playing
//! - `stop` - the call ended
//!
//! Outbound frames (bridge -> telephony):
//! - `media` - one chunk of assistant audio
//! - `mark` - boundary marker used to track playback progress
//! - `clear` - discard any buffered-but-unplayed assistant audio
//!
//! Audio payloads are treated as opaque base64 strings end to end; the
//! bridge never transcodes them.

use serde::{Deserialize, Serialize};

/// Label attached to every boundary marker the bridge emits.
pub const RESPONSE_MARK: &str = "responsePart";

// =============================================================================
// Inbound Frames (telephony -> bridge)
// =============================================================================

/// Frames received from the telephony media stream.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelephonyFrame {
    /// Connection preamble. Carries protocol metadata the bridge ignores.
    Connected,

    /// Stream start, delivered once before any media.
    Start {
        /// Stream metadata
        start: StreamStart,
    },

    /// One chunk of caller audio.
    Media {
        /// Audio chunk
        media: MediaChunk,
    },

    /// Acknowledgment that a mark the bridge sent has finished playing.
    Mark {
        /// Acknowledged marker
        mark: MarkLabel,
    },

    /// The call ended.
    Stop,
}

/// Metadata carried by a `start` frame.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamStart {
    /// Identifier correlating all frames of this stream
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
}

/// One chunk of inbound caller audio.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaChunk {
    /// Milliseconds on the telephony clock, non-decreasing within a stream
    pub timestamp: u64,
    /// Base64-encoded audio payload, passed through opaque
    pub payload: String,
}

/// Marker name carried by `mark` frames in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkLabel {
    /// Marker name
    pub name: String,
}

impl TelephonyFrame {
    /// Parse one frame of wire text.
    ///
    /// A malformed frame must not tear down the call, so parse failures are
    /// logged and absorbed here.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Discarding malformed telephony frame: {}", e);
                None
            }
        }
    }
}

// =============================================================================
// Outbound Frames (bridge -> telephony)
// =============================================================================

/// Frames the bridge sends back to the telephony media stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundFrame {
    /// One chunk of assistant audio.
    Media {
        /// Stream identifier
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Audio payload
        media: OutboundPayload,
    },

    /// Boundary marker; the far end echoes it back once playback reaches it.
    Mark {
        /// Stream identifier
        #[serde(rename = "streamSid")]
        stream_sid: String,
        /// Marker name
        mark: MarkLabel,
    },

    /// Discard any buffered-but-unplayed assistant audio immediately.
    Clear {
        /// Stream identifier
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

/// Payload of an outbound media frame.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundPayload {
    /// Base64-encoded audio payload
    pub payload: String,
}

impl OutboundFrame {
    /// Build an outbound media frame from an opaque base64 payload.
    pub fn media(stream_sid: &str, payload: String) -> Self {
        OutboundFrame::Media {
            stream_sid: stream_sid.to_string(),
            media: OutboundPayload { payload },
        }
    }

    /// Build a boundary marker frame.
    pub fn mark(stream_sid: &str) -> Self {
        OutboundFrame::Mark {
            stream_sid: stream_sid.to_string(),
            mark: MarkLabel {
                name: RESPONSE_MARK.to_string(),
            },
        }
    }

    /// Build a clear-playback-buffer frame.
    pub fn clear(stream_sid: &str) -> Self {
        OutboundFrame::Clear {
            stream_sid: stream_sid.to_string(),
        }
    }
}

// =============================================================================
// Routing
// =============================================================================

/// Messages routed to the telephony sender task.
///
/// The WebSocket sink is owned by a dedicated task; the bridge loops talk to
/// it through this enum so any of them can also request an orderly close.
#[derive(Debug)]
pub enum TelephonyRoute {
    /// Serialize and send one frame
    Frame(OutboundFrame),
    /// Close the telephony connection
    Close,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_frame() {
        let frame = TelephonyFrame::parse(
            r#"{"event":"start","sequenceNumber":"1","start":{"streamSid":"MZ123","callSid":"CA9"}}"#,
        )
        .unwrap();
        match frame {
            TelephonyFrame::Start { start } => assert_eq!(start.stream_sid, "MZ123"),
            _ => panic!("Wrong frame type"),
        }
    }

    #[test]
    fn test_parse_media_frame() {
        let frame = TelephonyFrame::parse(
            r#"{"event":"media","media":{"timestamp":100,"payload":"dGVzdA=="}}"#,
        )
        .unwrap();
        match frame {
            TelephonyFrame::Media { media } => {
                assert_eq!(media.timestamp, 100);
                assert_eq!(media.payload, "dGVzdA==");
            }
            _ => panic!("Wrong frame type"),
        }
    }

    #[test]
    fn test_parse_mark_and_stop() {
        let mark = TelephonyFrame::parse(r#"{"event":"mark","mark":{"name":"responsePart"}}"#);
        assert!(matches!(mark, Some(TelephonyFrame::Mark { .. })));

        let stop = TelephonyFrame::parse(r#"{"event":"stop"}"#);
        assert!(matches!(stop, Some(TelephonyFrame::Stop)));
    }

    #[test]
    fn test_parse_connected_preamble() {
        let frame =
            TelephonyFrame::parse(r#"{"event":"connected","protocol":"Call","version":"1.0.0"}"#);
        assert!(matches!(frame, Some(TelephonyFrame::Connected)));
    }

    #[test]
    fn test_parse_malformed_frame_yields_none() {
        assert!(TelephonyFrame::parse("not json").is_none());
        assert!(TelephonyFrame::parse(r#"{"event":"warp"}"#).is_none());
        assert!(TelephonyFrame::parse(r#"{"event":"media"}"#).is_none());
    }

    #[test]
    fn test_outbound_media_serialization() {
        let frame = OutboundFrame::media("MZ123", "dGVzdA==".to_string());
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""event":"media""#));
        assert!(json.contains(r#""streamSid":"MZ123""#));
        assert!(json.contains(r#""payload":"dGVzdA==""#));
    }

    #[test]
    fn test_outbound_mark_serialization() {
        let frame = OutboundFrame::mark("MZ123");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""event":"mark""#));
        assert!(json.contains(r#""name":"responsePart""#));
    }

    #[test]
    fn test_outbound_clear_serialization() {
        let frame = OutboundFrame::clear("MZ123");
        let json = serde_json::to_string(&frame).unwrap();
        assert_eq!(json, r#"{"event":"clear","streamSid":"MZ123"}"#);
    }
}
