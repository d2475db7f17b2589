//! Protocol translation between the two wire formats.
//!
//! Pure functions, no side effects. Lifecycle frames and non-audio events
//! map to nothing here; they drive state transitions in the relay loops
//! instead. Audio payloads cross as opaque base64 in both directions.

use crate::core::realtime::{ClientEvent, VoiceEvent};
use crate::core::telephony::{OutboundFrame, TelephonyFrame};

/// Map an inbound telephony frame to a voice-channel event.
///
/// Only `media` frames produce an event (`input_audio_buffer.append`).
pub fn frame_to_voice_event(frame: &TelephonyFrame) -> Option<ClientEvent> {
    match frame {
        TelephonyFrame::Media { media } => Some(ClientEvent::audio_append(media.payload.clone())),
        _ => None,
    }
}

/// Map a voice-channel event to an outbound telephony media frame.
///
/// Only `response.audio.delta` events produce a frame.
pub fn event_to_media_frame(event: &VoiceEvent, stream_sid: &str) -> Option<OutboundFrame> {
    match event {
        VoiceEvent::AudioDelta { delta, .. } => {
            Some(OutboundFrame::media(stream_sid, delta.clone()))
        }
        _ => None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::telephony::MediaChunk;

    #[test]
    fn test_media_frame_becomes_audio_append() {
        let frame = TelephonyFrame::Media {
            media: MediaChunk {
                timestamp: 100,
                payload: "dGVzdA==".to_string(),
            },
        };
        match frame_to_voice_event(&frame) {
            Some(ClientEvent::InputAudioBufferAppend { audio }) => assert_eq!(audio, "dGVzdA=="),
            other => panic!("Unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_lifecycle_frames_map_to_nothing() {
        assert!(frame_to_voice_event(&TelephonyFrame::Stop).is_none());
        assert!(frame_to_voice_event(&TelephonyFrame::Connected).is_none());
        let mark = TelephonyFrame::parse(r#"{"event":"mark","mark":{"name":"responsePart"}}"#);
        assert!(frame_to_voice_event(&mark.unwrap()).is_none());
    }

    #[test]
    fn test_audio_delta_becomes_media_frame() {
        let event = VoiceEvent::parse(
            r#"{"type":"response.audio.delta","delta":"dGVzdA==","item_id":"item_abc"}"#,
        )
        .unwrap();
        match event_to_media_frame(&event, "MZ1") {
            Some(OutboundFrame::Media { stream_sid, media }) => {
                assert_eq!(stream_sid, "MZ1");
                assert_eq!(media.payload, "dGVzdA==");
            }
            other => panic!("Unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn test_non_audio_events_map_to_nothing() {
        let done = VoiceEvent::parse(r#"{"type":"response.done"}"#).unwrap();
        assert!(event_to_media_frame(&done, "MZ1").is_none());

        let started =
            VoiceEvent::parse(r#"{"type":"input_audio_buffer.speech_started"}"#).unwrap();
        assert!(event_to_media_frame(&started, "MZ1").is_none());
    }
}
