pub mod bridge;
pub mod realtime;
pub mod telephony;

// Re-export commonly used types for convenience
pub use bridge::{
    BridgeChannels, BridgeConfig, CallProfile, MediaBridge, Session, SharedState, TruncationMode,
};
pub use realtime::{
    ClientEvent, RealtimeModel, SessionOptions, Voice, VoiceError, VoiceEvent, VoiceLink,
};
pub use telephony::{OutboundFrame, TelephonyFrame, TelephonyRoute};
