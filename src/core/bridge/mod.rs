//! The telephony <-> voice-API media bridge.
//!
//! This module is the heart of the crate: everything with real concurrency,
//! timing-sensitive state, and a lifecycle lives here.
//!
//! - [`Session`] - per-call usage budget with a one-way inactive latch
//! - [`SharedState`] - the mutable stream state shared by the three loops
//! - [`translate`] - pure mapping between the two wire formats
//! - [`MediaBridge`] - the engine running the inbound relay, outbound
//!   relay, and silence watchdog for one call
//!
//! A bridge instance handles exactly one call and shares nothing with any
//! other instance.

mod engine;
mod session;
mod state;
pub mod translate;

pub use engine::{
    BridgeChannels, BridgeConfig, CallProfile, DEFAULT_SESSION_BUDGET, DISCONNECT_THRESHOLD,
    MediaBridge, SILENCE_THRESHOLD, TruncationMode, VoiceErrorKind, WATCHDOG_INTERVAL,
    classify_voice_error,
};
pub use session::{Session, TOKENS_PER_WORD, estimate_tokens};
pub use state::{InterruptSnapshot, SharedState, WatchdogVerdict};
