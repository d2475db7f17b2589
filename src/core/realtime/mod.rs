//! Realtime voice API channel.
//!
//! The bridge's upstream side: a duplex WebSocket to the conversational
//! voice API, initialized with instructions/voice/turn-detection
//! configuration and exchanging JSON control and audio events.
//!
//! # Example
//!
//! ```rust,ignore
//! use callbridge::core::realtime::{self, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = SessionOptions::new("sk-...", "Keep answers to one sentence.");
//!     let mut link = realtime::connect(&options).await.unwrap();
//!
//!     while let Some(event) = link.events.recv().await {
//!         println!("{event:?}");
//!     }
//! }
//! ```

mod client;
mod config;
mod messages;

pub use client::{VoiceError, VoiceLink, VoiceResult, connect};
pub use config::{
    AudioFormat, REALTIME_HOST, REALTIME_URL, RealtimeModel, SessionOptions, VadSettings, Voice,
};
pub use messages::{
    AssistantItem, ClientEvent, RateLimit, ResponseSummary, SessionConfig, SessionInfo,
    TurnDetection, Usage, VoiceApiError, VoiceEvent,
};
