//! HTTP and WebSocket request handlers
//!
//! - `api` - health check endpoint
//! - `media_stream` - telephony media-stream WebSocket (one bridge per call)

pub mod api;
pub mod media_stream;

// Re-export commonly used handlers for convenient access
pub use media_stream::media_stream_handler;
