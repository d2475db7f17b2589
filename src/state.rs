//! Shared application state.

use crate::config::ServerConfig;
use crate::core::bridge::CallProfile;
use crate::core::realtime::Voice;

/// State shared across request handlers.
///
/// Each media-stream connection builds its own per-call context from this;
/// nothing here is mutated after startup, so handlers share it through a
/// plain `Arc`.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
}

impl AppState {
    /// Create application state from loaded configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Resolve the conversation profile for one call.
    ///
    /// This is the seam where an upstream prompt resolver would plug in;
    /// here it is a pure lookup over the configured defaults, with the
    /// caller's query parameters overriding language and voice.
    pub fn call_profile(&self, language: Option<&str>, voice: Option<&str>) -> CallProfile {
        CallProfile {
            instructions: self.config.instructions.clone(),
            language: language.unwrap_or(&self.config.language).to_string(),
            voice: voice
                .map(Voice::from_str_or_default)
                .unwrap_or(self.config.voice),
            goodbye: self.config.goodbye.clone(),
        }
    }
}
