//! Server configuration.
//!
//! Configuration comes from environment variables (with `.env` support via
//! dotenvy in `main`). A missing voice API credential is fatal at startup:
//! the server refuses to start rather than accept calls it cannot bridge.
//!
//! # Example
//! ```rust,no_run
//! use callbridge::config::ServerConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::core::bridge::{BridgeConfig, DEFAULT_SESSION_BUDGET, TruncationMode};
use crate::core::realtime::{RealtimeModel, Voice};

/// Default system instructions when none are configured.
const DEFAULT_INSTRUCTIONS: &str =
    "You are a helpful voice assistant. Keep your answers limited to one or two sentences, \
     concise and effective. Be as polite, warm, and helpful as possible.";

/// Default parting message when none is configured.
const DEFAULT_GOODBYE: &str =
    "I apologize, but our conversation time has ended. Please call again for further assistance.";

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    /// An environment variable holds an unusable value
    #[error("Invalid value for {var}: {message}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What was wrong with it
        message: String,
    },
}

/// Server configuration.
///
/// Contains everything needed to run the bridge server: listen address,
/// voice API credentials and defaults, the per-call budget and timing
/// thresholds, and security settings (CORS, rate limiting).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    /// OpenAI API key for the realtime voice channel (required)
    pub openai_api_key: String,
    /// Realtime model to open voice sessions with
    pub model: RealtimeModel,

    // Per-call conversation defaults; a real prompt resolver upstream may
    // override these per language
    /// Default voice for spoken responses
    pub voice: Voice,
    /// Default language code
    pub language: String,
    /// Default system instructions
    pub instructions: String,
    /// Default parting message
    pub goodbye: String,

    // Bridge tuning
    /// Estimated-token budget per call
    pub session_token_budget: f64,
    /// Caller silence ending their turn (ms)
    pub silence_threshold_ms: u64,
    /// Caller silence after which the call counts as dropped (ms)
    pub disconnect_threshold_ms: u64,
    /// Barge-in truncation behavior
    pub truncation: TruncationMode,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: u32,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openai_api_key =
            env::var("OPENAI_API_KEY").map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY"))?;
        if openai_api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar("OPENAI_API_KEY"));
        }

        let config = Self {
            host: env_or("HOST", "0.0.0.0"),
            port: parse_var("PORT", 8080)?,
            openai_api_key,
            model: RealtimeModel::from_str_or_default(&env_or("REALTIME_MODEL", "")),
            voice: Voice::from_str_or_default(&env_or("VOICE", "alloy")),
            language: env_or("LANGUAGE", "en-US"),
            instructions: env_or("SYSTEM_INSTRUCTIONS", DEFAULT_INSTRUCTIONS),
            goodbye: env_or("GOODBYE_MESSAGE", DEFAULT_GOODBYE),
            session_token_budget: parse_var("SESSION_TOKEN_BUDGET", DEFAULT_SESSION_BUDGET)?,
            silence_threshold_ms: parse_var("SILENCE_THRESHOLD_MS", 500)?,
            disconnect_threshold_ms: parse_var("DISCONNECT_THRESHOLD_MS", 5000)?,
            truncation: TruncationMode::from_str_or_default(&env_or("TRUNCATION_MODE", "")),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            rate_limit_requests_per_second: parse_var("RATE_LIMIT_RPS", 60)?,
            rate_limit_burst_size: parse_var("RATE_LIMIT_BURST", 10)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// The socket address string the server binds to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Build the per-call bridge configuration from the server settings.
    pub fn bridge_config(&self, goodbye: String) -> BridgeConfig {
        BridgeConfig {
            session_budget: self.session_token_budget,
            silence_threshold: Duration::from_millis(self.silence_threshold_ms),
            disconnect_threshold: Duration::from_millis(self.disconnect_threshold_ms),
            truncation: self.truncation,
            goodbye,
            ..BridgeConfig::default()
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_token_budget <= 0.0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TOKEN_BUDGET",
                message: "budget must be positive".to_string(),
            });
        }
        if self.silence_threshold_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "SILENCE_THRESHOLD_MS",
                message: "threshold must be positive".to_string(),
            });
        }
        if self.disconnect_threshold_ms <= self.silence_threshold_ms {
            return Err(ConfigError::Invalid {
                var: "DISCONNECT_THRESHOLD_MS",
                message: "disconnect threshold must exceed the silence threshold".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

// =============================================================================
// Tests
// =============================================================================
