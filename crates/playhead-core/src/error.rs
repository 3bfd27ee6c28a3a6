//! Error types for Playhead Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Ad resolution errors (recovered locally, playback falls back to primary)
    #[error("Failed to fetch VAST document: {0}")]
    VastFetch(String),

    #[error("Failed to parse VAST document: {0}")]
    VastParse(String),

    #[error("Invalid media URL: {0}")]
    InvalidMediaUrl(String),

    // Provider errors
    #[error("Playback format not supported by provider: {provider}")]
    UnsupportedFormat { provider: String },

    #[error("No provider adapter attached")]
    NoProvider,

    #[error("Timed out waiting for provider readiness")]
    ProviderReadyTimeout,

    #[error("Programmatic autoplay rejected by platform policy")]
    AutoplayBlocked,

    // Playback errors
    #[error("Invalid playback state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("No media cued")]
    NothingCued,

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error ends the playback session.
    ///
    /// Ad resolution failures, autoplay rejection, and readiness timeouts are
    /// all recovered locally; only a provider that cannot play the format at
    /// all is fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::UnsupportedFormat { .. })
    }

    /// Returns the error code for event payloads
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::VastFetch(_) => "VAST_FETCH",
            Error::VastParse(_) => "VAST_PARSE",
            Error::InvalidMediaUrl(_) => "INVALID_MEDIA_URL",
            Error::UnsupportedFormat { .. } => "FORMAT_UNSUPPORTED",
            Error::NoProvider => "NO_PROVIDER",
            Error::ProviderReadyTimeout => "PROVIDER_READY_TIMEOUT",
            Error::AutoplayBlocked => "AUTOPLAY_BLOCKED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::NothingCued => "NOTHING_CUED",
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Internal(_) => "INTERNAL",
            Error::Io(_) => "IO",
        }
    }
}
