//! Error types for the warteg gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the warteg gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Required platform capability is missing (e.g. no audio device)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A listening session is already active
    #[error("listening session already active")]
    ListeningActive,

    /// Audio error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// AI live session transport failure
    #[error("AI stream error: {0}")]
    AiStream(String),

    /// Non-JSON or schema-invalid AI output
    #[error("command parse error: {0}")]
    CommandParse(String),

    /// REST backend returned a non-success status
    #[error("network error: {0}")]
    Network(String),

    /// Push connection error (open failure, exhausted reconnects)
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
