//! TOML configuration file loading
//!
//! Supports `~/.config/warteg/gateway/config.toml` as a persistent config
//! source. All fields are optional, the file is a partial overlay on top of
//! defaults; environment variables override both.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct WartegConfigFile {
    /// Backend REST API configuration
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Voice pipeline configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Push channel configuration
    #[serde(default)]
    pub push: PushFileConfig,

    /// Generative AI live session configuration
    #[serde(default)]
    pub ai: AiFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Backend REST API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// Base URL of the warteg backend (e.g. `https://api.warteg.example`)
    pub base_url: Option<String>,

    /// Bearer token for authenticated endpoints
    pub token: Option<String>,

    /// Stall owner identifier stamped on push messages
    pub user_id: Option<String>,
}

/// Voice pipeline configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// BCP 47 recognition language (e.g. "id-ID")
    pub language: Option<String>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy", or an ElevenLabs voice id)
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Playback volume, 0.0 to 1.0
    pub volume: Option<f32>,
}

/// Push channel configuration
#[derive(Debug, Default, Deserialize)]
pub struct PushFileConfig {
    /// WebSocket URL (e.g. `wss://api.warteg.example/ws`)
    pub url: Option<String>,

    /// Seconds between heartbeat pings
    pub heartbeat_interval_secs: Option<u64>,

    /// Seconds between reconnect attempts
    pub reconnect_interval_secs: Option<u64>,

    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: Option<u32>,

    /// Offline queue capacity
    pub queue_capacity: Option<usize>,
}

/// Generative AI live session configuration
#[derive(Debug, Default, Deserialize)]
pub struct AiFileConfig {
    /// Live session WebSocket URL
    pub live_url: Option<String>,

    /// Model identifier for command parsing
    pub model: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `WartegConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
pub fn load_config_file() -> WartegConfigFile {
    let Some(path) = config_file_path() else {
        return WartegConfigFile::default();
    };

    if !path.exists() {
        return WartegConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                WartegConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            WartegConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/warteg/gateway/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| {
        d.config_dir()
            .join("warteg")
            .join("gateway")
            .join("config.toml")
    })
}
