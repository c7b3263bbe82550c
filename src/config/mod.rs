//! Configuration management for the warteg gateway
//!
//! Layered: built-in defaults, then the TOML config file, then `WARTEG_*`
//! environment variables.

pub mod file;

use std::time::Duration;

use crate::push::PushConfig;
use crate::voice::{SpeechToText, TextToSpeech};
use crate::{Error, Result};

use file::WartegConfigFile;

/// Warteg gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend REST API
    pub api: ApiConfig,

    /// Voice pipeline
    pub voice: VoiceConfig,

    /// Push channel
    pub push: PushSettings,

    /// Generative AI live session
    pub ai: AiConfig,
}

/// Backend REST API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the warteg backend
    pub base_url: String,

    /// Bearer token for authenticated endpoints
    pub token: Option<String>,

    /// Stall owner identifier stamped on push messages
    pub user_id: Option<String>,
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable voice input/output
    pub enabled: bool,

    /// BCP 47 recognition language
    pub language: String,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: String,

    /// STT model identifier
    pub stt_model: String,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: String,

    /// TTS model identifier
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier
    pub tts_speed: f32,

    /// Playback volume, 0.0 to 1.0
    pub volume: f32,

    /// `OpenAI` API key (Whisper STT, `OpenAI` TTS)
    pub openai_key: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs_key: Option<String>,

    /// Deepgram API key (optional STT)
    pub deepgram_key: Option<String>,
}

/// Push channel configuration
#[derive(Debug, Clone)]
pub struct PushSettings {
    /// WebSocket URL of the backend push endpoint
    pub url: String,

    /// Seconds between heartbeat pings
    pub heartbeat_interval_secs: u64,

    /// Seconds between reconnect attempts
    pub reconnect_interval_secs: u64,

    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,

    /// Offline queue capacity
    pub queue_capacity: usize,
}

/// Generative AI live session configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Live session WebSocket URL (backend proxy)
    pub live_url: String,

    /// Model identifier for command parsing
    pub model: String,
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a numeric environment override fails to parse
    pub fn load(disable_voice: bool) -> Result<Self> {
        let mut config = Self::from_file(file::load_config_file());
        config.apply_env()?;

        if disable_voice {
            config.voice.enabled = false;
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Build a config from a (possibly partial) file, filling defaults
    #[must_use]
    pub fn from_file(f: WartegConfigFile) -> Self {
        Self {
            api: ApiConfig {
                base_url: f
                    .api
                    .base_url
                    .unwrap_or_else(|| "http://localhost:3000".to_string()),
                token: f.api.token,
                user_id: f.api.user_id,
            },
            voice: VoiceConfig {
                enabled: f.voice.enabled.unwrap_or(true),
                language: f.voice.language.unwrap_or_else(|| "id-ID".to_string()),
                stt_provider: f
                    .voice
                    .stt_provider
                    .unwrap_or_else(|| "whisper".to_string()),
                stt_model: f.voice.stt_model.unwrap_or_else(|| "whisper-1".to_string()),
                tts_provider: f.voice.tts_provider.unwrap_or_else(|| "openai".to_string()),
                tts_model: f.voice.tts_model.unwrap_or_else(|| "tts-1".to_string()),
                tts_voice: f.voice.tts_voice.unwrap_or_else(|| "alloy".to_string()),
                tts_speed: f.voice.tts_speed.unwrap_or(1.0),
                volume: f.voice.volume.unwrap_or(1.0),
                openai_key: f.api_keys.openai,
                elevenlabs_key: f.api_keys.elevenlabs,
                deepgram_key: f.api_keys.deepgram,
            },
            push: PushSettings {
                url: f
                    .push
                    .url
                    .unwrap_or_else(|| "ws://localhost:3000/ws".to_string()),
                heartbeat_interval_secs: f.push.heartbeat_interval_secs.unwrap_or(30),
                reconnect_interval_secs: f.push.reconnect_interval_secs.unwrap_or(3),
                max_reconnect_attempts: f.push.max_reconnect_attempts.unwrap_or(5),
                queue_capacity: f.push.queue_capacity.unwrap_or(256),
            },
            ai: AiConfig {
                live_url: f
                    .ai
                    .live_url
                    .unwrap_or_else(|| "ws://localhost:3000/live".to_string()),
                model: f
                    .ai
                    .model
                    .unwrap_or_else(|| "gemini-2.0-flash-exp".to_string()),
            },
        }
    }

    /// Overlay `WARTEG_*` (and provider key) environment variables
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("WARTEG_API_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("WARTEG_API_TOKEN") {
            self.api.token = Some(v);
        }
        if let Ok(v) = std::env::var("WARTEG_USER_ID") {
            self.api.user_id = Some(v);
        }

        if let Ok(v) = std::env::var("WARTEG_WS_URL") {
            self.push.url = v;
        }
        if let Ok(v) = std::env::var("WARTEG_WS_MAX_RECONNECTS") {
            self.push.max_reconnect_attempts = v
                .parse()
                .map_err(|_| Error::Config(format!("invalid WARTEG_WS_MAX_RECONNECTS: {v}")))?;
        }

        if let Ok(v) = std::env::var("WARTEG_LIVE_URL") {
            self.ai.live_url = v;
        }
        if let Ok(v) = std::env::var("WARTEG_AI_MODEL") {
            self.ai.model = v;
        }

        if let Ok(v) = std::env::var("WARTEG_LANGUAGE") {
            self.voice.language = v;
        }
        if let Ok(v) = std::env::var("WARTEG_STT_PROVIDER") {
            self.voice.stt_provider = v;
        }
        if let Ok(v) = std::env::var("WARTEG_STT_MODEL") {
            self.voice.stt_model = v;
        }
        if let Ok(v) = std::env::var("WARTEG_TTS_PROVIDER") {
            self.voice.tts_provider = v;
        }
        if let Ok(v) = std::env::var("WARTEG_TTS_MODEL") {
            self.voice.tts_model = v;
        }
        if let Ok(v) = std::env::var("WARTEG_TTS_VOICE") {
            self.voice.tts_voice = v;
        }

        if let Ok(v) = std::env::var("OPENAI_API_KEY") {
            self.voice.openai_key = Some(v);
        }
        if let Ok(v) = std::env::var("ELEVENLABS_API_KEY") {
            self.voice.elevenlabs_key = Some(v);
        }
        if let Ok(v) = std::env::var("DEEPGRAM_API_KEY") {
            self.voice.deepgram_key = Some(v);
        }

        Ok(())
    }

    /// Build the push client configuration
    #[must_use]
    pub fn push_config(&self) -> PushConfig {
        PushConfig {
            url: self.push.url.clone(),
            heartbeat_interval: Duration::from_secs(self.push.heartbeat_interval_secs),
            reconnect_interval: Duration::from_secs(self.push.reconnect_interval_secs),
            max_reconnect_attempts: self.push.max_reconnect_attempts,
            stability_window: Duration::from_secs(5),
            queue_capacity: self.push.queue_capacity,
            user_id: self.api.user_id.clone(),
        }
    }
}

impl VoiceConfig {
    /// Build the configured speech recognizer.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or its API key is missing
    pub fn build_recognizer(&self) -> Result<SpeechToText> {
        match self.stt_provider.as_str() {
            "whisper" => SpeechToText::new_whisper(
                self.openai_key.clone().unwrap_or_default(),
                self.stt_model.clone(),
            ),
            "deepgram" => SpeechToText::new_deepgram(
                self.deepgram_key.clone().unwrap_or_default(),
                self.stt_model.clone(),
            ),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }

    /// Build the configured speech synthesizer.
    ///
    /// # Errors
    ///
    /// Returns error if the provider is unknown or its API key is missing
    pub fn build_synthesizer(&self) -> Result<TextToSpeech> {
        match self.tts_provider.as_str() {
            "openai" => TextToSpeech::new_openai(
                self.openai_key.clone().unwrap_or_default(),
                self.tts_voice.clone(),
                self.tts_speed,
                self.tts_model.clone(),
            ),
            "elevenlabs" => TextToSpeech::new_elevenlabs(
                self.elevenlabs_key.clone().unwrap_or_default(),
                self.tts_voice.clone(),
                self.tts_model.clone(),
            ),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_file(WartegConfigFile::default());

        assert_eq!(config.api.base_url, "http://localhost:3000");
        assert!(config.api.token.is_none());
        assert!(config.voice.enabled);
        assert_eq!(config.voice.language, "id-ID");
        assert_eq!(config.voice.stt_provider, "whisper");
        assert_eq!(config.push.heartbeat_interval_secs, 30);
        assert_eq!(config.push.reconnect_interval_secs, 3);
        assert_eq!(config.push.max_reconnect_attempts, 5);
        assert_eq!(config.push.queue_capacity, 256);
        assert_eq!(config.ai.model, "gemini-2.0-flash-exp");
    }

    #[test]
    fn file_values_override_defaults() {
        let file: WartegConfigFile = toml::from_str(
            r#"
            [push]
            url = "wss://api.warteg.example/ws"
            max_reconnect_attempts = 2

            [api]
            user_id = "owner-1"
            "#,
        )
        .unwrap();

        let config = Config::from_file(file);
        assert_eq!(config.push.url, "wss://api.warteg.example/ws");
        assert_eq!(config.push.max_reconnect_attempts, 2);

        let push = config.push_config();
        assert_eq!(push.max_reconnect_attempts, 2);
        assert_eq!(push.user_id.as_deref(), Some("owner-1"));
        assert_eq!(push.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    fn unknown_stt_provider_is_rejected() {
        let mut config = Config::from_file(WartegConfigFile::default());
        config.voice.stt_provider = "kaldi".to_string();
        assert!(config.voice.build_recognizer().is_err());
    }
}
