//! Warteg Gateway - voice-driven management client for food stalls
//!
//! This library provides the core functionality for the warteg gateway:
//! - Voice command pipeline (capture, STT, AI command parsing, TTS)
//! - Push channel to the warteg backend over WebSocket
//! - Local sales prediction engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        Voice (mic/speaker)   │   CLI tools          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Warteg Gateway                       │
//! │  Daemon │ Speech Session │ Command Parser │ Predict │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Warteg Backend                       │
//! │   REST API  │  Push (WebSocket)  │  AI live proxy   │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod predict;
pub mod push;
pub mod voice;

pub use api::ApiClient;
pub use command::{dispatch, Backend, CommandParser, Dispatched, ParsedCommand, TokenProvider};
pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use predict::{predict, predict_all, Prediction, SalesRecord, Trend};
pub use push::{
    ConnectionStatus, Envelope, EnvelopeKind, PushClient, PushConfig, SendOutcome, Subscription,
};
pub use voice::{SessionState, SpeechSession, VoiceCommand};
