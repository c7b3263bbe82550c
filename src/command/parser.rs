//! Generative command parsing
//!
//! One AI live session is opened per transcript: a setup frame selects the
//! model with a text-only response modality, a single prompt is sent, and
//! streamed partial text is accumulated until the turn-complete signal.
//! The session socket is closed exactly once on every path. Retry policy
//! belongs to the caller, never to this module.
//!
//! [`parse_fallback`] is the local, non-AI alternative: regex pattern
//! matching over common Indonesian phrasings. Anything it cannot match
//! becomes `UNKNOWN` with the raw transcript preserved.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use regex::Regex;
use tokio_tungstenite::tungstenite::Message;

use crate::{Error, Result};

use super::types::{ParsedCommand, SaleItem, SalePayload, SocialPostPayload, StockPayload};

/// Prompt template; `{transcript}` is substituted before sending
const PROMPT_TEMPLATE: &str = "\
Kamu adalah asisten warteg. Ubah perintah suara berikut menjadi JSON dengan \
bentuk {\"action\": \"UPDATE_STOCK\" | \"RECORD_SALE\" | \"SOCIAL_POST\" | \"UNKNOWN\", \
\"payload\": {...}}. \
UPDATE_STOCK payload: {\"itemName\", \"quantity\", \"unit\"}. \
RECORD_SALE payload: {\"items\": [{\"itemName\", \"quantity\"}]}. \
SOCIAL_POST payload: {\"caption\"}. \
Jawab hanya dengan JSON. Perintah: \"{transcript}\"";

/// Supplies short-lived credentials for the live session.
///
/// Token refresh and expiry policy live with the auth subsystem; the parser
/// only asks for a usable token once per session.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Fetch an ephemeral token for opening a live session.
    async fn live_token(&self) -> Result<String>;
}

/// Parses transcripts through a generative-AI live session
#[derive(Debug, Clone)]
pub struct CommandParser {
    live_url: String,
    model: String,
}

impl CommandParser {
    /// Create a parser for the given live endpoint and model.
    #[must_use]
    pub fn new(live_url: &str, model: &str) -> Self {
        Self {
            live_url: live_url.to_string(),
            model: model.to_string(),
        }
    }

    /// Parse one transcript through a fresh live session.
    ///
    /// # Errors
    ///
    /// [`Error::AiStream`] on any session transport failure,
    /// [`Error::CommandParse`] when the accumulated output is not a valid
    /// command. The session is closed on both paths.
    pub async fn parse(
        &self,
        transcript: &str,
        tokens: &dyn TokenProvider,
    ) -> Result<ParsedCommand> {
        let token = tokens.live_token().await?;
        let url = format!("{}?access_token={token}", self.live_url);

        let (socket, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|e| Error::AiStream(format!("live session open failed: {e}")))?;
        let (mut sink, mut source) = socket.split();

        let outcome = drive_session(&mut sink, &mut source, &self.model, transcript).await;

        // Close exactly once, success or failure
        if let Err(e) = sink.close().await {
            tracing::debug!(error = %e, "live session close");
        }

        let text = outcome?;
        tracing::debug!(chars = text.len(), "live session turn complete");
        extract_command(&text)
    }

    /// Parse with the AI session, falling back to local pattern matching.
    ///
    /// Session and parse failures are logged, never surfaced: the caller
    /// always receives a command, possibly `UNKNOWN`.
    pub async fn parse_with_fallback(
        &self,
        transcript: &str,
        tokens: &dyn TokenProvider,
    ) -> ParsedCommand {
        match self.parse(transcript, tokens).await {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "AI parse failed, using local fallback");
                parse_fallback(transcript)
            }
        }
    }
}

type LiveStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type LiveSink = futures::stream::SplitSink<LiveStream, Message>;
type LiveSource = futures::stream::SplitStream<LiveStream>;

/// Send setup + prompt, then accumulate until the turn completes.
async fn drive_session(
    sink: &mut LiveSink,
    source: &mut LiveSource,
    model: &str,
    transcript: &str,
) -> Result<String> {
    let setup = serde_json::json!({
        "setup": {
            "model": model,
            "generationConfig": { "responseModalities": ["TEXT"] },
        }
    });
    sink.send(Message::Text(setup.to_string()))
        .await
        .map_err(|e| Error::AiStream(format!("setup send failed: {e}")))?;

    let prompt = PROMPT_TEMPLATE.replace("{transcript}", transcript);
    let content = serde_json::json!({
        "clientContent": {
            "turns": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "turnComplete": true,
        }
    });
    sink.send(Message::Text(content.to_string()))
        .await
        .map_err(|e| Error::AiStream(format!("prompt send failed: {e}")))?;

    let mut accumulator = TurnAccumulator::new();
    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(frame)) => {
                if accumulator.feed(&frame) {
                    return Ok(accumulator.into_text());
                }
            }
            Ok(Message::Close(_)) => {
                return Err(Error::AiStream(
                    "session closed before turn completion".to_string(),
                ));
            }
            Ok(_) => {}
            Err(e) => return Err(Error::AiStream(e.to_string())),
        }
    }

    Err(Error::AiStream(
        "stream ended before turn completion".to_string(),
    ))
}

/// Accumulates streamed partial text until the turn-complete signal
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
}

impl TurnAccumulator {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one server frame; returns true once the turn is complete.
    ///
    /// Frames that are not server content (setup acks, usage metadata) are
    /// ignored.
    pub fn feed(&mut self, frame: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(frame) else {
            tracing::trace!("ignoring non-JSON session frame");
            return false;
        };

        let Some(server_content) = value.get("serverContent") else {
            return false;
        };

        if let Some(parts) = server_content
            .get("modelTurn")
            .and_then(|turn| turn.get("parts"))
            .and_then(serde_json::Value::as_array)
        {
            for part in parts {
                if let Some(text) = part.get("text").and_then(serde_json::Value::as_str) {
                    self.text.push_str(text);
                }
            }
        }

        server_content
            .get("turnComplete")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    /// The accumulated text so far.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Extract a [`ParsedCommand`] from accumulated session text.
///
/// Tolerates markdown code fences and prose around the JSON object.
///
/// # Errors
///
/// [`Error::CommandParse`] when no valid command object is present.
pub fn extract_command(text: &str) -> Result<ParsedCommand> {
    let start = text
        .find('{')
        .ok_or_else(|| Error::CommandParse("no JSON object in output".to_string()))?;
    let end = text
        .rfind('}')
        .ok_or_else(|| Error::CommandParse("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(Error::CommandParse("unterminated JSON object".to_string()));
    }

    serde_json::from_str(&text[start..=end])
        .map_err(|e| Error::CommandParse(format!("invalid command JSON: {e}")))
}

static STOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:tambah|tambahkan|isi)\s+stok\s+(.+?)\s+(\d+)(?:\s+(\S+))?\s*$")
        .expect("hardcoded stock pattern")
});

static SALE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:catat\s+)?(?:penjualan|jual|terjual)\s+(.+?)\s+(\d+)(?:\s+\S+)?\s*$")
        .expect("hardcoded sale pattern")
});

/// Local, non-AI command matching over common Indonesian phrasings.
///
/// Used when the live session is unavailable or its output cannot be
/// parsed. Unmatched transcripts map to `UNKNOWN` with the transcript
/// preserved.
#[must_use]
pub fn parse_fallback(transcript: &str) -> ParsedCommand {
    let normalized = transcript.trim().to_lowercase();

    if let Some(captures) = STOCK_PATTERN.captures(&normalized) {
        if let Ok(quantity) = captures[2].parse::<u32>() {
            return ParsedCommand::UpdateStock(StockPayload {
                item_name: captures[1].trim().to_string(),
                quantity,
                unit: captures.get(3).map(|m| m.as_str().to_string()),
            });
        }
    }

    if let Some(captures) = SALE_PATTERN.captures(&normalized) {
        if let Ok(quantity) = captures[2].parse::<u32>() {
            return ParsedCommand::RecordSale(SalePayload {
                items: vec![SaleItem {
                    item_name: captures[1].trim().to_string(),
                    quantity,
                }],
            });
        }
    }

    if normalized.contains("promosi") || normalized.contains("posting") {
        return ParsedCommand::SocialPost(SocialPostPayload {
            caption: Some(transcript.trim().to_string()),
        });
    }

    ParsedCommand::unknown(transcript)
}
