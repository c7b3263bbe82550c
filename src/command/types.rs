//! Parsed command types
//!
//! Wire shape matches what the AI session is prompted to produce:
//! `{"action": "UPDATE_STOCK", "payload": {...}}`.

use serde::{Deserialize, Serialize};

/// Action tag of a parsed command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    UpdateStock,
    RecordSale,
    SocialPost,
    Unknown,
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::UpdateStock => "UPDATE_STOCK",
            Self::RecordSale => "RECORD_SALE",
            Self::SocialPost => "SOCIAL_POST",
            Self::Unknown => "UNKNOWN",
        })
    }
}

/// A structured command derived from a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload")]
pub enum ParsedCommand {
    /// Add stock for one menu item
    #[serde(rename = "UPDATE_STOCK")]
    UpdateStock(StockPayload),

    /// Record a completed sale of one or more items
    #[serde(rename = "RECORD_SALE")]
    RecordSale(SalePayload),

    /// Post a promotion to social media
    #[serde(rename = "SOCIAL_POST")]
    SocialPost(SocialPostPayload),

    /// Not understood; the raw transcript is preserved
    #[serde(rename = "UNKNOWN")]
    Unknown(UnknownPayload),
}

impl ParsedCommand {
    /// The action tag of this command
    #[must_use]
    pub const fn action(&self) -> CommandAction {
        match self {
            Self::UpdateStock(_) => CommandAction::UpdateStock,
            Self::RecordSale(_) => CommandAction::RecordSale,
            Self::SocialPost(_) => CommandAction::SocialPost,
            Self::Unknown(_) => CommandAction::Unknown,
        }
    }

    /// Build an unknown command preserving the transcript.
    #[must_use]
    pub fn unknown(transcript: &str) -> Self {
        Self::Unknown(UnknownPayload {
            transcript: transcript.to_string(),
        })
    }
}

/// Stock update payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockPayload {
    /// Menu item name
    pub item_name: String,
    /// Units to add
    pub quantity: u32,
    /// Unit of measure (e.g. "potong", "porsi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Sale record payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalePayload {
    /// Items sold in this transaction
    pub items: Vec<SaleItem>,
}

/// One line item of a sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    /// Menu item name
    pub item_name: String,
    /// Units sold
    pub quantity: u32,
}

/// Social post payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPostPayload {
    /// Caption text; the backend generates one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Payload for commands that could not be understood
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownPayload {
    /// The raw transcript, kept for logging and clarification
    pub transcript: String,
}
