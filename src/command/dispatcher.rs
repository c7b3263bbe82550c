//! Command dispatch
//!
//! Maps a parsed command onto backend REST calls and produces the spoken
//! confirmation. Voice feedback always says something: a confirmation, a
//! clarification request, or the generic failure line. Granular error
//! causes are logged, never spoken.

use async_trait::async_trait;

use crate::Result;

use super::types::{ParsedCommand, SalePayload, SocialPostPayload, StockPayload};

/// Spoken when a command could not be understood
pub const UNKNOWN_MESSAGE: &str = "Maaf, perintah tidak dikenali. Silakan ulangi.";

/// Spoken when any backend call fails
pub const OFFLINE_MESSAGE: &str = "Maaf, sistem sedang offline atau terjadi kesalahan.";

/// What dispatching a command produced
#[derive(Debug, Clone)]
pub struct Dispatched {
    /// Confirmation or failure line for TTS; never empty
    pub spoken: String,
    /// Whether the backend accepted the command
    pub delivered: bool,
}

impl Dispatched {
    fn delivered(spoken: String) -> Self {
        Self {
            spoken,
            delivered: true,
        }
    }

    fn failed(spoken: &str) -> Self {
        Self {
            spoken: spoken.to_string(),
            delivered: false,
        }
    }
}

/// REST operations a command can trigger.
///
/// Implemented by the API client; a recording stand-in is enough for tests.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Add stock for one menu item.
    async fn add_stock(&self, payload: &StockPayload) -> Result<()>;

    /// Record a completed sale.
    async fn record_sale(&self, payload: &SalePayload) -> Result<()>;

    /// Post a promotion to social media.
    async fn post_social(&self, payload: &SocialPostPayload) -> Result<()>;
}

/// Execute a command and return the spoken confirmation plus whether the
/// backend accepted it.
///
/// `UNKNOWN` commands never reach the backend. Any backend failure collapses
/// to [`OFFLINE_MESSAGE`] — no retry, no partial-success tracking for
/// multi-item sales; the cause goes to the log.
pub async fn dispatch(backend: &dyn Backend, command: &ParsedCommand) -> Dispatched {
    match command {
        ParsedCommand::UpdateStock(payload) => match backend.add_stock(payload).await {
            Ok(()) => Dispatched::delivered(confirm_stock(payload)),
            Err(e) => {
                tracing::error!(error = %e, item = %payload.item_name, "stock update failed");
                Dispatched::failed(OFFLINE_MESSAGE)
            }
        },
        ParsedCommand::RecordSale(payload) => match backend.record_sale(payload).await {
            Ok(()) => Dispatched::delivered(confirm_sale(payload)),
            Err(e) => {
                tracing::error!(error = %e, items = payload.items.len(), "sale record failed");
                Dispatched::failed(OFFLINE_MESSAGE)
            }
        },
        ParsedCommand::SocialPost(payload) => match backend.post_social(payload).await {
            Ok(()) => Dispatched::delivered("Promosi berhasil diposting ke media sosial.".to_string()),
            Err(e) => {
                tracing::error!(error = %e, "social post failed");
                Dispatched::failed(OFFLINE_MESSAGE)
            }
        },
        ParsedCommand::Unknown(payload) => {
            tracing::info!(transcript = %payload.transcript, "command not understood");
            Dispatched::failed(UNKNOWN_MESSAGE)
        }
    }
}

fn confirm_stock(payload: &StockPayload) -> String {
    let unit = payload.unit.as_deref().unwrap_or("unit");
    format!(
        "Stok {} berhasil ditambah {} {}.",
        payload.item_name, payload.quantity, unit
    )
}

fn confirm_sale(payload: &SalePayload) -> String {
    let items = payload
        .items
        .iter()
        .map(|item| format!("{} {}", item.quantity, item.item_name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Penjualan {items} berhasil dicatat.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::types::SaleItem;

    #[test]
    fn stock_confirmation_names_item_quantity_and_unit() {
        let msg = confirm_stock(&StockPayload {
            item_name: "ayam goreng".to_string(),
            quantity: 20,
            unit: Some("potong".to_string()),
        });
        assert!(msg.contains("ayam goreng"));
        assert!(msg.contains("20"));
        assert!(msg.contains("potong"));
    }

    #[test]
    fn sale_confirmation_joins_items_with_commas() {
        let msg = confirm_sale(&SalePayload {
            items: vec![
                SaleItem {
                    item_name: "ayam goreng".to_string(),
                    quantity: 2,
                },
                SaleItem {
                    item_name: "es teh".to_string(),
                    quantity: 3,
                },
            ],
        });
        assert!(msg.contains("2 ayam goreng, 3 es teh"));
    }
}
