//! Command pipeline integration tests
//!
//! Exercises parsing and dispatch end to end with a recording backend,
//! without network access.

use std::sync::Mutex;

use async_trait::async_trait;
use warteg_gateway::command::{
    dispatch, parse_fallback, Backend, ParsedCommand, SalePayload, SocialPostPayload,
    StockPayload, OFFLINE_MESSAGE, UNKNOWN_MESSAGE,
};
use warteg_gateway::{Error, Result};

/// Backend stand-in that records every call it receives
#[derive(Default)]
struct RecordingBackend {
    calls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingBackend {
    fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.fail {
            Err(Error::Network("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for RecordingBackend {
    async fn add_stock(&self, payload: &StockPayload) -> Result<()> {
        self.record(format!("stock:{}:{}", payload.item_name, payload.quantity))
    }

    async fn record_sale(&self, payload: &SalePayload) -> Result<()> {
        self.record(format!("sale:{}", payload.items.len()))
    }

    async fn post_social(&self, _payload: &SocialPostPayload) -> Result<()> {
        self.record("social".to_string())
    }
}

#[tokio::test]
async fn stock_phrase_reaches_backend_exactly_once() {
    let backend = RecordingBackend::default();

    let command = parse_fallback("Tambah stok ayam goreng 20 potong");
    let outcome = dispatch(&backend, &command).await;

    assert_eq!(backend.calls(), vec!["stock:ayam goreng:20"]);
    assert!(outcome.delivered);
    assert!(outcome.spoken.contains("ayam goreng"));
    assert!(outcome.spoken.contains("20"));
}

#[tokio::test]
async fn sale_phrase_reaches_backend() {
    let backend = RecordingBackend::default();

    let command = parse_fallback("Catat penjualan es teh 3 gelas");
    let outcome = dispatch(&backend, &command).await;

    assert_eq!(backend.calls(), vec!["sale:1"]);
    assert!(outcome.delivered);
    assert!(outcome.spoken.contains("es teh"));
}

#[tokio::test]
async fn unknown_command_never_calls_backend() {
    let backend = RecordingBackend::default();

    let command = parse_fallback("berapa cuaca hari ini");
    assert!(matches!(command, ParsedCommand::Unknown(_)));

    let outcome = dispatch(&backend, &command).await;

    assert!(backend.calls().is_empty());
    assert!(!outcome.delivered);
    assert_eq!(outcome.spoken, UNKNOWN_MESSAGE);
}

#[tokio::test]
async fn backend_failure_collapses_to_offline_message() {
    let backend = RecordingBackend::failing();

    let command = parse_fallback("tambah stok rendang 5 porsi");
    let outcome = dispatch(&backend, &command).await;

    // The call was attempted, but the user hears the generic failure line
    // and the command is not marked delivered, so it is never mirrored
    assert_eq!(backend.calls().len(), 1);
    assert!(!outcome.delivered);
    assert_eq!(outcome.spoken, OFFLINE_MESSAGE);
}

#[tokio::test]
async fn social_phrase_posts_promotion() {
    let backend = RecordingBackend::default();

    let command = parse_fallback("posting promosi menu hari ini");
    let outcome = dispatch(&backend, &command).await;

    assert_eq!(backend.calls(), vec!["social"]);
    assert!(outcome.delivered);
    assert!(outcome.spoken.contains("Promosi"));
}
