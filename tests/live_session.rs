//! AI live-session parser integration tests
//!
//! Runs a loopback WebSocket server speaking the live-session frame
//! protocol; no hosted AI involved.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use warteg_gateway::command::{CommandAction, CommandParser, TokenProvider};
use warteg_gateway::{Error, Result};

struct StaticTokens;

#[async_trait]
impl TokenProvider for StaticTokens {
    async fn live_token(&self) -> Result<String> {
        Ok("test-token".to_string())
    }
}

/// Accept one connection, capturing the request URI.
async fn accept_with_uri(listener: &TcpListener) -> (WebSocketStream<TcpStream>, String) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut uri = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        uri = req.uri().to_string();
        Ok(resp)
    })
    .await
    .unwrap();
    (ws, uri)
}

/// Speak the server side of one full session turn.
async fn serve_turn(ws: &mut WebSocketStream<TcpStream>, reply_chunks: &[&str]) {
    // Setup frame, then the client content frame
    let setup = ws.next().await.unwrap().unwrap();
    let setup: serde_json::Value = serde_json::from_str(setup.to_text().unwrap()).unwrap();
    assert!(setup.get("setup").is_some(), "first frame must be setup");

    let content = ws.next().await.unwrap().unwrap();
    let content: serde_json::Value = serde_json::from_str(content.to_text().unwrap()).unwrap();
    assert!(content.get("clientContent").is_some());

    for chunk in reply_chunks {
        let frame = serde_json::json!({
            "serverContent": {"modelTurn": {"parts": [{"text": chunk}]}}
        });
        ws.send(Message::Text(frame.to_string())).await.unwrap();
    }
    let done = serde_json::json!({"serverContent": {"turnComplete": true}});
    ws.send(Message::Text(done.to_string())).await.unwrap();
}

#[tokio::test]
async fn streamed_chunks_accumulate_into_a_command() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut ws, uri) = accept_with_uri(&listener).await;
        serve_turn(
            &mut ws,
            &[
                "{\"action\":\"UPDATE_STOCK\",",
                "\"payload\":{\"itemName\":\"ayam goreng\",\"quantity\":20,\"unit\":\"potong\"}}",
            ],
        )
        .await;
        // Client closes once the turn is extracted
        let _ = ws.next().await;
        uri
    });

    let parser = CommandParser::new(&url, "gemini-2.0-flash-exp");
    let command = parser
        .parse("tambah stok ayam goreng 20 potong", &StaticTokens)
        .await
        .unwrap();
    assert_eq!(command.action(), CommandAction::UpdateStock);

    let uri = server.await.unwrap();
    assert!(uri.contains("access_token=test-token"));
}

#[tokio::test]
async fn failed_session_does_not_poison_the_next_one() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        // First connection dies before any turn completes
        let (ws, _) = accept_with_uri(&listener).await;
        drop(ws);

        // Second connection serves a full turn
        let (mut ws, _) = accept_with_uri(&listener).await;
        serve_turn(
            &mut ws,
            &["{\"action\":\"UNKNOWN\",\"payload\":{\"transcript\":\"halo\"}}"],
        )
        .await;
        let _ = ws.next().await;
    });

    let parser = CommandParser::new(&url, "gemini-2.0-flash-exp");

    let first = parser.parse("halo", &StaticTokens).await;
    assert!(matches!(first, Err(Error::AiStream(_))));

    let second = parser.parse("halo", &StaticTokens).await.unwrap();
    assert_eq!(second.action(), CommandAction::Unknown);

    server.await.unwrap();
}

#[tokio::test]
async fn non_command_output_is_a_parse_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept_with_uri(&listener).await;
        serve_turn(&mut ws, &["maaf, saya tidak bisa membantu dengan itu"]).await;
        let _ = ws.next().await;
    });

    let parser = CommandParser::new(&url, "gemini-2.0-flash-exp");
    let result = parser.parse("halo", &StaticTokens).await;
    assert!(matches!(result, Err(Error::CommandParse(_))));

    server.await.unwrap();
}
