//! Push client integration tests
//!
//! Runs a loopback WebSocket server per test; no external services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use warteg_gateway::push::{
    ConnectionStatus, Envelope, EnvelopeKind, PushClient, PushConfig, SendOutcome,
};

fn test_config(url: String) -> PushConfig {
    PushConfig {
        url,
        heartbeat_interval: Duration::from_secs(30),
        reconnect_interval: Duration::from_millis(50),
        max_reconnect_attempts: 2,
        stability_window: Duration::from_secs(5),
        queue_capacity: 8,
        user_id: Some("owner-1".to_string()),
    }
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}", listener.local_addr().unwrap());
    (listener, url)
}

async fn accept_ws(listener: &TcpListener) -> WebSocketStream<TcpStream> {
    let (stream, _) = listener.accept().await.unwrap();
    tokio_tungstenite::accept_async(stream).await.unwrap()
}

/// Read text frames until `n` envelopes arrive.
async fn read_envelopes(ws: &mut WebSocketStream<TcpStream>, n: usize) -> Vec<Envelope> {
    let mut out = Vec::new();
    while out.len() < n {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                out.push(serde_json::from_str(&text).unwrap());
            }
            Some(Ok(_)) => {}
            other => panic!("connection ended early: {other:?}"),
        }
    }
    out
}

async fn wait_for_status(client: &PushClient, wanted: ConnectionStatus) {
    let mut watch = client.status_watch();
    timeout(Duration::from_secs(5), watch.wait_for(|s| *s == wanted))
        .await
        .expect("status timeout")
        .expect("status channel closed");
}

#[tokio::test]
async fn send_while_connected_is_sent_with_user_id() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        read_envelopes(&mut ws, 1).await
    });

    let client = PushClient::spawn(test_config(url));
    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await;

    let outcome = client
        .send(EnvelopeKind::Stock, serde_json::json!({"itemName": "tempe"}))
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Sent);

    let envelopes = timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(envelopes[0].kind, EnvelopeKind::Stock);
    assert_eq!(envelopes[0].user_id.as_deref(), Some("owner-1"));
}

#[tokio::test]
async fn offline_sends_queue_and_flush_in_order() {
    let (listener, url) = bind().await;
    let client = PushClient::spawn(test_config(url));

    // Not connected yet: both are queued
    let first = client
        .send(EnvelopeKind::Stock, serde_json::json!({"seq": 1}))
        .await
        .unwrap();
    let second = client
        .send(EnvelopeKind::Sale, serde_json::json!({"seq": 2}))
        .await
        .unwrap();
    assert_eq!(first, SendOutcome::Queued);
    assert_eq!(second, SendOutcome::Queued);

    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        read_envelopes(&mut ws, 2).await
    });

    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await;

    let envelopes = timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    // FIFO: oldest first
    assert_eq!(envelopes[0].kind, EnvelopeKind::Stock);
    assert_eq!(envelopes[1].kind, EnvelopeKind::Sale);
}

#[tokio::test]
async fn inbound_frames_route_to_matching_subscribers_only() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let alert = serde_json::json!({
            "type": "alert",
            "data": {"message": "stok ayam menipis"},
            "timestamp": "2024-06-14T02:00:00Z",
        });
        let validation = serde_json::json!({
            "type": "validation",
            "data": {"valid": true},
            "timestamp": "2024-06-14T02:00:01Z",
        });
        ws.send(Message::Text(alert.to_string())).await.unwrap();
        ws.send(Message::Text(validation.to_string())).await.unwrap();
        // Hold the socket open until the test finishes
        let _ = ws.next().await;
    });

    let client = PushClient::spawn(test_config(url));
    let mut alerts = client.subscribe(EnvelopeKind::Alert).await.unwrap();
    let mut validations = client.subscribe(EnvelopeKind::Validation).await.unwrap();

    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await;

    let alert = timeout(Duration::from_secs(5), alerts.receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(alert.kind, EnvelopeKind::Alert);
    assert_eq!(alert.data.unwrap()["message"], "stok ayam menipis");

    let validation = timeout(Duration::from_secs(5), validations.receiver.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(validation.kind, EnvelopeKind::Validation);

    // The alert subscriber never saw the validation frame
    assert!(alerts.receiver.try_recv().is_err());

    client.disconnect();
    let _ = timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn unsubscribed_handle_receives_nothing() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        let alert = serde_json::json!({
            "type": "alert",
            "data": {},
            "timestamp": "2024-06-14T02:00:00Z",
        });
        ws.send(Message::Text(alert.to_string())).await.unwrap();
        let _ = ws.next().await;
    });

    let client = PushClient::spawn(test_config(url));
    let mut subscription = client.subscribe(EnvelopeKind::Alert).await.unwrap();
    client.unsubscribe(subscription.id);

    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await;

    // Give the frame time to arrive and be (not) dispatched
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(subscription.receiver.try_recv().is_err());

    client.disconnect();
    let _ = timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn reconnects_are_bounded_then_give_up() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));

    let server = {
        let accepts = Arc::clone(&accepts);
        tokio::spawn(async move {
            // Accept, complete the handshake, close immediately
            loop {
                let mut ws = accept_ws(&listener).await;
                accepts.fetch_add(1, Ordering::SeqCst);
                let _ = ws.close(None).await;
            }
        })
    };

    let config = test_config(url);
    let max = config.max_reconnect_attempts as usize;
    let client = PushClient::spawn(config);
    client.connect();

    let mut watch = client.status_watch();
    timeout(
        Duration::from_secs(5),
        watch.wait_for(|s| *s != ConnectionStatus::Disconnected),
    )
    .await
    .expect("never started connecting")
    .expect("status channel closed");

    timeout(
        Duration::from_secs(5),
        watch.wait_for(|s| *s == ConnectionStatus::Disconnected),
    )
    .await
    .expect("never gave up")
    .expect("status channel closed");

    // Initial connect plus the bounded retries, nothing more
    assert_eq!(accepts.load(Ordering::SeqCst), 1 + max);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepts.load(Ordering::SeqCst), 1 + max);

    server.abort();
}

#[tokio::test]
async fn stable_connection_refills_the_retry_budget() {
    let (listener, url) = bind().await;
    let accepts = Arc::new(AtomicUsize::new(0));

    let server = {
        let accepts = Arc::clone(&accepts);
        tokio::spawn(async move {
            // Hold each connection open past the stability window, then close
            loop {
                let mut ws = accept_ws(&listener).await;
                accepts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
                let _ = ws.close(None).await;
            }
        })
    };

    let mut config = test_config(url);
    config.max_reconnect_attempts = 1;
    config.stability_window = Duration::from_millis(100);
    let client = PushClient::spawn(config);
    client.connect();

    // Each held-open connection refills the budget, so the client keeps
    // reconnecting well past 1 + max
    timeout(Duration::from_secs(5), async {
        while accepts.load(Ordering::SeqCst) < 4 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await
    .expect("reconnects stopped early");

    client.disconnect();
    server.abort();
}

#[tokio::test]
async fn manual_disconnect_sends_close_and_stays_down() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept_ws(&listener).await;
        // Expect a close frame, not an abrupt drop
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => {}
                other => panic!("expected close frame, got {other:?}"),
            }
        }
    });

    let client = PushClient::spawn(test_config(url));
    client.connect();
    wait_for_status(&client, ConnectionStatus::Connected).await;

    client.disconnect();
    wait_for_status(&client, ConnectionStatus::Disconnected).await;

    let frame = timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert!(frame.is_some());

    // No automatic reconnect after a manual disconnect
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.status(), ConnectionStatus::Disconnected);
}
