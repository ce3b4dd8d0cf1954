//! WebSocket end-to-end tests against a live server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

use common::TestServer;

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn next_json(socket: &mut Socket) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for ws message")
            .expect("socket closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Reads until an event on `topic` satisfying `pred` arrives.
async fn wait_for_event(socket: &mut Socket, topic: &str, pred: impl Fn(&Value) -> bool) -> Value {
    loop {
        let msg = next_json(socket).await;
        if msg["type"] == "event" && msg["payload"]["topic"] == topic && pred(&msg["payload"]["data"]) {
            return msg;
        }
    }
}

async fn subscribe(socket: &mut Socket, topics: &[&str]) {
    let command = json!({
        "id": "sub-1",
        "type": "command",
        "timestamp": "2026-01-01T00:00:00Z",
        "payload": { "command": "subscribe", "topics": topics }
    });
    socket
        .send(Message::text(command.to_string()))
        .await
        .unwrap();
}

#[tokio::test]
async fn upgrade_without_session_is_refused() {
    let server = TestServer::spawn().await;
    assert!(
        tokio_tungstenite::connect_async(server.ws_url("bogus"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn account_topic_sends_snapshot_then_replacements() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-ws").await;
    let (mut socket, _) = tokio_tungstenite::connect_async(server.ws_url(&token))
        .await
        .unwrap();

    subscribe(&mut socket, &["account"]).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "response");
    assert_eq!(reply["id"], "sub-1");

    let initial = wait_for_event(&mut socket, "account", |_| true).await;
    assert_eq!(initial["payload"]["data"]["financialInfo"]["portfolioValue"], 0.0);

    let pi = server.deposit_intent(&token, 400.0).await;
    let resp = server.confirm_deposit(&token, 400.0, &pi).await;
    assert_eq!(resp.status(), 201);

    let updated = wait_for_event(&mut socket, "account", |data| {
        data["financialInfo"]["portfolioValue"] == 400.0
    })
    .await;
    assert_eq!(updated["payload"]["data"]["name"], "Asha Rao");
}

#[tokio::test]
async fn transactions_topic_only_carries_own_events() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-mine").await;
    let other = server.sign_in("u-other").await;
    let (mut socket, _) = tokio_tungstenite::connect_async(server.ws_url(&token))
        .await
        .unwrap();

    subscribe(&mut socket, &["transactions"]).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "response");

    let other_pi = server.deposit_intent(&other, 999.0).await;
    let resp = server.confirm_deposit(&other, 999.0, &other_pi).await;
    assert_eq!(resp.status(), 201);
    let pi = server.deposit_intent(&token, 150.0).await;
    let resp = server.confirm_deposit(&token, 150.0, &pi).await;
    assert_eq!(resp.status(), 201);

    let event = wait_for_event(&mut socket, "transactions", |_| true).await;
    assert_eq!(event["payload"]["data"]["event_type"], "deposit_recorded");
    assert_eq!(event["payload"]["data"]["account_id"], "u-mine");
}

#[tokio::test]
async fn unknown_command_gets_error_reply() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-cmd").await;
    let (mut socket, _) = tokio_tungstenite::connect_async(server.ws_url(&token))
        .await
        .unwrap();

    let command = json!({
        "id": "x-1",
        "type": "command",
        "timestamp": "2026-01-01T00:00:00Z",
        "payload": { "command": "teleport" }
    });
    socket
        .send(Message::text(command.to_string()))
        .await
        .unwrap();

    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["id"], "x-1");
    assert_eq!(reply["payload"]["code"], 404);
}

#[tokio::test]
async fn sign_out_closes_open_socket() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-leaving").await;
    let (mut socket, _) = tokio_tungstenite::connect_async(server.ws_url(&token))
        .await
        .unwrap();

    subscribe(&mut socket, &["account"]).await;
    let reply = next_json(&mut socket).await;
    assert_eq!(reply["type"], "response");

    let resp = server
        .http
        .delete(server.url("/api/v1/sessions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // Drain queued events; the stream must end with a close frame.
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("socket stayed open after sign-out");
    if let Some(frame) = closed {
        assert_eq!(u16::from(frame.code), 1008);
    }
}
