//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single authenticated connection,
//! dispatching subscribe commands, forwarding the account's ledger events
//! and streaming account snapshots.

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{Topic, WsCommand, WsMessage};
use super::subscription::SubscriptionManager;
use crate::domain::{Account, AccountEvents, AccountId, RevocationWatch};
use crate::service::{AccountService, AccountWatch};

type WsSink = SplitSink<WebSocket, Message>;

async fn send(ws_tx: &mut WsSink, msg: &WsMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => ws_tx.send(Message::text(json)).await.is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode ws message");
            true
        }
    }
}

fn account_event(account: &Account) -> WsMessage {
    WsMessage::event(
        Topic::Account,
        serde_json::to_value(account).unwrap_or_default(),
    )
}

async fn next_snapshot(watch: &mut Option<AccountWatch>) -> Option<Account> {
    match watch.as_mut() {
        Some(w) => w.changed().await,
        None => std::future::pending().await,
    }
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and dispatches them.
/// - Forwards the account's ledger events on the `transactions` topic.
/// - Streams full account snapshots on the `account` topic.
/// - Closes with a policy-violation frame once the session is revoked.
pub async fn run_connection(
    socket: WebSocket,
    account_id: AccountId,
    mut revocation: RevocationWatch,
    mut events: AccountEvents,
    accounts: AccountService,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();
    let mut watch: Option<AccountWatch> = None;

    loop {
        tokio::select! {
            () = revocation.revoked() => {
                tracing::info!(%account_id, "session revoked; closing ws");
                let frame = CloseFrame {
                    code: close_code::POLICY,
                    reason: "session revoked".into(),
                };
                let _ = ws_tx.send(Message::Close(Some(frame))).await;
                break;
            }
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let replies = handle_text_message(&text, &mut subs, &mut watch, &account_id, &accounts).await;
                        let mut open = true;
                        for reply in &replies {
                            if !send(&mut ws_tx, reply).await {
                                open = false;
                                break;
                            }
                        }
                        if !open {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            // Event from EventBus
            event = events.recv() => {
                match event {
                    Ok(ledger_event) => {
                        if subs.matches(Topic::Transactions) {
                            let msg = WsMessage::event(
                                Topic::Transactions,
                                serde_json::to_value(&ledger_event).unwrap_or_default(),
                            );
                            if !send(&mut ws_tx, &msg).await {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            // Committed account snapshot
            snapshot = next_snapshot(&mut watch) => {
                match snapshot {
                    Some(account) => {
                        if !send(&mut ws_tx, &account_event(&account)).await {
                            break;
                        }
                    }
                    None => watch = None,
                }
            }
        }
    }

    if let Some(w) = watch.take() {
        w.dispose();
    }
    tracing::debug!(%account_id, "ws connection closed");
}

/// Handles a text message from the client, returning the messages to send.
async fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    watch: &mut Option<AccountWatch>,
    account_id: &AccountId,
    accounts: &AccountService,
) -> Vec<WsMessage> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return vec![WsMessage::error(String::new(), 400, "malformed JSON")];
    };
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return vec![WsMessage::error(msg.id, 404, "unknown command")];
    };

    match command {
        WsCommand::Subscribe { topics } => {
            let added = subs.subscribe(&topics);
            let mut replies = vec![WsMessage::response(
                msg.id,
                serde_json::json!({ "subscribed": added, "count": subs.count() }),
            )];
            if added.contains(&Topic::Account) {
                // Subscribe first so no commit between read and watch is lost.
                *watch = Some(accounts.watch(account_id));
                match accounts.get_account(account_id).await {
                    Ok(account) => replies.push(account_event(&account)),
                    Err(e) => {
                        tracing::warn!(%account_id, error = %e, "initial snapshot unavailable");
                        replies.push(WsMessage::error(String::new(), 404, &e.user_message()));
                    }
                }
            }
            replies
        }
        WsCommand::Unsubscribe { topics } => {
            let removed = subs.unsubscribe(&topics);
            if removed.contains(&Topic::Account)
                && let Some(w) = watch.take()
            {
                w.dispose();
            }
            vec![WsMessage::response(
                msg.id,
                serde_json::json!({ "unsubscribed": removed, "remaining_count": subs.count() }),
            )]
        }
    }
}
