//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws?token=` pushes the signed-in account's
//! snapshots (`account` topic) and ledger events (`transactions` topic).

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
