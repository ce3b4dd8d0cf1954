//! Broadcast channel for ledger events.
//!
//! [`EventBus`] wraps a [`tokio::sync::broadcast`] channel. Every committed
//! deposit or withdrawal publishes a [`LedgerEvent`] through the bus, and
//! WebSocket connections subscribe to receive the events of their account.

use tokio::sync::broadcast;

use super::{AccountId, LedgerEvent};

/// Broadcast bus for [`LedgerEvent`]s.
///
/// Backed by a `tokio::broadcast` channel with a configurable capacity
/// (default 10 000). When the ring buffer is full, the oldest events are
/// dropped for lagging receivers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    /// Creates a new `EventBus` with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// If there are no active receivers, the event is silently dropped.
    pub fn publish(&self, event: LedgerEvent) -> usize {
        let event_type = event.event_type_str();
        let account_id = event.account_id().clone();
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(%account_id, event_type, receivers, "ledger event published");
        receivers
    }

    /// Creates a new receiver that will receive all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    /// Creates a receiver limited to the events of `account_id`.
    #[must_use]
    pub fn subscribe_account(&self, account_id: AccountId) -> AccountEvents {
        AccountEvents {
            account_id,
            rx: self.sender.subscribe(),
        }
    }

    /// Returns the current number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver yielding only one account's events.
#[derive(Debug)]
pub struct AccountEvents {
    account_id: AccountId,
    rx: broadcast::Receiver<LedgerEvent>,
}

impl AccountEvents {
    /// Waits for the account's next event. Cancel-safe.
    ///
    /// # Errors
    ///
    /// Returns `Lagged` when events were overwritten before being read and
    /// `Closed` once every [`EventBus`] handle is gone.
    pub async fn recv(&mut self) -> Result<LedgerEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if event.account_id() == &self.account_id {
                return Ok(event);
            }
        }
    }
}
