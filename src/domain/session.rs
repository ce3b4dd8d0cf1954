//! Bearer-token sessions.
//!
//! The identity provider verifies who the user is at sign-in; this registry
//! maps the opaque token issued then to the resolved [`AccountId`] and keeps
//! the provider's ID token for calls made on the user's behalf. Every
//! account-scoped operation resolves its session here and fails closed with
//! [`SaviumError::AuthRequired`] when it cannot.

use std::collections::HashMap;

use tokio::sync::{RwLock, watch};

use super::AccountId;
use crate::error::SaviumError;

/// A resolved session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Account the session belongs to.
    pub account_id: AccountId,
    /// Identity-provider ID token presented at sign-in.
    pub id_token: String,
}

#[derive(Debug)]
struct Entry {
    session: ActiveSession,
    // Dropped on sign-out; watchers observe the closed channel.
    alive: watch::Sender<()>,
}

/// Resolves once its session is revoked.
#[derive(Debug)]
pub struct RevocationWatch {
    rx: watch::Receiver<()>,
}

impl RevocationWatch {
    /// Waits until the session ends. Cancel-safe.
    pub async fn revoked(&mut self) {
        while self.rx.changed().await.is_ok() {}
    }
}

/// Active sessions keyed by bearer token.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Entry>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new token for `account_id`, remembering the ID token it was
    /// granted for.
    pub async fn sign_in(&self, account_id: AccountId, id_token: String) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let (alive, _) = watch::channel(());
        let entry = Entry {
            session: ActiveSession {
                account_id,
                id_token,
            },
            alive,
        };
        self.sessions.write().await.insert(token.clone(), entry);
        token
    }

    /// Resolves a token to its session.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::AuthRequired`] for unknown tokens.
    pub async fn resolve(&self, token: &str) -> Result<ActiveSession, SaviumError> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|entry| entry.session.clone())
            .ok_or(SaviumError::AuthRequired)
    }

    /// Watches a live token for revocation.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::AuthRequired`] for unknown tokens.
    pub async fn watch(&self, token: &str) -> Result<RevocationWatch, SaviumError> {
        self.sessions
            .read()
            .await
            .get(token)
            .map(|entry| RevocationWatch {
                rx: entry.alive.subscribe(),
            })
            .ok_or(SaviumError::AuthRequired)
    }

    /// Ends a session and wakes its revocation watchers. Returns `true` if
    /// the token was active.
    pub async fn sign_out(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_pending, assert_ready, task};

    use super::*;

    #[tokio::test]
    async fn sign_in_then_resolve() {
        let registry = SessionRegistry::new();
        let token = registry
            .sign_in(AccountId::new("u1"), "id-token-1".to_string())
            .await;
        let resolved = registry.resolve(&token).await;
        assert!(matches!(
            resolved,
            Ok(ref s) if s.account_id.as_str() == "u1" && s.id_token == "id-token-1"
        ));
    }

    #[tokio::test]
    async fn unknown_token_fails_closed() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.resolve("nope").await,
            Err(SaviumError::AuthRequired)
        ));
        assert!(registry.watch("nope").await.is_err());
    }

    #[tokio::test]
    async fn sign_out_revokes() {
        let registry = SessionRegistry::new();
        let token = registry.sign_in(AccountId::new("u1"), String::new()).await;
        assert!(registry.sign_out(&token).await);
        assert!(!registry.sign_out(&token).await);
        assert!(registry.resolve(&token).await.is_err());
    }

    #[tokio::test]
    async fn watch_fires_only_for_its_own_token() {
        let registry = SessionRegistry::new();
        let mine = registry.sign_in(AccountId::new("u1"), String::new()).await;
        let other = registry.sign_in(AccountId::new("u2"), String::new()).await;
        let Ok(mut watch) = registry.watch(&mine).await else {
            panic!("live token should be watchable");
        };

        let mut revoked = task::spawn(watch.revoked());
        assert_pending!(revoked.poll());

        assert!(registry.sign_out(&other).await);
        assert_pending!(revoked.poll());

        assert!(registry.sign_out(&mine).await);
        assert!(revoked.is_woken());
        assert_ready!(revoked.poll());
    }
}
