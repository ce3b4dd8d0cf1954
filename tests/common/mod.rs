//! Shared harness: a server on an ephemeral port over the in-memory store.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use savium_ledger::api;
use savium_ledger::app_state::AppState;
use savium_ledger::config::SaviumConfig;
use savium_ledger::domain::account::ACCOUNTS_COLLECTION;
use savium_ledger::domain::{Account, AccountId, timestamp};
use savium_ledger::error::SaviumError;
use savium_ledger::service::deposit::DepositIntentRequest;
use savium_ledger::service::{
    DepositIntent, DepositIntentClient, IdentityVerifier, VerifiedIdentity,
};
use savium_ledger::store::{DocumentStore, MemoryStore};

/// Deposit backend that always issues an intent.
#[derive(Debug)]
pub struct StubDepositClient;

#[async_trait]
impl DepositIntentClient for StubDepositClient {
    async fn create_intent(
        &self,
        _token: &str,
        request: &DepositIntentRequest,
    ) -> Result<DepositIntent, SaviumError> {
        Ok(DepositIntent {
            client_secret: format!("secret_{}", request.amount),
            payment_intent_id: format!("pi_{}", uuid::Uuid::new_v4().simple()),
        })
    }
}

/// Identity provider accepting `idt-<user>` tokens for any user.
#[derive(Debug)]
pub struct StubIdentityVerifier;

#[async_trait]
impl IdentityVerifier for StubIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, SaviumError> {
        let user_id = id_token
            .strip_prefix("idt-")
            .filter(|u| !u.is_empty())
            .ok_or(SaviumError::AuthRequired)?;
        Ok(VerifiedIdentity {
            user_id: user_id.to_string(),
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
        })
    }
}

/// ID token the stub provider accepts for `user_id`.
pub fn id_token(user_id: &str) -> String {
    format!("idt-{user_id}")
}

/// A running server plus direct access to its store.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub store: Arc<MemoryStore>,
    pub http: reqwest::Client,
}

impl TestServer {
    pub async fn spawn() -> Self {
        Self::spawn_with(SaviumConfig::default()).await
    }

    pub async fn spawn_with(config: SaviumConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(
            config,
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::new(StubDepositClient),
            Arc::new(StubIdentityVerifier),
        );
        let app = api::build_app(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            store,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={token}", self.addr)
    }

    /// Stores an account created `age_days` ago holding `balance`.
    pub async fn seed_account(&self, user_id: &str, age_days: i64, balance: f64) {
        let mut account = Account::new(
            AccountId::new(user_id),
            "Asha Rao",
            "asha@example.com",
            timestamp::now() - Duration::days(age_days),
        );
        account.financial_info.portfolio_value = balance;
        account.financial_info.total_invested = balance;
        let data = serde_json::to_value(&account).unwrap();
        self.store
            .set_document(ACCOUNTS_COLLECTION, user_id, data)
            .await
            .unwrap();
    }

    /// Signs in with the stub provider's ID token and returns the bearer token.
    pub async fn sign_in(&self, user_id: &str) -> String {
        let resp = self
            .http
            .post(self.url("/api/v1/sessions"))
            .bearer_auth(id_token(user_id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.http
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> reqwest::Response {
        self.http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Creates a deposit intent and returns its processor reference.
    pub async fn deposit_intent(&self, token: &str, amount: f64) -> String {
        let resp = self
            .post("/api/v1/deposits/intent", token, &json!({ "amount": amount }))
            .await;
        assert_eq!(resp.status(), 200);
        let intent: Value = resp.json().await.unwrap();
        intent["paymentIntentId"].as_str().unwrap().to_string()
    }

    /// Confirms a succeeded payment of `amount` for intent `pi`.
    pub async fn confirm_deposit(&self, token: &str, amount: f64, pi: &str) -> reqwest::Response {
        self.post(
            "/api/v1/deposits/confirm",
            token,
            &json!({
                "amount": amount,
                "outcome": { "status": "succeeded", "payment_intent_id": pi }
            }),
        )
        .await
    }

    pub async fn balance(&self, token: &str) -> f64 {
        let account: Value = self.get("/api/v1/account", token).await.json().await.unwrap();
        account["financialInfo"]["portfolioValue"].as_f64().unwrap()
    }
}
