//! REST API end-to-end tests against a live server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

mod common;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use savium_ledger::config::SaviumConfig;
use serde_json::{Value, json};

use common::TestServer;

const PNG_BASE64: &str = "iVBORw0KGgo=";

#[tokio::test]
async fn health_reports_store_backend() {
    let server = TestServer::spawn().await;
    let resp = server.http.get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn rate_catalog_lists_benchmarks() {
    let server = TestServer::spawn().await;
    let rates: Vec<Value> = server
        .http
        .get(server.url("/config/rates"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rates.len(), 5);
    assert!(rates.iter().any(|r| r["key"] == "savium"));
}

#[tokio::test]
async fn account_routes_fail_closed_without_session() {
    let server = TestServer::spawn().await;

    let resp = server.http.get(server.url("/api/v1/account")).send().await.unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1401);

    let resp = server.get("/api/v1/transactions", "not-a-token").await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn sign_out_revokes_token() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-signout").await;
    assert_eq!(server.get("/api/v1/account", &token).await.status(), 200);

    let resp = server
        .http
        .delete(server.url("/api/v1/sessions"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(server.get("/api/v1/account", &token).await.status(), 401);
}

#[tokio::test]
async fn standard_withdrawal_then_cooldown() {
    let server = TestServer::spawn().await;
    server.seed_account("u-standard", 30, 1000.0).await;
    let token = server.sign_in("u-standard").await;

    let eligibility: Value = server
        .get("/api/v1/withdrawals/eligibility", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(eligibility["eligible"], true);
    assert_eq!(eligibility["frequency"], "first");

    let resp = server
        .post(
            "/api/v1/withdrawals",
            &token,
            &json!({ "mode": "standard", "amount": "500", "payment_method": "bank" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["record"]["kind"], "withdrawal");
    assert_eq!(body["record"]["status"], "processing");
    assert_eq!(body["new_balance"], 500.0);
    assert_eq!(server.balance(&token).await, 500.0);

    let resp = server
        .post("/api/v1/withdrawals", &token, &json!({ "amount": 100 }))
        .await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"]["details"],
        "You can only make one withdrawal every 3 days"
    );
    assert_eq!(server.balance(&token).await, 500.0);
}

#[tokio::test]
async fn young_account_uses_emergency_withdrawal() {
    let server = TestServer::spawn().await;
    server.seed_account("u-young", 2, 800.0).await;
    let token = server.sign_in("u-young").await;

    let resp = server
        .post("/api/v1/withdrawals", &token, &json!({ "amount": 100 }))
        .await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body["error"]["details"],
        "Accounts less than 7 days old cannot make withdrawals"
    );

    let resp = server
        .post(
            "/api/v1/withdrawals",
            &token,
            &json!({
                "mode": "emergency",
                "amount": 300,
                "emergency_type": "medical",
                "description": "Hospital admission for surgery next week",
                "documents": [
                    { "name": "bill.png", "type": "image/png", "content_base64": PNG_BASE64 }
                ]
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["record"]["kind"], "emergency_withdrawal");
    assert_eq!(body["record"]["status"], "pending_review");
    assert_eq!(body["record"]["emergency"]["priority"], "high");
    assert_eq!(server.balance(&token).await, 500.0);

    let history: Value = server
        .get("/api/v1/transactions?filter=emergency", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["count"], 1);
}

#[tokio::test]
async fn emergency_request_needs_documents() {
    let server = TestServer::spawn().await;
    server.seed_account("u-nodocs", 2, 800.0).await;
    let token = server.sign_in("u-nodocs").await;

    let resp = server
        .post(
            "/api/v1/withdrawals",
            &token,
            &json!({
                "mode": "emergency",
                "amount": 300,
                "emergency_type": "family",
                "description": "Travel for a family emergency abroad"
            }),
        )
        .await;
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1001);
    assert_eq!(server.balance(&token).await, 800.0);
}

#[tokio::test]
async fn withdrawal_above_balance_is_rejected() {
    let server = TestServer::spawn().await;
    server.seed_account("u-poor", 30, 50.0).await;
    let token = server.sign_in("u-poor").await;

    let resp = server
        .post("/api/v1/withdrawals", &token, &json!({ "amount": 100 }))
        .await;
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["details"], "Insufficient funds for withdrawal");
}

#[tokio::test]
async fn deposit_flow_credits_account_and_history() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-deposit").await;

    let resp = server
        .post("/api/v1/deposits/intent", &token, &json!({ "amount": 50, "currency": "inr" }))
        .await;
    assert_eq!(resp.status(), 400);

    let intent: Value = server
        .post("/api/v1/deposits/intent", &token, &json!({ "amount": 250.5 }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(intent["clientSecret"], "secret_25050");
    let pi = intent["paymentIntentId"].as_str().unwrap();

    let resp = server.confirm_deposit(&token, 250.5, pi).await;
    assert_eq!(resp.status(), 201);
    assert_eq!(server.balance(&token).await, 250.5);

    let resp = server
        .post(
            "/api/v1/deposits/confirm",
            &token,
            &json!({
                "amount": 100,
                "outcome": { "status": "failed", "message": "Card declined" }
            }),
        )
        .await;
    assert_eq!(resp.status(), 402);
    assert_eq!(server.balance(&token).await, 250.5);

    let history: Value = server
        .get("/api/v1/transactions", &token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(history["count"], 1);
    assert_eq!(history["transactions"][0]["kind"], "deposit");
}

#[tokio::test]
async fn unissued_payment_reference_credits_nothing() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-forged").await;

    let resp = server.confirm_deposit(&token, 1_000_000.0, "pi_made_up").await;
    assert_eq!(resp.status(), 404);
    assert_eq!(server.balance(&token).await, 0.0);

    let pi = server.deposit_intent(&token, 500.0).await;
    let resp = server.confirm_deposit(&token, 1_000_000.0, &pi).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(server.balance(&token).await, 0.0);
}

#[tokio::test]
async fn replayed_confirmation_credits_once() {
    let server = TestServer::spawn().await;
    let token = server.sign_in("u-replay").await;
    let pi = server.deposit_intent(&token, 300.0).await;

    assert_eq!(server.confirm_deposit(&token, 300.0, &pi).await.status(), 201);
    let resp = server.confirm_deposit(&token, 300.0, &pi).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(server.balance(&token).await, 300.0);

    let other = server.sign_in("u-replay-other").await;
    assert_eq!(server.confirm_deposit(&other, 300.0, &pi).await.status(), 404);
    assert_eq!(server.balance(&other).await, 0.0);
}

#[tokio::test]
async fn sign_in_requires_a_verified_id_token() {
    let server = TestServer::spawn().await;

    let resp = server
        .http
        .post(server.url("/api/v1/sessions"))
        .json(&json!({ "user_id": "u-victim" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = server
        .http
        .post(server.url("/api/v1/sessions"))
        .bearer_auth("forged-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1401);
}

#[tokio::test]
async fn full_size_emergency_documents_fit_the_body_limit() {
    let server = TestServer::spawn_with(SaviumConfig {
        withdrawal_max_documents: 2,
        ..SaviumConfig::default()
    })
    .await;
    server.seed_account("u-bigdocs", 2, 800.0).await;
    let token = server.sign_in("u-bigdocs").await;

    // 1000 KiB of PNG-signed bytes per document, base64 encoded.
    let mut bytes = vec![0_u8; 1000 * 1024];
    bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    let content = STANDARD.encode(&bytes);
    let document = |name: &str| json!({ "name": name, "type": "image/png", "content_base64": content });

    let resp = server
        .post(
            "/api/v1/withdrawals",
            &token,
            &json!({
                "mode": "emergency",
                "amount": 300,
                "emergency_type": "medical",
                "description": "Hospital admission for surgery next week",
                "documents": [document("bill.png"), document("report.png")]
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    assert_eq!(server.balance(&token).await, 500.0);

    let resp = server
        .post(
            "/api/v1/withdrawals",
            &token,
            &json!({
                "mode": "emergency",
                "amount": 10,
                "emergency_type": "medical",
                "description": "Hospital admission for surgery next week",
                "documents": [document("a.png"), document("b.png"), document("c.png")]
            }),
        )
        .await;
    assert_eq!(resp.status(), 413);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], 1004);
    assert_eq!(server.balance(&token).await, 500.0);
}

#[tokio::test]
async fn projections_compute_without_session() {
    let server = TestServer::spawn().await;

    let body: Value = server
        .http
        .get(server.url("/api/v1/projections?monthly=1000&rate=0&years=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["future_value"], 24_000.0);

    let body: Value = server
        .http
        .get(server.url("/api/v1/projections/savings-rate?income=5000&expenses=3500"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["percentage"], 30);
    assert_eq!(body["rate"], "excellent");

    let resp = server
        .http
        .get(server.url("/api/v1/projections/scenarios?risk=150"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
