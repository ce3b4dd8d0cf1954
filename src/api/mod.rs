//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Resource endpoints are mounted under `/api/v1`; system endpoints and the
//! WebSocket live at the root.

pub mod dto;
pub mod handlers;
pub mod session;

use std::time::Duration;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::app_state::AppState;
use crate::config::SaviumConfig;
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws::handler::ws_handler;

/// Upper bound on the time spent producing a response.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Registers the bearer-token security scheme.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

/// OpenAPI description of the REST API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "savium-ledger",
        description = "Withdrawals, deposits and transaction history of Savium accounts."
    ),
    paths(
        handlers::session::sign_in,
        handlers::session::sign_out,
        handlers::account::get_account,
        handlers::withdrawal::get_eligibility,
        handlers::withdrawal::create_withdrawal,
        handlers::transaction::list_transactions,
        handlers::deposit::create_intent,
        handlers::deposit::confirm_deposit,
        handlers::projection::project,
        handlers::projection::savings_rate,
        handlers::projection::completion,
        handlers::projection::scenarios,
        handlers::system::health_handler,
        handlers::system::rates_handler,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    modifiers(&BearerAuth),
    tags(
        (name = "Sessions", description = "Sign-in and sign-out"),
        (name = "Account", description = "Account snapshot"),
        (name = "Withdrawals", description = "Standard and emergency withdrawals"),
        (name = "Transactions", description = "Merged ledger history"),
        (name = "Deposits", description = "Payment intents and confirmations"),
        (name = "Projections", description = "Investment calculators"),
        (name = "System", description = "Health and configuration"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router(config: &SaviumConfig) -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes(config))
        .merge(handlers::system::routes())
        .merge(api_docs())
}

#[cfg(feature = "swagger-ui")]
fn api_docs() -> Router<AppState> {
    Router::new().merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn api_docs() -> Router<AppState> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}

/// Builds the full application: REST, WebSocket and the HTTP middleware
/// stack, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(REQUEST_TIMEOUT);
    let middleware = ServiceBuilder::new()
        .layer(CorsLayer::permissive())
        .map_response(|res: axum::http::Response<_>| res.map(axum::body::Body::new))
        .layer(TraceLayer::new_for_http())
        .layer(timeout);

    Router::new()
        .merge(build_router(&state.config))
        .route("/ws", get(ws_handler))
        .layer(middleware)
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::AccountId;
    use crate::service::{HttpDepositIntentClient, HttpIdentityVerifier};
    use crate::store::MemoryStore;

    fn state(config: SaviumConfig) -> AppState {
        let (Ok(deposits), Ok(identity)) = (
            HttpDepositIntentClient::new("http://127.0.0.1:9"),
            HttpIdentityVerifier::new("http://127.0.0.1:9/lookup", None),
        ) else {
            panic!("clients should build");
        };
        AppState::new(config, Arc::new(MemoryStore::new()), Arc::new(deposits), Arc::new(identity))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let Ok(bytes) = to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body unreadable");
        };
        serde_json::from_slice(&bytes).unwrap_or_default()
    }

    #[tokio::test]
    async fn sign_in_without_id_token_is_unauthorized() {
        let app = build_app(state(SaviumConfig::default()));
        let request = Request::post("/api/v1/sessions").body(Body::empty());
        let Ok(request) = request else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], 1401);
    }

    #[tokio::test]
    async fn oversized_withdrawal_body_gets_error_envelope() {
        let config = SaviumConfig {
            withdrawal_max_documents: 1,
            ..SaviumConfig::default()
        };
        let state = state(config);
        let token = state.sessions.sign_in(AccountId::new("u1"), String::new()).await;
        let app = build_app(state);

        let body = json!({
            "mode": "emergency",
            "amount": 10,
            "documents": [{
                "name": "scan.pdf",
                "type": "application/pdf",
                "content_base64": "A".repeat(handlers::withdrawal::body_limit(1) + 1),
            }]
        });
        let request = Request::post("/api/v1/withdrawals")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()));
        let Ok(request) = request else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router failed");
        };
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json_body(response).await["error"]["code"], 1004);
    }

    #[test]
    fn openapi_lists_every_resource() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/sessions",
            "/api/v1/account",
            "/api/v1/withdrawals",
            "/api/v1/withdrawals/eligibility",
            "/api/v1/transactions",
            "/api/v1/deposits/intent",
            "/api/v1/deposits/confirm",
            "/api/v1/projections",
            "/health",
            "/config/rates",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn bearer_scheme_is_registered() {
        let doc = ApiDoc::openapi();
        let Some(components) = doc.components else {
            panic!("no components");
        };
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
