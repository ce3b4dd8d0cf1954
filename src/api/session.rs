//! Bearer-token session extractor.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::domain::AccountId;
use crate::error::SaviumError;

/// The signed-in caller, resolved from `Authorization: Bearer <token>`.
///
/// Handlers taking a `Session` argument are account-scoped; requests without
/// a live token are rejected with [`SaviumError::AuthRequired`].
#[derive(Debug, Clone)]
pub struct Session {
    /// Account the token belongs to.
    pub account_id: AccountId,
    /// The bearer token itself.
    pub token: String,
    /// Identity-provider ID token the session was granted for.
    pub id_token: String,
}

/// Extracts the bearer token of a request, if any.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for Session {
    type Rejection = SaviumError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(SaviumError::AuthRequired)?;
        let session = state.sessions.resolve(token).await?;
        Ok(Self {
            account_id: session.account_id,
            token: token.to_string(),
            id_token: session.id_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn headers(header: Option<&str>) -> HeaderMap {
        let mut builder = Request::builder().uri("/api/v1/account");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (parts, ()) = builder.body(()).unwrap_or_default().into_parts();
        parts.headers
    }

    #[test]
    fn reads_bearer_token() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc123"))), Some("abc123"));
    }

    #[test]
    fn rejects_other_schemes_and_blanks() {
        assert_eq!(bearer_token(&headers(Some("Basic abc123"))), None);
        assert_eq!(bearer_token(&headers(Some("Bearer   "))), None);
        assert_eq!(bearer_token(&headers(None)), None);
    }
}
