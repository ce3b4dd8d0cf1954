//! Identity verification of sign-in requests.
//!
//! Sign-in presents the identity provider's ID token. The service never
//! trusts a self-asserted user id: an [`IdentityVerifier`] exchanges the
//! token for the provider's account record first.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::SaviumError;

/// Timeout of calls to the identity provider.
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity confirmed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    /// Provider user id; becomes the account id.
    pub user_id: String,
    /// Display name, empty when the provider has none.
    pub name: String,
    /// Contact email, empty when the provider has none.
    pub email: String,
}

/// Checks ID tokens with the identity provider.
#[async_trait]
pub trait IdentityVerifier: Send + Sync + fmt::Debug {
    /// Verifies `id_token` and returns whose it is.
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, SaviumError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<ProviderUser>,
}

/// [`IdentityVerifier`] backed by the provider's account-lookup endpoint
/// (`POST {lookup_url}?key=` with `{"idToken": ..}`).
///
/// The provider rejects expired, revoked or forged tokens with a 4xx.
#[derive(Debug, Clone)]
pub struct HttpIdentityVerifier {
    http: reqwest::Client,
    lookup_url: String,
    api_key: Option<String>,
}

impl HttpIdentityVerifier {
    /// Creates a verifier for the lookup endpoint at `lookup_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SaviumError::Internal`] if the HTTP client cannot be built.
    pub fn new(lookup_url: impl Into<String>, api_key: Option<String>) -> Result<Self, SaviumError> {
        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| SaviumError::Internal(format!("http client: {e}")))?;
        Ok(Self {
            http,
            lookup_url: lookup_url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, SaviumError> {
        let mut request = self
            .http
            .post(&self.lookup_url)
            .json(&json!({ "idToken": id_token }));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SaviumError::IdentityUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            tracing::info!(status = status.as_u16(), "identity provider rejected token");
            return Err(SaviumError::AuthRequired);
        }
        if !status.is_success() {
            return Err(SaviumError::IdentityUnavailable(format!(
                "provider answered {status}"
            )));
        }

        let body = response
            .json::<LookupResponse>()
            .await
            .map_err(|e| SaviumError::IdentityUnavailable(format!("malformed lookup: {e}")))?;
        identity_from(body)
    }
}

fn identity_from(body: LookupResponse) -> Result<VerifiedIdentity, SaviumError> {
    let user = body
        .users
        .into_iter()
        .next()
        .filter(|u| !u.local_id.trim().is_empty())
        .ok_or(SaviumError::AuthRequired)?;
    Ok(VerifiedIdentity {
        user_id: user.local_id,
        name: user.display_name.unwrap_or_default(),
        email: user.email.unwrap_or_default(),
    })
}
