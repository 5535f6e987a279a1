//! Identity verification and bearer-credential middleware
//!
//! Verifying who a caller is belongs to an external identity provider; this
//! module only defines the contract ([`IdentityVerifier`]) plus two
//! providers and the middleware guarding the browsing and token routes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use super::error::ServerError;
use super::server::ServerState;
use crate::config::{IdentityConfig, StaticCredential};

/// Identity provider error type
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("credential rejected by identity provider")]
    InvalidCredential,

    #[error("verified identity lacks the '{0}' claim")]
    MissingClaim(&'static str),

    #[error("identity provider unavailable: {reason}")]
    Provider { reason: String },
}

/// Verified caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub name: String,
}

impl Principal {
    /// Name for greetings, the email when no name is known
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

/// Turns a bearer credential into a verified principal
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Principal, AuthError>;
}

/// Fixed credential table, for personal deployments and tests
pub struct StaticIdentityVerifier {
    credentials: Vec<(SecretString, Principal)>,
}

impl StaticIdentityVerifier {
    pub fn new(credentials: &[StaticCredential]) -> Self {
        Self {
            credentials: credentials
                .iter()
                .map(|c| {
                    (
                        c.credential.clone(),
                        Principal {
                            email: c.email.clone(),
                            name: c.name.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Constant-time comparison to prevent timing attacks
    fn credential_matches(expected: &str, given: &str) -> bool {
        expected.len() == given.len()
            && expected
                .as_bytes()
                .iter()
                .zip(given.as_bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Principal, AuthError> {
        self.credentials
            .iter()
            .find(|(expected, _)| Self::credential_matches(expected.expose_secret(), credential))
            .map(|(_, principal)| principal.clone())
            .ok_or(AuthError::InvalidCredential)
    }
}

/// Claims returned by a token-info endpoint
#[derive(Debug, Deserialize)]
struct TokenInfo {
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Delegates verification to a token-info endpoint.
///
/// The credential is sent as the `id_token` query parameter; a 2xx answer
/// carrying an `email` claim is a verified identity.
pub struct RemoteIdentityVerifier {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteIdentityVerifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Provider { reason: e.to_string() })?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl IdentityVerifier for RemoteIdentityVerifier {
    async fn verify(&self, credential: &str) -> Result<Principal, AuthError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", credential)])
            .send()
            .await
            .map_err(|e| AuthError::Provider { reason: e.to_string() })?;

        if response.status().is_client_error() {
            return Err(AuthError::InvalidCredential);
        }
        if !response.status().is_success() {
            return Err(AuthError::Provider {
                reason: format!("status {}", response.status()),
            });
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Provider { reason: e.to_string() })?;

        Ok(Principal {
            email: info.email.ok_or(AuthError::MissingClaim("email"))?,
            name: info.name.unwrap_or_default(),
        })
    }
}

/// Build the verifier selected by the configuration
pub fn verifier_from_config(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityVerifier>, AuthError> {
    Ok(match config {
        IdentityConfig::Static { credentials } => {
            if credentials.is_empty() {
                tracing::warn!("Static identity provider has no credentials; every login will fail");
            }
            Arc::new(StaticIdentityVerifier::new(credentials))
        }
        IdentityConfig::Remote {
            endpoint,
            timeout_secs,
        } => Arc::new(RemoteIdentityVerifier::new(
            endpoint.clone(),
            Duration::from_secs(*timeout_secs),
        )?),
    })
}

/// Extract the credential of an `Authorization: Bearer <credential>` header
pub fn bearer_credential(headers: &HeaderMap) -> Result<&str, ServerError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::Unauthorized)?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(credential), None)
            if scheme.eq_ignore_ascii_case("bearer") && !credential.is_empty() =>
        {
            Ok(credential)
        }
        _ => Err(ServerError::Unauthorized),
    }
}

/// Verify the bearer credential and the whitelist, then expose the
/// [`Principal`] to handlers as a request extension
pub async fn auth_middleware(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    // No borrow of the request may live across the await, its body is !Sync
    let credential = bearer_credential(request.headers())?.to_owned();
    let path = request.uri().path().to_owned();

    let principal = state.verifier.verify(&credential).await.map_err(|e| {
        tracing::warn!("Identity verification failed for {}: {}", path, e);
        e
    })?;

    if !state.is_whitelisted(&principal.email) {
        tracing::warn!("User not whitelisted: {}", principal.email);
        return Err(ServerError::NotWhitelisted {
            email: principal.email,
        });
    }

    tracing::debug!(email = %principal.email, "Identity verified");
    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
