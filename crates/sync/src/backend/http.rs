//! HTTP cart backend client.
//!
//! Talks to a cart service exposing `GET`/`PUT /carts/{user_id}` with the
//! camelCase JSON wire format. Carts are never cached - they are mutable
//! state and the server copy is the authority.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;
use url::Url;

use cartbridge_core::UserId;

use crate::error::CartError;
use crate::state::{CartDocument, CartLine};

/// Configuration for the HTTP cart backend.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct HttpBackendConfig {
    /// Base URL of the cart service (e.g., `https://carts.example.com/api`).
    pub endpoint: Url,
    /// Bearer token for the cart service.
    pub access_token: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpBackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackendConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("access_token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Client for the cart service.
#[derive(Clone)]
pub struct HttpCartBackend {
    inner: Arc<HttpCartBackendInner>,
}

struct HttpCartBackendInner {
    client: reqwest::Client,
    endpoint: Url,
    access_token: SecretString,
}

impl HttpCartBackend {
    /// Create a new cart service client.
    ///
    /// # Errors
    ///
    /// Returns `Network` if the underlying HTTP client cannot be built.
    pub fn new(config: &HttpBackendConfig) -> Result<Self, CartError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CartError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(HttpCartBackendInner {
                client,
                endpoint: config.endpoint.clone(),
                access_token: config.access_token.clone(),
            }),
        })
    }

    fn cart_url(&self, user_id: &UserId) -> Result<Url, CartError> {
        let mut url = self.inner.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| CartError::Network("endpoint cannot be a base URL".to_string()))?
            .pop_if_empty()
            .push("carts")
            .push(user_id.as_str());
        Ok(url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.inner.access_token.expose_secret())
    }
}

impl super::CartBackend for HttpCartBackend {
    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn get_cart(&self, user_id: &UserId) -> Result<Vec<CartLine>, CartError> {
        let response = self
            .inner
            .client
            .get(self.cart_url(user_id)?)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        match status {
            reqwest::StatusCode::NOT_FOUND => {
                // No cart stored yet for this user
                Ok(Vec::new())
            }
            s if s.is_success() => {
                let document: CartDocument = response
                    .json()
                    .await
                    .map_err(|e| CartError::Server {
                        status: status.as_u16(),
                        message: format!("malformed cart document: {e}"),
                    })?;
                Ok(document.lines)
            }
            _ => Err(status_error(status, response).await),
        }
    }

    #[instrument(skip(self, lines), fields(user_id = %user_id, lines = lines.len()))]
    async fn put_cart(&self, user_id: &UserId, lines: &[CartLine]) -> Result<(), CartError> {
        let document = CartDocument {
            lines: lines.to_vec(),
        };

        let response = self
            .inner
            .client
            .put(self.cart_url(user_id)?)
            .header(reqwest::header::AUTHORIZATION, self.bearer())
            .json(&document)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(status_error(status, response).await)
        }
    }
}

/// Map a transport-level failure to the cart error taxonomy.
fn transport_error(err: reqwest::Error) -> CartError {
    if err.is_timeout() {
        CartError::Network("request timed out".to_string())
    } else {
        CartError::Network(err.to_string())
    }
}

/// Map a non-success HTTP status to the cart error taxonomy.
async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> CartError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return CartError::Unauthenticated;
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "no response body".to_string())
        .chars()
        .take(200)
        .collect::<String>();

    CartError::Server {
        status: status.as_u16(),
        message,
    }
}
