//! HTTP implementation of [`CartRemote`] using `reqwest`.

use std::sync::Arc;

use mercado_cart_core::{CartItemId, ProductId};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use url::Url;

use super::{CartRemote, RemoteCart, RemoteError};
use crate::config::RemoteConfig;

/// Maximum number of body characters kept in logs and errors.
const BODY_LOG_LIMIT: usize = 500;

// =============================================================================
// HttpCartRemote
// =============================================================================

/// Client for the remote cart service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct HttpCartRemote {
    inner: Arc<HttpCartRemoteInner>,
}

struct HttpCartRemoteInner {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<SecretString>,
}

impl HttpCartRemote {
    /// Create a new remote cart client.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            inner: Arc::new(HttpCartRemoteInner {
                client: builder.build()?,
                base_url: config.base_url.clone(),
                api_token: config.api_token.clone(),
            }),
        })
    }

    /// Build `{base}/cart/{segments...}?{query}`.
    ///
    /// Segments are percent-encoded, so owner keys that are emails are safe.
    fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, RemoteError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .push("cart")
            .extend(segments);

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Execute a request and decode the cart snapshot it returns.
    async fn execute(&self, method: Method, url: Url) -> Result<RemoteCart, RemoteError> {
        let mut request = self
            .inner
            .client
            .request(method, url)
            .header("Accept", "application/json");
        if let Some(token) = &self.inner.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();

        // Check for rate limiting
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let body = response.text().await?;

        if !status.is_success() {
            let truncated = body.chars().take(BODY_LOG_LIMIT).collect::<String>();
            tracing::error!(
                status = %status,
                body = %truncated,
                "Cart service returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: truncated,
            });
        }

        // No content means an empty cart (DELETE /cart/{owner} answers 204)
        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            debug!("Empty response body, treating as empty cart");
            return Ok(RemoteCart::empty());
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(BODY_LOG_LIMIT).collect::<String>(),
                "Failed to parse cart snapshot"
            );
            RemoteError::Parse(e)
        })
    }
}

impl CartRemote for HttpCartRemote {
    #[instrument(skip(self))]
    async fn fetch_cart(&self, owner: &str) -> Result<RemoteCart, RemoteError> {
        let url = self.endpoint(&[owner], &[])?;
        self.execute(Method::GET, url).await
    }

    #[instrument(skip(self))]
    async fn add_item(
        &self,
        owner: &str,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<RemoteCart, RemoteError> {
        let url = self.endpoint(
            &[owner, "items"],
            &[
                ("productId", product_id.to_string()),
                ("quantity", quantity.to_string()),
            ],
        )?;
        self.execute(Method::POST, url).await
    }

    #[instrument(skip(self))]
    async fn update_item(
        &self,
        owner: &str,
        item_id: CartItemId,
        quantity: u32,
    ) -> Result<RemoteCart, RemoteError> {
        let item = item_id.to_string();
        let url = self.endpoint(
            &[owner, "items", &item],
            &[("quantity", quantity.to_string())],
        )?;
        self.execute(Method::PUT, url).await
    }

    #[instrument(skip(self))]
    async fn remove_item(
        &self,
        owner: &str,
        item_id: CartItemId,
    ) -> Result<RemoteCart, RemoteError> {
        let item = item_id.to_string();
        let url = self.endpoint(&[owner, "items", &item], &[])?;
        self.execute(Method::DELETE, url).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self, owner: &str) -> Result<RemoteCart, RemoteError> {
        let url = self.endpoint(&[owner], &[])?;
        self.execute(Method::DELETE, url).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpCartRemote {
        HttpCartRemote::new(&RemoteConfig::new(base).unwrap()).unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let remote = client("http://localhost:8080/api");
        let url = remote.endpoint(&["42"], &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/cart/42");
    }

    #[test]
    fn test_endpoint_encodes_owner_and_query() {
        let remote = client("http://localhost:8080/api/");
        let url = remote
            .endpoint(
                &["ana@example.com", "items"],
                &[("productId", "7".to_string()), ("quantity", "2".to_string())],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/cart/ana@example.com/items?productId=7&quantity=2"
        );

        let url = remote.endpoint(&["a/b"], &[]).unwrap();
        assert_eq!(url.path(), "/api/cart/a%2Fb");
    }
}
