//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional:
//! - `CART_API_URL` - Base URL of the remote cart service (default: `http://localhost:8080/api`)
//! - `CART_API_TOKEN` - Bearer token sent with every remote call
//! - `CART_STORAGE_DIR` - Directory of the file-backed local store (default: `.mercado-cart`)
//! - `CART_SHIPPING_FEE` - Flat shipping fee in standard units (default: 2500)
//! - `CART_CURRENCY` - Currency code (default: ARS)
//! - `CART_PENDING_INTENT_TTL_SECS` - Pending add-to-cart intent lifetime (default: 1800)
//! - `CART_FALLBACK` - `keep-local` or `rollback` when a remote mutation fails (default: keep-local)
//! - `CART_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: none)

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mercado_cart_core::{CurrencyCode, Price, ShippingPolicy};
use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const DEFAULT_STORAGE_DIR: &str = ".mercado-cart";
const DEFAULT_SHIPPING_FEE: &str = "2500";
const DEFAULT_PENDING_INTENT_TTL_SECS: u64 = 30 * 60;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// What to do with the tentative local change when a remote mutation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Keep the local change and flag the error.
    #[default]
    KeepLocal,
    /// Restore the state from before the mutation and flag the error.
    Rollback,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keep-local" | "keep_local" | "local" => Ok(Self::KeepLocal),
            "rollback" => Ok(Self::Rollback),
            other => Err(format!("expected keep-local or rollback, got '{other}'")),
        }
    }
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Remote cart service configuration
    pub remote: RemoteConfig,
    /// Directory of the file-backed local store
    pub storage_dir: PathBuf,
    /// Shipping fee policy
    pub shipping: ShippingPolicy,
    /// How long a captured pending intent stays valid
    pub pending_intent_ttl: Duration,
    /// Behavior when a remote mutation fails
    pub fallback: FallbackPolicy,
}

/// Remote cart service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL, e.g. `http://localhost:8080/api`
    pub base_url: Url,
    /// Bearer token for authenticated calls
    pub api_token: Option<SecretString>,
    /// Optional per-request timeout
    pub request_timeout: Option<Duration>,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl RemoteConfig {
    /// Remote configuration for `base_url` without token or timeout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if `base_url` is not a valid URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url("CART_API_URL", base_url)?,
            api_token: None,
            request_timeout: None,
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(
            "CART_API_URL",
            &get_env_or_default("CART_API_URL", DEFAULT_API_URL),
        )?;
        let api_token = get_optional_env("CART_API_TOKEN").map(SecretString::from);
        let request_timeout = get_optional_env("CART_REQUEST_TIMEOUT_SECS")
            .map(|v| parse_var::<u64>("CART_REQUEST_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            base_url,
            api_token,
            request_timeout,
        })
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let remote = RemoteConfig::from_env()?;
        let storage_dir = PathBuf::from(get_env_or_default("CART_STORAGE_DIR", DEFAULT_STORAGE_DIR));

        let currency = parse_var::<CurrencyCode>(
            "CART_CURRENCY",
            &get_env_or_default("CART_CURRENCY", "ARS"),
        )?;
        let fee = parse_var::<Decimal>(
            "CART_SHIPPING_FEE",
            &get_env_or_default("CART_SHIPPING_FEE", DEFAULT_SHIPPING_FEE),
        )?;
        if fee.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                "CART_SHIPPING_FEE".to_string(),
                "must not be negative".to_string(),
            ));
        }

        let ttl_secs = get_optional_env("CART_PENDING_INTENT_TTL_SECS")
            .map(|v| parse_var::<u64>("CART_PENDING_INTENT_TTL_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_PENDING_INTENT_TTL_SECS);

        let fallback = parse_var::<FallbackPolicy>(
            "CART_FALLBACK",
            &get_env_or_default("CART_FALLBACK", "keep-local"),
        )?;

        Ok(Self {
            remote,
            storage_dir,
            shipping: ShippingPolicy::new(Price::new(fee, currency)),
            pending_intent_ttl: Duration::from_secs(ttl_secs),
            fallback,
        })
    }

    /// Defaults for everything, pointing at `remote`.
    #[must_use]
    pub fn with_remote(remote: RemoteConfig) -> Self {
        Self {
            remote,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            shipping: ShippingPolicy::default(),
            pending_intent_ttl: Duration::from_secs(DEFAULT_PENDING_INTENT_TTL_SECS),
            fallback: FallbackPolicy::default(),
        }
    }

    /// Currency used for totals.
    #[must_use]
    pub const fn currency(&self) -> CurrencyCode {
        self.shipping.flat_fee.currency_code
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse a variable value, mapping failures to `ConfigError::InvalidEnvVar`.
fn parse_var<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the base URL and make sure joining paths onto it keeps its path.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an absolute http(s) URL".to_string(),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
