//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL of the storefront (checkout redirects)
//! - `SANITY_PROJECT_ID` - Sanity project ID
//! - `SHIPENGINE_API_KEY` - ShipEngine API key
//! - `STRIPE_SECRET_KEY` - Stripe secret API key
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `SANITY_DATASET` - Dataset name (default: production)
//! - `SANITY_API_VERSION` - Query API version (default: 2024-01-01)
//! - `SANITY_TOKEN` - Read token for private datasets
//! - `SANITY_API_HOST` - Override the query host (default: `https://{project}.api.sanity.io`)
//! - `SHIPENGINE_BASE_URL` - Rate API base (default: <https://api.shipengine.com>)
//! - `SHIPENGINE_CARRIER_IDS` - Comma-separated carrier IDs (default: query all carriers)
//! - `SHIP_FROM_*` - Shipping origin (`NAME`, `PHONE`, `ADDRESS_LINE1`, `ADDRESS_LINE2`,
//!   `CITY`, `STATE`, `POSTAL_CODE`, `COUNTRY`); quotes fail until it is set
//! - `SHIPPING_DEFAULT_WEIGHT_LB` - Weight for items without one (default: 1)
//! - `SHIPPING_DEFAULT_DIMENSIONS` - Box for items without one (default: 12x9x4)
//! - `STRIPE_WEBHOOK_SECRET` - Signing secret for `/api/stripe/webhook`
//! - `STRIPE_BASE_URL` - Stripe API base (default: <https://api.stripe.com>)
//! - `CHECKOUT_SUCCESS_PATH` - Redirect after payment (default: /checkout/success)
//! - `CHECKOUT_CANCEL_PATH` - Redirect on cancel (default: /cart)
//! - `HTTP_TIMEOUT_SECS` - Upstream request timeout (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use tidewater_core::{CarrierId, Destination, Dimensions};
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: Url,
    /// Sanity content store
    pub sanity: SanityConfig,
    /// ShipEngine rate API
    pub shipengine: ShipEngineConfig,
    /// Origin address and package defaults
    pub shipping: ShippingConfig,
    /// Stripe payments
    pub stripe: StripeConfig,
    /// Timeout for every upstream HTTP request
    pub http_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Sanity content store configuration.
#[derive(Clone)]
pub struct SanityConfig {
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    /// Read token; unset for public datasets
    pub token: Option<SecretString>,
    /// Query host override
    pub api_host: Option<Url>,
}

impl std::fmt::Debug for SanityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SanityConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("api_version", &self.api_version)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("api_host", &self.api_host)
            .finish()
    }
}

/// ShipEngine rate API configuration.
#[derive(Clone)]
pub struct ShipEngineConfig {
    pub api_key: SecretString,
    pub base_url: Url,
    /// Carriers to quote; empty means every carrier on the account
    pub carrier_ids: Vec<CarrierId>,
}

impl std::fmt::Debug for ShipEngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShipEngineConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url.as_str())
            .field("carrier_ids", &self.carrier_ids)
            .finish()
    }
}

/// Shipping origin and package defaults.
#[derive(Debug, Clone)]
pub struct ShippingConfig {
    /// Ship-from address; quotes fail with a configuration error while unset
    pub origin: Option<Destination>,
    pub default_weight_lb: f64,
    pub default_dimensions: Dimensions,
}

/// Stripe configuration.
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: SecretString,
    pub webhook_secret: Option<SecretString>,
    pub base_url: Url,
    pub success_path: String,
    pub cancel_path: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("base_url", &self.base_url.as_str())
            .field("success_path", &self.success_path)
            .field("cancel_path", &self.cancel_path)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_url("STOREFRONT_BASE_URL")?;
        let timeout_secs = parse_env_or_default::<u64>("HTTP_TIMEOUT_SECS", "15")?;

        Ok(Self {
            host,
            port,
            base_url,
            sanity: SanityConfig::from_env()?,
            shipengine: ShipEngineConfig::from_env()?,
            shipping: ShippingConfig::from_env()?,
            stripe: StripeConfig::from_env()?,
            http_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or_default::<f32>("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env_or_default::<f32>(
                "SENTRY_TRACES_SAMPLE_RATE",
                "0.1",
            )?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Where Stripe sends the shopper after paying.
    ///
    /// Stripe substitutes `{CHECKOUT_SESSION_ID}` itself.
    #[must_use]
    pub fn checkout_success_url(&self) -> String {
        format!(
            "{}?session_id={{CHECKOUT_SESSION_ID}}",
            self.join_path(&self.stripe.success_path)
        )
    }

    /// Where Stripe sends the shopper after cancelling.
    #[must_use]
    pub fn checkout_cancel_url(&self) -> String {
        self.join_path(&self.stripe.cancel_path)
    }

    fn join_path(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl SanityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            project_id: get_required_env("SANITY_PROJECT_ID")?,
            dataset: get_env_or_default("SANITY_DATASET", "production"),
            api_version: get_env_or_default("SANITY_API_VERSION", "2024-01-01"),
            token: get_optional_env("SANITY_TOKEN").map(SecretString::from),
            api_host: get_optional_env("SANITY_API_HOST")
                .map(|v| parse_url("SANITY_API_HOST", &v))
                .transpose()?,
        })
    }

    /// Full URL of the GROQ query endpoint.
    #[must_use]
    pub fn query_endpoint(&self) -> String {
        let host = self.api_host.as_ref().map_or_else(
            || format!("https://{}.api.sanity.io", self.project_id),
            |url| url.as_str().trim_end_matches('/').to_string(),
        );
        let version = self.api_version.trim_start_matches('v');
        format!("{host}/v{version}/data/query/{}", self.dataset)
    }
}

impl ShipEngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let carrier_ids = get_optional_env("SHIPENGINE_CARRIER_IDS")
            .map(|v| parse_carrier_ids(&v))
            .unwrap_or_default();

        Ok(Self {
            api_key: get_validated_secret("SHIPENGINE_API_KEY")?,
            base_url: parse_url(
                "SHIPENGINE_BASE_URL",
                &get_env_or_default("SHIPENGINE_BASE_URL", "https://api.shipengine.com"),
            )?,
            carrier_ids,
        })
    }
}

impl ShippingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let default_dimensions = get_env_or_default("SHIPPING_DEFAULT_DIMENSIONS", "12x9x4")
            .parse::<Dimensions>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("SHIPPING_DEFAULT_DIMENSIONS".to_string(), e.to_string())
            })?;
        let default_weight_lb = parse_env_or_default::<f64>("SHIPPING_DEFAULT_WEIGHT_LB", "1")?;
        if !default_weight_lb.is_finite() || default_weight_lb <= 0.0 {
            return Err(ConfigError::InvalidEnvVar(
                "SHIPPING_DEFAULT_WEIGHT_LB".to_string(),
                "must be a positive number".to_string(),
            ));
        }

        Ok(Self {
            origin: origin_from_env()?,
            default_weight_lb,
            default_dimensions,
        })
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let webhook_secret = get_optional_env("STRIPE_WEBHOOK_SECRET")
            .map(|value| {
                validate_secret_strength(&value, "STRIPE_WEBHOOK_SECRET")?;
                Ok::<_, ConfigError>(SecretString::from(value))
            })
            .transpose()?;

        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret,
            base_url: parse_url(
                "STRIPE_BASE_URL",
                &get_env_or_default("STRIPE_BASE_URL", "https://api.stripe.com"),
            )?,
            success_path: get_env_or_default("CHECKOUT_SUCCESS_PATH", "/checkout/success"),
            cancel_path: get_env_or_default("CHECKOUT_CANCEL_PATH", "/cart"),
        })
    }
}

/// Ship-from address. All of it or none of it.
fn origin_from_env() -> Result<Option<Destination>, ConfigError> {
    let origin = Destination {
        name: get_optional_env("SHIP_FROM_NAME"),
        phone: get_optional_env("SHIP_FROM_PHONE"),
        email: None,
        address_line1: get_optional_env("SHIP_FROM_ADDRESS_LINE1").unwrap_or_default(),
        address_line2: get_optional_env("SHIP_FROM_ADDRESS_LINE2"),
        city: get_optional_env("SHIP_FROM_CITY").unwrap_or_default(),
        state: get_optional_env("SHIP_FROM_STATE").unwrap_or_default(),
        postal_code: get_optional_env("SHIP_FROM_POSTAL_CODE").unwrap_or_default(),
        country: get_env_or_default("SHIP_FROM_COUNTRY", "US"),
    };

    let missing = origin.missing_fields();
    // Country alone has a default, so four missing fields means nothing was set.
    if missing.len() == 4 && !missing.contains(&"country") {
        return Ok(None);
    }
    if !missing.is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            "SHIP_FROM_*".to_string(),
            format!("incomplete shipping origin, missing: {}", missing.join(", ")),
        ));
    }
    Ok(Some(origin))
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to a default.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    parse_url(key, &get_required_env(key)?)
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_carrier_ids(value: &str) -> Vec<CarrierId> {
    value
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(CarrierId::from)
        .collect()
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real API keys have high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: Url::parse("https://shop.example.test/").unwrap(),
            sanity: SanityConfig {
                project_id: "abc123".to_string(),
                dataset: "production".to_string(),
                api_version: "2024-01-01".to_string(),
                token: None,
                api_host: None,
            },
            shipengine: ShipEngineConfig {
                api_key: SecretString::from("TEST_super_sensitive_key"),
                base_url: Url::parse("https://api.shipengine.com").unwrap(),
                carrier_ids: vec![],
            },
            shipping: ShippingConfig {
                origin: None,
                default_weight_lb: 1.0,
                default_dimensions: Dimensions::inches(12.0, 9.0, 4.0),
            },
            stripe: StripeConfig {
                secret_key: SecretString::from("sk_test_super_sensitive"),
                webhook_secret: Some(SecretString::from("whsec_super_sensitive")),
                base_url: Url::parse("https://api.stripe.com").unwrap(),
                success_path: "/checkout/success".to_string(),
                cancel_path: "cart".to_string(),
            },
            http_timeout: Duration::from_secs(15),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-api-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("sk_test_51Hq8vQ2eZvKYlo2C9xTmR4wP", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_parse_carrier_ids() {
        assert_eq!(
            parse_carrier_ids(" se-1, ,se-2,"),
            vec![CarrierId::new("se-1"), CarrierId::new("se-2")]
        );
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_checkout_urls() {
        let config = config();
        assert_eq!(
            config.checkout_success_url(),
            "https://shop.example.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(config.checkout_cancel_url(), "https://shop.example.test/cart");
    }

    #[test]
    fn test_sanity_query_endpoint() {
        let mut sanity = config().sanity;
        assert_eq!(
            sanity.query_endpoint(),
            "https://abc123.api.sanity.io/v2024-01-01/data/query/production"
        );

        sanity.api_host = Some(Url::parse("http://127.0.0.1:4010").unwrap());
        assert_eq!(
            sanity.query_endpoint(),
            "http://127.0.0.1:4010/v2024-01-01/data/query/production"
        );
    }

    #[test]
    fn test_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config());

        assert!(debug_output.contains("abc123"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("TEST_super_sensitive_key"));
        assert!(!debug_output.contains("sk_test_super_sensitive"));
        assert!(!debug_output.contains("whsec_super_sensitive"));
    }
}
