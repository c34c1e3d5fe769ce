use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use storefront::client::RetryPolicy;
use storefront::routes::RoutePaths;
use thiserror::Error;
use url::Url;

/// Upper bound on configured 429 retries. With exponential backoff anything
/// past this stalls the drawer for longer than a shopper would wait.
pub const MAX_RETRY_LIMIT: u32 = 8;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Storefront base URL must use http or https, got {0:?}")]
    UnsupportedScheme(String),

    #[error("Section id cannot be empty")]
    EmptySectionId,

    #[error("Element id cannot be empty")]
    EmptyElementId,

    #[error("Endpoint path must start with '/': {0:?}")]
    RelativeEndpointPath(String),

    #[error("Retry limit {0} exceeds the maximum of {max}", max = MAX_RETRY_LIMIT)]
    RetryLimitTooHigh(u32),

    #[error("Retry base delay cannot be 0")]
    ZeroRetryDelay,

    #[error("Submit release delay cannot be 0")]
    ZeroSubmitReleaseDelay,
}

/// Where the storefront lives and how to talk to its cart API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StorefrontConfig {
    /// Origin of the storefront, e.g. "https://shop.example.com"
    pub base_url: Url,
    /// Cart API endpoint paths, root-relative
    #[serde(default)]
    pub routes: RoutePaths,
    /// Backoff for rate-limited mutations
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Backoff settings for cart mutations answered with HTTP 429.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// How many times a rate-limited request is retried before giving up
    pub max_retries: u32,
    /// Delay before the first retry; each later retry doubles it
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 1,
            base_delay_ms: 300,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
        }
    }
}

/// Section ids requested from the section rendering endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct SectionIds {
    /// Section rendering the slide-out cart
    pub drawer: String,
    /// Section rendering the header cart bubble
    pub bubble: String,
}

impl Default for SectionIds {
    fn default() -> Self {
        SectionIds {
            drawer: "cart-drawer".to_string(),
            bubble: "cart-icon-bubble".to_string(),
        }
    }
}

/// Element ids located inside the rendered fragments.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElementIds {
    /// Drawer container, swapped wholesale on refresh
    pub drawer: String,
    /// Bubble element whose inner markup is swapped
    pub bubble: String,
    /// Script element embedding the upsell pool JSON
    pub upsell_pool: String,
}

impl Default for ElementIds {
    fn default() -> Self {
        ElementIds {
            drawer: "CartDrawer".to_string(),
            bubble: "cart-icon-bubble".to_string(),
            upsell_pool: "sc-upsell-pool".to_string(),
        }
    }
}

/// Timing knobs for the concurrency guards.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimingConfig {
    /// How long the add-to-cart lock lingers after a submission finishes,
    /// absorbing trailing duplicate events
    pub submit_release_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            submit_release_ms: 200,
        }
    }
}

impl TimingConfig {
    pub fn submit_release(&self) -> Duration {
        Duration::from_millis(self.submit_release_ms)
    }
}

/// Optional telemetry sinks.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub statsd: Option<StatsdConfig>,
    pub sentry_dsn: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StatsdConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_statsd_prefix")]
    pub prefix: String,
}

fn default_statsd_prefix() -> String {
    "sidecart".to_string()
}

/// Top-level configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DrawerConfig {
    pub storefront: StorefrontConfig,
    #[serde(default)]
    pub sections: SectionIds,
    #[serde(default)]
    pub elements: ElementIds,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl DrawerConfig {
    /// Reads and validates a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: DrawerConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let scheme = self.storefront.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ValidationError::UnsupportedScheme(scheme.to_string()));
        }

        let paths = &self.storefront.routes;
        for path in [&paths.cart, &paths.add, &paths.change, &paths.update] {
            if !path.starts_with('/') {
                return Err(ValidationError::RelativeEndpointPath(path.clone()));
            }
        }

        for id in [&self.sections.drawer, &self.sections.bubble] {
            if id.is_empty() {
                return Err(ValidationError::EmptySectionId);
            }
        }
        for id in [
            &self.elements.drawer,
            &self.elements.bubble,
            &self.elements.upsell_pool,
        ] {
            if id.is_empty() {
                return Err(ValidationError::EmptyElementId);
            }
        }

        if self.storefront.retry.max_retries > MAX_RETRY_LIMIT {
            return Err(ValidationError::RetryLimitTooHigh(
                self.storefront.retry.max_retries,
            ));
        }
        if self.storefront.retry.base_delay_ms == 0 {
            return Err(ValidationError::ZeroRetryDelay);
        }
        if self.timing.submit_release_ms == 0 {
            return Err(ValidationError::ZeroSubmitReleaseDelay);
        }

        Ok(())
    }
}
