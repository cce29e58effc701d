//! Discovery Configuration
//!
//! Every option recognised by the resolver, with the defaults used when the
//! owning process leaves an option unset.

use crate::credentials::BuiltinProvider;
use crate::endpoints::PortPolicy;
use crate::error::{DiscoveryError, Result};
use std::time::Duration;

/// Explicit access key / secret key pair.
#[derive(Clone)]
pub struct StaticKeyPair {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for StaticKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyPair")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .finish()
    }
}

/// Resolver configuration with sensible defaults
#[derive(Debug, Clone)]
pub struct PingConfig {
    // Credentials
    /// Explicit access key (must be paired with `secret_key`)
    pub access_key: Option<String>,
    /// Explicit secret key (must be paired with `access_key`)
    pub secret_key: Option<String>,
    /// Registered credentials strategy used when no explicit keys are set.
    /// Also accepted as `credentials_provider_class`; the value is a registry
    /// name such as `instance_profile`, not a class name.
    pub credentials_provider: String,

    // Matching criteria
    /// Filter grammar: `name1=value1,value2;name2=value3`
    pub filters: Option<String>,
    /// Comma separated tag names that identify this cluster
    pub tags: Option<String>,

    // Port expansion
    /// Base port used for cluster membership
    pub port_number: u16,
    /// Number of additional ports probed after `port_number`
    pub port_range: u16,

    // Diagnostics
    /// Log request and fault body for every failed inventory call
    pub log_aws_error_messages: bool,

    // Metadata endpoint
    /// Base URL of the instance metadata service
    pub metadata_endpoint: String,
    /// Timeout for each metadata request
    pub metadata_timeout: Duration,

    // Identity retry
    /// Delay before the first identity retry
    pub identity_backoff_initial: Duration,
    /// Upper bound for the delay between identity retries
    pub identity_backoff_max: Duration,
    /// Total time spent retrying the identity fetch (zero = single attempt)
    pub identity_backoff_max_elapsed: Duration,
    /// Growth factor applied to the delay after each failed attempt
    pub identity_backoff_multiplier: f64,

    // Inventory client
    /// Overrides the regional endpoint derived from the identity's region
    pub inventory_endpoint: Option<String>,
    /// Per-request timeout for inventory calls
    pub request_timeout: Duration,
    /// Page size for filtered describe queries
    pub page_size: i32,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            secret_key: None,
            credentials_provider: BuiltinProvider::Default.to_string(),

            filters: None,
            tags: None,

            port_number: PortPolicy::DEFAULT_BASE_PORT,
            port_range: PortPolicy::DEFAULT_PORT_RANGE,

            log_aws_error_messages: false,

            metadata_endpoint: "http://169.254.169.254".to_string(),
            metadata_timeout: Duration::from_secs(2),

            identity_backoff_initial: Duration::from_millis(250),
            identity_backoff_max: Duration::from_secs(2),
            identity_backoff_max_elapsed: Duration::from_secs(10),
            identity_backoff_multiplier: 2.0,

            inventory_endpoint: None,
            request_timeout: Duration::from_secs(30),
            page_size: 1000,
        }
    }
}

impl PingConfig {
    /// Check the static parts of the configuration.
    ///
    /// Criteria syntax is checked when the lifecycle parses them.
    pub fn validate(&self) -> Result<()> {
        self.static_key_pair()?;
        self.port_policy().validate()?;

        if self.credentials_provider.trim().is_empty() && self.static_key_pair()?.is_none() {
            return Err(DiscoveryError::InvalidConfig(
                "credentials_provider must not be empty".to_string(),
            ));
        }

        if self.metadata_endpoint.trim().is_empty() {
            return Err(DiscoveryError::InvalidConfig(
                "metadata_endpoint must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The explicit key pair, if configured. Keys are both-or-neither.
    pub fn static_key_pair(&self) -> Result<Option<StaticKeyPair>> {
        let access = self.access_key.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let secret = self.secret_key.as_deref().map(str::trim).filter(|s| !s.is_empty());

        match (access, secret) {
            (Some(access_key), Some(secret_key)) => Ok(Some(StaticKeyPair {
                access_key: access_key.to_string(),
                secret_key: secret_key.to_string(),
            })),
            (None, None) => Ok(None),
            _ => Err(DiscoveryError::InvalidConfig(
                "access_key and secret_key must be configured together".to_string(),
            )),
        }
    }

    pub fn port_policy(&self) -> PortPolicy {
        PortPolicy::new(self.port_number, self.port_range)
    }

    /// Page size clamped to the range the inventory API accepts.
    pub fn effective_page_size(&self) -> i32 {
        self.page_size.clamp(5, 1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PingConfig::default();
        assert_eq!(config.port_number, 7800);
        assert_eq!(config.port_range, 50);
        assert_eq!(config.credentials_provider, "default");
        assert!(!config.log_aws_error_messages);
        assert!(config.filters.is_none());
        assert!(config.tags.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_key_pair_both_or_neither() {
        let mut config = PingConfig {
            access_key: Some("AKIA".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DiscoveryError::InvalidConfig(_))
        ));

        config.secret_key = Some("secret".to_string());
        let pair = config.static_key_pair().unwrap().unwrap();
        assert_eq!(pair.access_key, "AKIA");
        assert_eq!(pair.secret_key, "secret");
    }

    #[test]
    fn test_blank_keys_count_as_absent() {
        let config = PingConfig {
            access_key: Some("  ".to_string()),
            secret_key: Some(String::new()),
            ..Default::default()
        };
        assert!(config.static_key_pair().unwrap().is_none());
    }

    #[test]
    fn test_secret_is_redacted_in_debug() {
        let pair = StaticKeyPair {
            access_key: "AKIA".to_string(),
            secret_key: "hunter2".to_string(),
        };
        assert!(!format!("{pair:?}").contains("hunter2"));
    }

    #[test]
    fn test_port_overflow_rejected() {
        let config = PingConfig {
            port_number: 65530,
            port_range: 10,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_page_size_clamped() {
        let config = PingConfig {
            page_size: 1,
            ..Default::default()
        };
        assert_eq!(config.effective_page_size(), 5);
    }
}
