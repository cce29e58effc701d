//! Instance Identity
//!
//! Fetches the local node's identity document from the instance metadata
//! service. The document is read once at init and never mutated afterwards.

use crate::config::PingConfig;
use crate::error::{DiscoveryError, Result};
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const IDENTITY_DOCUMENT_PATH: &str = "/latest/dynamic/instance-identity/document";
const TOKEN_PATH: &str = "/latest/api/token";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_TTL_SECONDS: &str = "21600";

/// Identity of the local instance. All fields are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentity {
    pub availability_zone: String,
    pub region: String,
    pub private_ip: String,
    pub instance_id: String,
    pub instance_type: String,
    pub image_id: String,
    pub architecture: String,
}

/// Identity document as served; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityDocument {
    availability_zone: Option<String>,
    region: Option<String>,
    private_ip: Option<String>,
    instance_id: Option<String>,
    instance_type: Option<String>,
    image_id: Option<String>,
    architecture: Option<String>,
}

impl TryFrom<IdentityDocument> for NodeIdentity {
    type Error = DiscoveryError;

    fn try_from(doc: IdentityDocument) -> Result<Self> {
        let mut missing = Vec::new();
        let mut take = |value: Option<String>, name: &'static str| {
            match value.filter(|v| !v.trim().is_empty()) {
                Some(v) => v,
                None => {
                    missing.push(name);
                    String::new()
                }
            }
        };

        let identity = NodeIdentity {
            availability_zone: take(doc.availability_zone, "availabilityZone"),
            region: take(doc.region, "region"),
            private_ip: take(doc.private_ip, "privateIp"),
            instance_id: take(doc.instance_id, "instanceId"),
            instance_type: take(doc.instance_type, "instanceType"),
            image_id: take(doc.image_id, "imageId"),
            architecture: take(doc.architecture, "architecture"),
        };

        if !missing.is_empty() {
            return Err(DiscoveryError::identity(format!(
                "identity document missing field(s): {}",
                missing.join(", ")
            )));
        }
        Ok(identity)
    }
}

impl NodeIdentity {
    /// Parse an identity document body.
    pub fn from_document(body: &str) -> Result<Self> {
        let doc: IdentityDocument = serde_json::from_str(body)
            .map_err(|e| DiscoveryError::identity(format!("malformed identity document: {e}")))?;
        doc.try_into()
    }
}

/// Retry settings for the identity fetch.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub max_elapsed: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &PingConfig) -> Self {
        Self {
            initial_interval: config.identity_backoff_initial,
            max_interval: config.identity_backoff_max,
            max_elapsed: config.identity_backoff_max_elapsed,
            multiplier: config.identity_backoff_multiplier,
        }
    }
}

/// Reads the identity document from the metadata service.
#[derive(Debug, Clone)]
pub struct IdentityProbe {
    client: Client,
    base_url: String,
}

/// Failure of one fetch attempt, tagged with whether a retry may help.
struct Attempt {
    error: DiscoveryError,
    transient: bool,
}

impl IdentityProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiscoveryError::identity(format!("could not build metadata client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &PingConfig) -> Result<Self> {
        Self::new(config.metadata_endpoint.clone(), config.metadata_timeout)
    }

    /// Fetch the identity document once.
    pub async fn fetch(&self) -> Result<NodeIdentity> {
        self.attempt().await.map_err(|a| a.error)
    }

    /// Fetch with exponential backoff on transient failures.
    ///
    /// Unreachable endpoints and 5xx answers are retried; 4xx answers and
    /// incomplete documents fail immediately.
    pub async fn fetch_with_retry(&self, policy: &RetryPolicy) -> Result<NodeIdentity> {
        if policy.max_elapsed.is_zero() {
            return self.fetch().await;
        }

        let backoff = ExponentialBackoff {
            initial_interval: policy.initial_interval,
            max_interval: policy.max_interval,
            max_elapsed_time: Some(policy.max_elapsed),
            multiplier: policy.multiplier,
            ..Default::default()
        };

        retry(backoff, || async {
            match self.attempt().await {
                Ok(identity) => Ok(identity),
                Err(Attempt {
                    error,
                    transient: true,
                }) => {
                    warn!(error = %error, "Identity fetch failed, retrying");
                    Err(backoff::Error::transient(error))
                }
                Err(Attempt { error, .. }) => Err(backoff::Error::permanent(error)),
            }
        })
        .await
    }

    async fn attempt(&self) -> std::result::Result<NodeIdentity, Attempt> {
        let token = self.session_token().await;

        let url = format!("{}{}", self.base_url, IDENTITY_DOCUMENT_PATH);
        let mut request = self.client.get(&url);
        if let Some(token) = &token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await.map_err(|e| Attempt {
            error: DiscoveryError::identity(format!("metadata endpoint unreachable: {e}")),
            transient: true,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Attempt {
                error: DiscoveryError::identity(format!("metadata endpoint returned {status}")),
                transient: status.is_server_error(),
            });
        }

        let body = response.text().await.map_err(|e| Attempt {
            error: DiscoveryError::identity(format!("could not read identity document: {e}")),
            transient: true,
        })?;

        NodeIdentity::from_document(&body).map_err(|error| Attempt {
            error,
            transient: false,
        })
    }

    /// Request an IMDSv2 session token, falling back to IMDSv1 on any failure.
    async fn session_token(&self) -> Option<String> {
        let url = format!("{}{}", self.base_url, TOKEN_PATH);
        let response = match self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECONDS)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!(error = %e, "IMDSv2 token request failed, using IMDSv1");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            debug!(status = %response.status(), "IMDSv2 token unavailable, using IMDSv1");
            return None;
        }

        response.text().await.ok().filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const DOCUMENT: &str = r#"{
        "accountId" : "123456789012",
        "architecture" : "x86_64",
        "availabilityZone" : "us-west-2b",
        "billingProducts" : null,
        "devpayProductCodes" : null,
        "marketplaceProductCodes" : null,
        "imageId" : "ami-5fb8c835",
        "instanceId" : "i-1234567890abcdef0",
        "instanceType" : "t2.micro",
        "kernelId" : null,
        "pendingTime" : "2016-11-19T16:32:11Z",
        "privateIp" : "10.158.112.84",
        "ramdiskId" : null,
        "region" : "us-west-2",
        "version" : "2017-09-30"
    }"#;

    fn probe(server: &MockServer) -> IdentityProbe {
        IdentityProbe::new(server.uri(), Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_parse_document() {
        let identity = NodeIdentity::from_document(DOCUMENT).unwrap();
        assert_eq!(identity.availability_zone, "us-west-2b");
        assert_eq!(identity.private_ip, "10.158.112.84");
        assert_eq!(identity.instance_id, "i-1234567890abcdef0");
        assert_eq!(identity.instance_type, "t2.micro");
        assert_eq!(identity.image_id, "ami-5fb8c835");
        assert_eq!(identity.architecture, "x86_64");
        assert_eq!(identity.region, "us-west-2");
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = NodeIdentity::from_document(r#"{"instanceId": "i-1", "privateIp": "10.0.0.1"}"#)
            .unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, DiscoveryError::IdentityUnavailable { .. }));
        assert!(message.contains("availabilityZone"));
        assert!(message.contains("region"));
        assert!(message.contains("architecture"));
        assert!(!message.contains("instanceId"));
    }

    #[test]
    fn test_malformed_document() {
        let err = NodeIdentity::from_document("<html>").unwrap_err();
        assert!(matches!(err, DiscoveryError::IdentityUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fetch_without_token_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCUMENT))
            .mount(&server)
            .await;

        let identity = probe(&server).fetch().await.unwrap();
        assert_eq!(identity.region, "us-west-2");
    }

    #[tokio::test]
    async fn test_fetch_sends_session_token() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("session-token"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .and(header(TOKEN_HEADER, "session-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCUMENT))
            .expect(1)
            .mount(&server)
            .await;

        let identity = probe(&server).fetch().await.unwrap();
        assert_eq!(identity.instance_id, "i-1234567890abcdef0");
    }

    #[tokio::test]
    async fn test_non_success_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = probe(&server).fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::IdentityUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let probe = IdentityProbe::new(uri, Duration::from_millis(500)).unwrap();
        let err = probe.fetch().await.unwrap_err();
        assert!(matches!(err, DiscoveryError::IdentityUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_retry_recovers_from_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(DOCUMENT))
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            max_elapsed: Duration::from_secs(5),
            multiplier: 1.5,
        };
        let identity = probe(&server).fetch_with_retry(&policy).await.unwrap();
        assert_eq!(identity.availability_zone, "us-west-2b");
    }

    #[tokio::test]
    async fn test_retry_gives_up_on_incomplete_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(IDENTITY_DOCUMENT_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"region": "us-west-2"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let policy = RetryPolicy {
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(20),
            max_elapsed: Duration::from_secs(5),
            multiplier: 1.5,
        };
        let err = probe(&server).fetch_with_retry(&policy).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::IdentityUnavailable { .. }));
    }
}
