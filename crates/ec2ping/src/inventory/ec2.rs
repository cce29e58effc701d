//! EC2 Inventory Client
//!
//! Region-scoped `DescribeInstances` client built once at init and reused for
//! every round.

use super::{FaultLogger, Instance, InstancePage, InstanceQuery, InstanceTag, InventoryClient, InventoryClientFactory, Reservation};
use crate::config::PingConfig;
use crate::error::{DiscoveryError, Result};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_ec2::config::timeout::TimeoutConfig;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::types::Filter;
use aws_sdk_ec2::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Regional endpoint template; `{region}` is replaced with the identity's region.
pub const EC2_ENDPOINT_TEMPLATE: &str = "https://ec2.{region}.amazonaws.com";

/// Derive the regional endpoint for `region`.
pub fn regional_endpoint(template: &str, region: &str) -> String {
    template.replace("{region}", region)
}

/// `InventoryClient` backed by the EC2 API.
#[derive(Debug, Clone)]
pub struct Ec2Inventory {
    client: Client,
    page_size: i32,
}

impl Ec2Inventory {
    pub fn new(client: Client, page_size: i32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl InventoryClient for Ec2Inventory {
    async fn describe_instances(&self, query: &InstanceQuery, next_token: Option<&str>) -> Result<InstancePage> {
        let filters: Vec<Filter> = query
            .predicates
            .iter()
            .map(|p| {
                Filter::builder()
                    .name(&p.name)
                    .set_values(Some(p.values.clone()))
                    .build()
            })
            .collect();

        let mut request = self
            .client
            .describe_instances()
            .set_filters((!filters.is_empty()).then_some(filters))
            .set_next_token(next_token.map(str::to_string));

        // EC2 rejects MaxResults combined with explicit instance ids.
        if query.instance_ids.is_empty() {
            request = request.max_results(self.page_size);
        } else {
            request = request.set_instance_ids(Some(query.instance_ids.clone()));
        }

        let output = request
            .send()
            .await
            .map_err(|e| DiscoveryError::inventory(DisplayErrorContext(&e).to_string()))?;

        let reservations = output
            .reservations()
            .iter()
            .map(|r| Reservation {
                reservation_id: r.reservation_id().map(str::to_string),
                instances: r.instances().iter().map(to_instance).collect(),
            })
            .collect();

        Ok(InstancePage {
            reservations,
            next_token: output.next_token().map(str::to_string),
        })
    }
}

fn to_instance(instance: &aws_sdk_ec2::types::Instance) -> Instance {
    Instance {
        instance_id: instance.instance_id().map(str::to_string),
        private_ip: instance.private_ip_address().map(str::to_string),
        state: instance
            .state()
            .and_then(|s| s.name())
            .map(|name| name.as_str().to_string()),
        tags: instance
            .tags()
            .iter()
            .filter_map(|tag| {
                let key = tag.key()?;
                Some(InstanceTag::new(key, tag.value().unwrap_or_default()))
            })
            .collect(),
    }
}

/// Builds `Ec2Inventory` clients bound to a regional endpoint.
#[derive(Debug, Clone)]
pub struct Ec2ClientFactory {
    /// Template used when no explicit endpoint is configured
    pub endpoint_template: String,
    /// Explicit endpoint, e.g. a VPC endpoint or a local emulator
    pub endpoint_override: Option<String>,
    pub log_faults: bool,
    pub request_timeout: Duration,
    pub page_size: i32,
}

impl Default for Ec2ClientFactory {
    fn default() -> Self {
        Self::from_config(&PingConfig::default())
    }
}

impl Ec2ClientFactory {
    pub fn from_config(config: &PingConfig) -> Self {
        Self {
            endpoint_template: EC2_ENDPOINT_TEMPLATE.to_string(),
            endpoint_override: config.inventory_endpoint.clone(),
            log_faults: config.log_aws_error_messages,
            request_timeout: config.request_timeout,
            page_size: config.effective_page_size(),
        }
    }

    pub fn endpoint_for(&self, region: &str) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| regional_endpoint(&self.endpoint_template, region))
    }
}

impl InventoryClientFactory for Ec2ClientFactory {
    fn build(&self, region: &str, credentials: SharedCredentialsProvider) -> Result<Arc<dyn InventoryClient>> {
        let region = region.trim();
        if region.is_empty() {
            return Err(DiscoveryError::InvalidConfig(
                "cannot build an inventory client without a region".to_string(),
            ));
        }

        let endpoint = self.endpoint_for(region);
        let timeouts = TimeoutConfig::builder()
            .operation_attempt_timeout(self.request_timeout)
            .build();

        let mut builder = aws_sdk_ec2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .timeout_config(timeouts);

        if self.log_faults {
            debug!("Installing inventory fault logger");
            builder = builder.interceptor(FaultLogger);
        }

        info!(region = %region, endpoint = %endpoint, "Inventory client created");
        let client: Arc<dyn InventoryClient> =
            Arc::new(Ec2Inventory::new(Client::from_conf(builder.build()), self.page_size));
        Ok(client)
    }
}
