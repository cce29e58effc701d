//! Inventory Module
//!
//! The cloud inventory seen by the resolver:
//! - `InventoryClient`: one paginated "describe instances" call
//! - `ec2`: the EC2-backed client and its factory
//! - `fault_logger`: optional interceptor logging service faults
//! - `resolver`: drains pages into flat instance and address lists

mod ec2;
mod fault_logger;
pub mod resolver;

pub use ec2::{regional_endpoint, Ec2ClientFactory, Ec2Inventory, EC2_ENDPOINT_TEMPLATE};
pub use fault_logger::FaultLogger;
pub use resolver::{describe_all, resolve_private_ips};

use crate::criteria::Predicate;
use crate::error::Result;
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use std::sync::Arc;

/// A tag as reported by the inventory API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceTag {
    pub key: String,
    pub value: String,
}

impl InstanceTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One machine in a describe result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Instance {
    pub instance_id: Option<String>,
    /// Absent while the instance is still being provisioned
    pub private_ip: Option<String>,
    pub state: Option<String>,
    pub tags: Vec<InstanceTag>,
}

/// Instances launched together in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reservation {
    pub reservation_id: Option<String>,
    pub instances: Vec<Instance>,
}

/// One page of a describe result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstancePage {
    pub reservations: Vec<Reservation>,
    /// Continuation token; `None` on the last page
    pub next_token: Option<String>,
}

/// Arguments of one describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceQuery {
    pub predicates: Vec<Predicate>,
    pub instance_ids: Vec<String>,
}

impl InstanceQuery {
    pub fn matching(predicates: Vec<Predicate>) -> Self {
        Self {
            predicates,
            instance_ids: Vec::new(),
        }
    }

    pub fn by_id(instance_id: impl Into<String>) -> Self {
        Self {
            predicates: Vec::new(),
            instance_ids: vec![instance_id.into()],
        }
    }
}

/// Region-scoped inventory API client, shared read-only across rounds.
#[async_trait]
pub trait InventoryClient: Send + Sync {
    /// Fetch a single page. `next_token` is the previous page's continuation token.
    async fn describe_instances(
        &self,
        query: &InstanceQuery,
        next_token: Option<&str>,
    ) -> Result<InstancePage>;
}

/// Builds the inventory client once per process.
pub trait InventoryClientFactory: Send + Sync {
    fn build(
        &self,
        region: &str,
        credentials: SharedCredentialsProvider,
    ) -> Result<Arc<dyn InventoryClient>>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory inventory used by the resolver and lifecycle tests.

    use super::*;
    use crate::error::DiscoveryError;
    use std::sync::Mutex;

    /// Serves canned pages; records every query it receives.
    #[derive(Default)]
    pub struct FakeInventory {
        /// Pages served for describe-by-id queries
        pub own_pages: Vec<InstancePage>,
        /// Pages served for filtered queries
        pub match_pages: Vec<InstancePage>,
        pub fail_filtered: bool,
        pub queries: Mutex<Vec<(InstanceQuery, Option<String>)>>,
    }

    impl FakeInventory {
        pub fn with_own_tags(mut self, tags: &[(&str, &str)]) -> Self {
            self.own_pages = vec![page(
                vec![vec![Instance {
                    instance_id: Some("i-self".to_string()),
                    private_ip: Some("10.0.0.1".to_string()),
                    state: Some("running".to_string()),
                    tags: tags.iter().map(|(k, v)| InstanceTag::new(*k, *v)).collect(),
                }]],
                None,
            )];
            self
        }

        pub fn with_matches(mut self, pages: Vec<InstancePage>) -> Self {
            self.match_pages = pages;
            self
        }

        pub fn failing(mut self) -> Self {
            self.fail_filtered = true;
            self
        }

        pub fn filtered_queries(&self) -> Vec<InstanceQuery> {
            self.queries
                .lock()
                .unwrap()
                .iter()
                .filter(|(q, _)| q.instance_ids.is_empty())
                .map(|(q, _)| q.clone())
                .collect()
        }
    }

    pub fn instance(ip: Option<&str>) -> Instance {
        Instance {
            instance_id: ip.map(|ip| format!("i-{}", ip.replace('.', ""))),
            private_ip: ip.map(str::to_string),
            state: Some("running".to_string()),
            tags: Vec::new(),
        }
    }

    pub fn page(reservations: Vec<Vec<Instance>>, next_token: Option<&str>) -> InstancePage {
        InstancePage {
            reservations: reservations
                .into_iter()
                .map(|instances| Reservation {
                    reservation_id: None,
                    instances,
                })
                .collect(),
            next_token: next_token.map(str::to_string),
        }
    }

    #[async_trait]
    impl InventoryClient for FakeInventory {
        async fn describe_instances(
            &self,
            query: &InstanceQuery,
            next_token: Option<&str>,
        ) -> Result<InstancePage> {
            self.queries
                .lock()
                .unwrap()
                .push((query.clone(), next_token.map(str::to_string)));

            let pages = if query.instance_ids.is_empty() {
                if self.fail_filtered {
                    return Err(DiscoveryError::inventory("RequestLimitExceeded"));
                }
                &self.match_pages
            } else {
                &self.own_pages
            };

            // Page N is addressed by token "page-N"; no token means page 0.
            let index = match next_token {
                None => 0,
                Some(token) => token
                    .strip_prefix("page-")
                    .and_then(|n| n.parse::<usize>().ok())
                    .ok_or_else(|| DiscoveryError::inventory(format!("bad token {token}")))?,
            };
            Ok(pages.get(index).cloned().unwrap_or_default())
        }
    }

    /// Factory handing out a shared fake.
    pub struct FakeFactory(pub Arc<FakeInventory>);

    impl InventoryClientFactory for FakeFactory {
        fn build(
            &self,
            _region: &str,
            _credentials: SharedCredentialsProvider,
        ) -> Result<Arc<dyn InventoryClient>> {
            let client: Arc<dyn InventoryClient> = self.0.clone();
            Ok(client)
        }
    }
}
