//! Discovery Round
//!
//! One pass of the pipeline: local tags, predicates, inventory query, port
//! expansion. Nothing here mutates the context, so rounds may overlap.

use crate::criteria::{self, combined, FilterCriterion, Predicate, TagCriterion};
use crate::endpoints::{self, CandidateEndpoint, PortPolicy};
use crate::error::Result;
use crate::identity::NodeIdentity;
use crate::inventory::{resolve_private_ips, InventoryClient};
use std::sync::Arc;
use tracing::debug;

/// Everything a round needs, built once by `init`.
pub struct DiscoveryContext {
    pub identity: NodeIdentity,
    pub client: Arc<dyn InventoryClient>,
    pub tags: Option<TagCriterion>,
    pub filters: Option<FilterCriterion>,
    pub ports: PortPolicy,
}

impl std::fmt::Debug for DiscoveryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryContext")
            .field("identity", &self.identity)
            .field("tags", &self.tags)
            .field("filters", &self.filters)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}

impl DiscoveryContext {
    /// Predicates for this round. Reads the local tags only when a tag criterion is set.
    pub async fn predicates(&self) -> Result<Vec<Predicate>> {
        let tag_predicates = match &self.tags {
            Some(tags) => {
                let instance_tags =
                    criteria::resolve_instance_tags(self.client.as_ref(), &self.identity.instance_id).await?;
                criteria::validate(Some(tags), &instance_tags)?;
                criteria::tag_predicates(Some(tags), &instance_tags)
            }
            None => Vec::new(),
        };

        Ok(combined(self.filters.as_ref(), tag_predicates))
    }
}

/// Result of a successful round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// Private addresses of the matched instances
    pub hosts: Vec<String>,
    pub endpoints: Vec<CandidateEndpoint>,
}

/// Run one discovery round against `context`.
pub async fn resolve_round(context: &DiscoveryContext) -> Result<RoundOutcome> {
    let predicates = context.predicates().await?;
    let hosts = resolve_private_ips(context.client.as_ref(), &predicates).await?;
    let endpoints = endpoints::expand(&hosts, context.ports).await;

    debug!(
        hosts = hosts.len(),
        endpoints = endpoints.len(),
        "Round resolved"
    );
    Ok(RoundOutcome { hosts, endpoints })
}
