//! Inventory Resolution
//!
//! Describe results are grouped into reservations (instances launched together)
//! and split across pages. Both levels have to be drained.

use super::{Instance, InstanceQuery, InventoryClient};
use crate::criteria::Predicate;
use crate::error::{DiscoveryError, Result};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Run `query` to exhaustion and flatten every reservation on every page.
pub async fn describe_all(client: &dyn InventoryClient, query: &InstanceQuery) -> Result<Vec<Instance>> {
    let mut instances = Vec::new();
    let mut seen_tokens = HashSet::new();
    let mut next_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = client.describe_instances(query, next_token.as_deref()).await?;
        pages += 1;

        for reservation in page.reservations {
            trace!(
                reservation_id = ?reservation.reservation_id,
                instance_count = reservation.instances.len(),
                "Reservation"
            );
            instances.extend(reservation.instances);
        }

        match page.next_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                if !seen_tokens.insert(token.clone()) {
                    return Err(DiscoveryError::inventory(format!(
                        "pagination token repeated after {pages} page(s)"
                    )));
                }
                next_token = Some(token);
            }
            None => break,
        }
    }

    debug!(pages = pages, instances = instances.len(), "Describe drained");
    Ok(instances)
}

/// Private addresses of every instance matching `predicates`.
///
/// Instances without a private address are skipped. Order is whatever the API
/// returned; callers treat the result as a set.
pub async fn resolve_private_ips(client: &dyn InventoryClient, predicates: &[Predicate]) -> Result<Vec<String>> {
    debug!(
        predicates = %Predicate::display_all(predicates),
        "Describing instances"
    );

    let query = InstanceQuery::matching(predicates.to_vec());
    let instances = describe_all(client, &query).await?;

    let addresses: Vec<String> = instances
        .into_iter()
        .filter_map(|instance| match instance.private_ip {
            Some(ip) if !ip.is_empty() => Some(ip),
            _ => {
                debug!(
                    instance_id = ?instance.instance_id,
                    state = ?instance.state,
                    "Skipping instance without private address"
                );
                None
            }
        })
        .collect();

    debug!(addresses = ?addresses, "Instances found");
    Ok(addresses)
}
