//! Tag Criterion
//!
//! Configured tag names select peers that carry the same tag values as the
//! local instance.

use super::Predicate;
use crate::error::{DiscoveryError, Result};
use crate::inventory::{describe_all, InstanceQuery, InstanceTag, InventoryClient};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Tag names in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCriterion {
    names: Vec<String>,
}

impl TagCriterion {
    /// Parse a comma separated list. Blank input (or only commas) is no criterion.
    pub fn parse(input: Option<&str>) -> Option<Self> {
        let names: Vec<String> = input?
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        (!names.is_empty()).then_some(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl fmt::Display for TagCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names.join(","))
    }
}

/// Every tag on `instance_id`, across all pages.
pub async fn resolve_instance_tags(client: &dyn InventoryClient, instance_id: &str) -> Result<Vec<InstanceTag>> {
    let instances = describe_all(client, &InstanceQuery::by_id(instance_id)).await?;
    let tags: Vec<InstanceTag> = instances.into_iter().flat_map(|i| i.tags).collect();
    debug!(instance_id = %instance_id, tags = tags.len(), "Instance tags resolved");
    Ok(tags)
}

/// Check that every configured name is present on the instance.
pub fn validate(criterion: Option<&TagCriterion>, instance_tags: &[InstanceTag]) -> Result<()> {
    let Some(criterion) = criterion else {
        return Ok(());
    };

    let missing: Vec<String> = criterion
        .names
        .iter()
        .filter(|name| !instance_tags.iter().any(|tag| &tag.key == *name))
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DiscoveryError::MissingTags { names: missing })
    }
}

/// `tag:<name> = [value]` for each configured name present on the instance.
pub fn tag_predicates(criterion: Option<&TagCriterion>, instance_tags: &[InstanceTag]) -> Vec<Predicate> {
    let Some(criterion) = criterion else {
        return Vec::new();
    };

    let by_key: HashMap<&str, &str> = instance_tags
        .iter()
        .map(|tag| (tag.key.as_str(), tag.value.as_str()))
        .collect();

    criterion
        .names
        .iter()
        .filter_map(|name| {
            by_key
                .get(name.as_str())
                .map(|value| Predicate::new(format!("tag:{name}"), vec![value.to_string()]))
        })
        .collect()
}
