//! Matching Criteria
//!
//! Both criteria end up as inventory predicates:
//! - `tags`: tag names whose values are copied from the local instance
//! - `filters`: free-form `name=value` predicates parsed from configuration
//!
//! Predicates are ANDed; the values of one predicate are ORed.

pub mod filters;
pub mod tags;

pub use filters::{combined, FilterCriterion};
pub use tags::{resolve_instance_tags, tag_predicates, validate, TagCriterion};

use std::fmt;

/// "`name` equals any of `values`".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    pub name: String,
    pub values: Vec<String>,
}

impl Predicate {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Render a predicate list in filter grammar, `;` separated.
    pub fn display_all(predicates: &[Predicate]) -> String {
        predicates
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let predicates = vec![
            Predicate::new("tag:Type", vec!["db".to_string()]),
            Predicate::new("instance-type", vec!["m5.large".to_string(), "m5.xlarge".to_string()]),
        ];
        assert_eq!(predicates[1].to_string(), "instance-type=m5.large,m5.xlarge");
        assert_eq!(
            Predicate::display_all(&predicates),
            "tag:Type=db;instance-type=m5.large,m5.xlarge"
        );
        assert_eq!(Predicate::display_all(&[]), "");
    }
}
