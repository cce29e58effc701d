//! Filter Criterion
//!
//! Grammar:
//!
//! ```text
//! FILTERS ::= FILTER (';' FILTER)*
//! FILTER  ::= NAME '=' VALUE (',' VALUE)*
//! ```
//!
//! Whitespace around separators is ignored and empty segments are skipped.

use super::Predicate;
use crate::error::{DiscoveryError, Result};
use std::fmt;

/// Parsed filter predicates, in configured order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCriterion {
    pub predicates: Vec<Predicate>,
}

impl FilterCriterion {
    /// Parse a filter string. Fails on the first malformed segment.
    pub fn parse(input: &str) -> Result<Self> {
        let predicates = input
            .split(';')
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(parse_segment)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { predicates })
    }

    /// `None` when the option is unset, blank, or holds only separators.
    pub fn parse_optional(input: Option<&str>) -> Result<Option<Self>> {
        match input {
            None => Ok(None),
            Some(s) => {
                let criterion = Self::parse(s)?;
                Ok((!criterion.is_empty()).then_some(criterion))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

impl fmt::Display for FilterCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Predicate::display_all(&self.predicates))
    }
}

fn parse_segment(segment: &str) -> Result<Predicate> {
    let invalid = || DiscoveryError::InvalidFilterSyntax {
        segment: segment.to_string(),
    };

    let mut parts = segment.split('=');
    let (name, values) = match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(values), None) => (name.trim(), values),
        _ => return Err(invalid()),
    };
    if name.is_empty() {
        return Err(invalid());
    }

    let values: Vec<String> = values.split(',').map(|v| v.trim().to_string()).collect();
    if values.iter().any(String::is_empty) {
        return Err(invalid());
    }

    Ok(Predicate::new(name, values))
}

/// Final predicate list for a round: tag predicates first, then filters.
pub fn combined(filters: Option<&FilterCriterion>, tag_predicates: Vec<Predicate>) -> Vec<Predicate> {
    let mut predicates = tag_predicates;
    if let Some(filters) = filters {
        predicates.extend(filters.predicates.iter().cloned());
    }
    predicates
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        (
            "[a-z][a-z0-9:._-]{0,15}",
            prop::collection::vec("[A-Za-z0-9._*-]{1,12}", 1..4),
        )
            .prop_map(|(name, values)| Predicate::new(name, values))
    }

    fn arb_padding() -> impl Strategy<Value = String> {
        "[ \t]{0,2}"
    }

    /// Renders predicates the way an operator might type them.
    fn untidy(predicates: &[Predicate], pad: &str, empty_segments: usize) -> String {
        let segments: Vec<String> = predicates
            .iter()
            .map(|p| {
                let values = p.values.join(&format!("{pad},{pad}"));
                format!("{pad}{}{pad}={pad}{values}{pad}", p.name)
            })
            .collect();
        let filler = format!("{pad};").repeat(empty_segments);
        format!("{filler}{}{filler}", segments.join(";"))
    }

    proptest! {
        #[test]
        fn test_display_then_parse_is_identity(predicates in prop::collection::vec(arb_predicate(), 1..5)) {
            let criterion = FilterCriterion { predicates };
            let reparsed = FilterCriterion::parse(&criterion.to_string()).unwrap();
            prop_assert_eq!(reparsed, criterion);
        }

        #[test]
        fn test_whitespace_and_empty_segments_are_ignored(
            predicates in prop::collection::vec(arb_predicate(), 1..5),
            pad in arb_padding(),
            empty_segments in 0usize..3,
        ) {
            let input = untidy(&predicates, &pad, empty_segments);
            let parsed = FilterCriterion::parse(&input).unwrap();

            prop_assert_eq!(parsed.predicates.len(), predicates.len());
            for (parsed, expected) in parsed.predicates.iter().zip(&predicates) {
                prop_assert_eq!(&parsed.name, &expected.name);
                prop_assert_eq!(&parsed.values, &expected.values);
            }

            let canonical = FilterCriterion::parse(&parsed.to_string()).unwrap();
            prop_assert_eq!(canonical, parsed);
        }
    }
}
