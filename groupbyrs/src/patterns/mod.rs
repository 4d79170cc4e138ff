//! Spec patterns: matchers that narrow a candidate spec collection.
//!
//! Patterns compose by sequential application. None of them ever returns a
//! spec that was not among its candidates.

mod base_time_grain;
mod entity_link;
mod match_list;
mod none_date_part;

use std::fmt;

use crate::specs::LinkableInstanceSpec;

pub use base_time_grain::BaseTimeGrainPattern;
pub use entity_link::{EntityLinkPattern, EntityLinkPatternParameterSet, ParameterSetField};
pub use match_list::MatchListPattern;
pub use none_date_part::NoneDatePartPattern;

pub trait SpecPattern: fmt::Debug {
    /// Candidates that match, in a deterministic order.
    fn match_specs(&self, candidates: &[LinkableInstanceSpec]) -> Vec<LinkableInstanceSpec>;
}

/// Apply `patterns` in order, each narrowing the previous result.
pub fn apply_patterns(
    candidates: &[LinkableInstanceSpec],
    patterns: &[&dyn SpecPattern],
) -> Vec<LinkableInstanceSpec> {
    let mut matched = candidates.to_vec();
    for pattern in patterns {
        matched = pattern.match_specs(&matched);
    }
    matched
}
