use crate::specs::LinkableInstanceSpec;

use super::SpecPattern;

/// Drops time dimensions that extract a date part. Other specs pass through.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoneDatePartPattern;

impl SpecPattern for NoneDatePartPattern {
    fn match_specs(&self, candidates: &[LinkableInstanceSpec]) -> Vec<LinkableInstanceSpec> {
        candidates
            .iter()
            .filter(|spec| spec.date_part().is_none())
            .cloned()
            .collect()
    }
}
