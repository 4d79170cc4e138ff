use crate::specs::LinkableInstanceSpec;

use super::SpecPattern;

/// Matches only members of a fixed allow-list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MatchListPattern {
    allowed: Vec<LinkableInstanceSpec>,
}

impl MatchListPattern {
    pub fn new(allowed: impl IntoIterator<Item = LinkableInstanceSpec>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl SpecPattern for MatchListPattern {
    fn match_specs(&self, candidates: &[LinkableInstanceSpec]) -> Vec<LinkableInstanceSpec> {
        candidates
            .iter()
            .filter(|spec| self.allowed.contains(spec))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_listed_specs() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        let is_instant = LinkableInstanceSpec::dimension("is_instant", &[]);
        let pattern = MatchListPattern::new([country.clone()]);
        assert_eq!(pattern.match_specs(&[is_instant, country.clone()]), vec![country]);
    }
}
