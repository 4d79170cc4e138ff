use std::collections::BTreeMap;

use crate::issues::{IssueSet, ResolutionIssue};
use crate::specs::{ElementPathKey, LinkableInstanceSpec};

use super::path::ResolutionPath;

/// Group-by items reachable at one node, with the paths to the measures that
/// supply them. Specs are empty exactly when measure paths are.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupByItemCandidateSet {
    specs: Vec<LinkableInstanceSpec>,
    measure_paths: Vec<ResolutionPath>,
    path_from_leaf_node: ResolutionPath,
}

impl GroupByItemCandidateSet {
    pub fn new(
        specs: Vec<LinkableInstanceSpec>,
        measure_paths: Vec<ResolutionPath>,
        path_from_leaf_node: ResolutionPath,
    ) -> Self {
        assert_eq!(
            specs.is_empty(),
            measure_paths.is_empty(),
            "candidate specs and measure paths must be empty together"
        );
        Self {
            specs,
            measure_paths,
            path_from_leaf_node,
        }
    }

    pub fn empty(path_from_leaf_node: ResolutionPath) -> Self {
        Self {
            specs: Vec::new(),
            measure_paths: Vec::new(),
            path_from_leaf_node,
        }
    }

    pub fn specs(&self) -> &[LinkableInstanceSpec] {
        &self.specs
    }

    pub fn measure_paths(&self) -> &[ResolutionPath] {
        &self.measure_paths
    }

    pub fn path_from_leaf_node(&self) -> &ResolutionPath {
        &self.path_from_leaf_node
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Same specs reported from a different node. Paths collapse when
    /// `specs` is empty.
    pub fn with_specs(&self, specs: Vec<LinkableInstanceSpec>, path: ResolutionPath) -> Self {
        if specs.is_empty() {
            return Self::empty(path);
        }
        Self::new(specs, self.measure_paths.clone(), path)
    }

    /// Specs whose path key every set shares. Specs under a surviving key are
    /// the deduplicated union across sets, in key order.
    pub fn intersect_by_path_key(sets: &[&GroupByItemCandidateSet]) -> Vec<LinkableInstanceSpec> {
        let keyed: Vec<BTreeMap<ElementPathKey, Vec<&LinkableInstanceSpec>>> = sets
            .iter()
            .map(|set| {
                let mut by_key: BTreeMap<ElementPathKey, Vec<&LinkableInstanceSpec>> =
                    BTreeMap::new();
                for spec in &set.specs {
                    by_key.entry(spec.element_path_key()).or_default().push(spec);
                }
                by_key
            })
            .collect();

        let Some((first, rest)) = keyed.split_first() else {
            return Vec::new();
        };
        let mut specs: Vec<LinkableInstanceSpec> = Vec::new();
        for (key, first_specs) in first {
            if !rest.iter().all(|other| other.contains_key(key)) {
                continue;
            }
            let mut under_key: Vec<&LinkableInstanceSpec> = first_specs.clone();
            for other in rest {
                if let Some(other_specs) = other.get(key) {
                    under_key.extend(other_specs.iter().copied());
                }
            }
            under_key.sort();
            under_key.dedup();
            specs.extend(under_key.into_iter().cloned());
        }
        specs
    }
}

/// Candidates plus issues from visiting one node. The candidate set is empty
/// exactly when the issue set has errors.
#[derive(Clone, Debug, PartialEq)]
pub struct PushDownResult {
    pub candidate_set: GroupByItemCandidateSet,
    pub issue_set: IssueSet,
}

impl PushDownResult {
    pub fn new(candidate_set: GroupByItemCandidateSet, issue_set: IssueSet) -> Self {
        debug_assert_eq!(
            candidate_set.is_empty(),
            issue_set.has_errors(),
            "push-down result must carry either candidates or errors"
        );
        Self {
            candidate_set,
            issue_set,
        }
    }

    pub fn from_issue(path: ResolutionPath, issue: ResolutionIssue) -> Self {
        Self::new(GroupByItemCandidateSet::empty(path), IssueSet::from_issue(issue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::TimeGranularity;

    fn set(specs: Vec<LinkableInstanceSpec>) -> GroupByItemCandidateSet {
        GroupByItemCandidateSet::new(
            specs,
            vec![ResolutionPath::default()],
            ResolutionPath::default(),
        )
    }

    #[test]
    fn intersection_keeps_shared_keys_in_key_order() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        let instant = LinkableInstanceSpec::dimension("is_instant", &[]);
        let year =
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Year, None);
        let month =
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Month, None);

        let left = set(vec![year.clone(), instant, country.clone(), month]);
        let right = set(vec![country.clone(), year.clone()]);
        let shared = GroupByItemCandidateSet::intersect_by_path_key(&[&left, &right]);
        assert_eq!(shared, vec![country, year]);
    }

    #[test]
    #[should_panic(expected = "empty together")]
    fn specs_without_paths_are_rejected() {
        GroupByItemCandidateSet::new(
            vec![LinkableInstanceSpec::dimension("country", &["listing"])],
            Vec::new(),
            ResolutionPath::default(),
        );
    }

    #[test]
    fn with_specs_collapses_paths_when_empty() {
        let original = set(vec![LinkableInstanceSpec::dimension("country", &["listing"])]);
        let narrowed = original.with_specs(Vec::new(), ResolutionPath::default());
        assert!(narrowed.is_empty());
        assert!(narrowed.measure_paths().is_empty());
    }
}
