use std::collections::BTreeSet;

use proptest::prelude::*;

use groupby::patterns::{apply_patterns, BaseTimeGrainPattern, NoneDatePartPattern, SpecPattern};
use groupby::resolution::{GroupByItemCandidateSet, NodeId, PathNode, ResolutionPath};
use groupby::specs::{DatePart, ElementPathKey, LinkableInstanceSpec, TimeGranularity};

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_links() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::select(vec![
        vec![],
        vec!["booking"],
        vec!["listing"],
        vec!["listing", "user"],
    ])
}

fn arb_spec() -> impl Strategy<Value = LinkableInstanceSpec> {
    let element = prop::sample::select(vec!["country", "ds", "metric_time", "is_instant"]);
    let grain = prop::sample::select(TimeGranularity::ALL.to_vec());
    let date_part = prop::option::of(prop::sample::select(DatePart::ALL.to_vec()));
    prop_oneof![
        (element.clone(), arb_links())
            .prop_map(|(name, links)| LinkableInstanceSpec::dimension(name, &links)),
        (element.clone(), arb_links(), grain, date_part).prop_map(|(name, links, grain, part)| {
            LinkableInstanceSpec::time_dimension(name, &links, grain, part)
        }),
        (element, arb_links()).prop_map(|(name, links)| LinkableInstanceSpec::entity(name, &links)),
    ]
}

fn arb_specs() -> impl Strategy<Value = Vec<LinkableInstanceSpec>> {
    prop::collection::vec(arb_spec(), 0..24)
}

fn candidate_set(specs: Vec<LinkableInstanceSpec>, id: usize) -> GroupByItemCandidateSet {
    let path = ResolutionPath::new(vec![PathNode {
        node_id: NodeId(id),
        description: format!("Measure('m{id}')"),
    }]);
    let measure_paths = if specs.is_empty() {
        Vec::new()
    } else {
        vec![path.clone()]
    };
    GroupByItemCandidateSet::new(specs, measure_paths, path)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn base_grain_is_idempotent(specs in arb_specs()) {
        let pattern = BaseTimeGrainPattern::new();
        let once = pattern.match_specs(&specs);
        let twice = pattern.match_specs(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn patterns_never_widen(specs in arb_specs()) {
        let matched = apply_patterns(&specs, &[&BaseTimeGrainPattern::new(), &NoneDatePartPattern]);
        for spec in &matched {
            prop_assert!(specs.contains(spec), "{} was not a candidate", spec);
            prop_assert!(spec.date_part().is_none());
        }
    }

    #[test]
    fn base_grain_keeps_one_grain_per_time_attribute(specs in arb_specs()) {
        let matched = BaseTimeGrainPattern::new().match_specs(&specs);
        let mut seen = BTreeSet::new();
        for spec in matched.iter().filter_map(LinkableInstanceSpec::as_time_dimension) {
            let identity = (spec.element_name.clone(), spec.entity_links.clone(), spec.date_part);
            prop_assert!(seen.insert(identity), "two grains kept for {}", spec.element_name);
        }
    }

    #[test]
    fn intersection_keys_are_exactly_the_shared_keys(left in arb_specs(), right in arb_specs()) {
        let left = candidate_set(left, 0);
        let right = candidate_set(right, 1);
        let common = GroupByItemCandidateSet::intersect_by_path_key(&[&left, &right]);

        let keys = |specs: &[LinkableInstanceSpec]| -> BTreeSet<ElementPathKey> {
            specs.iter().map(LinkableInstanceSpec::element_path_key).collect()
        };
        let shared: BTreeSet<ElementPathKey> = keys(left.specs())
            .intersection(&keys(right.specs()))
            .cloned()
            .collect();
        prop_assert_eq!(keys(&common), shared);
    }
}
