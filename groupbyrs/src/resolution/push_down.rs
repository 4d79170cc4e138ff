//! Push-down: compute the group-by items available at every node of the
//! resolution DAG, from the measures up to the requested node.
//!
//! Source nodes enumerate what their measure (or a metric-less query) can
//! reach and narrow it with the source patterns. Metric and query nodes keep
//! only the items every parent offers. Failures become issues attached to the
//! node's path; nothing here returns `Err`.

use std::collections::BTreeSet;

use crate::issues::{IssueKind, IssueSet, ParentCandidates, ResolutionIssue};
use crate::linkable::LinkableElementProperty;
use crate::lookup::ManifestLookup;
use crate::manifest::MetricType;
use crate::mergeable::Mergeable;
use crate::patterns::{apply_patterns, BaseTimeGrainPattern, NoneDatePartPattern, SpecPattern};
use crate::specs::LinkableInstanceSpec;

use super::candidates::{GroupByItemCandidateSet, PushDownResult};
use super::dag::{
    MeasureSourceNode, MetricNode, NoMetricsSourceNode, NodeId, QueryNode, ResolutionDag,
    ResolutionDagVisitor,
};
use super::path::{PathTracker, ResolutionPath};
use super::suggestions::SuggestionGenerator;

pub struct PushDownVisitor<'a> {
    lookup: &'a dyn ManifestLookup,
    source_spec_patterns: Vec<&'a dyn SpecPattern>,
    with_any_of: &'a BTreeSet<LinkableElementProperty>,
    without_any_of: &'a BTreeSet<LinkableElementProperty>,
    suggestion_generator: Option<&'a SuggestionGenerator<'a>>,
    path_tracker: PathTracker,
}

impl<'a> PushDownVisitor<'a> {
    pub fn new(
        lookup: &'a dyn ManifestLookup,
        source_spec_patterns: Vec<&'a dyn SpecPattern>,
        with_any_of: &'a BTreeSet<LinkableElementProperty>,
        without_any_of: &'a BTreeSet<LinkableElementProperty>,
        suggestion_generator: Option<&'a SuggestionGenerator<'a>>,
    ) -> Self {
        Self {
            lookup,
            source_spec_patterns,
            with_any_of,
            without_any_of,
            suggestion_generator,
            path_tracker: PathTracker::new(),
        }
    }

    fn input_str(&self) -> Option<String> {
        self.suggestion_generator
            .map(|generator| generator.input_str().to_string())
    }

    fn suggestions(&self, candidates: &[LinkableInstanceSpec]) -> Vec<String> {
        self.suggestion_generator
            .map(|generator| generator.suggestions(candidates))
            .unwrap_or_default()
    }

    fn merge_parents(
        &self,
        dag: &ResolutionDag,
        parents: &[NodeId],
        current: &ResolutionPath,
    ) -> PushDownResult {
        let results: Vec<PushDownResult> = parents
            .iter()
            .map(|parent| dag.accept(*parent, self))
            .collect();

        let merged_issues = IssueSet::merge_iter(results.iter().map(|r| r.issue_set.clone()));
        if merged_issues.has_errors() {
            return PushDownResult::new(GroupByItemCandidateSet::empty(current.clone()), merged_issues);
        }

        let parent_sets: Vec<&GroupByItemCandidateSet> =
            results.iter().map(|r| &r.candidate_set).collect();
        let specs = GroupByItemCandidateSet::intersect_by_path_key(&parent_sets);
        if specs.is_empty() {
            let parent_candidates = results
                .iter()
                .map(|r| ParentCandidates {
                    path: r.candidate_set.path_from_leaf_node().clone(),
                    specs: r.candidate_set.specs().to_vec(),
                })
                .collect();
            return PushDownResult::from_issue(
                current.clone(),
                ResolutionIssue::new(
                    IssueKind::NoCommonItemsInParents { parent_candidates },
                    current.clone(),
                ),
            );
        }

        let mut measure_paths: Vec<ResolutionPath> = Vec::new();
        for result in &results {
            for path in result.candidate_set.measure_paths() {
                if !measure_paths.contains(path) {
                    measure_paths.push(path.clone());
                }
            }
        }
        PushDownResult::new(
            GroupByItemCandidateSet::new(specs, measure_paths, current.clone()),
            merged_issues,
        )
    }

    fn log_result(&self, dag: &ResolutionDag, id: NodeId, result: &PushDownResult) {
        tracing::trace!(
            node = %dag.display_id(id),
            candidates = result.candidate_set.specs().len(),
            issues = result.issue_set.len(),
            "pushed down group-by items"
        );
    }
}

impl ResolutionDagVisitor for PushDownVisitor<'_> {
    type Output = PushDownResult;

    fn visit_measure_source(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        node: &MeasureSourceNode,
    ) -> PushDownResult {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let current = self.path_tracker.current();

        let items = self.lookup.group_by_item_specs_for_measure(
            &node.measure,
            self.with_any_of,
            self.without_any_of,
        );
        let candidates = match node.child_metric_type {
            MetricType::Simple | MetricType::Conversion => items,
            // A cumulative window is computed at the base grain of each time
            // dimension and cannot be bucketed by date part.
            MetricType::Cumulative => apply_patterns(
                &items,
                &[&BaseTimeGrainPattern::new(), &NoneDatePartPattern],
            ),
            MetricType::Ratio | MetricType::Derived => unreachable!(
                "{} metric '{}' cannot read measure '{}' directly",
                node.child_metric_type, node.child_metric, node.measure
            ),
        };

        let matched = apply_patterns(&candidates, &self.source_spec_patterns);
        let result = if matched.is_empty() {
            PushDownResult::from_issue(
                current.clone(),
                ResolutionIssue::new(
                    IssueKind::NoMatchingItemsForMeasure {
                        measure: node.measure.clone(),
                        input: self.input_str(),
                        suggestions: self.suggestions(&candidates),
                    },
                    current,
                ),
            )
        } else {
            PushDownResult::new(
                GroupByItemCandidateSet::new(matched, vec![current.clone()], current),
                IssueSet::new(),
            )
        };
        self.log_result(dag, id, &result);
        result
    }

    fn visit_no_metrics_source(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        _node: &NoMetricsSourceNode,
    ) -> PushDownResult {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let current = self.path_tracker.current();

        let candidates = self
            .lookup
            .group_by_item_specs_for_no_metrics_query(self.with_any_of, self.without_any_of);
        let matched = apply_patterns(&candidates, &self.source_spec_patterns);
        let result = if matched.is_empty() {
            PushDownResult::from_issue(
                current.clone(),
                ResolutionIssue::new(
                    IssueKind::NoMatchingItemsForNoMetricsQuery {
                        input: self.input_str(),
                        suggestions: self.suggestions(&candidates),
                    },
                    current,
                ),
            )
        } else {
            PushDownResult::new(
                GroupByItemCandidateSet::new(matched, vec![current.clone()], current),
                IssueSet::new(),
            )
        };
        self.log_result(dag, id, &result);
        result
    }

    fn visit_metric(&self, dag: &ResolutionDag, id: NodeId, node: &MetricNode) -> PushDownResult {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let current = self.path_tracker.current();

        let merged = self.merge_parents(dag, &node.parents, &current);
        if merged.issue_set.has_errors() {
            self.log_result(dag, id, &merged);
            return merged;
        }

        let offsets_to_grain = matches!(
            node.metric.metric_type,
            MetricType::Ratio | MetricType::Derived
        ) && node
            .metric
            .input_metrics()
            .iter()
            .any(|input| input.offset_to_grain.is_some());
        if !offsets_to_grain {
            self.log_result(dag, id, &merged);
            return merged;
        }

        let without_date_part = NoneDatePartPattern.match_specs(merged.candidate_set.specs());
        let result = if without_date_part.is_empty() {
            let issue = ResolutionIssue::new(
                IssueKind::MetricExcludesDatePart {
                    metric: node.reference(),
                },
                current.clone(),
            )
            .with_parent_issues(merged.issue_set.issues.clone());
            PushDownResult::from_issue(current, issue)
        } else {
            PushDownResult::new(
                merged.candidate_set.with_specs(without_date_part, current),
                merged.issue_set,
            )
        };
        self.log_result(dag, id, &result);
        result
    }

    fn visit_query(&self, dag: &ResolutionDag, id: NodeId, node: &QueryNode) -> PushDownResult {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let current = self.path_tracker.current();
        let result = self.merge_parents(dag, &node.parents, &current);
        self.log_result(dag, id, &result);
        result
    }
}
