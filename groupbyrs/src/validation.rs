//! Checks run once every input of a query has resolved.
//!
//! Each rule sees every metric node and the query node of the resolution DAG
//! and reports issues against the node's path.

use crate::issues::{IssueKind, IssueSet, ResolutionIssue};
use crate::lookup::ManifestLookup;
use crate::manifest::MetricType;
use crate::mergeable::Mergeable;
use crate::resolution::{
    MeasureSourceNode, MetricNode, NoMetricsSourceNode, NodeId, PathTracker, QueryNode,
    ResolutionDag, ResolutionDagVisitor, ResolutionPath,
};
use crate::specs::{LinkableInstanceSpec, MetricReference};

pub trait PostResolutionQueryValidationRule {
    fn validate_metric_in_resolution_dag(
        &self,
        _metric: &MetricNode,
        _path: &ResolutionPath,
    ) -> IssueSet {
        IssueSet::new()
    }

    fn validate_query_in_resolution_dag(
        &self,
        _query: &QueryNode,
        _path: &ResolutionPath,
    ) -> IssueSet {
        IssueSet::new()
    }
}

/// Rejects a query that lists the same metric more than once.
#[derive(Debug, Default)]
pub struct DuplicateMetricValidationRule;

impl PostResolutionQueryValidationRule for DuplicateMetricValidationRule {
    fn validate_query_in_resolution_dag(&self, query: &QueryNode, path: &ResolutionPath) -> IssueSet {
        let duplicates: Vec<MetricReference> = query
            .metrics
            .iter()
            .filter(|metric| query.metrics.iter().filter(|other| other == metric).count() > 1)
            .cloned()
            .collect();
        if duplicates.is_empty() {
            return IssueSet::new();
        }
        IssueSet::from_issue(ResolutionIssue::new(
            IssueKind::DuplicateMetric { duplicates },
            path.clone(),
        ))
    }
}

/// Cumulative metrics with a window and metrics with time-offset inputs only
/// make sense grouped by time.
pub struct MetricTimeRequirementsRule<'a> {
    lookup: &'a dyn ManifestLookup,
    group_by_specs: &'a [LinkableInstanceSpec],
}

impl<'a> MetricTimeRequirementsRule<'a> {
    pub fn new(lookup: &'a dyn ManifestLookup, group_by_specs: &'a [LinkableInstanceSpec]) -> Self {
        Self {
            lookup,
            group_by_specs,
        }
    }

    fn group_by_includes_metric_time(&self, metric: &MetricReference) -> bool {
        let agg_time_dimensions = self.lookup.agg_time_dimension_specs_for_metric(metric);
        self.group_by_specs
            .iter()
            .filter_map(LinkableInstanceSpec::as_time_dimension)
            .any(|spec| {
                spec.is_metric_time()
                    || agg_time_dimensions
                        .iter()
                        .any(|agg_time| agg_time.same_attribute(spec))
            })
    }
}

impl PostResolutionQueryValidationRule for MetricTimeRequirementsRule<'_> {
    fn validate_metric_in_resolution_dag(&self, metric: &MetricNode, path: &ResolutionPath) -> IssueSet {
        let reference = metric.reference();
        if self.group_by_includes_metric_time(&reference) {
            return IssueSet::new();
        }
        let definition = &metric.metric;
        let kind = match definition.metric_type {
            MetricType::Cumulative if definition.has_cumulative_window() => {
                let params = &definition.type_params;
                let window = match (&params.window, &params.grain_to_date) {
                    (Some(window), _) => format!("window: {window}"),
                    (None, Some(grain)) => format!("grain_to_date: {grain}"),
                    (None, None) => String::new(),
                };
                IssueKind::CumulativeMetricRequiresMetricTime {
                    metric: reference,
                    window,
                }
            }
            MetricType::Ratio | MetricType::Derived if definition.has_time_offset_input() => {
                let offset_inputs = definition
                    .input_metrics()
                    .iter()
                    .filter(|input| input.offset_window.is_some() || input.offset_to_grain.is_some())
                    .map(|input| input.describe())
                    .collect();
                IssueKind::OffsetMetricRequiresMetricTime {
                    metric: reference,
                    offset_inputs,
                }
            }
            _ => return IssueSet::new(),
        };
        IssueSet::from_issue(ResolutionIssue::new(kind, path.clone()))
    }
}

/// Runs a list of rules over every metric and query node of a DAG.
pub struct PostResolutionQueryValidator<'a> {
    rules: Vec<Box<dyn PostResolutionQueryValidationRule + 'a>>,
}

impl<'a> PostResolutionQueryValidator<'a> {
    /// The standard rule set for a query grouped by `group_by_specs`.
    pub fn new(lookup: &'a dyn ManifestLookup, group_by_specs: &'a [LinkableInstanceSpec]) -> Self {
        Self::with_rules(vec![
            Box::new(DuplicateMetricValidationRule),
            Box::new(MetricTimeRequirementsRule::new(lookup, group_by_specs)),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn PostResolutionQueryValidationRule + 'a>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, dag: &ResolutionDag) -> IssueSet {
        let visitor = ValidationVisitor {
            rules: &self.rules,
            path_tracker: PathTracker::new(),
        };
        let issues = dag.accept(dag.sink_id(), &visitor);
        tracing::debug!(issues = issues.len(), "post-resolution validation");
        issues
    }
}

struct ValidationVisitor<'v, 'a> {
    rules: &'v [Box<dyn PostResolutionQueryValidationRule + 'a>],
    path_tracker: PathTracker,
}

impl ValidationVisitor<'_, '_> {
    fn visit_parents(&self, dag: &ResolutionDag, parents: &[NodeId]) -> IssueSet {
        IssueSet::merge_iter(parents.iter().map(|parent| dag.accept(*parent, self)))
    }
}

impl ResolutionDagVisitor for ValidationVisitor<'_, '_> {
    type Output = IssueSet;

    fn visit_measure_source(
        &self,
        _dag: &ResolutionDag,
        _id: NodeId,
        _node: &MeasureSourceNode,
    ) -> IssueSet {
        IssueSet::new()
    }

    fn visit_no_metrics_source(
        &self,
        _dag: &ResolutionDag,
        _id: NodeId,
        _node: &NoMetricsSourceNode,
    ) -> IssueSet {
        IssueSet::new()
    }

    fn visit_metric(&self, dag: &ResolutionDag, id: NodeId, node: &MetricNode) -> IssueSet {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let path = self.path_tracker.current();
        let own = IssueSet::merge_iter(
            self.rules
                .iter()
                .map(|rule| rule.validate_metric_in_resolution_dag(node, &path)),
        );
        own.merge(self.visit_parents(dag, &node.parents))
    }

    fn visit_query(&self, dag: &ResolutionDag, id: NodeId, node: &QueryNode) -> IssueSet {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let path = self.path_tracker.current();
        let own = IssueSet::merge_iter(
            self.rules
                .iter()
                .map(|rule| rule.validate_query_in_resolution_dag(node, &path)),
        );
        own.merge(self.visit_parents(dag, &node.parents))
    }
}
