//! Resolves the group-by items referenced inside where-filter templates.
//!
//! A filter is resolved against the sub-DAG rooted at the node that declares
//! it, so an input metric's filter sees only that metric's items while the
//! query filter sees what every requested metric shares.

use crate::config::GroupByConfig;
use crate::filters::WhereFilterIntersection;
use crate::issues::{IssueKind, IssueSet, ResolutionIssue};
use crate::lookup::ManifestLookup;
use crate::mergeable::Mergeable;
use crate::patterns::EntityLinkPattern;

use super::dag::{
    MeasureSourceNode, MetricNode, NoMetricsSourceNode, NodeId, QueryNode, ResolutionDag,
    ResolutionDagVisitor,
};
use super::filter_lookup::{
    FilterSpecResolution, FilterSpecResolutionLookUp, NonParsableFilterResolution,
    ResolvedSpecLookUpKey, WhereFilterLocation,
};
use super::path::PathTracker;
use super::resolver::GroupByItemResolver;

pub struct WhereFilterSpecResolver<'a> {
    lookup: &'a dyn ManifestLookup,
    dag: &'a ResolutionDag,
    group_by_config: &'a GroupByConfig,
}

impl<'a> WhereFilterSpecResolver<'a> {
    pub fn new(
        lookup: &'a dyn ManifestLookup,
        dag: &'a ResolutionDag,
        group_by_config: &'a GroupByConfig,
    ) -> Self {
        Self {
            lookup,
            dag,
            group_by_config,
        }
    }

    pub fn resolve_lookup(&self) -> FilterSpecResolutionLookUp {
        let visitor = FilterResolutionVisitor {
            resolver: GroupByItemResolver::new(self.lookup, self.dag, self.group_by_config),
            path_tracker: PathTracker::new(),
        };
        let lookup = self.dag.accept(self.dag.sink_id(), &visitor);
        tracing::debug!(
            resolutions = lookup.spec_resolutions.len(),
            non_parsable = lookup.non_parsable_resolutions.len(),
            "resolved where-filter specs"
        );
        lookup
    }
}

struct FilterResolutionVisitor<'a> {
    resolver: GroupByItemResolver<'a>,
    path_tracker: PathTracker,
}

impl FilterResolutionVisitor<'_> {
    fn visit_parents(&self, dag: &ResolutionDag, parents: &[NodeId]) -> FilterSpecResolutionLookUp {
        FilterSpecResolutionLookUp::merge_iter(parents.iter().map(|p| dag.accept(*p, self)))
    }

    fn resolve_filters(
        &self,
        node_id: NodeId,
        filters: Vec<(WhereFilterLocation, &WhereFilterIntersection)>,
        already_resolved: &FilterSpecResolutionLookUp,
    ) -> FilterSpecResolutionLookUp {
        let current = self.path_tracker.current();
        // Sub-resolutions start their own path at this node.
        let prefix = current.parent_path();
        let mut resolved = FilterSpecResolutionLookUp::new();

        for (location, intersection) in filters {
            for filter in intersection.iter() {
                let template = filter.where_sql_template.clone();
                let call_parameter_sets = match filter.call_parameter_sets() {
                    Ok(sets) => sets,
                    Err(err) => {
                        tracing::debug!(filter = %template, error = %err, "unparsable where filter");
                        resolved.non_parsable_resolutions.push(NonParsableFilterResolution {
                            filter_location: location.clone(),
                            where_filter_template: template.clone(),
                            issue_set: IssueSet::from_issue(ResolutionIssue::new(
                                IssueKind::WhereFilterParsingIssue {
                                    where_filter: template,
                                    message: err.to_string(),
                                },
                                current.clone(),
                            )),
                        });
                        continue;
                    }
                };

                for call_parameter_set in call_parameter_sets {
                    let lookup_key = ResolvedSpecLookUpKey {
                        filter_location: location.clone(),
                        call_parameter_set,
                    };
                    if already_resolved.contains_key(&lookup_key) || resolved.contains_key(&lookup_key)
                    {
                        continue;
                    }
                    let pattern = EntityLinkPattern::from_call_parameter_set(
                        &lookup_key.call_parameter_set,
                    );
                    let object_builder_str = lookup_key.call_parameter_set.builder_str();
                    let resolution = self.resolver.resolve_matching_item_for_filters(
                        &object_builder_str,
                        &pattern,
                        node_id,
                    );
                    resolved.spec_resolutions.push(FilterSpecResolution {
                        lookup_key,
                        where_filter_template: template.clone(),
                        resolved_spec: resolution.spec,
                        resolution_path: current.clone(),
                        issue_set: resolution.issue_set.with_path_prefix(&prefix),
                        object_builder_str,
                    });
                }
            }
        }
        resolved
    }
}

impl ResolutionDagVisitor for FilterResolutionVisitor<'_> {
    type Output = FilterSpecResolutionLookUp;

    fn visit_measure_source(
        &self,
        _dag: &ResolutionDag,
        _id: NodeId,
        _node: &MeasureSourceNode,
    ) -> FilterSpecResolutionLookUp {
        FilterSpecResolutionLookUp::new()
    }

    fn visit_no_metrics_source(
        &self,
        _dag: &ResolutionDag,
        _id: NodeId,
        _node: &NoMetricsSourceNode,
    ) -> FilterSpecResolutionLookUp {
        FilterSpecResolutionLookUp::new()
    }

    fn visit_metric(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        node: &MetricNode,
    ) -> FilterSpecResolutionLookUp {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let from_parents = self.visit_parents(dag, &node.parents);

        let metric_location = WhereFilterLocation::Metric {
            metric: node.reference(),
        };
        let mut filters: Vec<(WhereFilterLocation, &WhereFilterIntersection)> = Vec::new();
        if let Some(filter) = &node.metric.filter {
            filters.push((metric_location.clone(), filter));
        }
        for measure in node.metric.input_measures() {
            if let Some(filter) = &measure.filter {
                filters.push((metric_location.clone(), filter));
            }
        }
        if let Some(location) = &node.metric_input_location {
            if let Some(filter) = &location.input.filter {
                filters.push((
                    WhereFilterLocation::MetricInput {
                        derived_metric: location.derived_metric.clone(),
                        input_metric: node.reference(),
                    },
                    filter,
                ));
            }
        }

        let resolved = self.resolve_filters(id, filters, &from_parents);
        from_parents.merge(resolved)
    }

    fn visit_query(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        node: &QueryNode,
    ) -> FilterSpecResolutionLookUp {
        let _guard = self.path_tracker.enter(id, dag.node(id).description());
        let from_parents = self.visit_parents(dag, &node.parents);
        let location = WhereFilterLocation::Query {
            metrics: node.metrics.clone(),
        };
        let resolved = self.resolve_filters(id, vec![(location, &node.where_filter)], &from_parents);
        from_parents.merge(resolved)
    }
}
