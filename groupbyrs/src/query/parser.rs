//! The front door: turns a textual [`QueryRequest`] into a
//! [`ResolvedQuerySpec`] or a grouped issue report.

use crate::config::ResolverConfig;
use crate::error::{ResolverError, Result};
use crate::filters::WhereFilterIntersection;
use crate::issues::{
    InputToIssueSetMapping, IssueKind, IssueSet, ResolutionIssue, ResolverInput,
    ResolverInputKind,
};
use crate::lookup::ManifestLookup;
use crate::naming::{
    scheme_for_input, DunderNamingScheme, MetricNamingScheme, ObjectBuilderNamingScheme,
    QueryItemNamingScheme,
};
use crate::patterns::{apply_patterns, BaseTimeGrainPattern, EntityLinkPattern};
use crate::resolution::{
    top_fuzzy_matches, AvailableGroupByItemsResolution, DagBuilder, FilterSpecResolutionLookUp,
    GroupByItemResolver, PathNode, ResolutionDag, ResolutionPath, ResolvedSpecLookUpKey,
    SuggestionGenerator, WhereFilterLocation, WhereFilterSpecResolver,
};
use crate::specs::{LinkableInstanceSpec, MetricReference, MetricSpec};
use crate::validation::PostResolutionQueryValidator;

use super::query_spec::{
    OrderByInstance, OrderBySpec, QueryResolution, ResolvedQuerySpec, WhereFilterSpec,
};
use super::request::QueryRequest;

pub struct QueryParser<'a> {
    lookup: &'a dyn ManifestLookup,
    config: &'a ResolverConfig,
}

impl<'a> QueryParser<'a> {
    pub fn new(lookup: &'a dyn ManifestLookup, config: &'a ResolverConfig) -> Self {
        Self { lookup, config }
    }

    /// Resolve a request into a spec or a grouped issue report. Only a
    /// structurally broken manifest is returned as `Err`.
    pub fn resolve_query(&self, request: &QueryRequest) -> Result<QueryResolution> {
        let mut issues = InputToIssueSetMapping::new();

        let metrics = self.resolve_metrics(&request.metrics, &mut issues);
        if issues.has_errors() {
            return Ok(QueryResolution {
                query_spec: None,
                input_to_issue_set: issues,
            });
        }

        let where_filter = WhereFilterIntersection::from_strs(&request.where_filters);
        let dag = DagBuilder::new(self.lookup).build(&metrics, &where_filter)?;
        let query_path = query_path(&dag);
        let resolver = GroupByItemResolver::new(self.lookup, &dag, &self.config.group_by);

        let group_by_specs = self.resolve_group_by(
            &resolver,
            &metrics,
            &request.group_by,
            &query_path,
            &mut issues,
        );
        let group_by_failed = issues.has_errors();

        let order_by_specs = self.resolve_order_by(
            &request.order_by,
            &metrics,
            &group_by_specs,
            &query_path,
            &mut issues,
        );

        let limit = match request.limit {
            Some(limit) if limit < 0 => {
                issues.add(
                    ResolverInput::new(ResolverInputKind::Limit, limit.to_string()),
                    IssueSet::from_issue(ResolutionIssue::new(
                        IssueKind::InvalidLimit { limit },
                        query_path.clone(),
                    )),
                );
                None
            }
            Some(limit) => u64::try_from(limit).ok(),
            None => None,
        };

        let filter_spec_lookup =
            WhereFilterSpecResolver::new(self.lookup, &dag, &self.config.group_by).resolve_lookup();
        for (template, issue_set) in filter_spec_lookup.issues_by_template() {
            issues.add(
                ResolverInput::new(ResolverInputKind::WhereFilter, template),
                issue_set,
            );
        }

        // Metric-time requirements are meaningless when the group-by itself
        // failed to resolve.
        if !group_by_failed {
            let validation_issues =
                PostResolutionQueryValidator::new(self.lookup, &group_by_specs).validate(&dag);
            let names: Vec<&str> = metrics.iter().map(MetricReference::as_str).collect();
            issues.add(
                ResolverInput::new(ResolverInputKind::Query, names.join(", ")),
                validation_issues,
            );
        }

        if issues.has_errors() {
            tracing::debug!(issues = issues.issue_count(), "query resolution failed");
            return Ok(QueryResolution {
                query_spec: None,
                input_to_issue_set: issues,
            });
        }

        let filter_specs = query_filter_specs(&where_filter, &metrics, &filter_spec_lookup)?;
        let mut query_spec = ResolvedQuerySpec {
            metric_specs: metrics.iter().map(MetricSpec::from_reference).collect(),
            order_by_specs,
            limit,
            filter_specs,
            filter_spec_lookup,
            ..ResolvedQuerySpec::default()
        };
        for spec in group_by_specs {
            query_spec.push_group_by(spec);
        }
        tracing::debug!(
            metrics = query_spec.metric_specs.len(),
            group_by = query_spec.linkable_specs().len(),
            "resolved query"
        );
        Ok(QueryResolution {
            query_spec: Some(query_spec),
            input_to_issue_set: issues,
        })
    }

    /// Like [`resolve_query`](Self::resolve_query) but any issue becomes an
    /// `InvalidQuery` error carrying the rendered report.
    pub fn parse_and_validate_query(&self, request: &QueryRequest) -> Result<ResolvedQuerySpec> {
        let resolution = self.resolve_query(request)?;
        if resolution.has_errors() {
            return Err(ResolverError::InvalidQuery(format!(
                "Got errors while resolving the query.\n\n{}",
                resolution.input_to_issue_set.render()
            )));
        }
        resolution
            .query_spec
            .ok_or_else(|| ResolverError::InvalidQuery("query resolved to no spec".to_string()))
    }

    /// Every group-by item the given metrics can be queried by together.
    pub fn available_group_by_items<S: AsRef<str>>(
        &self,
        metric_names: &[S],
    ) -> Result<AvailableGroupByItemsResolution> {
        let mut metrics = Vec::with_capacity(metric_names.len());
        for name in metric_names {
            let name = name.as_ref();
            let reference = MetricNamingScheme
                .metric_reference(name)
                .filter(|reference| self.lookup.get_metric(reference).is_some())
                .ok_or_else(|| ResolverError::InvalidQuery(format!("unknown metric '{name}'")))?;
            metrics.push(reference);
        }
        let dag =
            DagBuilder::new(self.lookup).build(&metrics, &WhereFilterIntersection::default())?;
        Ok(GroupByItemResolver::new(self.lookup, &dag, &self.config.group_by)
            .resolve_available_items(None))
    }

    fn resolve_metrics(
        &self,
        inputs: &[String],
        issues: &mut InputToIssueSetMapping,
    ) -> Vec<MetricReference> {
        let mut metrics = Vec::with_capacity(inputs.len());
        for input in inputs {
            let known = MetricNamingScheme
                .metric_reference(input)
                .filter(|reference| self.lookup.get_metric(reference).is_some());
            match known {
                Some(reference) => metrics.push(reference),
                None => {
                    let candidates = self
                        .lookup
                        .metric_references()
                        .into_iter()
                        .map(|reference| reference.0);
                    let suggestions =
                        top_fuzzy_matches(input, candidates, &self.config.suggestions);
                    issues.add(
                        ResolverInput::new(ResolverInputKind::Metric, input.clone()),
                        IssueSet::from_issue(ResolutionIssue::new(
                            IssueKind::InvalidMetric {
                                metric: input.clone(),
                                suggestions,
                            },
                            ResolutionPath::default(),
                        )),
                    );
                }
            }
        }
        metrics
    }

    fn resolve_group_by(
        &self,
        resolver: &GroupByItemResolver<'_>,
        metrics: &[MetricReference],
        inputs: &[String],
        query_path: &ResolutionPath,
        issues: &mut InputToIssueSetMapping,
    ) -> Vec<LinkableInstanceSpec> {
        let mut specs: Vec<LinkableInstanceSpec> = Vec::new();
        for input in inputs {
            let resolver_input = ResolverInput::new(ResolverInputKind::GroupBy, input.clone());
            let invalid = |message: String| {
                IssueSet::from_issue(ResolutionIssue::new(
                    IssueKind::InvalidGroupByItem {
                        input: input.clone(),
                        message,
                        suggestions: self.group_by_suggestions(input, metrics),
                    },
                    query_path.clone(),
                ))
            };

            let Some(scheme) = scheme_for_input(input) else {
                issues.add(
                    resolver_input,
                    invalid(
                        "it follows neither the dunder nor the object-builder naming scheme"
                            .to_string(),
                    ),
                );
                continue;
            };
            let pattern = match scheme.spec_pattern(input) {
                Ok(pattern) => pattern,
                Err(err) => {
                    issues.add(resolver_input, invalid(err.to_string()));
                    continue;
                }
            };

            let generator =
                SuggestionGenerator::new(input.clone(), scheme, &self.config.suggestions);
            let resolution =
                resolver.resolve_matching_item_for_querying(&pattern, Some(&generator));
            match resolution.spec {
                Some(spec) => {
                    tracing::trace!(input = %input, spec = %spec, "resolved group-by item");
                    if !specs.contains(&spec) {
                        specs.push(spec);
                    }
                }
                None => issues.add(resolver_input, resolution.issue_set),
            }
        }
        specs
    }

    /// Dunder names of items the metrics can all be grouped by, closest to
    /// `input` first. Used when the input could not be parsed at all.
    fn group_by_suggestions(&self, input: &str, metrics: &[MetricReference]) -> Vec<String> {
        let group_by = &self.config.group_by;
        let candidates = if metrics.is_empty() {
            self.lookup.group_by_item_specs_for_no_metrics_query(
                &group_by.with_any_of,
                &group_by.without_any_of,
            )
        } else {
            self.lookup.element_specs_for_metrics(
                metrics,
                &group_by.with_any_of,
                &group_by.without_any_of,
            )
        };
        SuggestionGenerator::new(input, &DunderNamingScheme, &self.config.suggestions)
            .suggestions(&candidates)
    }

    fn resolve_order_by(
        &self,
        inputs: &[String],
        metrics: &[MetricReference],
        group_by_specs: &[LinkableInstanceSpec],
        query_path: &ResolutionPath,
        issues: &mut InputToIssueSetMapping,
    ) -> Vec<OrderBySpec> {
        let mut order_by_specs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let trimmed = input.trim();
            let (body, minus) = match trimmed.strip_prefix('-') {
                Some(rest) => (rest.trim(), true),
                None => (trimmed, false),
            };

            if let Some(metric) = MetricNamingScheme
                .metric_reference(body)
                .filter(|reference| metrics.contains(reference))
            {
                order_by_specs.push(OrderBySpec {
                    instance: OrderByInstance::Metric(MetricSpec::from_reference(&metric)),
                    descending: minus,
                });
                continue;
            }

            let parsed: Option<(EntityLinkPattern, bool, &dyn QueryItemNamingScheme)> =
                if ObjectBuilderNamingScheme.input_str_follows_scheme(body) {
                    ObjectBuilderNamingScheme
                        .parse_input(body, true)
                        .ok()
                        .map(|(call_parameter_set, descending)| {
                            (
                                EntityLinkPattern::from_call_parameter_set(&call_parameter_set),
                                minus || descending,
                                &ObjectBuilderNamingScheme as &dyn QueryItemNamingScheme,
                            )
                        })
                } else if DunderNamingScheme.input_str_follows_scheme(body) {
                    DunderNamingScheme
                        .spec_pattern(body)
                        .ok()
                        .map(|pattern| {
                            (
                                pattern,
                                minus,
                                &DunderNamingScheme as &dyn QueryItemNamingScheme,
                            )
                        })
                } else {
                    None
                };

            let matched = parsed.as_ref().map(|(pattern, _, _)| {
                apply_patterns(group_by_specs, &[pattern, &BaseTimeGrainPattern::new()])
            });
            match (parsed, matched) {
                (Some((_, descending, _)), Some(mut matched)) if matched.len() == 1 => {
                    if let Some(spec) = matched.pop() {
                        order_by_specs.push(OrderBySpec {
                            instance: OrderByInstance::GroupBy(spec),
                            descending,
                        });
                    }
                }
                (parsed, _) => {
                    let scheme: &dyn QueryItemNamingScheme = parsed
                        .map(|(_, _, scheme)| scheme)
                        .unwrap_or(&DunderNamingScheme);
                    let candidates = metrics
                        .iter()
                        .map(|metric| metric.0.clone())
                        .chain(group_by_specs.iter().filter_map(|spec| scheme.input_str(spec)));
                    let suggestions = top_fuzzy_matches(body, candidates, &self.config.suggestions);
                    issues.add(
                        ResolverInput::new(ResolverInputKind::OrderBy, input.clone()),
                        IssueSet::from_issue(ResolutionIssue::new(
                            IssueKind::InvalidOrderByItem {
                                input: input.clone(),
                                suggestions,
                            },
                            query_path.clone(),
                        )),
                    );
                }
            }
        }
        order_by_specs
    }
}

fn query_path(dag: &ResolutionDag) -> ResolutionPath {
    let sink = dag.sink_id();
    ResolutionPath::new(vec![PathNode {
        node_id: sink,
        description: dag.node(sink).description(),
    }])
}

/// Render each query-level filter with dunder names for its resolved items.
fn query_filter_specs(
    where_filter: &WhereFilterIntersection,
    metrics: &[MetricReference],
    lookup: &FilterSpecResolutionLookUp,
) -> Result<Vec<WhereFilterSpec>> {
    let location = WhereFilterLocation::Query {
        metrics: metrics.to_vec(),
    };
    let mut filter_specs = Vec::new();
    for filter in where_filter.iter() {
        let mut linkable_specs: Vec<LinkableInstanceSpec> = Vec::new();
        let where_sql = filter
            .render(|call_parameter_set| {
                let key = ResolvedSpecLookUpKey {
                    filter_location: location.clone(),
                    call_parameter_set: call_parameter_set.clone(),
                };
                let spec = lookup.checked_resolved_spec(&key)?;
                if !linkable_specs.contains(spec) {
                    linkable_specs.push(spec.clone());
                }
                Some(spec.qualified_name())
            })
            .map_err(|err| ResolverError::InvalidQuery(err.to_string()))?;
        filter_specs.push(WhereFilterSpec {
            where_sql,
            linkable_specs,
            template: filter.where_sql_template.clone(),
        });
    }
    Ok(filter_specs)
}
