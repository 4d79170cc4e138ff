use serde::Serialize;

use crate::config::GroupByConfig;
use crate::issues::{IssueKind, IssueSet, ResolutionIssue};
use crate::lookup::ManifestLookup;
use crate::patterns::{apply_patterns, BaseTimeGrainPattern, MatchListPattern, SpecPattern};
use crate::specs::LinkableInstanceSpec;

use super::candidates::PushDownResult;
use super::dag::{NodeId, ResolutionDag};
use super::push_down::PushDownVisitor;
use super::suggestions::SuggestionGenerator;

/// Outcome of resolving one group-by input: a spec, or the issues explaining
/// why there is none.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupByItemResolution {
    pub spec: Option<LinkableInstanceSpec>,
    pub issue_set: IssueSet,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AvailableGroupByItemsResolution {
    pub specs: Vec<LinkableInstanceSpec>,
    pub issue_set: IssueSet,
}

/// Resolves group-by inputs against one resolution DAG.
pub struct GroupByItemResolver<'a> {
    lookup: &'a dyn ManifestLookup,
    dag: &'a ResolutionDag,
    group_by_config: &'a GroupByConfig,
}

impl<'a> GroupByItemResolver<'a> {
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

    pub fn dag(&self) -> &ResolutionDag {
        self.dag
    }

    fn push_down(
        &self,
        node: NodeId,
        source_spec_patterns: Vec<&dyn SpecPattern>,
        suggestion_generator: Option<&SuggestionGenerator<'_>>,
    ) -> PushDownResult {
        let visitor = PushDownVisitor::new(
            self.lookup,
            source_spec_patterns,
            &self.group_by_config.with_any_of,
            &self.group_by_config.without_any_of,
            suggestion_generator,
        );
        self.dag.accept(node, &visitor)
    }

    fn resolve_from(
        &self,
        node: NodeId,
        spec_pattern: &dyn SpecPattern,
        suggestion_generator: Option<&SuggestionGenerator<'_>>,
        input_str: Option<&str>,
    ) -> GroupByItemResolution {
        let base_grain = BaseTimeGrainPattern::new();
        let source_spec_patterns: Vec<&dyn SpecPattern> = vec![spec_pattern, &base_grain];
        let result = self.push_down(node, source_spec_patterns, suggestion_generator);
        if result.issue_set.has_errors() {
            return GroupByItemResolution {
                spec: None,
                issue_set: result.issue_set,
            };
        }

        let path = result.candidate_set.path_from_leaf_node().clone();
        let mut matched = apply_patterns(result.candidate_set.specs(), &[spec_pattern, &base_grain]);
        match matched.len() {
            1 => GroupByItemResolution {
                spec: matched.pop(),
                issue_set: IssueSet::new(),
            },
            0 => GroupByItemResolution {
                spec: None,
                issue_set: IssueSet::from_issue(ResolutionIssue::new(
                    IssueKind::InvalidGroupByItem {
                        input: input_str.unwrap_or_default().to_string(),
                        message: "it matches none of the items available to the query".to_string(),
                        suggestions: Vec::new(),
                    },
                    path,
                )),
            },
            _ => {
                tracing::debug!(
                    input = input_str.unwrap_or_default(),
                    matches = matched.len(),
                    "ambiguous group-by item"
                );
                GroupByItemResolution {
                    spec: None,
                    issue_set: IssueSet::from_issue(ResolutionIssue::new(
                        IssueKind::AmbiguousGroupByItem {
                            input: input_str.map(str::to_string),
                            candidates: matched,
                        },
                        path,
                    )),
                }
            }
        }
    }

    /// Resolve a query's group-by input at the DAG sink.
    pub fn resolve_matching_item_for_querying(
        &self,
        spec_pattern: &dyn SpecPattern,
        suggestion_generator: Option<&SuggestionGenerator<'_>>,
    ) -> GroupByItemResolution {
        let input_str = suggestion_generator.map(SuggestionGenerator::input_str);
        self.resolve_from(
            self.dag.sink_id(),
            spec_pattern,
            suggestion_generator,
            input_str,
        )
    }

    /// Resolve a filter's group-by input against the sub-DAG rooted at the
    /// node carrying the filter.
    pub fn resolve_matching_item_for_filters(
        &self,
        input_str: &str,
        spec_pattern: &dyn SpecPattern,
        resolution_node: NodeId,
    ) -> GroupByItemResolution {
        self.resolve_from(resolution_node, spec_pattern, None, Some(input_str))
    }

    /// Every group-by item available at `resolution_node` (the sink when
    /// `None`).
    pub fn resolve_available_items(
        &self,
        resolution_node: Option<NodeId>,
    ) -> AvailableGroupByItemsResolution {
        let node = resolution_node.unwrap_or_else(|| self.dag.sink_id());
        let result = self.push_down(node, Vec::new(), None);
        AvailableGroupByItemsResolution {
            specs: result.candidate_set.specs().to_vec(),
            issue_set: result.issue_set,
        }
    }

    /// Items available at `resolution_node` that the whole query can also be
    /// grouped by.
    pub fn resolve_available_items_within_query(
        &self,
        resolution_node: NodeId,
    ) -> AvailableGroupByItemsResolution {
        let at_sink = self.resolve_available_items(None);
        if at_sink.issue_set.has_errors() {
            return at_sink;
        }
        let allowed = MatchListPattern::new(at_sink.specs);
        let result = self.push_down(resolution_node, vec![&allowed], None);
        AvailableGroupByItemsResolution {
            specs: result.candidate_set.specs().to_vec(),
            issue_set: result.issue_set,
        }
    }
}
