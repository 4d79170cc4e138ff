//! The resolved output handed to SQL generation.

use serde::Serialize;

use crate::issues::InputToIssueSetMapping;
use crate::resolution::FilterSpecResolutionLookUp;
use crate::specs::{
    DimensionSpec, EntitySpec, GroupByMetricSpec, LinkableInstanceSpec, MetricSpec,
    TimeDimensionSpec,
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum OrderByInstance {
    Metric(MetricSpec),
    GroupBy(LinkableInstanceSpec),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OrderBySpec {
    pub instance: OrderByInstance,
    pub descending: bool,
}

/// A query-level filter with its placeholders rendered as dunder names.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WhereFilterSpec {
    pub where_sql: String,
    pub linkable_specs: Vec<LinkableInstanceSpec>,
    pub template: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResolvedQuerySpec {
    pub metric_specs: Vec<MetricSpec>,
    pub dimension_specs: Vec<DimensionSpec>,
    pub time_dimension_specs: Vec<TimeDimensionSpec>,
    pub entity_specs: Vec<EntitySpec>,
    pub group_by_metric_specs: Vec<GroupByMetricSpec>,
    pub order_by_specs: Vec<OrderBySpec>,
    pub limit: Option<u64>,
    pub filter_specs: Vec<WhereFilterSpec>,
    pub filter_spec_lookup: FilterSpecResolutionLookUp,
}

impl ResolvedQuerySpec {
    pub(crate) fn push_group_by(&mut self, spec: LinkableInstanceSpec) {
        match spec {
            LinkableInstanceSpec::Dimension(s) => self.dimension_specs.push(s),
            LinkableInstanceSpec::TimeDimension(s) => self.time_dimension_specs.push(s),
            LinkableInstanceSpec::Entity(s) => self.entity_specs.push(s),
            LinkableInstanceSpec::GroupByMetric(s) => self.group_by_metric_specs.push(s),
        }
    }

    /// Every group-by spec, dimensions first.
    pub fn linkable_specs(&self) -> Vec<LinkableInstanceSpec> {
        self.dimension_specs
            .iter()
            .cloned()
            .map(LinkableInstanceSpec::Dimension)
            .chain(
                self.time_dimension_specs
                    .iter()
                    .cloned()
                    .map(LinkableInstanceSpec::TimeDimension),
            )
            .chain(self.entity_specs.iter().cloned().map(LinkableInstanceSpec::Entity))
            .chain(
                self.group_by_metric_specs
                    .iter()
                    .cloned()
                    .map(LinkableInstanceSpec::GroupByMetric),
            )
            .collect()
    }
}

/// Either a resolved spec, or the issues explaining why there is none.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryResolution {
    pub query_spec: Option<ResolvedQuerySpec>,
    pub input_to_issue_set: InputToIssueSetMapping,
}

impl QueryResolution {
    pub fn has_errors(&self) -> bool {
        self.input_to_issue_set.has_errors()
    }
}
