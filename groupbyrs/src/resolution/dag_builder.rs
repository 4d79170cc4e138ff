use crate::error::{ResolverError, Result};
use crate::filters::WhereFilterIntersection;
use crate::lookup::ManifestLookup;
use crate::manifest::MetricType;
use crate::specs::MetricReference;

use super::dag::{
    MeasureSourceNode, MetricInputLocation, MetricNode, NoMetricsSourceNode, NodeId,
    QueryNode, ResolutionDag, ResolutionNode,
};

/// Builds the resolution DAG for a query from the manifest.
pub struct DagBuilder<'a> {
    lookup: &'a dyn ManifestLookup,
    nodes: Vec<ResolutionNode>,
}

impl<'a> DagBuilder<'a> {
    pub fn new(lookup: &'a dyn ManifestLookup) -> Self {
        Self {
            lookup,
            nodes: Vec::new(),
        }
    }

    /// An empty metric list builds a metric-less "distinct values" DAG.
    pub fn build(
        mut self,
        metrics: &[MetricReference],
        where_filter: &WhereFilterIntersection,
    ) -> Result<ResolutionDag> {
        let parents = if metrics.is_empty() {
            vec![self.push(ResolutionNode::NoMetricsSource(NoMetricsSourceNode))]
        } else {
            metrics
                .iter()
                .map(|metric| self.build_metric_node(metric, None))
                .collect::<Result<Vec<_>>>()?
        };
        self.push(ResolutionNode::Query(QueryNode {
            metrics: metrics.to_vec(),
            where_filter: where_filter.clone(),
            parents,
        }));
        let dag = ResolutionDag::from_nodes(self.nodes);
        tracing::debug!(nodes = dag.len(), metrics = metrics.len(), "built resolution DAG");
        tracing::trace!(dag = %dag, "resolution DAG");
        Ok(dag)
    }

    fn push(&mut self, node: ResolutionNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn build_metric_node(
        &mut self,
        metric_reference: &MetricReference,
        metric_input_location: Option<MetricInputLocation>,
    ) -> Result<NodeId> {
        let metric = self.lookup.get_metric(metric_reference).cloned().ok_or_else(|| {
            ResolverError::Manifest(format!("unknown metric '{metric_reference}'"))
        })?;

        let parents = match metric.metric_type {
            MetricType::Simple | MetricType::Cumulative | MetricType::Conversion => metric
                .measure_references()
                .into_iter()
                .map(|measure| {
                    self.push(ResolutionNode::MeasureSource(MeasureSourceNode {
                        measure,
                        child_metric: metric.reference(),
                        child_metric_type: metric.metric_type,
                    }))
                })
                .collect(),
            MetricType::Ratio | MetricType::Derived => {
                let mut parents = Vec::new();
                for (input_index, input) in metric.input_metrics().into_iter().enumerate() {
                    let location = MetricInputLocation {
                        derived_metric: metric.reference(),
                        input_index,
                        input: input.clone(),
                    };
                    parents.push(self.build_metric_node(&input.reference(), Some(location))?);
                }
                parents
            }
        };

        Ok(self.push(ResolutionNode::Metric(MetricNode {
            metric,
            metric_input_location,
            parents,
        })))
    }
}
