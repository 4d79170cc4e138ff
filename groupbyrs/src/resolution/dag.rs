//! The resolution DAG: an arena of typed nodes describing how the requested
//! metrics are built from measures. Built once per query, never mutated.

use std::fmt;

use serde::Serialize;

use crate::filters::WhereFilterIntersection;
use crate::manifest::{Metric, MetricInput, MetricType};
use crate::specs::{MeasureReference, MetricReference};

/// Index of a node in its DAG's arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// Which input slot of which derived or ratio metric a metric node fills.
#[derive(Clone, Debug)]
pub struct MetricInputLocation {
    pub derived_metric: MetricReference,
    pub input_index: usize,
    pub input: MetricInput,
}

/// A measure read by a simple, cumulative or conversion metric.
#[derive(Clone, Debug)]
pub struct MeasureSourceNode {
    pub measure: MeasureReference,
    pub child_metric: MetricReference,
    pub child_metric_type: MetricType,
}

/// Source for a query that requests no metrics.
#[derive(Clone, Debug, Default)]
pub struct NoMetricsSourceNode;

#[derive(Clone, Debug)]
pub struct MetricNode {
    pub metric: Metric,
    pub metric_input_location: Option<MetricInputLocation>,
    pub parents: Vec<NodeId>,
}

impl MetricNode {
    pub fn reference(&self) -> MetricReference {
        self.metric.reference()
    }
}

/// The single sink of the DAG.
#[derive(Clone, Debug)]
pub struct QueryNode {
    pub metrics: Vec<MetricReference>,
    pub where_filter: WhereFilterIntersection,
    pub parents: Vec<NodeId>,
}

#[derive(Clone, Debug)]
pub enum ResolutionNode {
    MeasureSource(MeasureSourceNode),
    NoMetricsSource(NoMetricsSourceNode),
    Metric(MetricNode),
    Query(QueryNode),
}

impl ResolutionNode {
    pub fn parents(&self) -> &[NodeId] {
        match self {
            ResolutionNode::MeasureSource(_) | ResolutionNode::NoMetricsSource(_) => &[],
            ResolutionNode::Metric(node) => &node.parents,
            ResolutionNode::Query(node) => &node.parents,
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            ResolutionNode::MeasureSource(_) => "msr",
            ResolutionNode::NoMetricsSource(_) => "nms",
            ResolutionNode::Metric(_) => "mtr",
            ResolutionNode::Query(_) => "qr",
        }
    }

    /// Short description used in resolution paths.
    pub fn description(&self) -> String {
        match self {
            ResolutionNode::MeasureSource(node) => format!("Measure('{}')", node.measure),
            ResolutionNode::NoMetricsSource(_) => "NoMetricsQuery()".to_string(),
            ResolutionNode::Metric(node) => format!("Metric('{}')", node.metric.name),
            ResolutionNode::Query(node) => {
                let metrics: Vec<String> =
                    node.metrics.iter().map(|m| format!("'{m}'")).collect();
                format!("Query([{}])", metrics.join(", "))
            }
        }
    }
}

/// One method per node variant; [`ResolutionDag::accept`] dispatches.
pub trait ResolutionDagVisitor {
    type Output;

    fn visit_measure_source(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        node: &MeasureSourceNode,
    ) -> Self::Output;

    fn visit_no_metrics_source(
        &self,
        dag: &ResolutionDag,
        id: NodeId,
        node: &NoMetricsSourceNode,
    ) -> Self::Output;

    fn visit_metric(&self, dag: &ResolutionDag, id: NodeId, node: &MetricNode) -> Self::Output;

    fn visit_query(&self, dag: &ResolutionDag, id: NodeId, node: &QueryNode) -> Self::Output;
}

#[derive(Clone, Debug)]
pub struct ResolutionDag {
    nodes: Vec<ResolutionNode>,
    sink: NodeId,
}

impl ResolutionDag {
    /// The last node pushed must be the query node.
    pub(crate) fn from_nodes(nodes: Vec<ResolutionNode>) -> Self {
        let sink = NodeId(nodes.len().saturating_sub(1));
        assert!(
            matches!(nodes.last(), Some(ResolutionNode::Query(_))),
            "a resolution DAG must end with its query node"
        );
        Self { nodes, sink }
    }

    pub fn sink_id(&self) -> NodeId {
        self.sink
    }

    pub fn sink(&self) -> &QueryNode {
        match &self.nodes[self.sink.0] {
            ResolutionNode::Query(node) => node,
            _ => unreachable!("sink is always a query node"),
        }
    }

    pub fn node(&self, id: NodeId) -> &ResolutionNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn display_id(&self, id: NodeId) -> String {
        format!("{}_{}", self.node(id).id_prefix(), id.0)
    }

    pub fn accept<V: ResolutionDagVisitor>(&self, id: NodeId, visitor: &V) -> V::Output {
        match self.node(id) {
            ResolutionNode::MeasureSource(node) => visitor.visit_measure_source(self, id, node),
            ResolutionNode::NoMetricsSource(node) => {
                visitor.visit_no_metrics_source(self, id, node)
            }
            ResolutionNode::Metric(node) => visitor.visit_metric(self, id, node),
            ResolutionNode::Query(node) => visitor.visit_query(self, id, node),
        }
    }
}

impl fmt::Display for ResolutionDag {
    /// Indented tree from the sink toward the sources.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_node(
            dag: &ResolutionDag,
            f: &mut fmt::Formatter<'_>,
            id: NodeId,
            depth: usize,
        ) -> fmt::Result {
            writeln!(
                f,
                "{}{} {}",
                "  ".repeat(depth),
                dag.display_id(id),
                dag.node(id).description()
            )?;
            for parent in dag.node(id).parents() {
                write_node(dag, f, *parent, depth + 1)?;
            }
            Ok(())
        }
        write_node(self, f, self.sink, 0)
    }
}
