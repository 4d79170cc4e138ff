//! Group-by item resolution over the query's resolution DAG.

mod candidates;
mod dag;
mod dag_builder;
mod filter_lookup;
mod filter_resolver;
mod path;
mod push_down;
mod resolver;
mod suggestions;

pub use candidates::{GroupByItemCandidateSet, PushDownResult};
pub use dag::{
    MeasureSourceNode, MetricInputLocation, MetricNode, NoMetricsSourceNode, NodeId, QueryNode,
    ResolutionDag, ResolutionDagVisitor, ResolutionNode,
};
pub use dag_builder::DagBuilder;
pub use filter_lookup::{
    FilterSpecResolution, FilterSpecResolutionLookUp, NonParsableFilterResolution,
    ResolvedSpecLookUpKey, WhereFilterLocation,
};
pub use filter_resolver::WhereFilterSpecResolver;
pub use path::{PathGuard, PathNode, PathTracker, ResolutionPath};
pub use push_down::PushDownVisitor;
pub use resolver::{AvailableGroupByItemsResolution, GroupByItemResolution, GroupByItemResolver};
pub use suggestions::{top_fuzzy_matches, SuggestionGenerator};
