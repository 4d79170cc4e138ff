pub mod config;
pub mod error;
pub mod filters;
pub mod issues;
pub mod linkable;
pub mod lookup;
pub mod manifest;
pub mod mergeable;
pub mod naming;
pub mod patterns;
pub mod query;
pub mod registry;
pub mod resolution;
pub mod specs;
pub mod telemetry;
pub mod validation;

use std::path::Path;

use crate::error::Result;
use crate::lookup::SemanticManifestLookup;
use crate::registry::ManifestRegistry;

/// Load a semantic manifest from a directory of YAML files and index it for
/// resolution.
pub fn load_lookup<P: AsRef<Path>>(manifest_dir: P) -> Result<SemanticManifestLookup> {
    ManifestRegistry::load_from_dir(manifest_dir)?.lookup()
}

pub use config::ResolverConfig;
pub use error::ResolverError;
pub use issues::{InputToIssueSetMapping, IssueKind, IssueSet, ResolutionIssue};
pub use lookup::ManifestLookup;
pub use manifest::{Metric, MetricType, SemanticManifest, SemanticModel};
pub use query::{QueryParser, QueryRequest, QueryResolution, ResolvedQuerySpec};
pub use resolution::{DagBuilder, GroupByItemResolver, ResolutionDag};
pub use specs::{LinkableInstanceSpec, MetricReference, TimeGranularity};
