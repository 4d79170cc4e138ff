use std::fs;
use std::path::Path;

use glob::glob;

use crate::error::{ResolverError, Result};
use crate::lookup::SemanticManifestLookup;
use crate::manifest::{Metric, SemanticManifest, SemanticModel};

/// A semantic manifest assembled from one or more YAML files.
#[derive(Debug, Default, Clone)]
pub struct ManifestRegistry {
    pub manifest: SemanticManifest,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(semantic_models: Vec<SemanticModel>, metrics: Vec<Metric>) -> Self {
        Self {
            manifest: SemanticManifest {
                semantic_models,
                metrics,
            },
        }
    }

    /// Load every `*.yml` / `*.yaml` file directly under `root`. Each file is
    /// a partial manifest with optional `semantic_models` and `metrics`.
    pub fn load_from_dir<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ResolverError::Manifest(format!(
                "manifest directory not found: {}",
                root.display()
            )));
        }
        let mut registry = ManifestRegistry::new();
        let mut loaded = 0usize;
        for extension in ["yml", "yaml"] {
            for entry in glob(&format!("{}/*.{extension}", root.display()))
                .map_err(|e| ResolverError::Other(e.into()))?
                .flatten()
            {
                registry.load_file(&entry)?;
                loaded += 1;
            }
        }
        tracing::debug!(
            dir = %root.display(),
            files = loaded,
            semantic_models = registry.manifest.semantic_models.len(),
            metrics = registry.manifest.metrics.len(),
            "loaded manifest files"
        );
        Ok(registry)
    }

    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let part: SemanticManifest = serde_yaml::from_str(&contents).map_err(|e| {
            ResolverError::Manifest(format!("failed to parse {}: {e}", path.display()))
        })?;
        self.manifest.extend(part);
        Ok(())
    }

    pub fn get_model(&self, name: &str) -> Option<&SemanticModel> {
        self.manifest
            .semantic_models
            .iter()
            .find(|m| m.name == name)
    }

    pub fn get_metric(&self, name: &str) -> Option<&Metric> {
        self.manifest.metrics.iter().find(|m| m.name == name)
    }

    /// Index the loaded manifest for resolution.
    pub fn lookup(&self) -> Result<SemanticManifestLookup> {
        SemanticManifestLookup::new(self.manifest.clone())
    }
}
