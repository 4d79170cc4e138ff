//! Semantic manifest definitions: semantic models, measures, and metrics.
//!
//! The manifest is read-only input to the resolver. These types mirror the
//! YAML layout and accept a few string shorthands (a bare measure or metric
//! name, a single filter string, a `"7 days"` window).

use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::filters::WhereFilterIntersection;
use crate::specs::{
    EntityReference, MeasureReference, MetricReference, SemanticModelReference, TimeGranularity,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticManifest {
    #[serde(default)]
    pub semantic_models: Vec<SemanticModel>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

impl SemanticManifest {
    pub fn extend(&mut self, other: SemanticManifest) {
        self.semantic_models.extend(other.semantic_models);
        self.metrics.extend(other.metrics);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticModel {
    pub name: String,
    #[serde(default)]
    pub defaults: Option<SemanticModelDefaults>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
    #[serde(default)]
    pub measures: Vec<Measure>,
    pub description: Option<String>,
}

impl SemanticModel {
    pub fn reference(&self) -> SemanticModelReference {
        SemanticModelReference::new(self.name.clone())
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    pub fn measure(&self, name: &str) -> Option<&Measure> {
        self.measures.iter().find(|m| m.name == name)
    }

    /// The measure's own aggregation time dimension, falling back to the
    /// model default.
    pub fn agg_time_dimension_for<'a>(&'a self, measure: &'a Measure) -> Option<&'a str> {
        measure.agg_time_dimension.as_deref().or_else(|| {
            self.defaults
                .as_ref()
                .and_then(|d| d.agg_time_dimension.as_deref())
        })
    }

    /// Entities another model can join to this one through.
    pub fn join_target_entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.entity_type.is_join_target())
    }

    pub fn primary_entity(&self) -> Option<&Entity> {
        self.entities
            .iter()
            .find(|e| e.entity_type == EntityType::Primary)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticModelDefaults {
    pub agg_time_dimension: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub description: Option<String>,
}

impl Entity {
    pub fn reference(&self) -> EntityReference {
        EntityReference::new(self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Primary,
    Unique,
    Natural,
    Foreign,
}

impl EntityType {
    /// Joining onto a foreign entity would fan out, so only these qualify.
    pub fn is_join_target(self) -> bool {
        matches!(
            self,
            EntityType::Primary | EntityType::Unique | EntityType::Natural
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dimension {
    pub name: String,
    #[serde(rename = "type")]
    pub dimension_type: DimensionType,
    #[serde(default)]
    pub type_params: Option<DimensionTypeParams>,
    pub description: Option<String>,
}

impl Dimension {
    /// Defined grain of a time dimension; day when unspecified.
    pub fn time_granularity(&self) -> Option<TimeGranularity> {
        match self.dimension_type {
            DimensionType::Categorical => None,
            DimensionType::Time => Some(
                self.type_params
                    .as_ref()
                    .map(|p| p.time_granularity)
                    .unwrap_or(TimeGranularity::Day),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DimensionType {
    Categorical,
    Time,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimensionTypeParams {
    pub time_granularity: TimeGranularity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Measure {
    pub name: String,
    pub agg: AggregationType,
    #[serde(default)]
    pub agg_time_dimension: Option<String>,
    pub description: Option<String>,
}

impl Measure {
    pub fn reference(&self) -> MeasureReference {
        MeasureReference::new(self.name.clone())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Sum,
    Count,
    CountDistinct,
    Min,
    Max,
    Average,
    Median,
    Percentile,
    SumBoolean,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Simple,
    Cumulative,
    Conversion,
    Ratio,
    Derived,
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricType::Simple => "simple",
            MetricType::Cumulative => "cumulative",
            MetricType::Conversion => "conversion",
            MetricType::Ratio => "ratio",
            MetricType::Derived => "derived",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    #[serde(default)]
    pub type_params: MetricTypeParams,
    #[serde(default)]
    pub filter: Option<WhereFilterIntersection>,
    pub description: Option<String>,
}

impl Metric {
    pub fn reference(&self) -> MetricReference {
        MetricReference::new(self.name.clone())
    }

    /// Input metrics of a ratio or derived metric, in slot order
    /// (numerator, denominator, then `metrics`).
    pub fn input_metrics(&self) -> Vec<&MetricInput> {
        let params = &self.type_params;
        params
            .numerator
            .iter()
            .chain(params.denominator.iter())
            .chain(params.metrics.iter())
            .collect()
    }

    /// Measures read directly by this metric.
    pub fn input_measures(&self) -> Vec<&MetricInputMeasure> {
        let params = &self.type_params;
        let mut measures: Vec<&MetricInputMeasure> = params.measure.iter().collect();
        if let Some(conversion) = &params.conversion_type_params {
            measures.push(&conversion.base_measure);
            measures.push(&conversion.conversion_measure);
        }
        measures
    }

    /// Measures whose group-by items bound what this metric can be queried by.
    /// A conversion metric is bounded by its base measure only.
    pub fn measure_references(&self) -> Vec<MeasureReference> {
        match self.metric_type {
            MetricType::Conversion => self
                .type_params
                .conversion_type_params
                .iter()
                .map(|c| c.base_measure.reference())
                .collect(),
            _ => self
                .type_params
                .measure
                .iter()
                .map(MetricInputMeasure::reference)
                .collect(),
        }
    }

    /// Cumulative window or grain-to-date, either of which needs metric time.
    pub fn has_cumulative_window(&self) -> bool {
        self.type_params.window.is_some() || self.type_params.grain_to_date.is_some()
    }

    pub fn has_time_offset_input(&self) -> bool {
        self.input_metrics()
            .iter()
            .any(|i| i.offset_window.is_some() || i.offset_to_grain.is_some())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricTypeParams {
    #[serde(default)]
    pub measure: Option<MetricInputMeasure>,
    #[serde(default)]
    pub numerator: Option<MetricInput>,
    #[serde(default)]
    pub denominator: Option<MetricInput>,
    #[serde(default)]
    pub metrics: Vec<MetricInput>,
    #[serde(default)]
    pub expr: Option<String>,
    #[serde(default)]
    pub window: Option<MetricTimeWindow>,
    #[serde(default)]
    pub grain_to_date: Option<TimeGranularity>,
    #[serde(default)]
    pub conversion_type_params: Option<ConversionTypeParams>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionTypeParams {
    pub base_measure: MetricInputMeasure,
    pub conversion_measure: MetricInputMeasure,
    pub entity: String,
    #[serde(default)]
    pub window: Option<MetricTimeWindow>,
}

/// A measure consumed by a metric, optionally filtered.
#[derive(Debug, Clone, Serialize)]
pub struct MetricInputMeasure {
    pub name: String,
    pub filter: Option<WhereFilterIntersection>,
    pub alias: Option<String>,
    pub join_to_timespine: bool,
    pub fill_nulls_with: Option<i64>,
}

impl MetricInputMeasure {
    pub fn reference(&self) -> MeasureReference {
        MeasureReference::new(self.name.clone())
    }
}

impl<'de> Deserialize<'de> for MetricInputMeasure {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(name) => Ok(MetricInputMeasure {
                name,
                filter: None,
                alias: None,
                join_to_timespine: false,
                fill_nulls_with: None,
            }),
            other => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Full {
                    name: String,
                    #[serde(default)]
                    filter: Option<WhereFilterIntersection>,
                    #[serde(default)]
                    alias: Option<String>,
                    #[serde(default)]
                    join_to_timespine: bool,
                    #[serde(default)]
                    fill_nulls_with: Option<i64>,
                }
                let full = Full::deserialize(other).map_err(de::Error::custom)?;
                Ok(MetricInputMeasure {
                    name: full.name,
                    filter: full.filter,
                    alias: full.alias,
                    join_to_timespine: full.join_to_timespine,
                    fill_nulls_with: full.fill_nulls_with,
                })
            }
        }
    }
}

/// A metric consumed by a ratio or derived metric.
#[derive(Debug, Clone, Serialize)]
pub struct MetricInput {
    pub name: String,
    pub filter: Option<WhereFilterIntersection>,
    pub alias: Option<String>,
    pub offset_window: Option<MetricTimeWindow>,
    pub offset_to_grain: Option<TimeGranularity>,
}

impl MetricInput {
    pub fn reference(&self) -> MetricReference {
        MetricReference::new(self.name.clone())
    }

    /// Short description used in validation messages.
    pub fn describe(&self) -> String {
        let mut description = format!("'{}'", self.name);
        if let Some(window) = &self.offset_window {
            description.push_str(&format!(" (offset_window: {window})"));
        }
        if let Some(grain) = &self.offset_to_grain {
            description.push_str(&format!(" (offset_to_grain: {grain})"));
        }
        description
    }
}

impl<'de> Deserialize<'de> for MetricInput {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(name) => Ok(MetricInput {
                name,
                filter: None,
                alias: None,
                offset_window: None,
                offset_to_grain: None,
            }),
            other => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Full {
                    name: String,
                    #[serde(default)]
                    filter: Option<WhereFilterIntersection>,
                    #[serde(default)]
                    alias: Option<String>,
                    #[serde(default)]
                    offset_window: Option<MetricTimeWindow>,
                    #[serde(default)]
                    offset_to_grain: Option<TimeGranularity>,
                }
                let full = Full::deserialize(other).map_err(de::Error::custom)?;
                Ok(MetricInput {
                    name: full.name,
                    filter: full.filter,
                    alias: full.alias,
                    offset_window: full.offset_window,
                    offset_to_grain: full.offset_to_grain,
                })
            }
        }
    }
}

/// A time window such as `7 days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricTimeWindow {
    pub count: u32,
    pub granularity: TimeGranularity,
}

impl MetricTimeWindow {
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let count = parts.next()?.parse().ok()?;
        let granularity = TimeGranularity::from_name(parts.next()?)?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { count, granularity })
    }
}

impl fmt::Display for MetricTimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = if self.count == 1 { "" } else { "s" };
        write!(f, "{} {}{}", self.count, self.granularity, plural)
    }
}

impl Serialize for MetricTimeWindow {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MetricTimeWindow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => MetricTimeWindow::parse(&s)
                .ok_or_else(|| de::Error::custom(format!("invalid time window '{s}'"))),
            other => {
                #[derive(Deserialize)]
                #[serde(deny_unknown_fields)]
                struct Full {
                    count: u32,
                    granularity: TimeGranularity,
                }
                let full = Full::deserialize(other).map_err(de::Error::custom)?;
                Ok(MetricTimeWindow {
                    count: full.count,
                    granularity: full.granularity,
                })
            }
        }
    }
}
