//! Manifest lookup: the read-only view of the semantic manifest the resolver
//! consumes. `SemanticManifestLookup` enumerates every group-by item a
//! measure (or a metric-less query) can reach, annotated with how it is
//! reached.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{Result, ResolverError};
use crate::linkable::{
    LinkableElement, LinkableElementProperty, LinkableElementSet, SemanticModelJoinPathElement,
};
use crate::manifest::{Metric, MetricType, SemanticManifest, SemanticModel};
use crate::specs::{
    DatePart, DimensionSpec, EntityReference, EntitySpec, GroupByMetricSpec, LinkableInstanceSpec,
    MeasureReference, MetricReference, SemanticModelReference, TimeDimensionSpec,
    TimeGranularity, METRIC_TIME_ELEMENT_NAME,
};

type PropertySet = BTreeSet<LinkableElementProperty>;

pub trait ManifestLookup {
    fn get_metric(&self, metric: &MetricReference) -> Option<&Metric>;

    /// Every metric defined in the manifest, sorted by name.
    fn metric_references(&self) -> Vec<MetricReference>;

    fn linkable_elements_for_measure(
        &self,
        measure: &MeasureReference,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> LinkableElementSet;

    fn linkable_elements_for_no_metrics_query(
        &self,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> LinkableElementSet;

    /// Measures a metric ultimately reads, through any input metrics.
    fn measures_for_metric(&self, metric: &MetricReference) -> Vec<MeasureReference> {
        let mut measures = Vec::new();
        let mut stack = vec![metric.clone()];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            let Some(definition) = self.get_metric(&current) else {
                continue;
            };
            for measure in definition.measure_references() {
                if !measures.contains(&measure) {
                    measures.push(measure);
                }
            }
            for input in definition.input_metrics().into_iter().rev() {
                stack.push(input.reference());
            }
        }
        measures
    }

    /// Group-by items for a measure. Items reachable through more than one
    /// origin are left out.
    fn group_by_item_specs_for_measure(
        &self,
        measure: &MeasureReference,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> Vec<LinkableInstanceSpec> {
        self.linkable_elements_for_measure(measure, with_any_of, without_any_of)
            .without_ambiguous_keys()
            .specs()
    }

    fn group_by_item_specs_for_no_metrics_query(
        &self,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> Vec<LinkableInstanceSpec> {
        self.linkable_elements_for_no_metrics_query(with_any_of, without_any_of)
            .without_ambiguous_keys()
            .specs()
    }

    /// Items reachable from every measure of every listed metric.
    fn element_specs_for_metrics(
        &self,
        metrics: &[MetricReference],
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> Vec<LinkableInstanceSpec> {
        let mut measures: Vec<MeasureReference> = Vec::new();
        for metric in metrics {
            for measure in self.measures_for_metric(metric) {
                if !measures.contains(&measure) {
                    measures.push(measure);
                }
            }
        }
        let sets: Vec<LinkableElementSet> = measures
            .iter()
            .map(|m| {
                self.linkable_elements_for_measure(m, with_any_of, without_any_of)
                    .without_ambiguous_keys()
            })
            .collect();
        LinkableElementSet::intersection_by_path_key(&sets).specs()
    }

    /// Aggregation time dimensions usable in place of `metric_time` for this
    /// metric, named through the primary entity of each measure's model.
    /// Only attributes shared by every measure are returned.
    fn agg_time_dimension_specs_for_metric(
        &self,
        metric: &MetricReference,
    ) -> Vec<TimeDimensionSpec>;
}

/// [`ManifestLookup`] over an in-memory [`SemanticManifest`].
#[derive(Debug, Clone)]
pub struct SemanticManifestLookup {
    manifest: SemanticManifest,
    metric_index: BTreeMap<MetricReference, usize>,
    /// Measure -> index of the semantic model defining it.
    measure_index: BTreeMap<MeasureReference, usize>,
}

impl SemanticManifestLookup {
    /// Index the manifest, rejecting references the resolver cannot follow.
    pub fn new(manifest: SemanticManifest) -> Result<Self> {
        let mut model_names = HashSet::new();
        let mut measure_index = BTreeMap::new();
        for (index, model) in manifest.semantic_models.iter().enumerate() {
            if !model_names.insert(model.name.as_str()) {
                return Err(ResolverError::Manifest(format!(
                    "duplicate semantic model '{}'",
                    model.name
                )));
            }
            for measure in &model.measures {
                if measure_index.insert(measure.reference(), index).is_some() {
                    return Err(ResolverError::Manifest(format!(
                        "measure '{}' is defined more than once",
                        measure.name
                    )));
                }
                if let Some(agg_time) = model.agg_time_dimension_for(measure) {
                    let is_time = model
                        .dimension(agg_time)
                        .and_then(|d| d.time_granularity())
                        .is_some();
                    if !is_time {
                        return Err(ResolverError::Manifest(format!(
                            "measure '{}' in '{}' uses '{}' as its aggregation time dimension, \
                             which is not a time dimension of that model",
                            measure.name, model.name, agg_time
                        )));
                    }
                }
            }
        }

        let mut metric_index = BTreeMap::new();
        for (index, metric) in manifest.metrics.iter().enumerate() {
            if metric_index.insert(metric.reference(), index).is_some() {
                return Err(ResolverError::Manifest(format!(
                    "metric '{}' is defined more than once",
                    metric.name
                )));
            }
        }

        for metric in &manifest.metrics {
            check_metric_shape(metric)?;
            for measure in metric.input_measures() {
                if !measure_index.contains_key(&measure.reference()) {
                    return Err(ResolverError::Manifest(format!(
                        "metric '{}' references unknown measure '{}'",
                        metric.name, measure.name
                    )));
                }
            }
            for input in metric.input_metrics() {
                if !metric_index.contains_key(&input.reference()) {
                    return Err(ResolverError::Manifest(format!(
                        "metric '{}' references unknown input metric '{}'",
                        metric.name, input.name
                    )));
                }
            }
        }

        let lookup = Self {
            manifest,
            metric_index,
            measure_index,
        };
        lookup.check_acyclic()?;
        tracing::debug!(
            semantic_models = lookup.manifest.semantic_models.len(),
            metrics = lookup.manifest.metrics.len(),
            "indexed semantic manifest"
        );
        Ok(lookup)
    }

    pub fn manifest(&self) -> &SemanticManifest {
        &self.manifest
    }

    fn check_acyclic(&self) -> Result<()> {
        fn visit(
            lookup: &SemanticManifestLookup,
            metric: &Metric,
            path: &mut Vec<String>,
        ) -> Result<()> {
            if path.contains(&metric.name) {
                path.push(metric.name.clone());
                return Err(ResolverError::Manifest(format!(
                    "metric inputs form a cycle: {}",
                    path.join(" -> ")
                )));
            }
            path.push(metric.name.clone());
            for input in metric.input_metrics() {
                if let Some(parent) = lookup.get_metric(&input.reference()) {
                    visit(lookup, parent, path)?;
                }
            }
            path.pop();
            Ok(())
        }

        for metric in &self.manifest.metrics {
            visit(self, metric, &mut Vec::new())?;
        }
        Ok(())
    }

    fn model_for_measure(&self, measure: &MeasureReference) -> Option<&SemanticModel> {
        self.measure_index
            .get(measure)
            .map(|index| &self.manifest.semantic_models[*index])
    }

    /// Models (other than `exclude`) that `entity` can join onto.
    fn join_targets<'a>(
        &'a self,
        entity: &'a str,
        exclude: &'a [&'a str],
    ) -> impl Iterator<Item = &'a SemanticModel> + 'a {
        self.manifest.semantic_models.iter().filter(move |model| {
            !exclude.contains(&model.name.as_str())
                && model
                    .entity(entity)
                    .map(|e| e.entity_type.is_join_target())
                    .unwrap_or(false)
        })
    }

    fn unfiltered_elements_for_measure(&self, measure: &MeasureReference) -> LinkableElementSet {
        let Some(model) = self.model_for_measure(measure) else {
            tracing::warn!(measure = %measure, "no semantic model defines this measure");
            return LinkableElementSet::new();
        };
        let mut elements = Vec::new();
        let own = [LinkableElementProperty::Local];
        model_elements(&mut elements, model, &[], &own, &[], None, true);

        for entity in &model.entities {
            let link = [entity.reference()];
            model_elements(
                &mut elements,
                model,
                &link,
                &[LinkableElementProperty::LocalLinked],
                &[],
                Some(&entity.name),
                true,
            );

            let first_exclude = [model.name.as_str()];
            for target in self.join_targets(&entity.name, &first_exclude) {
                let first_hop = vec![SemanticModelJoinPathElement {
                    semantic_model: target.reference(),
                    join_on_entity: entity.reference(),
                }];
                model_elements(
                    &mut elements,
                    target,
                    &link,
                    &[LinkableElementProperty::Joined],
                    &first_hop,
                    Some(&entity.name),
                    true,
                );

                for second in target.entities.iter().filter(|e| e.name != entity.name) {
                    let second_exclude = [model.name.as_str(), target.name.as_str()];
                    for far in self.join_targets(&second.name, &second_exclude) {
                        let mut two_hops = first_hop.clone();
                        two_hops.push(SemanticModelJoinPathElement {
                            semantic_model: far.reference(),
                            join_on_entity: second.reference(),
                        });
                        model_elements(
                            &mut elements,
                            far,
                            &[entity.reference(), second.reference()],
                            &[
                                LinkableElementProperty::Joined,
                                LinkableElementProperty::MultiHop,
                            ],
                            &two_hops,
                            Some(&second.name),
                            false,
                        );
                    }
                }
            }
        }

        if let Some(measure_definition) = model.measure(measure.as_str()) {
            let defined_grain = model
                .agg_time_dimension_for(measure_definition)
                .and_then(|name| model.dimension(name))
                .and_then(|d| d.time_granularity());
            if let Some(grain) = defined_grain {
                time_elements(
                    &mut elements,
                    METRIC_TIME_ELEMENT_NAME,
                    &[],
                    grain,
                    &[LinkableElementProperty::MetricTime],
                    None,
                    &[],
                );
            }
        }

        for entity in &model.entities {
            self.group_by_metric_elements(&mut elements, entity.reference());
        }

        LinkableElementSet::from_elements(elements)
    }

    /// Metrics whose every measure lives in a model carrying `entity` can be
    /// aggregated to that entity and joined back as a group-by item.
    fn group_by_metric_elements(&self, out: &mut Vec<LinkableElement>, entity: EntityReference) {
        for metric in &self.manifest.metrics {
            let measures = self.measures_for_metric(&metric.reference());
            let models: Vec<&SemanticModel> = measures
                .iter()
                .filter_map(|m| self.model_for_measure(m))
                .collect();
            if models.is_empty() || models.len() != measures.len() {
                continue;
            }
            if !models.iter().all(|m| m.entity(entity.as_str()).is_some()) {
                continue;
            }
            out.push(LinkableElement::new(
                LinkableInstanceSpec::GroupByMetric(GroupByMetricSpec {
                    element_name: metric.name.clone(),
                    entity_links: vec![entity.clone()],
                    metric_subquery_entity_links: vec![entity.clone()],
                }),
                [
                    LinkableElementProperty::Metric,
                    LinkableElementProperty::Joined,
                ],
                Some(models[0].reference()),
                Vec::new(),
            ));
        }
    }

    fn unfiltered_elements_for_no_metrics_query(&self) -> LinkableElementSet {
        let mut elements = Vec::new();
        for model in &self.manifest.semantic_models {
            for entity in model.join_target_entities() {
                elements.push(LinkableElement::new(
                    LinkableInstanceSpec::Entity(EntitySpec {
                        element_name: entity.name.clone(),
                        entity_links: Vec::new(),
                    }),
                    [
                        LinkableElementProperty::Local,
                        LinkableElementProperty::Entity,
                    ],
                    Some(model.reference()),
                    Vec::new(),
                ));
                model_elements(
                    &mut elements,
                    model,
                    &[entity.reference()],
                    &[LinkableElementProperty::LocalLinked],
                    &[],
                    Some(&entity.name),
                    true,
                );

                for other in model.entities.iter().filter(|e| e.name != entity.name) {
                    let exclude = [model.name.as_str()];
                    for target in self.join_targets(&other.name, &exclude) {
                        let hop = vec![SemanticModelJoinPathElement {
                            semantic_model: target.reference(),
                            join_on_entity: other.reference(),
                        }];
                        model_elements(
                            &mut elements,
                            target,
                            &[entity.reference(), other.reference()],
                            &[LinkableElementProperty::Joined],
                            &hop,
                            Some(&other.name),
                            false,
                        );
                    }
                }
            }
        }
        time_elements(
            &mut elements,
            METRIC_TIME_ELEMENT_NAME,
            &[],
            TimeGranularity::Day,
            &[LinkableElementProperty::MetricTime],
            None,
            &[],
        );
        LinkableElementSet::from_elements(elements)
    }
}

impl ManifestLookup for SemanticManifestLookup {
    fn get_metric(&self, metric: &MetricReference) -> Option<&Metric> {
        self.metric_index
            .get(metric)
            .map(|index| &self.manifest.metrics[*index])
    }

    fn metric_references(&self) -> Vec<MetricReference> {
        self.metric_index.keys().cloned().collect()
    }

    fn linkable_elements_for_measure(
        &self,
        measure: &MeasureReference,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> LinkableElementSet {
        let elements = self
            .unfiltered_elements_for_measure(measure)
            .filter(with_any_of, without_any_of);
        tracing::trace!(measure = %measure, items = elements.len(), "linkable elements for measure");
        elements
    }

    fn linkable_elements_for_no_metrics_query(
        &self,
        with_any_of: &PropertySet,
        without_any_of: &PropertySet,
    ) -> LinkableElementSet {
        self.unfiltered_elements_for_no_metrics_query()
            .filter(with_any_of, without_any_of)
    }

    fn agg_time_dimension_specs_for_metric(
        &self,
        metric: &MetricReference,
    ) -> Vec<TimeDimensionSpec> {
        let per_measure: Vec<Vec<TimeDimensionSpec>> = self
            .measures_for_metric(metric)
            .iter()
            .map(|measure| {
                let Some(model) = self.model_for_measure(measure) else {
                    return Vec::new();
                };
                let Some(definition) = model.measure(measure.as_str()) else {
                    return Vec::new();
                };
                let Some(name) = model.agg_time_dimension_for(definition) else {
                    return Vec::new();
                };
                let Some(grain) = model.dimension(name).and_then(|d| d.time_granularity()) else {
                    return Vec::new();
                };
                model
                    .primary_entity()
                    .map(|primary| TimeDimensionSpec {
                        element_name: name.to_string(),
                        entity_links: vec![primary.reference()],
                        time_granularity: grain,
                        date_part: None,
                    })
                    .into_iter()
                    .collect()
            })
            .collect();

        let Some((first, rest)) = per_measure.split_first() else {
            return Vec::new();
        };
        first
            .iter()
            .filter(|spec| {
                rest.iter()
                    .all(|specs| specs.iter().any(|other| other.same_attribute(spec)))
            })
            .cloned()
            .collect()
    }
}

fn check_metric_shape(metric: &Metric) -> Result<()> {
    let params = &metric.type_params;
    let missing = match metric.metric_type {
        MetricType::Simple | MetricType::Cumulative if params.measure.is_none() => Some("measure"),
        MetricType::Ratio if params.numerator.is_none() => Some("numerator"),
        MetricType::Ratio if params.denominator.is_none() => Some("denominator"),
        MetricType::Derived if params.metrics.is_empty() => Some("metrics"),
        MetricType::Conversion if params.conversion_type_params.is_none() => {
            Some("conversion_type_params")
        }
        _ => None,
    };
    match missing {
        Some(field) => Err(ResolverError::Manifest(format!(
            "{} metric '{}' is missing type_params.{}",
            metric.metric_type, metric.name, field
        ))),
        None => Ok(()),
    }
}

/// Dimensions, time dimensions and (optionally) entities of `model`, named
/// through `entity_links`. `skip_entity` is the entity the links already end
/// in.
fn model_elements(
    out: &mut Vec<LinkableElement>,
    model: &SemanticModel,
    entity_links: &[EntityReference],
    properties: &[LinkableElementProperty],
    join_path: &[SemanticModelJoinPathElement],
    skip_entity: Option<&str>,
    include_entities: bool,
) {
    let owner = Some(model.reference());
    for dimension in &model.dimensions {
        match dimension.time_granularity() {
            None => out.push(LinkableElement::new(
                LinkableInstanceSpec::Dimension(DimensionSpec {
                    element_name: dimension.name.clone(),
                    entity_links: entity_links.to_vec(),
                }),
                properties.iter().copied(),
                owner.clone(),
                join_path.to_vec(),
            )),
            Some(grain) => time_elements(
                out,
                &dimension.name,
                entity_links,
                grain,
                properties,
                owner.clone(),
                join_path,
            ),
        }
    }
    if !include_entities {
        return;
    }
    for entity in &model.entities {
        if Some(entity.name.as_str()) == skip_entity {
            continue;
        }
        out.push(LinkableElement::new(
            LinkableInstanceSpec::Entity(EntitySpec {
                element_name: entity.name.clone(),
                entity_links: entity_links.to_vec(),
            }),
            properties
                .iter()
                .copied()
                .chain([LinkableElementProperty::Entity]),
            owner.clone(),
            join_path.to_vec(),
        ));
    }
}

/// A time attribute at its defined grain, every coarser grain, and every
/// date part extractable at the defined grain.
fn time_elements(
    out: &mut Vec<LinkableElement>,
    element_name: &str,
    entity_links: &[EntityReference],
    defined_grain: TimeGranularity,
    properties: &[LinkableElementProperty],
    owner: Option<SemanticModelReference>,
    join_path: &[SemanticModelJoinPathElement],
) {
    for grain in defined_grain.self_and_coarser() {
        let derived = (grain > defined_grain).then_some(LinkableElementProperty::DerivedTimeGranularity);
        out.push(LinkableElement::new(
            LinkableInstanceSpec::TimeDimension(TimeDimensionSpec {
                element_name: element_name.to_string(),
                entity_links: entity_links.to_vec(),
                time_granularity: grain,
                date_part: None,
            }),
            properties.iter().copied().chain(derived),
            owner.clone(),
            join_path.to_vec(),
        ));
    }
    for part in DatePart::ALL
        .into_iter()
        .filter(|p| p.compatible_with(defined_grain))
    {
        out.push(LinkableElement::new(
            LinkableInstanceSpec::TimeDimension(TimeDimensionSpec {
                element_name: element_name.to_string(),
                entity_links: entity_links.to_vec(),
                time_granularity: defined_grain,
                date_part: Some(part),
            }),
            properties
                .iter()
                .copied()
                .chain([LinkableElementProperty::DatePart]),
            owner.clone(),
            join_path.to_vec(),
        ));
    }
}
