use std::collections::BTreeMap;

use crate::specs::{DatePart, EntityReference, LinkableInstanceSpec, TimeGranularity};

use super::SpecPattern;

/// Collapses time dimensions that differ only in grain to the finest grain
/// available. A date part is part of a time dimension's identity here, so
/// `ds__extract_dow` and `ds__day` are never collapsed together.
///
/// Output order: dimensions, time dimensions, entities, group-by metrics,
/// each in candidate order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BaseTimeGrainPattern {
    pub only_apply_for_metric_time: bool,
}

type TimeDimensionIdentity<'a> = (&'a str, &'a [EntityReference], Option<DatePart>);

impl BaseTimeGrainPattern {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_metric_time_only() -> Self {
        Self {
            only_apply_for_metric_time: true,
        }
    }
}

impl SpecPattern for BaseTimeGrainPattern {
    fn match_specs(&self, candidates: &[LinkableInstanceSpec]) -> Vec<LinkableInstanceSpec> {
        let applies = |spec: &LinkableInstanceSpec| {
            spec.as_time_dimension().is_some()
                && (!self.only_apply_for_metric_time || spec.is_metric_time())
        };

        let mut finest: BTreeMap<TimeDimensionIdentity<'_>, TimeGranularity> = BTreeMap::new();
        for spec in candidates.iter().filter(|s| applies(*s)) {
            if let Some(td) = spec.as_time_dimension() {
                let identity = (
                    td.element_name.as_str(),
                    td.entity_links.as_slice(),
                    td.date_part,
                );
                finest
                    .entry(identity)
                    .and_modify(|g| *g = (*g).min(td.time_granularity))
                    .or_insert(td.time_granularity);
            }
        }

        let mut dimensions = Vec::new();
        let mut time_dimensions = Vec::new();
        let mut entities = Vec::new();
        let mut group_by_metrics = Vec::new();
        for spec in candidates {
            match spec {
                LinkableInstanceSpec::Dimension(_) => dimensions.push(spec.clone()),
                LinkableInstanceSpec::TimeDimension(td) => {
                    let keep = !applies(spec)
                        || finest
                            .get(&(
                                td.element_name.as_str(),
                                td.entity_links.as_slice(),
                                td.date_part,
                            ))
                            .map(|g| *g == td.time_granularity)
                            .unwrap_or(false);
                    if keep && !time_dimensions.contains(spec) {
                        time_dimensions.push(spec.clone());
                    }
                }
                LinkableInstanceSpec::Entity(_) => entities.push(spec.clone()),
                LinkableInstanceSpec::GroupByMetric(_) => group_by_metrics.push(spec.clone()),
            }
        }

        dimensions
            .into_iter()
            .chain(time_dimensions)
            .chain(entities)
            .chain(group_by_metrics)
            .collect()
    }
}
