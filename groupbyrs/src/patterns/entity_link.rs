use std::collections::BTreeSet;

use crate::filters::CallParameterSet;
use crate::specs::{
    DatePart, EntityReference, LinkableElementType, LinkableInstanceSpec, TimeGranularity,
};

use super::SpecPattern;

/// Fields of a spec an [`EntityLinkPattern`] can compare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ParameterSetField {
    ElementName,
    EntityLinks,
    TimeGranularity,
    DatePart,
    MetricSubqueryEntityLinks,
}

/// Desired field values plus the subset of fields that take part in the
/// comparison. A compared field must be equal exactly: a `None` desired
/// value only matches a spec that also has no value for that field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EntityLinkPatternParameterSet {
    pub fields_to_compare: BTreeSet<ParameterSetField>,
    pub element_name: Option<String>,
    pub entity_links: Option<Vec<EntityReference>>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
    pub metric_subquery_entity_links: Option<Vec<EntityReference>>,
    /// Restrict candidates to these element types; `None` admits every type.
    pub element_types: Option<BTreeSet<LinkableElementType>>,
}

impl EntityLinkPatternParameterSet {
    fn matches(&self, spec: &LinkableInstanceSpec) -> bool {
        if let Some(types) = &self.element_types {
            if !types.contains(&spec.element_type()) {
                return false;
            }
        }
        self.fields_to_compare.iter().all(|field| match field {
            ParameterSetField::ElementName => {
                self.element_name.as_deref() == Some(spec.element_name())
            }
            ParameterSetField::EntityLinks => {
                self.entity_links.as_deref() == Some(spec.entity_links())
            }
            ParameterSetField::TimeGranularity => {
                self.time_granularity == spec.time_granularity()
            }
            ParameterSetField::DatePart => self.date_part == spec.date_part(),
            ParameterSetField::MetricSubqueryEntityLinks => {
                let actual = match spec {
                    LinkableInstanceSpec::GroupByMetric(s) => {
                        Some(s.metric_subquery_entity_links.as_slice())
                    }
                    _ => None,
                };
                self.metric_subquery_entity_links.as_deref() == actual
            }
        })
    }
}

/// Matches specs by element name and entity links, optionally grain and
/// date part.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntityLinkPattern {
    pub parameter_set: EntityLinkPatternParameterSet,
}

impl EntityLinkPattern {
    pub fn new(parameter_set: EntityLinkPatternParameterSet) -> Self {
        Self { parameter_set }
    }

    /// Dimension reference. Time dimensions match too, at any grain, but
    /// only without a date part.
    pub fn dimension(element_name: &str, entity_links: Vec<EntityReference>) -> Self {
        Self::new(EntityLinkPatternParameterSet {
            fields_to_compare: [
                ParameterSetField::ElementName,
                ParameterSetField::EntityLinks,
                ParameterSetField::DatePart,
            ]
            .into_iter()
            .collect(),
            element_name: Some(element_name.to_string()),
            entity_links: Some(entity_links),
            element_types: Some(
                [LinkableElementType::Dimension, LinkableElementType::TimeDimension]
                    .into_iter()
                    .collect(),
            ),
            ..Default::default()
        })
    }

    /// Time dimension reference. The grain takes part in the comparison only
    /// when given; the date part always does.
    pub fn time_dimension(
        element_name: &str,
        entity_links: Vec<EntityReference>,
        time_granularity: Option<TimeGranularity>,
        date_part: Option<DatePart>,
    ) -> Self {
        let mut fields_to_compare: BTreeSet<ParameterSetField> = [
            ParameterSetField::ElementName,
            ParameterSetField::EntityLinks,
            ParameterSetField::DatePart,
        ]
        .into_iter()
        .collect();
        if time_granularity.is_some() {
            fields_to_compare.insert(ParameterSetField::TimeGranularity);
        }
        Self::new(EntityLinkPatternParameterSet {
            fields_to_compare,
            element_name: Some(element_name.to_string()),
            entity_links: Some(entity_links),
            time_granularity,
            date_part,
            element_types: Some([LinkableElementType::TimeDimension].into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn entity(element_name: &str, entity_links: Vec<EntityReference>) -> Self {
        Self::new(EntityLinkPatternParameterSet {
            fields_to_compare: [ParameterSetField::ElementName, ParameterSetField::EntityLinks]
                .into_iter()
                .collect(),
            element_name: Some(element_name.to_string()),
            entity_links: Some(entity_links),
            element_types: Some([LinkableElementType::Entity].into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn group_by_metric(metric_name: &str, group_by: Vec<EntityReference>) -> Self {
        Self::new(EntityLinkPatternParameterSet {
            fields_to_compare: [
                ParameterSetField::ElementName,
                ParameterSetField::EntityLinks,
                ParameterSetField::MetricSubqueryEntityLinks,
            ]
            .into_iter()
            .collect(),
            element_name: Some(metric_name.to_string()),
            entity_links: Some(group_by.clone()),
            metric_subquery_entity_links: Some(group_by),
            element_types: Some([LinkableElementType::Metric].into_iter().collect()),
            ..Default::default()
        })
    }

    pub fn from_call_parameter_set(call_parameter_set: &CallParameterSet) -> Self {
        match call_parameter_set {
            CallParameterSet::Dimension(p) => {
                Self::dimension(&p.dimension_reference, p.entity_path.clone())
            }
            CallParameterSet::TimeDimension(p) => Self::time_dimension(
                &p.time_dimension_reference,
                p.entity_path.clone(),
                p.time_granularity,
                p.date_part,
            ),
            CallParameterSet::Entity(p) => Self::entity(&p.entity_reference, p.entity_path.clone()),
            CallParameterSet::Metric(p) => {
                Self::group_by_metric(p.metric_reference.as_str(), p.group_by.clone())
            }
        }
    }
}

impl SpecPattern for EntityLinkPattern {
    fn match_specs(&self, candidates: &[LinkableInstanceSpec]) -> Vec<LinkableInstanceSpec> {
        candidates
            .iter()
            .filter(|spec| self.parameter_set.matches(spec))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links(names: &[&str]) -> Vec<EntityReference> {
        names.iter().map(|n| EntityReference::new(*n)).collect()
    }

    #[test]
    fn entity_links_compare_exactly() {
        let candidates = vec![
            LinkableInstanceSpec::dimension("country", &["listing"]),
            LinkableInstanceSpec::dimension("country", &["listing", "user"]),
            LinkableInstanceSpec::dimension("country", &["user"]),
        ];
        let matched =
            EntityLinkPattern::dimension("country", links(&["user"])).match_specs(&candidates);
        assert_eq!(matched, vec![candidates[2].clone()]);
    }

    #[test]
    fn none_date_part_matches_only_none() {
        let candidates = vec![
            LinkableInstanceSpec::time_dimension("ds", &["booking"], TimeGranularity::Day, None),
            LinkableInstanceSpec::time_dimension(
                "ds",
                &["booking"],
                TimeGranularity::Day,
                Some(DatePart::Dow),
            ),
        ];
        let matched =
            EntityLinkPattern::dimension("ds", links(&["booking"])).match_specs(&candidates);
        assert_eq!(matched, vec![candidates[0].clone()]);

        let with_part = EntityLinkPattern::time_dimension(
            "ds",
            links(&["booking"]),
            None,
            Some(DatePart::Dow),
        )
        .match_specs(&candidates);
        assert_eq!(with_part, vec![candidates[1].clone()]);
    }

    #[test]
    fn grain_is_compared_only_when_given() {
        let candidates = vec![
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Day, None),
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Year, None),
        ];
        let any_grain =
            EntityLinkPattern::time_dimension("metric_time", vec![], None, None)
                .match_specs(&candidates);
        assert_eq!(any_grain.len(), 2);
        let year = EntityLinkPattern::time_dimension(
            "metric_time",
            vec![],
            Some(TimeGranularity::Year),
            None,
        )
        .match_specs(&candidates);
        assert_eq!(year, vec![candidates[1].clone()]);
    }

    #[test]
    fn element_type_filter_applies() {
        let candidates = vec![
            LinkableInstanceSpec::entity("listing", &[]),
            LinkableInstanceSpec::dimension("listing", &[]),
        ];
        let matched = EntityLinkPattern::entity("listing", vec![]).match_specs(&candidates);
        assert_eq!(matched, vec![candidates[0].clone()]);
    }
}
