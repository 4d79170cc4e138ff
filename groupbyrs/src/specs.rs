//! Immutable value types that identify queryable, joinable attributes.
//!
//! A spec names an attribute by element name plus the ordered entity join
//! path used to reach it. Time dimensions additionally carry a granularity and
//! an optional date part. Equality is structural over every field, which is
//! what all set and intersection operations in the resolver rely on.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element name of the canonical aggregation time attribute.
pub const METRIC_TIME_ELEMENT_NAME: &str = "metric_time";

/// Separator used by the dunder naming convention.
pub const DUNDER: &str = "__";

macro_rules! reference_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

reference_type!(
    /// Name of an entity (join key) defined on one or more semantic models.
    EntityReference
);
reference_type!(MetricReference);
reference_type!(MeasureReference);
reference_type!(SemanticModelReference);

/// Time bucket size, ordered from finest to coarsest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeGranularity {
    pub const ALL: [TimeGranularity; 9] = [
        TimeGranularity::Millisecond,
        TimeGranularity::Second,
        TimeGranularity::Minute,
        TimeGranularity::Hour,
        TimeGranularity::Day,
        TimeGranularity::Week,
        TimeGranularity::Month,
        TimeGranularity::Quarter,
        TimeGranularity::Year,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TimeGranularity::Millisecond => "millisecond",
            TimeGranularity::Second => "second",
            TimeGranularity::Minute => "minute",
            TimeGranularity::Hour => "hour",
            TimeGranularity::Day => "day",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
            TimeGranularity::Quarter => "quarter",
            TimeGranularity::Year => "year",
        }
    }

    /// Case-insensitive lookup. Plural forms ("days") are accepted since
    /// window strings use them.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        let singular = lowered.strip_suffix('s').unwrap_or(&lowered);
        Self::ALL
            .iter()
            .copied()
            .find(|g| g.name() == lowered || g.name() == singular)
    }

    /// This granularity and every coarser one, finest first.
    pub fn self_and_coarser(self) -> impl Iterator<Item = TimeGranularity> {
        Self::ALL.into_iter().filter(move |g| *g >= self)
    }
}

impl fmt::Display for TimeGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sub-component extracted from a time dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Quarter,
    Month,
    Day,
    Dow,
    Doy,
}

impl DatePart {
    pub const ALL: [DatePart; 6] = [
        DatePart::Year,
        DatePart::Quarter,
        DatePart::Month,
        DatePart::Day,
        DatePart::Dow,
        DatePart::Doy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Quarter => "quarter",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::Dow => "dow",
            DatePart::Doy => "doy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.trim().to_ascii_lowercase();
        Self::ALL.iter().copied().find(|p| p.name() == lowered)
    }

    /// Finest granularity from which this part can still be extracted.
    pub fn min_granularity(self) -> TimeGranularity {
        match self {
            DatePart::Year => TimeGranularity::Year,
            DatePart::Quarter => TimeGranularity::Quarter,
            DatePart::Month => TimeGranularity::Month,
            DatePart::Day | DatePart::Dow | DatePart::Doy => TimeGranularity::Day,
        }
    }

    pub fn compatible_with(self, granularity: TimeGranularity) -> bool {
        granularity <= self.min_granularity()
    }
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkableElementType {
    Dimension,
    TimeDimension,
    Entity,
    Metric,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeDimensionSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub time_granularity: TimeGranularity,
    #[serde(default)]
    pub date_part: Option<DatePart>,
}

impl TimeDimensionSpec {
    pub fn metric_time(time_granularity: TimeGranularity) -> Self {
        Self {
            element_name: METRIC_TIME_ELEMENT_NAME.to_string(),
            entity_links: Vec::new(),
            time_granularity,
            date_part: None,
        }
    }

    pub fn is_metric_time(&self) -> bool {
        self.element_name == METRIC_TIME_ELEMENT_NAME && self.entity_links.is_empty()
    }

    pub fn with_grain(&self, time_granularity: TimeGranularity) -> Self {
        Self {
            time_granularity,
            ..self.clone()
        }
    }

    /// True when both specs name the same attribute, regardless of grain and
    /// date part.
    pub fn same_attribute(&self, other: &TimeDimensionSpec) -> bool {
        self.element_name == other.element_name && self.entity_links == other.entity_links
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntitySpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
}

/// A metric aggregated to an entity and offered as a group-by item.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupByMetricSpec {
    pub element_name: String,
    pub entity_links: Vec<EntityReference>,
    pub metric_subquery_entity_links: Vec<EntityReference>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkableInstanceSpec {
    Dimension(DimensionSpec),
    TimeDimension(TimeDimensionSpec),
    Entity(EntitySpec),
    GroupByMetric(GroupByMetricSpec),
}

impl LinkableInstanceSpec {
    pub fn dimension(element_name: &str, entity_links: &[&str]) -> Self {
        LinkableInstanceSpec::Dimension(DimensionSpec {
            element_name: element_name.to_string(),
            entity_links: links(entity_links),
        })
    }

    pub fn time_dimension(
        element_name: &str,
        entity_links: &[&str],
        time_granularity: TimeGranularity,
        date_part: Option<DatePart>,
    ) -> Self {
        LinkableInstanceSpec::TimeDimension(TimeDimensionSpec {
            element_name: element_name.to_string(),
            entity_links: links(entity_links),
            time_granularity,
            date_part,
        })
    }

    pub fn entity(element_name: &str, entity_links: &[&str]) -> Self {
        LinkableInstanceSpec::Entity(EntitySpec {
            element_name: element_name.to_string(),
            entity_links: links(entity_links),
        })
    }

    pub fn group_by_metric(element_name: &str, entity_links: &[&str]) -> Self {
        LinkableInstanceSpec::GroupByMetric(GroupByMetricSpec {
            element_name: element_name.to_string(),
            entity_links: links(entity_links),
            metric_subquery_entity_links: links(entity_links),
        })
    }

    pub fn element_name(&self) -> &str {
        match self {
            LinkableInstanceSpec::Dimension(s) => &s.element_name,
            LinkableInstanceSpec::TimeDimension(s) => &s.element_name,
            LinkableInstanceSpec::Entity(s) => &s.element_name,
            LinkableInstanceSpec::GroupByMetric(s) => &s.element_name,
        }
    }

    pub fn entity_links(&self) -> &[EntityReference] {
        match self {
            LinkableInstanceSpec::Dimension(s) => &s.entity_links,
            LinkableInstanceSpec::TimeDimension(s) => &s.entity_links,
            LinkableInstanceSpec::Entity(s) => &s.entity_links,
            LinkableInstanceSpec::GroupByMetric(s) => &s.entity_links,
        }
    }

    pub fn element_type(&self) -> LinkableElementType {
        match self {
            LinkableInstanceSpec::Dimension(_) => LinkableElementType::Dimension,
            LinkableInstanceSpec::TimeDimension(_) => LinkableElementType::TimeDimension,
            LinkableInstanceSpec::Entity(_) => LinkableElementType::Entity,
            LinkableInstanceSpec::GroupByMetric(_) => LinkableElementType::Metric,
        }
    }

    pub fn time_granularity(&self) -> Option<TimeGranularity> {
        self.as_time_dimension().map(|s| s.time_granularity)
    }

    pub fn date_part(&self) -> Option<DatePart> {
        self.as_time_dimension().and_then(|s| s.date_part)
    }

    pub fn as_time_dimension(&self) -> Option<&TimeDimensionSpec> {
        match self {
            LinkableInstanceSpec::TimeDimension(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_metric_time(&self) -> bool {
        self.as_time_dimension()
            .map(TimeDimensionSpec::is_metric_time)
            .unwrap_or(false)
    }

    pub fn element_path_key(&self) -> ElementPathKey {
        ElementPathKey {
            element_name: self.element_name().to_string(),
            element_type: self.element_type(),
            entity_links: self.entity_links().to_vec(),
            time_granularity: self.time_granularity(),
            date_part: self.date_part(),
        }
    }

    /// Dunder-joined name, e.g. `listing__country` or `metric_time__month`.
    pub fn qualified_name(&self) -> String {
        let mut parts: Vec<&str> = self.entity_links().iter().map(|e| e.as_str()).collect();
        parts.push(self.element_name());
        let mut name = parts.join(DUNDER);
        if let Some(time_dimension) = self.as_time_dimension() {
            match time_dimension.date_part {
                Some(part) => {
                    name.push_str(DUNDER);
                    name.push_str("extract_");
                    name.push_str(part.name());
                }
                None => {
                    name.push_str(DUNDER);
                    name.push_str(time_dimension.time_granularity.name());
                }
            }
        }
        name
    }
}

impl fmt::Display for LinkableInstanceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified_name())
    }
}

/// Reduced identity of a linkable attribute used to merge and intersect
/// candidates without regard to which semantic model supplies them.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementPathKey {
    pub element_name: String,
    pub element_type: LinkableElementType,
    pub entity_links: Vec<EntityReference>,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricSpec {
    pub element_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl MetricSpec {
    pub fn from_reference(metric_reference: &MetricReference) -> Self {
        Self {
            element_name: metric_reference.0.clone(),
            alias: None,
        }
    }

    pub fn reference(&self) -> MetricReference {
        MetricReference::new(self.element_name.clone())
    }
}

fn links(entity_links: &[&str]) -> Vec<EntityReference> {
    entity_links.iter().map(|e| EntityReference::new(*e)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_follow_dunder_convention() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        assert_eq!(country.qualified_name(), "listing__country");

        let month = LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Month,
            None,
        );
        assert_eq!(month.qualified_name(), "metric_time__month");

        let dow = LinkableInstanceSpec::time_dimension(
            "ds",
            &["booking"],
            TimeGranularity::Day,
            Some(DatePart::Dow),
        );
        assert_eq!(dow.qualified_name(), "booking__ds__extract_dow");
    }

    #[test]
    fn granularities_are_ordered_fine_to_coarse() {
        assert!(TimeGranularity::Day < TimeGranularity::Month);
        let coarser: Vec<_> = TimeGranularity::Month.self_and_coarser().collect();
        assert_eq!(
            coarser,
            vec![
                TimeGranularity::Month,
                TimeGranularity::Quarter,
                TimeGranularity::Year
            ]
        );
    }

    #[test]
    fn granularity_names_accept_plural() {
        assert_eq!(TimeGranularity::from_name("days"), Some(TimeGranularity::Day));
        assert_eq!(TimeGranularity::from_name("MONTH"), Some(TimeGranularity::Month));
        assert_eq!(TimeGranularity::from_name("fortnight"), None);
    }

    #[test]
    fn date_part_requires_fine_enough_grain() {
        assert!(DatePart::Dow.compatible_with(TimeGranularity::Day));
        assert!(!DatePart::Dow.compatible_with(TimeGranularity::Month));
        assert!(DatePart::Year.compatible_with(TimeGranularity::Month));
    }

    #[test]
    fn path_key_distinguishes_grain() {
        let day = LinkableInstanceSpec::time_dimension("ds", &[], TimeGranularity::Day, None);
        let month = LinkableInstanceSpec::time_dimension("ds", &[], TimeGranularity::Month, None);
        assert_ne!(day.element_path_key(), month.element_path_key());
        assert_eq!(day.element_path_key(), day.clone().element_path_key());
    }
}
