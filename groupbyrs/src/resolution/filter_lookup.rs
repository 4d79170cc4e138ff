//! Results of resolving every group-by item referenced by where-filter
//! templates, keyed by where the filter was declared and the call it made.

use serde::Serialize;

use crate::filters::CallParameterSet;
use crate::issues::IssueSet;
use crate::mergeable::Mergeable;
use crate::specs::{LinkableInstanceSpec, MetricReference};

use super::path::ResolutionPath;

/// Where a where-filter was declared.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "location", rename_all = "snake_case")]
pub enum WhereFilterLocation {
    /// The query's own filter.
    Query { metrics: Vec<MetricReference> },
    /// A metric's filter, or a filter on one of its input measures.
    Metric { metric: MetricReference },
    /// A filter on a derived metric's input.
    MetricInput {
        derived_metric: MetricReference,
        input_metric: MetricReference,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ResolvedSpecLookUpKey {
    pub filter_location: WhereFilterLocation,
    pub call_parameter_set: CallParameterSet,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterSpecResolution {
    pub lookup_key: ResolvedSpecLookUpKey,
    pub where_filter_template: String,
    pub resolved_spec: Option<LinkableInstanceSpec>,
    pub resolution_path: ResolutionPath,
    pub issue_set: IssueSet,
    /// The call rendered back as builder text, e.g. `Dimension('listing__country')`.
    pub object_builder_str: String,
}

/// A filter whose template could not be parsed at all.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NonParsableFilterResolution {
    pub filter_location: WhereFilterLocation,
    pub where_filter_template: String,
    pub issue_set: IssueSet,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterSpecResolutionLookUp {
    pub spec_resolutions: Vec<FilterSpecResolution>,
    pub non_parsable_resolutions: Vec<NonParsableFilterResolution>,
}

impl FilterSpecResolutionLookUp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.spec_resolutions.is_empty() && self.non_parsable_resolutions.is_empty()
    }

    pub fn contains_key(&self, key: &ResolvedSpecLookUpKey) -> bool {
        self.spec_resolutions.iter().any(|r| r.lookup_key == *key)
    }

    pub fn get_spec_resolutions(&self, key: &ResolvedSpecLookUpKey) -> Vec<&FilterSpecResolution> {
        self.spec_resolutions
            .iter()
            .filter(|r| r.lookup_key == *key)
            .collect()
    }

    /// The resolved spec for `key`, if exactly one resolution exists and it
    /// succeeded.
    pub fn checked_resolved_spec(&self, key: &ResolvedSpecLookUpKey) -> Option<&LinkableInstanceSpec> {
        match self.get_spec_resolutions(key).as_slice() {
            [only] => only.resolved_spec.as_ref(),
            _ => None,
        }
    }

    /// Every successfully resolved spec, in resolution order, deduplicated.
    pub fn resolved_specs(&self) -> Vec<LinkableInstanceSpec> {
        let mut specs: Vec<LinkableInstanceSpec> = Vec::new();
        for spec in self.spec_resolutions.iter().filter_map(|r| r.resolved_spec.as_ref()) {
            if !specs.contains(spec) {
                specs.push(spec.clone());
            }
        }
        specs
    }

    pub fn has_errors(&self) -> bool {
        self.spec_resolutions.iter().any(|r| r.issue_set.has_errors())
            || self
                .non_parsable_resolutions
                .iter()
                .any(|r| r.issue_set.has_errors())
    }

    /// Issues per offending filter template, templates in first-seen order.
    pub fn issues_by_template(&self) -> Vec<(String, IssueSet)> {
        let mut grouped: Vec<(String, IssueSet)> = Vec::new();
        let sources = self
            .non_parsable_resolutions
            .iter()
            .map(|r| (&r.where_filter_template, &r.issue_set))
            .chain(
                self.spec_resolutions
                    .iter()
                    .map(|r| (&r.where_filter_template, &r.issue_set)),
            );
        for (template, issues) in sources {
            if issues.is_empty() {
                continue;
            }
            match grouped.iter_mut().find(|(existing, _)| existing == template) {
                Some((_, existing)) => {
                    *existing = std::mem::take(existing).merge(issues.clone());
                }
                None => grouped.push((template.clone(), issues.clone())),
            }
        }
        grouped
    }
}

impl Mergeable for FilterSpecResolutionLookUp {
    fn empty() -> Self {
        Self::new()
    }

    /// The first resolution recorded for a key wins.
    fn merge(mut self, other: Self) -> Self {
        for resolution in other.spec_resolutions {
            if !self.contains_key(&resolution.lookup_key) {
                self.spec_resolutions.push(resolution);
            }
        }
        for resolution in other.non_parsable_resolutions {
            let seen = self.non_parsable_resolutions.iter().any(|existing| {
                existing.filter_location == resolution.filter_location
                    && existing.where_filter_template == resolution.where_filter_template
            });
            if !seen {
                self.non_parsable_resolutions.push(resolution);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::WhereFilter;

    fn resolution(template: &str, spec: Option<LinkableInstanceSpec>) -> FilterSpecResolution {
        let filter = WhereFilter::new(template);
        let call_parameter_set = filter
            .call_parameter_sets()
            .expect("template parses")
            .remove(0);
        FilterSpecResolution {
            lookup_key: ResolvedSpecLookUpKey {
                filter_location: WhereFilterLocation::Metric {
                    metric: MetricReference::new("bookings"),
                },
                call_parameter_set: call_parameter_set.clone(),
            },
            where_filter_template: template.to_string(),
            resolved_spec: spec,
            resolution_path: ResolutionPath::default(),
            issue_set: IssueSet::new(),
            object_builder_str: call_parameter_set.builder_str(),
        }
    }

    #[test]
    fn merge_keeps_first_resolution_per_key() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        let template = "{{ Dimension('listing__country') }} = 'US'";
        let first = FilterSpecResolutionLookUp {
            spec_resolutions: vec![resolution(template, Some(country.clone()))],
            non_parsable_resolutions: Vec::new(),
        };
        let second = FilterSpecResolutionLookUp {
            spec_resolutions: vec![resolution(template, None)],
            non_parsable_resolutions: Vec::new(),
        };
        let merged = first.merge(second);
        assert_eq!(merged.spec_resolutions.len(), 1);
        let key = merged.spec_resolutions[0].lookup_key.clone();
        assert_eq!(merged.checked_resolved_spec(&key), Some(&country));
        assert_eq!(merged.resolved_specs(), vec![country]);
        assert!(!merged.has_errors());
    }
}
