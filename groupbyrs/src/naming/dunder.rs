use crate::filters::{split_dunder, TemplateError};
use crate::patterns::{EntityLinkPattern, EntityLinkPatternParameterSet, ParameterSetField};
use crate::specs::{DatePart, EntityReference, LinkableInstanceSpec, TimeGranularity, DUNDER};

use super::QueryItemNamingScheme;

const DATE_PART_PREFIX: &str = "extract_";

/// A dunder name split into its parts:
/// `listing__created_at__month` has links `[listing]`, element `created_at`,
/// grain `month`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuredLinkableSpecName {
    pub entity_links: Vec<EntityReference>,
    pub element_name: String,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

impl StructuredLinkableSpecName {
    pub fn parse(name: &str) -> Result<Self, TemplateError> {
        let (mut entity_links, last) = split_dunder(name)?;

        let suffix_grain = TimeGranularity::ALL
            .into_iter()
            .find(|g| g.name() == last);
        let suffix_part = last
            .strip_prefix(DATE_PART_PREFIX)
            .and_then(DatePart::from_name);

        // A suffix only counts when something precedes it.
        if (suffix_grain.is_some() || suffix_part.is_some()) && !entity_links.is_empty() {
            let element = entity_links
                .pop()
                .map(|e| e.0)
                .ok_or_else(|| TemplateError::new(format!("invalid name '{name}'"), 0))?;
            return Ok(Self {
                entity_links,
                element_name: element,
                time_granularity: suffix_grain,
                date_part: suffix_part,
            });
        }
        Ok(Self {
            entity_links,
            element_name: last,
            time_granularity: None,
            date_part: None,
        })
    }

    pub fn qualified_name(&self) -> String {
        let mut parts: Vec<String> = self.entity_links.iter().map(|e| e.0.clone()).collect();
        parts.push(self.element_name.clone());
        if let Some(grain) = self.time_granularity {
            parts.push(grain.name().to_string());
        }
        if let Some(part) = self.date_part {
            parts.push(format!("{DATE_PART_PREFIX}{part}"));
        }
        parts.join(DUNDER)
    }
}

/// `entity__entity__element[__grain|__extract_<part>]`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DunderNamingScheme;

impl QueryItemNamingScheme for DunderNamingScheme {
    fn name(&self) -> &'static str {
        "dunder"
    }

    fn input_str(&self, spec: &LinkableInstanceSpec) -> Option<String> {
        Some(spec.qualified_name())
    }

    fn input_str_follows_scheme(&self, input: &str) -> bool {
        !input.is_empty()
            && input
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && input.split(DUNDER).all(|part| !part.is_empty())
    }

    fn spec_pattern(&self, input: &str) -> Result<EntityLinkPattern, TemplateError> {
        let name = StructuredLinkableSpecName::parse(&input.to_ascii_lowercase())?;
        let mut fields_to_compare = vec![
            ParameterSetField::ElementName,
            ParameterSetField::EntityLinks,
            ParameterSetField::DatePart,
        ];
        if name.time_granularity.is_some() {
            fields_to_compare.push(ParameterSetField::TimeGranularity);
        }
        Ok(EntityLinkPattern::new(EntityLinkPatternParameterSet {
            fields_to_compare: fields_to_compare.into_iter().collect(),
            element_name: Some(name.element_name),
            entity_links: Some(name.entity_links),
            time_granularity: name.time_granularity,
            date_part: name.date_part,
            ..Default::default()
        }))
    }
}
