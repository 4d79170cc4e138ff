use crate::filters::template::{looks_like_builder_call, parse_builder_call};
use crate::filters::{CallParameterSet, TemplateError};
use crate::patterns::EntityLinkPattern;
use crate::specs::{LinkableInstanceSpec, DUNDER};

use super::QueryItemNamingScheme;

/// `Dimension('listing__country')`, `TimeDimension('metric_time', 'month')`,
/// `Entity('listing')`, `Metric('bookings', group_by=['listing'])`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectBuilderNamingScheme;

impl ObjectBuilderNamingScheme {
    /// Parse into a call parameter set plus the descending flag.
    pub fn parse_input(
        &self,
        input: &str,
        allow_descending: bool,
    ) -> Result<(CallParameterSet, bool), TemplateError> {
        let call = parse_builder_call(input.trim())?;
        let parsed = CallParameterSet::from_builder_call(&call, allow_descending)?;
        Ok((parsed.call_parameter_set, parsed.descending))
    }
}

fn dunder_path(spec: &LinkableInstanceSpec) -> String {
    let mut parts: Vec<&str> = spec.entity_links().iter().map(|e| e.as_str()).collect();
    parts.push(spec.element_name());
    parts.join(DUNDER)
}

impl QueryItemNamingScheme for ObjectBuilderNamingScheme {
    fn name(&self) -> &'static str {
        "object_builder"
    }

    fn input_str(&self, spec: &LinkableInstanceSpec) -> Option<String> {
        let rendered = match spec {
            LinkableInstanceSpec::Dimension(_) => format!("Dimension('{}')", dunder_path(spec)),
            LinkableInstanceSpec::TimeDimension(td) => match td.date_part {
                Some(part) => format!(
                    "TimeDimension('{}', '{}', date_part_name='{}')",
                    dunder_path(spec),
                    td.time_granularity,
                    part
                ),
                None => format!(
                    "TimeDimension('{}', '{}')",
                    dunder_path(spec),
                    td.time_granularity
                ),
            },
            LinkableInstanceSpec::Entity(_) => format!("Entity('{}')", dunder_path(spec)),
            LinkableInstanceSpec::GroupByMetric(gbm) => {
                let group_by: Vec<String> = gbm
                    .metric_subquery_entity_links
                    .iter()
                    .map(|e| format!("'{e}'"))
                    .collect();
                format!(
                    "Metric('{}', group_by=[{}])",
                    gbm.element_name,
                    group_by.join(", ")
                )
            }
        };
        Some(rendered)
    }

    fn input_str_follows_scheme(&self, input: &str) -> bool {
        looks_like_builder_call(input)
    }

    fn spec_pattern(&self, input: &str) -> Result<EntityLinkPattern, TemplateError> {
        let (call_parameter_set, _) = self.parse_input(input, false)?;
        Ok(EntityLinkPattern::from_call_parameter_set(&call_parameter_set))
    }
}
