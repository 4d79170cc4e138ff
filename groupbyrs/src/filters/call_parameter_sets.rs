//! Typed group-by references extracted from object-builder calls.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::specs::{DatePart, EntityReference, MetricReference, TimeGranularity, DUNDER};

use super::template::{BuilderCall, TemplateError, TemplateValue};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DimensionCallParameterSet {
    pub entity_path: Vec<EntityReference>,
    pub dimension_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeDimensionCallParameterSet {
    pub entity_path: Vec<EntityReference>,
    pub time_dimension_reference: String,
    pub time_granularity: Option<TimeGranularity>,
    pub date_part: Option<DatePart>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityCallParameterSet {
    pub entity_path: Vec<EntityReference>,
    pub entity_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetricCallParameterSet {
    pub metric_reference: MetricReference,
    pub group_by: Vec<EntityReference>,
}

/// One group-by item referenced by an object-builder call.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum CallParameterSet {
    Dimension(DimensionCallParameterSet),
    TimeDimension(TimeDimensionCallParameterSet),
    Entity(EntityCallParameterSet),
    Metric(MetricCallParameterSet),
}

/// A parsed builder input plus the ordering flag only query inputs may set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderInput {
    pub call_parameter_set: CallParameterSet,
    pub descending: bool,
}

impl CallParameterSet {
    /// Render back into the object-builder form, e.g. `Dimension('listing__country')`.
    pub fn builder_str(&self) -> String {
        match self {
            CallParameterSet::Dimension(p) => {
                format!("Dimension('{}')", dunder_join(&p.entity_path, &p.dimension_reference))
            }
            CallParameterSet::TimeDimension(p) => {
                let mut out = format!(
                    "TimeDimension('{}'",
                    dunder_join(&p.entity_path, &p.time_dimension_reference)
                );
                if let Some(grain) = p.time_granularity {
                    out.push_str(&format!(", '{grain}'"));
                }
                if let Some(part) = p.date_part {
                    out.push_str(&format!(", date_part_name='{part}'"));
                }
                out.push(')');
                out
            }
            CallParameterSet::Entity(p) => {
                format!("Entity('{}')", dunder_join(&p.entity_path, &p.entity_reference))
            }
            CallParameterSet::Metric(p) => {
                let group_by: Vec<String> =
                    p.group_by.iter().map(|e| format!("'{e}'")).collect();
                format!(
                    "Metric('{}', group_by=[{}])",
                    p.metric_reference,
                    group_by.join(", ")
                )
            }
        }
    }

    /// Convert a parsed builder call. `.descending()` is only accepted when
    /// `allow_descending` is set.
    pub fn from_builder_call(
        call: &BuilderCall,
        allow_descending: bool,
    ) -> Result<BuilderInput, TemplateError> {
        let name = call.positional_str(0)?.ok_or_else(|| {
            TemplateError::new(format!("{}() requires a name argument", call.function), 0)
        })?;
        let (mut entity_path, element_name) = split_dunder(name)?;

        let mut grain: Option<TimeGranularity> = None;
        let mut date_part: Option<DatePart> = None;
        let mut descending = false;

        match call.function.as_str() {
            "Dimension" | "Entity" => {
                call.check_keywords(&["entity_path"])?;
                if call.positional.len() > 1 {
                    return Err(TemplateError::new(
                        format!("{}() takes a single positional argument", call.function),
                        0,
                    ));
                }
            }
            "TimeDimension" => {
                call.check_keywords(&[
                    "entity_path",
                    "time_granularity_name",
                    "date_part_name",
                    "descending",
                ])?;
                let grain_name = match call.positional_str(1)? {
                    Some(g) => Some(g),
                    None => call.keyword_str("time_granularity_name")?,
                };
                grain = grain_name.map(parse_grain).transpose()?;
                date_part = call
                    .keyword_str("date_part_name")?
                    .map(parse_date_part)
                    .transpose()?;
                if let Some(TemplateValue::Bool(flag)) = call.keyword("descending") {
                    descending = *flag;
                }
            }
            "Metric" => {
                call.check_keywords(&["group_by"])?;
                let group_by = call
                    .keyword_list("group_by")?
                    .into_iter()
                    .map(EntityReference::new)
                    .collect();
                for chained in &call.chained {
                    match chained.method.as_str() {
                        "descending" if allow_descending => {
                            descending = chained_bool(&chained.args)?;
                        }
                        other => {
                            return Err(TemplateError::new(
                                format!("Metric() does not support .{other}()"),
                                0,
                            ))
                        }
                    }
                }
                return Ok(BuilderInput {
                    call_parameter_set: CallParameterSet::Metric(MetricCallParameterSet {
                        metric_reference: MetricReference::new(name),
                        group_by,
                    }),
                    descending,
                });
            }
            other => {
                return Err(TemplateError::new(
                    format!(
                        "unknown function '{other}'; expected Dimension, TimeDimension, Entity or Metric"
                    ),
                    0,
                ))
            }
        }

        let mut prefix: Vec<EntityReference> = call
            .keyword_list("entity_path")?
            .into_iter()
            .map(EntityReference::new)
            .collect();
        prefix.append(&mut entity_path);
        let entity_path = prefix;

        for chained in &call.chained {
            match chained.method.as_str() {
                "grain" if call.function != "Entity" => {
                    grain = Some(parse_grain(chained_str(&chained.args)?)?);
                }
                "date_part" if call.function != "Entity" => {
                    date_part = Some(parse_date_part(chained_str(&chained.args)?)?);
                }
                "descending" if allow_descending => {
                    descending = chained_bool(&chained.args)?;
                }
                other => {
                    return Err(TemplateError::new(
                        format!("{}() does not support .{other}()", call.function),
                        0,
                    ))
                }
            }
        }
        if descending && !allow_descending {
            return Err(TemplateError::new("descending is not allowed here", 0));
        }

        let call_parameter_set = match call.function.as_str() {
            "Entity" => CallParameterSet::Entity(EntityCallParameterSet {
                entity_path,
                entity_reference: element_name,
            }),
            "Dimension" if grain.is_none() && date_part.is_none() => {
                CallParameterSet::Dimension(DimensionCallParameterSet {
                    entity_path,
                    dimension_reference: element_name,
                })
            }
            _ => CallParameterSet::TimeDimension(TimeDimensionCallParameterSet {
                entity_path,
                time_dimension_reference: element_name,
                time_granularity: grain,
                date_part,
            }),
        };
        Ok(BuilderInput {
            call_parameter_set,
            descending,
        })
    }
}

impl fmt::Display for CallParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.builder_str())
    }
}

/// `listing__user__country` -> (`[listing, user]`, `country`).
pub(crate) fn split_dunder(name: &str) -> Result<(Vec<EntityReference>, String), TemplateError> {
    let parts: Vec<&str> = name.split(DUNDER).collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(TemplateError::new(format!("invalid name '{name}'"), 0));
    }
    let (element, links) = parts
        .split_last()
        .ok_or_else(|| TemplateError::new("empty name", 0))?;
    Ok((
        links.iter().map(|l| EntityReference::new(*l)).collect(),
        element.to_string(),
    ))
}

fn dunder_join(entity_path: &[EntityReference], element_name: &str) -> String {
    let mut parts: Vec<&str> = entity_path.iter().map(|e| e.as_str()).collect();
    parts.push(element_name);
    parts.join(DUNDER)
}

fn parse_grain(name: &str) -> Result<TimeGranularity, TemplateError> {
    TimeGranularity::ALL
        .into_iter()
        .find(|g| g.name() == name.to_ascii_lowercase())
        .ok_or_else(|| TemplateError::new(format!("unknown time granularity '{name}'"), 0))
}

fn parse_date_part(name: &str) -> Result<DatePart, TemplateError> {
    DatePart::from_name(name)
        .ok_or_else(|| TemplateError::new(format!("unknown date part '{name}'"), 0))
}

fn chained_str(args: &[TemplateValue]) -> Result<&str, TemplateError> {
    match args {
        [TemplateValue::Str(s)] => Ok(s),
        _ => Err(TemplateError::new("expected a single string argument", 0)),
    }
}

fn chained_bool(args: &[TemplateValue]) -> Result<bool, TemplateError> {
    match args {
        [] => Ok(true),
        [TemplateValue::Bool(b)] => Ok(*b),
        _ => Err(TemplateError::new("expected a single boolean argument", 0)),
    }
}
