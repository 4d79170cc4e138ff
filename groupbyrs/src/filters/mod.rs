//! Where-filter templates and the group-by references they contain.

mod call_parameter_sets;
pub mod template;

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use call_parameter_sets::{
    BuilderInput, CallParameterSet, DimensionCallParameterSet, EntityCallParameterSet,
    MetricCallParameterSet, TimeDimensionCallParameterSet,
};
pub(crate) use call_parameter_sets::split_dunder;
pub use template::TemplateError;

use template::parse_builder_call;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A SQL predicate with `{{ ... }}` placeholders naming group-by items.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WhereFilter {
    pub where_sql_template: String,
}

enum Segment<'a> {
    Text(&'a str),
    Call(CallParameterSet),
}

impl WhereFilter {
    pub fn new(where_sql_template: impl Into<String>) -> Self {
        Self {
            where_sql_template: where_sql_template.into(),
        }
    }

    fn segments(&self) -> Result<Vec<Segment<'_>>, TemplateError> {
        let template = self.where_sql_template.as_str();
        let mut segments = Vec::new();
        let mut cursor = 0;
        while let Some(found) = template[cursor..].find(OPEN) {
            let open = cursor + found;
            if open > cursor {
                segments.push(Segment::Text(&template[cursor..open]));
            }
            let body_start = open + OPEN.len();
            let close = template[body_start..]
                .find(CLOSE)
                .map(|i| body_start + i)
                .ok_or_else(|| TemplateError::new("unclosed '{{' in filter template", open))?;
            let body = &template[body_start..close];
            let call = parse_builder_call(body.trim()).map_err(|e| {
                TemplateError::new(e.message, body_start + e.position)
            })?;
            let input = CallParameterSet::from_builder_call(&call, false)?;
            segments.push(Segment::Call(input.call_parameter_set));
            cursor = close + CLOSE.len();
        }
        if cursor < template.len() {
            segments.push(Segment::Text(&template[cursor..]));
        }
        Ok(segments)
    }

    /// Every referenced group-by item, deduplicated, in order of appearance.
    pub fn call_parameter_sets(&self) -> Result<Vec<CallParameterSet>, TemplateError> {
        let mut sets: Vec<CallParameterSet> = Vec::new();
        for segment in self.segments()? {
            if let Segment::Call(set) = segment {
                if !sets.contains(&set) {
                    sets.push(set);
                }
            }
        }
        Ok(sets)
    }

    /// Substitute each placeholder with the name `render_call` produces for it.
    /// Placeholders it declines keep their builder form.
    pub fn render<F>(&self, mut render_call: F) -> Result<String, TemplateError>
    where
        F: FnMut(&CallParameterSet) -> Option<String>,
    {
        let mut out = String::with_capacity(self.where_sql_template.len());
        for segment in self.segments()? {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Call(set) => match render_call(&set) {
                    Some(rendered) => out.push_str(&rendered),
                    None => out.push_str(&format!("{{{{ {} }}}}", set.builder_str())),
                },
            }
        }
        Ok(out)
    }
}

/// Filters combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct WhereFilterIntersection {
    pub where_filters: Vec<WhereFilter>,
}

impl WhereFilterIntersection {
    pub fn new(where_filters: Vec<WhereFilter>) -> Self {
        Self { where_filters }
    }

    pub fn from_strs<S: AsRef<str>>(templates: &[S]) -> Self {
        Self::new(
            templates
                .iter()
                .map(|t| WhereFilter::new(t.as_ref()))
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.where_filters.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WhereFilter> {
        self.where_filters.iter()
    }

    /// Combine with another intersection, dropping exact duplicates.
    pub fn combine(&self, other: &WhereFilterIntersection) -> Self {
        let mut where_filters = self.where_filters.clone();
        for filter in &other.where_filters {
            if !where_filters.contains(filter) {
                where_filters.push(filter.clone());
            }
        }
        Self { where_filters }
    }
}

impl<'de> Deserialize<'de> for WhereFilterIntersection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        match value {
            Value::String(s) => Ok(WhereFilterIntersection::new(vec![WhereFilter::new(s)])),
            Value::Array(items) => {
                let mut where_filters = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => where_filters.push(WhereFilter::new(s)),
                        other => {
                            return Err(de::Error::custom(format!(
                                "filter entries must be strings, got {other}"
                            )))
                        }
                    }
                }
                Ok(WhereFilterIntersection::new(where_filters))
            }
            Value::Null => Ok(WhereFilterIntersection::default()),
            other => Err(de::Error::custom(format!(
                "filter must be a string or a list of strings, got {other}"
            ))),
        }
    }
}
