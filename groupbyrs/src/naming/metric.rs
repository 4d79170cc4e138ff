use crate::specs::{MetricReference, MetricSpec};

/// Bare metric names, used for requested metrics and metric order-by items.
#[derive(Clone, Copy, Debug, Default)]
pub struct MetricNamingScheme;

impl MetricNamingScheme {
    pub fn input_str(&self, spec: &MetricSpec) -> String {
        spec.element_name.clone()
    }

    pub fn input_str_follows_scheme(&self, input: &str) -> bool {
        !input.is_empty()
            && input
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    pub fn metric_reference(&self, input: &str) -> Option<MetricReference> {
        let trimmed = input.trim();
        self.input_str_follows_scheme(trimmed)
            .then(|| MetricReference::new(trimmed.to_ascii_lowercase()))
    }
}
