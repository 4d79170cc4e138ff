use serde::{Deserialize, Serialize};

/// A metrics query as the user wrote it. Every item is still text; the
/// parser resolves it against the manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryRequest {
    pub metrics: Vec<String>,
    pub group_by: Vec<String>,
    #[serde(alias = "where")]
    pub where_filters: Vec<String>,
    /// A leading `-` (or `.descending(True)` on a builder input) sorts descending.
    pub order_by: Vec<String>,
    pub limit: Option<i64>,
}

impl QueryRequest {
    pub fn new<S: AsRef<str>>(metrics: &[S]) -> Self {
        Self {
            metrics: to_strings(metrics),
            ..Self::default()
        }
    }

    pub fn with_group_by<S: AsRef<str>>(mut self, group_by: &[S]) -> Self {
        self.group_by = to_strings(group_by);
        self
    }

    pub fn with_where<S: AsRef<str>>(mut self, where_filters: &[S]) -> Self {
        self.where_filters = to_strings(where_filters);
        self
    }

    pub fn with_order_by<S: AsRef<str>>(mut self, order_by: &[S]) -> Self {
        self.order_by = to_strings(order_by);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

fn to_strings<S: AsRef<str>>(items: &[S]) -> Vec<String> {
    items.iter().map(|s| s.as_ref().to_string()).collect()
}
