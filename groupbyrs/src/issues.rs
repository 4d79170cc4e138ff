//! Resolution issues: structured, path-aware diagnostics.
//!
//! Issues are values accumulated during traversal rather than errors thrown
//! out of it. Each records the DAG path at which it was raised and may wrap
//! the parent issues that caused it.

use std::fmt;

use serde::Serialize;

use crate::mergeable::Mergeable;
use crate::resolution::ResolutionPath;
use crate::specs::{LinkableInstanceSpec, MeasureReference, MetricReference};

/// Candidates a single parent offered when parents shared nothing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParentCandidates {
    pub path: ResolutionPath,
    pub specs: Vec<LinkableInstanceSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    NoMatchingItemsForMeasure {
        measure: MeasureReference,
        input: Option<String>,
        suggestions: Vec<String>,
    },
    NoMatchingItemsForNoMetricsQuery {
        input: Option<String>,
        suggestions: Vec<String>,
    },
    AmbiguousGroupByItem {
        input: Option<String>,
        candidates: Vec<LinkableInstanceSpec>,
    },
    NoCommonItemsInParents {
        parent_candidates: Vec<ParentCandidates>,
    },
    MetricExcludesDatePart {
        metric: MetricReference,
    },
    WhereFilterParsingIssue {
        where_filter: String,
        message: String,
    },
    DuplicateMetric {
        duplicates: Vec<MetricReference>,
    },
    CumulativeMetricRequiresMetricTime {
        metric: MetricReference,
        window: String,
    },
    OffsetMetricRequiresMetricTime {
        metric: MetricReference,
        offset_inputs: Vec<String>,
    },
    InvalidMetric {
        metric: String,
        suggestions: Vec<String>,
    },
    InvalidGroupByItem {
        input: String,
        message: String,
        suggestions: Vec<String>,
    },
    InvalidOrderByItem {
        input: String,
        suggestions: Vec<String>,
    },
    InvalidLimit {
        limit: i64,
    },
}

fn suggestion_text(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = suggestions.iter().map(|s| format!("'{s}'")).collect();
        format!("\n\nSuggestions:\n  {}", quoted.join("\n  "))
    }
}

fn spec_list(specs: &[LinkableInstanceSpec]) -> String {
    let names: Vec<String> = specs.iter().map(|s| format!("'{s}'")).collect();
    format!("[{}]", names.join(", "))
}

impl IssueKind {
    pub fn description(&self) -> String {
        match self {
            IssueKind::NoMatchingItemsForMeasure {
                measure,
                input,
                suggestions,
            } => {
                let subject = input
                    .as_deref()
                    .map(|i| format!("'{i}'"))
                    .unwrap_or_else(|| "The query".to_string());
                format!(
                    "{subject} does not match any of the available group-by items for measure '{measure}'.{}",
                    suggestion_text(suggestions)
                )
            }
            IssueKind::NoMatchingItemsForNoMetricsQuery { input, suggestions } => {
                let subject = input
                    .as_deref()
                    .map(|i| format!("'{i}'"))
                    .unwrap_or_else(|| "The query".to_string());
                format!(
                    "{subject} does not match any of the available group-by items for a query without metrics.{}",
                    suggestion_text(suggestions)
                )
            }
            IssueKind::AmbiguousGroupByItem { input, candidates } => {
                let subject = input
                    .as_deref()
                    .map(|i| format!("'{i}'"))
                    .unwrap_or_else(|| "The input".to_string());
                format!(
                    "{subject} is ambiguous; it matches {}",
                    spec_list(candidates)
                )
            }
            IssueKind::NoCommonItemsInParents { parent_candidates } => {
                let mut out = "The given input does not match any of the available group-by items \
                               common to all parents."
                    .to_string();
                for parent in parent_candidates {
                    out.push_str(&format!(
                        "\n  {}: {}",
                        parent
                            .path
                            .last_node()
                            .map(|n| n.description.as_str())
                            .unwrap_or("?"),
                        spec_list(&parent.specs)
                    ));
                }
                out
            }
            IssueKind::MetricExcludesDatePart { metric } => format!(
                "Metric '{metric}' offsets an input to a grain, so its group-by items cannot \
                 extract a date part."
            ),
            IssueKind::WhereFilterParsingIssue {
                where_filter,
                message,
            } => format!("Error parsing where filter '{where_filter}': {message}"),
            IssueKind::DuplicateMetric { duplicates } => {
                let names: Vec<String> = duplicates.iter().map(|m| format!("'{m}'")).collect();
                format!(
                    "Each metric may be queried only once, but these were repeated: [{}]",
                    names.join(", ")
                )
            }
            IssueKind::CumulativeMetricRequiresMetricTime { metric, window } => format!(
                "Cumulative metric '{metric}' ({window}) must be queried with 'metric_time' or \
                 the metric's aggregation time dimension."
            ),
            IssueKind::OffsetMetricRequiresMetricTime {
                metric,
                offset_inputs,
            } => format!(
                "Metric '{metric}' has time-offset inputs [{}] and must be queried with \
                 'metric_time' or the metric's aggregation time dimension.",
                offset_inputs.join(", ")
            ),
            IssueKind::InvalidMetric {
                metric,
                suggestions,
            } => format!(
                "Metric '{metric}' does not exist in the semantic manifest.{}",
                suggestion_text(suggestions)
            ),
            IssueKind::InvalidGroupByItem {
                input,
                message,
                suggestions,
            } => format!(
                "'{input}' is not a valid group-by item: {message}{}",
                suggestion_text(suggestions)
            ),
            IssueKind::InvalidOrderByItem { input, suggestions } => format!(
                "Order-by item '{input}' does not match any requested metric or group-by item.{}",
                suggestion_text(suggestions)
            ),
            IssueKind::InvalidLimit { limit } => {
                format!("The limit must be non-negative, got {limit}.")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolutionIssue {
    pub kind: IssueKind,
    pub query_resolution_path: ResolutionPath,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parent_issues: Vec<ResolutionIssue>,
}

impl ResolutionIssue {
    pub fn new(kind: IssueKind, query_resolution_path: ResolutionPath) -> Self {
        Self {
            kind,
            query_resolution_path,
            parent_issues: Vec::new(),
        }
    }

    pub fn with_parent_issues(mut self, parent_issues: Vec<ResolutionIssue>) -> Self {
        self.parent_issues = parent_issues;
        self
    }

    /// Copy with `prefix` prepended to this issue's path and its parents'.
    pub fn with_path_prefix(&self, prefix: &ResolutionPath) -> Self {
        Self {
            kind: self.kind.clone(),
            query_resolution_path: self.query_resolution_path.with_prefix(prefix),
            parent_issues: self
                .parent_issues
                .iter()
                .map(|issue| issue.with_path_prefix(prefix))
                .collect(),
        }
    }

    fn render(&self, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        for line in self.kind.description().lines() {
            out.push_str(&pad);
            out.push_str(line);
            out.push('\n');
        }
        if !self.query_resolution_path.is_empty() {
            out.push_str(&format!(
                "{pad}Query resolution path: {}\n",
                self.query_resolution_path
            ));
        }
        for parent in &self.parent_issues {
            out.push_str(&format!("{pad}Caused by:\n"));
            parent.render(out, indent + 1);
        }
    }
}

/// Every issue kind is an error; a non-empty set halts the query.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IssueSet {
    pub issues: Vec<ResolutionIssue>,
}

impl IssueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_issue(issue: ResolutionIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn push(&mut self, issue: ResolutionIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    pub fn with_path_prefix(&self, prefix: &ResolutionPath) -> Self {
        Self {
            issues: self
                .issues
                .iter()
                .map(|issue| issue.with_path_prefix(prefix))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolutionIssue> {
        self.issues.iter()
    }
}

impl Mergeable for IssueSet {
    fn empty() -> Self {
        Self::new()
    }

    fn merge(mut self, other: Self) -> Self {
        for issue in other.issues {
            self.push(issue);
        }
        self
    }
}

impl fmt::Display for IssueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for (index, issue) in self.issues.iter().enumerate() {
            out.push_str(&format!("Error #{}:\n", index + 1));
            issue.render(&mut out, 1);
        }
        f.write_str(out.trim_end())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverInputKind {
    Metric,
    GroupBy,
    OrderBy,
    Limit,
    WhereFilter,
    Query,
}

impl fmt::Display for ResolverInputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResolverInputKind::Metric => "metric",
            ResolverInputKind::GroupBy => "group-by item",
            ResolverInputKind::OrderBy => "order-by item",
            ResolverInputKind::Limit => "limit",
            ResolverInputKind::WhereFilter => "where filter",
            ResolverInputKind::Query => "query",
        };
        f.write_str(label)
    }
}

/// One piece of user input issues are reported against.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ResolverInput {
    pub kind: ResolverInputKind,
    pub input_str: String,
}

impl ResolverInput {
    pub fn new(kind: ResolverInputKind, input_str: impl Into<String>) -> Self {
        Self {
            kind,
            input_str: input_str.into(),
        }
    }
}

/// Issues grouped by the input that caused them, in input order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct InputToIssueSetMapping {
    pub items: Vec<(ResolverInput, IssueSet)>,
}

impl InputToIssueSetMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, input: ResolverInput, issue_set: IssueSet) {
        if issue_set.is_empty() {
            return;
        }
        match self.items.iter_mut().find(|(existing, _)| *existing == input) {
            Some((_, existing)) => {
                let merged = std::mem::take(existing).merge(issue_set);
                *existing = merged;
            }
            None => self.items.push((input, issue_set)),
        }
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|(_, issues)| issues.has_errors())
    }

    pub fn issue_count(&self) -> usize {
        self.items.iter().map(|(_, issues)| issues.len()).sum()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (input, issues) in &self.items {
            out.push_str(&format!("Got errors with {} '{}':\n", input.kind, input.input_str));
            for line in issues.to_string().lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.trim_end().to_string()
    }
}

impl Mergeable for InputToIssueSetMapping {
    fn empty() -> Self {
        Self::new()
    }

    fn merge(mut self, other: Self) -> Self {
        for (input, issues) in other.items {
            self.add(input, issues);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::{NodeId, PathNode};

    fn path(ids: &[usize]) -> ResolutionPath {
        ResolutionPath::new(
            ids.iter()
                .map(|id| PathNode {
                    node_id: NodeId(*id),
                    description: format!("Node{id}"),
                })
                .collect(),
        )
    }

    #[test]
    fn path_prefix_reaches_parent_issues() {
        let parent = ResolutionIssue::new(
            IssueKind::InvalidLimit { limit: -1 },
            path(&[1]),
        );
        let issue = ResolutionIssue::new(
            IssueKind::MetricExcludesDatePart {
                metric: MetricReference::new("bookings_growth"),
            },
            path(&[1]),
        )
        .with_parent_issues(vec![parent]);

        let prefixed = issue.with_path_prefix(&path(&[9]));
        assert_eq!(prefixed.query_resolution_path, path(&[9, 1]));
        assert_eq!(prefixed.parent_issues[0].query_resolution_path, path(&[9, 1]));
        // Original untouched.
        assert_eq!(issue.query_resolution_path, path(&[1]));
    }

    #[test]
    fn merge_dedups_identical_issues() {
        let issue = ResolutionIssue::new(IssueKind::InvalidLimit { limit: -5 }, path(&[0]));
        let merged = IssueSet::merge_iter([
            IssueSet::from_issue(issue.clone()),
            IssueSet::from_issue(issue),
        ]);
        assert_eq!(merged.len(), 1);
        assert!(merged.has_errors());
    }

    #[test]
    fn mapping_groups_by_input() {
        let mut mapping = InputToIssueSetMapping::new();
        let input = ResolverInput::new(ResolverInputKind::GroupBy, "country");
        mapping.add(
            input.clone(),
            IssueSet::from_issue(ResolutionIssue::new(
                IssueKind::InvalidLimit { limit: -1 },
                path(&[0]),
            )),
        );
        mapping.add(
            input,
            IssueSet::from_issue(ResolutionIssue::new(
                IssueKind::InvalidLimit { limit: -2 },
                path(&[0]),
            )),
        );
        mapping.add(
            ResolverInput::new(ResolverInputKind::Limit, "-1"),
            IssueSet::new(),
        );
        assert_eq!(mapping.items.len(), 1);
        assert_eq!(mapping.issue_count(), 2);
        let rendered = mapping.render();
        assert!(rendered.starts_with("Got errors with group-by item 'country':"));
        assert!(rendered.contains("Error #2:"));
    }
}
