mod common;

use common::{issue_kinds, lookup, resolve};
use groupby::config::ResolverConfig;
use groupby::filters::{CallParameterSet, DimensionCallParameterSet, WhereFilterIntersection};
use groupby::issues::{IssueKind, ResolverInputKind};
use groupby::query::QueryRequest;
use groupby::resolution::{
    DagBuilder, ResolvedSpecLookUpKey, WhereFilterLocation, WhereFilterSpecResolver,
};
use groupby::specs::{EntityReference, LinkableInstanceSpec, MetricReference, TimeGranularity};

fn dimension_key(location: WhereFilterLocation, name: &str, links: &[&str]) -> ResolvedSpecLookUpKey {
    ResolvedSpecLookUpKey {
        filter_location: location,
        call_parameter_set: CallParameterSet::Dimension(DimensionCallParameterSet {
            entity_path: links.iter().map(|l| EntityReference::new(*l)).collect(),
            dimension_reference: name.to_string(),
        }),
    }
}

#[test]
fn metric_and_input_filters_resolve_at_their_own_node() {
    let lookup = lookup();
    let config = ResolverConfig::default();
    let metrics = vec![
        MetricReference::new("instant_bookings"),
        MetricReference::new("us_bookings"),
    ];
    let dag = DagBuilder::new(&lookup)
        .build(&metrics, &WhereFilterIntersection::default())
        .unwrap();
    let filter_lookup = WhereFilterSpecResolver::new(&lookup, &dag, &config.group_by).resolve_lookup();
    assert!(!filter_lookup.has_errors());

    let instant = dimension_key(
        WhereFilterLocation::Metric {
            metric: MetricReference::new("instant_bookings"),
        },
        "is_instant",
        &["booking"],
    );
    assert_eq!(
        filter_lookup.checked_resolved_spec(&instant),
        Some(&LinkableInstanceSpec::dimension("is_instant", &["booking"]))
    );

    let country = dimension_key(
        WhereFilterLocation::MetricInput {
            derived_metric: MetricReference::new("us_bookings"),
            input_metric: MetricReference::new("bookings"),
        },
        "country",
        &["listing"],
    );
    let resolutions = filter_lookup.get_spec_resolutions(&country);
    assert_eq!(resolutions.len(), 1);
    assert_eq!(resolutions[0].object_builder_str, "Dimension('listing__country')");
    assert_eq!(
        resolutions[0]
            .resolution_path
            .last_node()
            .map(|node| node.description.as_str()),
        Some("Metric('bookings')")
    );
    assert_eq!(filter_lookup.resolved_specs().len(), 2);
}

#[test]
fn query_filter_is_rendered_with_dunder_names() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings"])
            .with_group_by(&["metric_time"])
            .with_where(&["{{ Dimension('listing__country') }} = 'US'"]),
    );
    let spec = resolution.query_spec.expect("query resolves");
    assert_eq!(spec.filter_specs.len(), 1);
    assert_eq!(spec.filter_specs[0].where_sql, "listing__country = 'US'");
    assert_eq!(
        spec.filter_specs[0].linkable_specs,
        vec![LinkableInstanceSpec::dimension("country", &["listing"])]
    );
    // A filter item does not become a group-by item.
    assert!(spec.dimension_specs.is_empty());
}

#[test]
fn query_filter_needs_a_grain_every_metric_offers() {
    let metrics = ["monthly_metric_0", "yearly_metric_0"];
    let template = "{{ TimeDimension('metric_time') }} >= '2020-01-01'";
    let resolution = resolve(&QueryRequest::new(&metrics).with_where(&[template]));
    assert!(matches!(
        issue_kinds(&resolution, ResolverInputKind::WhereFilter).as_slice(),
        [IssueKind::NoCommonItemsInParents { .. }]
    ));
    let (input, _) = &resolution.input_to_issue_set.items[0];
    assert_eq!(input.input_str, template);

    let resolution = resolve(
        &QueryRequest::new(&metrics)
            .with_where(&["{{ TimeDimension('metric_time', 'year') }} >= '2020-01-01'"]),
    );
    let spec = resolution.query_spec.expect("query resolves");
    assert_eq!(spec.filter_specs[0].where_sql, "metric_time__year >= '2020-01-01'");
    assert_eq!(
        spec.filter_spec_lookup.resolved_specs(),
        vec![LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Year,
            None
        )]
    );
}

#[test]
fn metric_filter_issues_carry_the_full_path() {
    let resolution = resolve(&QueryRequest::new(&["broken_filter_bookings"]));
    assert!(resolution.query_spec.is_none());

    let (input, issues) = &resolution.input_to_issue_set.items[0];
    assert_eq!(input.kind, ResolverInputKind::WhereFilter);
    assert_eq!(input.input_str, "{{ Dimension('booking__nonexistent') }}");

    let issue = issues.iter().next().expect("one issue");
    assert!(matches!(issue.kind, IssueKind::NoMatchingItemsForMeasure { .. }));
    let descriptions: Vec<&str> = issue
        .query_resolution_path
        .nodes
        .iter()
        .map(|node| node.description.as_str())
        .collect();
    assert_eq!(
        descriptions,
        vec![
            "Query(['broken_filter_bookings'])",
            "Metric('broken_filter_bookings')",
            "Measure('bookings')",
        ]
    );
}

#[test]
fn unparsable_filter_is_reported_not_raised() {
    let template = "{{ Dimension('listing__country') = 'US'";
    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_where(&[template]));
    match issue_kinds(&resolution, ResolverInputKind::WhereFilter).as_slice() {
        [IssueKind::WhereFilterParsingIssue {
            where_filter,
            message,
        }] => {
            assert_eq!(where_filter, template);
            assert!(!message.is_empty());
        }
        other => panic!("unexpected issues {other:?}"),
    }
}

#[test]
fn closing_braces_inside_sql_literals_are_plain_text() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings"]).with_where(&["{{ Dimension('listing__country') }} = '}}'"]),
    );
    assert!(issue_kinds(&resolution, ResolverInputKind::WhereFilter).is_empty());
    let spec = resolution.query_spec.expect("query resolves");
    assert_eq!(spec.filter_specs[0].where_sql, "listing__country = '}}'");
}
