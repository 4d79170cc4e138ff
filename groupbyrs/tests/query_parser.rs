mod common;

use common::{issue_kinds, lookup, lookup_from, resolve, resolve_with};
use groupby::config::ResolverConfig;
use groupby::issues::{IssueKind, ResolverInputKind};
use groupby::query::{OrderByInstance, QueryParser, QueryRequest};
use groupby::specs::{LinkableInstanceSpec, MetricReference, TimeGranularity};
use groupby::ResolverError;

fn group_by_specs(request: QueryRequest) -> Vec<LinkableInstanceSpec> {
    let resolution = resolve(&request);
    assert!(
        !resolution.has_errors(),
        "unexpected issues:\n{}",
        resolution.input_to_issue_set.render()
    );
    resolution
        .query_spec
        .expect("resolved query has a spec")
        .linkable_specs()
}

#[test]
fn resolves_local_joined_and_metric_time_items() {
    let specs = group_by_specs(
        QueryRequest::new(&["bookings"]).with_group_by(&[
            "is_instant",
            "listing__country",
            "metric_time",
        ]),
    );
    assert_eq!(
        specs,
        vec![
            LinkableInstanceSpec::dimension("is_instant", &[]),
            LinkableInstanceSpec::dimension("country", &["listing"]),
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Day, None),
        ]
    );
}

#[test]
fn dunder_and_builder_inputs_agree_on_grain() {
    let dunder =
        group_by_specs(QueryRequest::new(&["bookings"]).with_group_by(&["metric_time__month"]));
    let builder = group_by_specs(
        QueryRequest::new(&["bookings"]).with_group_by(&["TimeDimension('metric_time', 'month')"]),
    );
    assert_eq!(dunder, builder);
    assert_eq!(
        dunder,
        vec![LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Month,
            None
        )]
    );
}

#[test]
fn ratio_metric_intersects_its_measures() {
    let specs = group_by_specs(
        QueryRequest::new(&["bookings_per_listing"]).with_group_by(&["listing__country"]),
    );
    assert_eq!(specs, vec![LinkableInstanceSpec::dimension("country", &["listing"])]);

    let resolution = resolve(
        &QueryRequest::new(&["bookings_per_listing"]).with_group_by(&["booking__is_instant"]),
    );
    let kinds = issue_kinds(&resolution, ResolverInputKind::GroupBy);
    assert_eq!(kinds.len(), 1);
    match &kinds[0] {
        IssueKind::NoMatchingItemsForMeasure { measure, .. } => {
            assert_eq!(measure.as_str(), "listings")
        }
        other => panic!("unexpected issue {other:?}"),
    }
}

#[test]
fn ambiguous_input_lists_every_candidate() {
    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_group_by(&["listing__host"]));
    let kinds = issue_kinds(&resolution, ResolverInputKind::GroupBy);
    match kinds.as_slice() {
        [IssueKind::AmbiguousGroupByItem { input, candidates }] => {
            assert_eq!(input.as_deref(), Some("listing__host"));
            assert!(candidates.contains(&LinkableInstanceSpec::dimension("host", &["listing"])));
            assert!(candidates.contains(&LinkableInstanceSpec::entity("host", &["listing"])));
        }
        other => panic!("unexpected issues {other:?}"),
    }
    assert!(resolution.query_spec.is_none());
}

#[test]
fn unknown_metric_is_reported_with_suggestions() {
    let resolution = resolve(&QueryRequest::new(&["bookngs"]).with_group_by(&["metric_time"]));
    let kinds = issue_kinds(&resolution, ResolverInputKind::Metric);
    match kinds.as_slice() {
        [IssueKind::InvalidMetric {
            metric,
            suggestions,
        }] => {
            assert_eq!(metric, "bookngs");
            assert_eq!(suggestions.first().map(String::as_str), Some("bookings"));
        }
        other => panic!("unexpected issues {other:?}"),
    }
    // Group-by items are not resolved once a metric fails.
    assert!(issue_kinds(&resolution, ResolverInputKind::GroupBy).is_empty());
}

#[test]
fn misspelled_group_by_item_is_suggested() {
    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_group_by(&["listing__contry"]));
    let kinds = issue_kinds(&resolution, ResolverInputKind::GroupBy);
    match kinds.as_slice() {
        [IssueKind::NoMatchingItemsForMeasure {
            measure,
            input,
            suggestions,
        }] => {
            assert_eq!(measure.as_str(), "bookings");
            assert_eq!(input.as_deref(), Some("listing__contry"));
            assert!(suggestions.contains(&"listing__country".to_string()));
        }
        other => panic!("unexpected issues {other:?}"),
    }
}

#[test]
fn input_following_no_scheme_is_invalid() {
    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_group_by(&["listing country"]));
    match issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice() {
        [IssueKind::InvalidGroupByItem {
            input, suggestions, ..
        }] => {
            assert_eq!(input, "listing country");
            assert!(suggestions.contains(&"listing__country".to_string()));
        }
        other => panic!("unexpected issues {other:?}"),
    }
}

#[test]
fn negative_limit_is_rejected() {
    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_limit(-1));
    assert_eq!(
        issue_kinds(&resolution, ResolverInputKind::Limit),
        vec![IssueKind::InvalidLimit { limit: -1 }]
    );

    let resolution = resolve(&QueryRequest::new(&["bookings"]).with_limit(10));
    assert_eq!(resolution.query_spec.and_then(|spec| spec.limit), Some(10));
}

#[test]
fn order_by_metrics_and_group_by_items() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings"])
            .with_group_by(&["metric_time__month", "listing__country"])
            .with_order_by(&["-bookings", "metric_time", "listing__country"]),
    );
    let spec = resolution.query_spec.expect("query resolves");
    assert_eq!(spec.order_by_specs.len(), 3);

    assert!(spec.order_by_specs[0].descending);
    assert!(matches!(
        &spec.order_by_specs[0].instance,
        OrderByInstance::Metric(metric) if metric.element_name == "bookings"
    ));

    assert!(!spec.order_by_specs[1].descending);
    assert_eq!(
        spec.order_by_specs[1].instance,
        OrderByInstance::GroupBy(LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Month,
            None
        ))
    );
}

#[test]
fn order_by_item_must_be_in_the_query() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings"])
            .with_group_by(&["metric_time"])
            .with_order_by(&["listing__country"]),
    );
    assert!(matches!(
        issue_kinds(&resolution, ResolverInputKind::OrderBy).as_slice(),
        [IssueKind::InvalidOrderByItem { input, .. }] if input == "listing__country"
    ));
}

#[test]
fn duplicate_metrics_are_listed() {
    let resolution = resolve(&QueryRequest::new(&["bookings", "bookings"]));
    let kinds = issue_kinds(&resolution, ResolverInputKind::Query);
    assert_eq!(
        kinds,
        vec![IssueKind::DuplicateMetric {
            duplicates: vec![
                MetricReference::new("bookings"),
                MetricReference::new("bookings")
            ],
        }]
    );
}

#[test]
fn cumulative_metric_needs_metric_time() {
    let resolution = resolve(&QueryRequest::new(&["bookings_7d"]).with_group_by(&["listing__country"]));
    assert_eq!(
        issue_kinds(&resolution, ResolverInputKind::Query),
        vec![IssueKind::CumulativeMetricRequiresMetricTime {
            metric: MetricReference::new("bookings_7d"),
            window: "window: 7 days".to_string(),
        }]
    );

    for time in ["metric_time", "booking__ds"] {
        let resolution = resolve(
            &QueryRequest::new(&["bookings_7d"]).with_group_by(&[time, "listing__country"]),
        );
        assert!(
            !resolution.has_errors(),
            "{time}: {}",
            resolution.input_to_issue_set.render()
        );
    }
}

#[test]
fn cumulative_metric_is_limited_to_base_grain() {
    let resolution =
        resolve(&QueryRequest::new(&["bookings_7d"]).with_group_by(&["booking__ds__month"]));
    assert!(matches!(
        issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice(),
        [IssueKind::NoMatchingItemsForMeasure { .. }]
    ));
}

#[test]
fn offset_metric_needs_metric_time() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings_growth_2_weeks"]).with_group_by(&["listing__country"]),
    );
    assert_eq!(
        issue_kinds(&resolution, ResolverInputKind::Query),
        vec![IssueKind::OffsetMetricRequiresMetricTime {
            metric: MetricReference::new("bookings_growth_2_weeks"),
            offset_inputs: vec!["'bookings' (offset_window: 14 days)".to_string()],
        }]
    );

    let resolution = resolve(
        &QueryRequest::new(&["bookings_growth_2_weeks"]).with_group_by(&["metric_time__week"]),
    );
    assert!(!resolution.has_errors());
}

#[test]
fn offset_to_grain_excludes_date_parts() {
    let resolution = resolve(
        &QueryRequest::new(&["bookings_since_start_of_month"])
            .with_group_by(&["metric_time__extract_year"]),
    );
    let kinds = issue_kinds(&resolution, ResolverInputKind::GroupBy);
    assert_eq!(
        kinds,
        vec![IssueKind::MetricExcludesDatePart {
            metric: MetricReference::new("bookings_since_start_of_month"),
        }]
    );
    // The same date part works for the plain metric.
    let resolution =
        resolve(&QueryRequest::new(&["bookings"]).with_group_by(&["metric_time__extract_year"]));
    assert!(!resolution.has_errors());
}

#[test]
fn derived_metric_needs_common_grain() {
    let resolution = resolve(
        &QueryRequest::new(&["monthly_plus_yearly"]).with_group_by(&["metric_time"]),
    );
    match issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice() {
        [IssueKind::NoCommonItemsInParents { parent_candidates }] => {
            assert_eq!(parent_candidates.len(), 2);
        }
        other => panic!("unexpected issues {other:?}"),
    }

    let specs = group_by_specs(
        QueryRequest::new(&["monthly_plus_yearly"]).with_group_by(&["metric_time__year"]),
    );
    assert_eq!(
        specs,
        vec![LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Year,
            None
        )]
    );
}

#[test]
fn query_without_metrics_reaches_entity_attributes() {
    let specs = group_by_specs(QueryRequest::default().with_group_by(&["listing__country"]));
    assert_eq!(specs, vec![LinkableInstanceSpec::dimension("country", &["listing"])]);

    let resolution = resolve(&QueryRequest::default().with_group_by(&["country"]));
    assert!(matches!(
        issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice(),
        [IssueKind::NoMatchingItemsForNoMetricsQuery { .. }]
    ));
}

#[test]
fn parse_and_validate_renders_the_report() {
    let lookup = lookup();
    let config = ResolverConfig::default();
    let parser = QueryParser::new(&lookup, &config);

    let err = parser
        .parse_and_validate_query(&QueryRequest::new(&["bookings"]).with_limit(-3))
        .unwrap_err();
    match err {
        ResolverError::InvalidQuery(message) => {
            assert!(message.starts_with("Got errors while resolving the query."));
            assert!(message.contains("Got errors with limit '-3'"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let spec = parser
        .parse_and_validate_query(
            &QueryRequest::new(&["bookings"]).with_group_by(&["listing__user__home_state"]),
        )
        .unwrap();
    assert_eq!(
        spec.dimension_specs[0].entity_links.len(),
        2,
        "multi-hop item keeps both links"
    );
}

#[test]
fn available_items_cover_every_metric() {
    let lookup = lookup();
    let config = ResolverConfig::default();
    let parser = QueryParser::new(&lookup, &config);

    let available = parser
        .available_group_by_items(&["bookings", "listings"])
        .unwrap();
    assert!(available.issue_set.is_empty());
    assert!(available
        .specs
        .contains(&LinkableInstanceSpec::dimension("country", &["listing"])));
    assert!(!available
        .specs
        .contains(&LinkableInstanceSpec::dimension("is_instant", &["booking"])));

    assert!(matches!(
        parser.available_group_by_items(&["nope"]),
        Err(ResolverError::InvalidQuery(_))
    ));
}

#[test]
fn resolution_is_deterministic() {
    let request = QueryRequest::new(&["bookings", "bookings_per_listing"])
        .with_group_by(&["metric_time__month", "listing__country"])
        .with_where(&["{{ Dimension('listing__country') }} != 'FR'"]);
    assert_eq!(resolve(&request), resolve(&request));
}

// ---------------------------------------------------------------------------
// Conversion metrics
// ---------------------------------------------------------------------------

#[test]
fn conversion_metric_is_grouped_by_base_measure_items() {
    let specs = group_by_specs(
        QueryRequest::new(&["view_to_booking_rate"]).with_group_by(&[
            "referrer",
            "view__ds__month",
            "listing__country",
        ]),
    );
    assert_eq!(
        specs,
        vec![
            LinkableInstanceSpec::dimension("referrer", &[]),
            LinkableInstanceSpec::dimension("country", &["listing"]),
            LinkableInstanceSpec::time_dimension("ds", &["view"], TimeGranularity::Month, None),
        ]
    );
}

#[test]
fn conversion_measure_items_do_not_widen_the_metric() {
    let resolution = resolve(
        &QueryRequest::new(&["view_to_booking_rate"]).with_group_by(&["booking__is_instant"]),
    );
    match issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice() {
        [IssueKind::NoMatchingItemsForMeasure { measure, .. }] => {
            assert_eq!(measure.as_str(), "views")
        }
        other => panic!("unexpected issues {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Items reachable through more than one model
// ---------------------------------------------------------------------------

const TWO_LISTING_MODELS: &str = r#"
semantic_models:
  - name: bookings_source
    defaults:
      agg_time_dimension: ds
    entities:
      - name: booking
        type: primary
      - name: listing
        type: foreign
    dimensions:
      - name: is_instant
        type: categorical
      - name: ds
        type: time
        type_params:
          time_granularity: day
    measures:
      - name: bookings
        agg: sum
  - name: listings_a
    entities:
      - name: listing
        type: primary
    dimensions:
      - name: country
        type: categorical
  - name: listings_b
    entities:
      - name: listing
        type: primary
    dimensions:
      - name: country
        type: categorical
      - name: capacity
        type: categorical
metrics:
  - name: bookings
    type: simple
    type_params:
      measure: bookings
"#;

#[test]
fn item_supplied_by_two_models_is_not_resolvable() {
    let lookup = lookup_from(TWO_LISTING_MODELS);
    let resolution = resolve_with(
        &lookup,
        &QueryRequest::new(&["bookings"]).with_group_by(&["listing__country"]),
    );
    assert!(resolution.query_spec.is_none());
    match issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice() {
        [IssueKind::NoMatchingItemsForMeasure {
            measure,
            suggestions,
            ..
        }] => {
            assert_eq!(measure.as_str(), "bookings");
            assert!(!suggestions.contains(&"listing__country".to_string()));
        }
        other => panic!("unexpected issues {other:?}"),
    }

    let resolution = resolve_with(
        &lookup,
        &QueryRequest::new(&["bookings"]).with_group_by(&["listing__capacity", "is_instant"]),
    );
    assert!(
        !resolution.has_errors(),
        "unexpected issues:\n{}",
        resolution.input_to_issue_set.render()
    );
}

#[test]
fn item_supplied_by_two_models_is_not_resolvable_without_metrics() {
    let lookup = lookup_from(TWO_LISTING_MODELS);
    let resolution = resolve_with(
        &lookup,
        &QueryRequest::default().with_group_by(&["listing__country"]),
    );
    assert!(matches!(
        issue_kinds(&resolution, ResolverInputKind::GroupBy).as_slice(),
        [IssueKind::NoMatchingItemsForNoMetricsQuery { .. }]
    ));
}
