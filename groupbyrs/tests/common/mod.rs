#![allow(dead_code)]

use groupby::config::ResolverConfig;
use groupby::issues::{IssueKind, ResolverInputKind};
use groupby::lookup::SemanticManifestLookup;
use groupby::manifest::SemanticManifest;
use groupby::query::{QueryParser, QueryRequest, QueryResolution};

pub const MANIFEST: &str = r#"
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
      - name: booking_value
        agg: sum
  - name: listings_source
    defaults:
      agg_time_dimension: created_at
    entities:
      - name: listing
        type: primary
      - name: user
        type: foreign
      - name: host
        type: foreign
    dimensions:
      - name: country
        type: categorical
      - name: host
        type: categorical
      - name: created_at
        type: time
        type_params:
          time_granularity: day
    measures:
      - name: listings
        agg: count
  - name: users_source
    entities:
      - name: user
        type: primary
    dimensions:
      - name: home_state
        type: categorical
  - name: monthly_measures_source
    defaults:
      agg_time_dimension: ds
    entities:
      - name: listing
        type: foreign
    dimensions:
      - name: ds
        type: time
        type_params:
          time_granularity: month
    measures:
      - name: monthly_measure_0
        agg: sum
  - name: yearly_measures_source
    defaults:
      agg_time_dimension: ds
    entities:
      - name: listing
        type: foreign
    dimensions:
      - name: ds
        type: time
        type_params:
          time_granularity: year
    measures:
      - name: yearly_measure_0
        agg: sum
  - name: views_source
    defaults:
      agg_time_dimension: ds
    entities:
      - name: view
        type: primary
      - name: listing
        type: foreign
    dimensions:
      - name: referrer
        type: categorical
      - name: ds
        type: time
        type_params:
          time_granularity: day
    measures:
      - name: views
        agg: count

metrics:
  - name: bookings
    type: simple
    type_params:
      measure: bookings
  - name: booking_value
    type: simple
    type_params:
      measure: booking_value
  - name: listings
    type: simple
    type_params:
      measure: listings
  - name: instant_bookings
    type: simple
    type_params:
      measure: bookings
    filter: "{{ Dimension('booking__is_instant') }}"
  - name: broken_filter_bookings
    type: simple
    type_params:
      measure: bookings
    filter: "{{ Dimension('booking__nonexistent') }}"
  - name: bookings_7d
    type: cumulative
    type_params:
      measure: bookings
      window: 7 days
  - name: bookings_growth_2_weeks
    type: derived
    type_params:
      expr: bookings - bookings_2_weeks_ago
      metrics:
        - bookings
        - name: bookings
          alias: bookings_2_weeks_ago
          offset_window: 14 days
  - name: bookings_since_start_of_month
    type: derived
    type_params:
      expr: bookings_mtd
      metrics:
        - name: bookings
          alias: bookings_mtd
          offset_to_grain: month
  - name: us_bookings
    type: derived
    type_params:
      expr: us_bookings
      metrics:
        - name: bookings
          alias: us_bookings
          filter: "{{ Dimension('listing__country') }} = 'US'"
  - name: bookings_per_listing
    type: ratio
    type_params:
      numerator: bookings
      denominator: listings
  - name: monthly_metric_0
    type: simple
    type_params:
      measure: monthly_measure_0
  - name: yearly_metric_0
    type: simple
    type_params:
      measure: yearly_measure_0
  - name: monthly_plus_yearly
    type: derived
    type_params:
      expr: monthly_metric_0 + yearly_metric_0
      metrics:
        - monthly_metric_0
        - yearly_metric_0
  - name: view_to_booking_rate
    type: conversion
    type_params:
      conversion_type_params:
        base_measure: views
        conversion_measure: bookings
        entity: listing
        window: 7 days
"#;

pub fn manifest() -> SemanticManifest {
    serde_yaml::from_str(MANIFEST).expect("fixture manifest parses")
}

pub fn lookup() -> SemanticManifestLookup {
    SemanticManifestLookup::new(manifest()).expect("fixture manifest is valid")
}

/// Index an ad-hoc manifest written inline by a test.
pub fn lookup_from(yaml: &str) -> SemanticManifestLookup {
    let manifest: SemanticManifest = serde_yaml::from_str(yaml).expect("manifest parses");
    SemanticManifestLookup::new(manifest).expect("manifest is valid")
}

pub fn resolve(request: &QueryRequest) -> QueryResolution {
    resolve_with(&lookup(), request)
}

pub fn resolve_with(lookup: &SemanticManifestLookup, request: &QueryRequest) -> QueryResolution {
    let config = ResolverConfig::default();
    QueryParser::new(lookup, &config)
        .resolve_query(request)
        .expect("fixture resolves without fatal errors")
}

/// Every issue kind reported against inputs of `kind`, parents excluded.
pub fn issue_kinds(resolution: &QueryResolution, kind: ResolverInputKind) -> Vec<IssueKind> {
    resolution
        .input_to_issue_set
        .items
        .iter()
        .filter(|(input, _)| input.kind == kind)
        .flat_map(|(_, issues)| issues.iter().map(|issue| issue.kind.clone()))
        .collect()
}
