//! Linkable elements: specs annotated with how and where they are reachable.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::mergeable::Mergeable;
use crate::specs::{ElementPathKey, EntityReference, LinkableInstanceSpec, SemanticModelReference};

/// How an element is reachable from a measure (or a metric-less query).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkableElementProperty {
    /// Defined on the measure's own semantic model, no join path.
    Local,
    /// Defined on the measure's own semantic model, named through one of its entities.
    LocalLinked,
    /// Reached through at least one join.
    Joined,
    /// Reached through more than one join.
    MultiHop,
    /// A time dimension at a grain coarser than the one it is defined at.
    DerivedTimeGranularity,
    MetricTime,
    Entity,
    Metric,
    DatePart,
}

impl LinkableElementProperty {
    pub const ALL: [LinkableElementProperty; 9] = [
        LinkableElementProperty::Local,
        LinkableElementProperty::LocalLinked,
        LinkableElementProperty::Joined,
        LinkableElementProperty::MultiHop,
        LinkableElementProperty::DerivedTimeGranularity,
        LinkableElementProperty::MetricTime,
        LinkableElementProperty::Entity,
        LinkableElementProperty::Metric,
        LinkableElementProperty::DatePart,
    ];

    pub fn all() -> BTreeSet<LinkableElementProperty> {
        Self::ALL.into_iter().collect()
    }
}

/// One hop of a join path: the model joined to and the entity joined on.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SemanticModelJoinPathElement {
    pub semantic_model: SemanticModelReference,
    pub join_on_entity: EntityReference,
}

/// A spec plus the origin record explaining why it is reachable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkableElement {
    pub spec: LinkableInstanceSpec,
    pub properties: BTreeSet<LinkableElementProperty>,
    /// `None` for `metric_time`, which has no single owning model.
    pub defined_in_semantic_model: Option<SemanticModelReference>,
    pub join_path: Vec<SemanticModelJoinPathElement>,
}

impl LinkableElement {
    pub fn new(
        spec: LinkableInstanceSpec,
        properties: impl IntoIterator<Item = LinkableElementProperty>,
        defined_in_semantic_model: Option<SemanticModelReference>,
        join_path: Vec<SemanticModelJoinPathElement>,
    ) -> Self {
        Self {
            spec,
            properties: properties.into_iter().collect(),
            defined_in_semantic_model,
            join_path,
        }
    }

    pub fn path_key(&self) -> ElementPathKey {
        self.spec.element_path_key()
    }

    fn origin_sort_key(&self) -> (Option<&str>, &[SemanticModelJoinPathElement]) {
        (
            self.defined_in_semantic_model.as_ref().map(|m| m.as_str()),
            &self.join_path,
        )
    }

    fn admitted_by(
        &self,
        with_any_of: &BTreeSet<LinkableElementProperty>,
        without_any_of: &BTreeSet<LinkableElementProperty>,
    ) -> bool {
        !self.properties.is_disjoint(with_any_of) && self.properties.is_disjoint(without_any_of)
    }
}

/// Origin records grouped by path key. More than one distinct origin under a
/// key marks it ambiguous.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinkableElementSet {
    elements_by_path_key: BTreeMap<ElementPathKey, Vec<LinkableElement>>,
}

impl LinkableElementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: impl IntoIterator<Item = LinkableElement>) -> Self {
        let mut set = Self::new();
        for element in elements {
            set.insert(element);
        }
        set
    }

    pub fn insert(&mut self, element: LinkableElement) {
        let origins = self.elements_by_path_key.entry(element.path_key()).or_default();
        if origins.contains(&element) {
            return;
        }
        origins.push(element);
        origins.sort_by(|a, b| a.origin_sort_key().cmp(&b.origin_sort_key()));
    }

    pub fn len(&self) -> usize {
        self.elements_by_path_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements_by_path_key.is_empty()
    }

    pub fn path_keys(&self) -> impl Iterator<Item = &ElementPathKey> {
        self.elements_by_path_key.keys()
    }

    pub fn origins(&self, path_key: &ElementPathKey) -> &[LinkableElement] {
        self.elements_by_path_key
            .get(path_key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Keys with more than one distinct origin: different owning models, or
    /// one model reached through different join paths.
    pub fn ambiguous_path_keys(&self) -> Vec<&ElementPathKey> {
        self.elements_by_path_key
            .iter()
            .filter(|(_, origins)| {
                let distinct: BTreeSet<_> =
                    origins.iter().map(LinkableElement::origin_sort_key).collect();
                distinct.len() > 1
            })
            .map(|(key, _)| key)
            .collect()
    }

    /// A copy without the ambiguous keys. Such a key cannot be grouped by
    /// until the model names a single join path for it.
    pub fn without_ambiguous_keys(&self) -> Self {
        let ambiguous = self.ambiguous_path_keys();
        if ambiguous.is_empty() {
            return self.clone();
        }
        tracing::debug!(
            keys = ambiguous.len(),
            "dropping group-by items reachable through more than one path"
        );
        let ambiguous: BTreeSet<ElementPathKey> = ambiguous.into_iter().cloned().collect();
        Self {
            elements_by_path_key: self
                .elements_by_path_key
                .iter()
                .filter(|(key, _)| !ambiguous.contains(*key))
                .map(|(key, origins)| (key.clone(), origins.clone()))
                .collect(),
        }
    }

    /// Keep origins carrying any of `with_any_of` and none of `without_any_of`.
    pub fn filter(
        &self,
        with_any_of: &BTreeSet<LinkableElementProperty>,
        without_any_of: &BTreeSet<LinkableElementProperty>,
    ) -> Self {
        let mut filtered = Self::new();
        for origins in self.elements_by_path_key.values() {
            for element in origins {
                if element.admitted_by(with_any_of, without_any_of) {
                    filtered.insert(element.clone());
                }
            }
        }
        filtered
    }

    /// One spec per path key, in key order. Specs under a key differ only in
    /// fields outside the key (group-by-metric subquery links), so the first
    /// origin's spec is returned along with any distinct siblings.
    pub fn specs(&self) -> Vec<LinkableInstanceSpec> {
        let mut specs = Vec::new();
        for origins in self.elements_by_path_key.values() {
            for element in origins {
                if !specs.contains(&element.spec) {
                    specs.push(element.spec.clone());
                }
            }
        }
        specs
    }

    /// Keys present in every set; origins are the union over all sets.
    pub fn intersection_by_path_key(sets: &[LinkableElementSet]) -> Self {
        let Some((first, rest)) = sets.split_first() else {
            return Self::new();
        };
        let mut result = Self::new();
        for (key, origins) in &first.elements_by_path_key {
            if !rest.iter().all(|s| s.elements_by_path_key.contains_key(key)) {
                continue;
            }
            for element in origins {
                result.insert(element.clone());
            }
            for other in rest {
                for element in other.origins(key) {
                    result.insert(element.clone());
                }
            }
        }
        result
    }
}

impl Mergeable for LinkableElementSet {
    fn empty() -> Self {
        Self::new()
    }

    fn merge(mut self, other: Self) -> Self {
        for (_, origins) in other.elements_by_path_key {
            for element in origins {
                self.insert(element);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::TimeGranularity;

    fn element(spec: LinkableInstanceSpec, model: &str) -> LinkableElement {
        LinkableElement::new(
            spec,
            [LinkableElementProperty::Joined],
            Some(SemanticModelReference::new(model)),
            Vec::new(),
        )
    }

    #[test]
    fn union_merges_origins_under_one_key() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        let a = LinkableElementSet::from_elements([element(country.clone(), "listings_b")]);
        let b = LinkableElementSet::from_elements([element(country.clone(), "listings_a")]);

        let merged = LinkableElementSet::merge_iter([a, b]);
        assert_eq!(merged.len(), 1);
        let origins = merged.origins(&country.element_path_key());
        assert_eq!(origins.len(), 2);
        assert_eq!(
            origins[0].defined_in_semantic_model,
            Some(SemanticModelReference::new("listings_a"))
        );
        assert_eq!(merged.ambiguous_path_keys().len(), 1);
        assert_eq!(merged.specs(), vec![country]);
    }

    #[test]
    fn distinct_join_paths_make_a_key_ambiguous() {
        let home_state = LinkableInstanceSpec::dimension("home_state", &["user"]);
        let through = |model: &str| {
            LinkableElement::new(
                home_state.clone(),
                [LinkableElementProperty::Joined],
                Some(SemanticModelReference::new("users")),
                vec![SemanticModelJoinPathElement {
                    semantic_model: SemanticModelReference::new(model),
                    join_on_entity: EntityReference::new("user"),
                }],
            )
        };
        let is_instant = element(LinkableInstanceSpec::dimension("is_instant", &[]), "bookings");
        let set = LinkableElementSet::from_elements([
            through("users"),
            through("users_archive"),
            is_instant.clone(),
        ]);

        assert_eq!(set.ambiguous_path_keys(), vec![&home_state.element_path_key()]);
        let unambiguous = set.without_ambiguous_keys();
        assert_eq!(unambiguous.specs(), vec![is_instant.spec]);
        assert!(unambiguous.ambiguous_path_keys().is_empty());

        // The same origin recorded twice is not ambiguous.
        let repeated = LinkableElementSet::from_elements([through("users"), through("users")]);
        assert!(repeated.ambiguous_path_keys().is_empty());
    }

    #[test]
    fn intersection_keeps_only_shared_keys() {
        let country = LinkableInstanceSpec::dimension("country", &["listing"]);
        let month = LinkableInstanceSpec::time_dimension(
            "metric_time",
            &[],
            TimeGranularity::Month,
            None,
        );
        let year =
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Year, None);

        let left = LinkableElementSet::from_elements([
            element(country.clone(), "listings"),
            element(month, "bookings"),
            element(year.clone(), "bookings"),
        ]);
        let right = LinkableElementSet::from_elements([
            element(country.clone(), "listings"),
            element(year.clone(), "views"),
        ]);

        let shared = LinkableElementSet::intersection_by_path_key(&[left, right]);
        assert_eq!(shared.specs(), vec![country, year.clone()]);
        assert_eq!(shared.origins(&year.element_path_key()).len(), 2);
    }

    #[test]
    fn filter_respects_with_and_without() {
        let local = LinkableElement::new(
            LinkableInstanceSpec::dimension("is_instant", &[]),
            [LinkableElementProperty::Local],
            Some(SemanticModelReference::new("bookings")),
            Vec::new(),
        );
        let joined = element(LinkableInstanceSpec::dimension("country", &["listing"]), "listings");
        let set = LinkableElementSet::from_elements([local.clone(), joined]);

        let without_joined = set.filter(
            &LinkableElementProperty::all(),
            &[LinkableElementProperty::Joined].into_iter().collect(),
        );
        assert_eq!(without_joined.specs(), vec![local.spec.clone()]);

        let only_local = set.filter(
            &[LinkableElementProperty::Local].into_iter().collect(),
            &BTreeSet::new(),
        );
        assert_eq!(only_local.specs(), vec![local.spec]);
    }
}
