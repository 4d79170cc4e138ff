use std::cmp::Ordering;

use crate::config::SuggestionsConfig;
use crate::naming::QueryItemNamingScheme;
use crate::patterns::{apply_patterns, BaseTimeGrainPattern, NoneDatePartPattern};
use crate::specs::LinkableInstanceSpec;

/// Rank `candidates` by normalized Levenshtein similarity to `input`.
/// Returns at most `max_suggestions` names scoring at least `min_score`,
/// best first, ties alphabetical.
pub fn top_fuzzy_matches<I>(input: &str, candidates: I, config: &SuggestionsConfig) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let needle = input.trim().to_ascii_lowercase();
    let mut scored: Vec<(String, f64)> = Vec::new();
    for candidate in candidates {
        if scored.iter().any(|(name, _)| *name == candidate) {
            continue;
        }
        let score = strsim::normalized_levenshtein(&needle, &candidate.to_ascii_lowercase());
        if score >= config.min_score {
            scored.push((candidate, score));
        }
    }
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored
        .into_iter()
        .take(config.max_suggestions)
        .map(|(name, _)| name)
        .collect()
}

/// Produces suggestions for one user input, rendering candidates in the
/// input's own naming scheme.
#[derive(Debug)]
pub struct SuggestionGenerator<'a> {
    input_str: String,
    naming_scheme: &'a dyn QueryItemNamingScheme,
    config: &'a SuggestionsConfig,
}

impl<'a> SuggestionGenerator<'a> {
    pub fn new(
        input_str: impl Into<String>,
        naming_scheme: &'a dyn QueryItemNamingScheme,
        config: &'a SuggestionsConfig,
    ) -> Self {
        Self {
            input_str: input_str.into(),
            naming_scheme,
            config,
        }
    }

    pub fn input_str(&self) -> &str {
        &self.input_str
    }

    pub fn suggestions(&self, candidates: &[LinkableInstanceSpec]) -> Vec<String> {
        let filtered = apply_patterns(
            candidates,
            &[&NoneDatePartPattern, &BaseTimeGrainPattern::new()],
        );
        let names = filtered
            .iter()
            .filter_map(|spec| self.naming_scheme.input_str(spec));
        top_fuzzy_matches(&self.input_str, names, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::DunderNamingScheme;
    use crate::specs::TimeGranularity;

    #[test]
    fn ranks_closest_first_and_drops_weak_matches() {
        let config = SuggestionsConfig::default();
        let ranked = top_fuzzy_matches(
            "listing__contry",
            [
                "listing__country".to_string(),
                "listing__capacity".to_string(),
                "user__home_state".to_string(),
            ],
            &config,
        );
        assert_eq!(ranked.first().map(String::as_str), Some("listing__country"));
        assert!(!ranked.contains(&"user__home_state".to_string()));
    }

    #[test]
    fn ties_break_alphabetically_and_respect_max() {
        let config = SuggestionsConfig {
            max_suggestions: 2,
            min_score: 0.0,
        };
        let ranked = top_fuzzy_matches(
            "ab",
            ["ad".to_string(), "ac".to_string(), "ae".to_string()],
            &config,
        );
        assert_eq!(ranked, vec!["ac".to_string(), "ad".to_string()]);
    }

    #[test]
    fn generator_collapses_grains_before_scoring() {
        let config = SuggestionsConfig::default();
        let generator = SuggestionGenerator::new("metric_tim", &DunderNamingScheme, &config);
        let candidates = vec![
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Day, None),
            LinkableInstanceSpec::time_dimension("metric_time", &[], TimeGranularity::Month, None),
        ];
        assert_eq!(
            generator.suggestions(&candidates),
            vec!["metric_time__day".to_string()]
        );
    }
}
