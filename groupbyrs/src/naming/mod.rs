//! Textual conventions for naming group-by items.
//!
//! A scheme maps user input to a spec pattern and renders specs back into
//! strings in the same convention for error messages and suggestions.

mod dunder;
mod metric;
mod object_builder;

use std::fmt;

use crate::filters::TemplateError;
use crate::patterns::EntityLinkPattern;
use crate::specs::LinkableInstanceSpec;

pub use dunder::{DunderNamingScheme, StructuredLinkableSpecName};
pub use metric::MetricNamingScheme;
pub use object_builder::ObjectBuilderNamingScheme;

pub trait QueryItemNamingScheme: fmt::Debug + Sync {
    /// Short label used in rendered issues.
    fn name(&self) -> &'static str;

    /// Render `spec` in this convention, or `None` if it cannot be expressed.
    fn input_str(&self, spec: &LinkableInstanceSpec) -> Option<String>;

    fn input_str_follows_scheme(&self, input: &str) -> bool;

    fn spec_pattern(&self, input: &str) -> Result<EntityLinkPattern, TemplateError>;
}

/// Schemes tried, in order, for group-by and order-by inputs.
pub fn group_by_naming_schemes() -> [&'static dyn QueryItemNamingScheme; 2] {
    [&ObjectBuilderNamingScheme, &DunderNamingScheme]
}

/// The first scheme that accepts `input`.
pub fn scheme_for_input(input: &str) -> Option<&'static dyn QueryItemNamingScheme> {
    group_by_naming_schemes()
        .into_iter()
        .find(|scheme| scheme.input_str_follows_scheme(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_scheme_by_shape() {
        assert_eq!(
            scheme_for_input("Dimension('listing__country')").map(|s| s.name()),
            Some("object_builder")
        );
        assert_eq!(
            scheme_for_input("listing__country").map(|s| s.name()),
            Some("dunder")
        );
        assert!(scheme_for_input("listing country").is_none());
    }
}
