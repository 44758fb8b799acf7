//! Autowire-candidate eligibility.
//!
//! The dependency resolver asks an [`AutowireCandidateResolver`] whether a
//! bean may satisfy a descriptor at all, before any tie-breaking happens.
//! The default, [`QualifierCandidateResolver`], honours the definition's
//! `autowire_candidate` flag and matches descriptor qualifiers against
//! definition qualifiers, bean names and aliases.

use crate::definition::BeanDefinition;
use crate::descriptor::DependencyDescriptor;
use crate::value::Value;

/// A bean under consideration for an injection point.
#[derive(Debug, Clone, Copy)]
pub struct CandidateInfo<'a> {
    pub name: &'a str,
    pub aliases: &'a [String],
    /// `None` for singletons registered without a definition.
    pub definition: Option<&'a BeanDefinition>,
}

impl CandidateInfo<'_> {
    /// Returns `true` if `name` is the candidate's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }
}

pub trait AutowireCandidateResolver: Send + Sync {
    fn is_autowire_candidate(&self, candidate: &CandidateInfo<'_>, descriptor: &DependencyDescriptor) -> bool {
        let _ = descriptor;
        candidate
            .definition
            .is_none_or(BeanDefinition::is_autowire_candidate)
    }

    /// A value to inject without looking up any bean.
    fn suggested_value(&self, descriptor: &DependencyDescriptor) -> Option<Value> {
        let _ = descriptor;
        None
    }

    fn is_required(&self, descriptor: &DependencyDescriptor) -> bool {
        descriptor.is_required()
    }
}

/// Honours the `autowire_candidate` flag and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleCandidateResolver;

impl AutowireCandidateResolver for SimpleCandidateResolver {}

/// Adds qualifier matching and default values on top of
/// [`SimpleCandidateResolver`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QualifierCandidateResolver;

impl AutowireCandidateResolver for QualifierCandidateResolver {
    fn is_autowire_candidate(&self, candidate: &CandidateInfo<'_>, descriptor: &DependencyDescriptor) -> bool {
        if !SimpleCandidateResolver.is_autowire_candidate(candidate, descriptor) {
            return false;
        }
        match descriptor.qualifier() {
            None => true,
            Some(qualifier) => {
                candidate
                    .definition
                    .is_some_and(|d| d.has_qualifier_value(qualifier))
                    || candidate.answers_to(qualifier)
            }
        }
    }

    fn suggested_value(&self, descriptor: &DependencyDescriptor) -> Option<Value> {
        descriptor.default_value().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamType;

    struct Store;

    fn info<'a>(name: &'a str, aliases: &'a [String], def: Option<&'a BeanDefinition>) -> CandidateInfo<'a> {
        CandidateInfo { name, aliases, definition: def }
    }

    #[test]
    fn excluded_definitions_are_not_candidates() {
        let def = BeanDefinition::new().autowire_candidate(false);
        let desc = DependencyDescriptor::of::<Store>();
        assert!(!QualifierCandidateResolver.is_autowire_candidate(&info("s", &[], Some(&def)), &desc));
        assert!(QualifierCandidateResolver.is_autowire_candidate(&info("s", &[], None), &desc));
    }

    #[test]
    fn qualifier_matches_definition_name_or_alias() {
        let desc = DependencyDescriptor::of::<Store>().qualified("fast");
        let tagged = BeanDefinition::new().qualifier("fast");
        let plain = BeanDefinition::new();
        let aliases = vec!["fast".to_string()];

        let resolver = QualifierCandidateResolver;
        assert!(resolver.is_autowire_candidate(&info("redis", &[], Some(&tagged)), &desc));
        assert!(resolver.is_autowire_candidate(&info("fast", &[], Some(&plain)), &desc));
        assert!(resolver.is_autowire_candidate(&info("redis", &aliases, Some(&plain)), &desc));
        assert!(!resolver.is_autowire_candidate(&info("disk", &[], Some(&plain)), &desc));
        // the simple resolver ignores qualifiers
        assert!(SimpleCandidateResolver.is_autowire_candidate(&info("disk", &[], Some(&plain)), &desc));
    }

    #[test]
    fn default_values_are_suggested() {
        let desc = DependencyDescriptor::new(ParamType::Int).with_default(8080i64);
        assert_eq!(QualifierCandidateResolver.suggested_value(&desc), Some(Value::Int(8080)));
        assert_eq!(SimpleCandidateResolver.suggested_value(&desc), None);
    }
}
