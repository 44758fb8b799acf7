//! Definition sources: where bean definitions come from.
//!
//! Parsing configuration files or scanning code is someone else's job; the
//! container only sees a [`DefinitionSource`], a supplier of named
//! definitions. [`ContainerBuilder::source`](crate::container::ContainerBuilder::source)
//! copies everything a source offers into the container's registry.
//!
//! # Examples
//! ```
//! use granary_container::bean::BeanClass;
//! use granary_container::definition::BeanDefinition;
//! use granary_container::source::{DefinitionSource, StaticDefinitionSource};
//!
//! struct Mailer;
//!
//! let source = StaticDefinitionSource::named("mail")
//!     .with("mailer", BeanDefinition::of_class(BeanClass::of::<Mailer>()))
//!     .with_alias("mailer", "smtp");
//!
//! assert!(source.contains_definition("mailer"));
//! assert_eq!(source.definition_names(), vec!["mailer".to_string()]);
//! ```

use crate::definition::BeanDefinition;

/// A supplier of bean definitions.
pub trait DefinitionSource: Send + Sync {
    fn get_definition(&self, name: &str) -> Option<BeanDefinition>;

    /// Names in the order they should be registered.
    fn definition_names(&self) -> Vec<String>;

    fn contains_definition(&self, name: &str) -> bool {
        self.get_definition(name).is_some()
    }

    /// `(name, alias)` pairs to register after the definitions.
    fn aliases(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// Human-readable name, used as the resource description of the
    /// definitions it supplies.
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// An in-memory [`DefinitionSource`].
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitionSource {
    description: Option<String>,
    definitions: Vec<(String, BeanDefinition)>,
    aliases: Vec<(String, String)>,
}

impl StaticDefinitionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Self::default()
        }
    }

    /// Adds a definition; a later one with the same name replaces it.
    pub fn with(mut self, name: impl Into<String>, definition: BeanDefinition) -> Self {
        self.add(name, definition);
        self
    }

    pub fn add(&mut self, name: impl Into<String>, definition: BeanDefinition) {
        let name = name.into();
        match self.definitions.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = definition,
            None => self.definitions.push((name, definition)),
        }
    }

    pub fn with_alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionSource for StaticDefinitionSource {
    fn get_definition(&self, name: &str) -> Option<BeanDefinition> {
        self.definitions
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, d)| d.clone())
    }

    fn definition_names(&self) -> Vec<String> {
        self.definitions.iter().map(|(n, _)| n.clone()).collect()
    }

    fn aliases(&self) -> Vec<(String, String)> {
        self.aliases.clone()
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| "static definition source".to_string())
    }
}
