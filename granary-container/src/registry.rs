//! Definition registry: bean definitions and aliases keyed by name.
//!
//! Registration may happen while beans are being created (a post-processor
//! can register more definitions), so definitions live in a concurrent map
//! and readers must tolerate names appearing between two calls. Registration
//! order is kept separately: pre-instantiation and type lookups walk names in
//! the order they were registered.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::definition::BeanDefinition;
use crate::error::{ContainerError, Result};

/// Stores bean definitions and aliases.
#[derive(Debug)]
pub(crate) struct DefinitionRegistry {
    definitions: DashMap<String, Arc<BeanDefinition>>,
    /// Names in registration order. Also serializes structural changes.
    names: Mutex<Vec<String>>,
    /// alias -> name (which may itself be an alias)
    aliases: DashMap<String, String>,
    allow_overriding: bool,
}

impl DefinitionRegistry {
    pub fn new(allow_overriding: bool) -> Self {
        Self {
            definitions: DashMap::new(),
            names: Mutex::new(Vec::new()),
            aliases: DashMap::new(),
            allow_overriding,
        }
    }

    /// Registers `definition` under `name`.
    ///
    /// Returns the definition it replaced, if any, so the caller can reset
    /// state derived from it.
    ///
    /// # Errors
    /// [`ContainerError::DefinitionStore`] for an empty name, an invalid
    /// definition, or a name that is taken (by a definition or an alias)
    /// while overriding is disabled.
    pub fn register(&self, name: &str, definition: BeanDefinition) -> Result<Option<Arc<BeanDefinition>>> {
        if name.is_empty() {
            return Err(ContainerError::definition_store(name, "bean name must not be empty"));
        }
        definition.validate(name)?;

        let mut names = self.names.lock();
        let previous = self.definitions.get(name).map(|d| d.value().clone());

        if let Some(ref existing) = previous {
            if !self.allow_overriding {
                return Err(ContainerError::definition_store(
                    name,
                    format!(
                        "cannot register bean definition [{definition:?}]: there is already [{existing:?}] bound\n  Hint: enable allow_definition_overriding or pick another name"
                    ),
                )
                .with_resource(definition.resource_description()));
            }
            debug!(bean = %name, "Overriding bean definition");
        } else if self.aliases.contains_key(name) {
            if !self.allow_overriding {
                return Err(ContainerError::definition_store(
                    name,
                    format!(
                        "cannot register bean definition under '{name}': it is already an alias for '{}'",
                        self.canonical_name(name)
                    ),
                ));
            }
            self.aliases.remove(name);
        }

        if previous.is_none() {
            names.push(name.to_string());
        }
        self.definitions.insert(name.to_string(), Arc::new(definition));
        debug!(bean = %name, "Registered bean definition");
        Ok(previous)
    }

    /// Removes the definition registered under `name`.
    pub fn remove(&self, name: &str) -> Result<Arc<BeanDefinition>> {
        let mut names = self.names.lock();
        let (_, removed) = self
            .definitions
            .remove(name)
            .ok_or_else(|| ContainerError::no_such_bean_named(name))?;
        names.retain(|n| n != name);
        debug!(bean = %name, "Removed bean definition");
        Ok(removed)
    }

    pub fn get(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.definitions.get(name).map(|d| d.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Definition names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.names.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Registers `alias` for `name`.
    ///
    /// An alias equal to the name is removed instead. Re-registering the same
    /// alias for the same name is a no-op.
    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        if name.is_empty() || alias.is_empty() {
            return Err(ContainerError::definition_store(alias, "alias and name must not be empty"));
        }
        let _guard = self.names.lock();

        if alias == name {
            self.aliases.remove(alias);
            trace!(alias, "Alias equals name, removed");
            return Ok(());
        }
        if self.definitions.contains_key(alias) {
            return Err(ContainerError::definition_store(
                alias,
                format!("cannot register alias '{alias}' for name '{name}': a bean definition is already registered under that name"),
            ));
        }
        if let Some(existing) = self.aliases.get(alias).map(|t| t.clone()) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_overriding {
                return Err(ContainerError::definition_store(
                    alias,
                    format!("cannot register alias '{alias}' for name '{name}': it is already registered for name '{existing}'"),
                ));
            }
        }
        if self.resolves_to(name, alias) {
            return Err(ContainerError::definition_store(
                alias,
                format!("cannot register alias '{alias}' for name '{name}': circular reference - '{name}' is a direct or indirect alias for '{alias}' already"),
            ));
        }

        self.aliases.insert(alias.to_string(), name.to_string());
        debug!(alias, bean = %name, "Registered alias");
        Ok(())
    }

    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        let _guard = self.names.lock();
        self.aliases.remove(alias).map(|_| ()).ok_or_else(|| {
            ContainerError::definition_store(alias, format!("no alias '{alias}' registered"))
        })
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Follows alias links from `name` to the name they ultimately point at.
    pub fn canonical_name(&self, name: &str) -> String {
        let mut current = name.to_string();
        // Registration rejects cycles, so the chain is finite.
        while let Some(next) = self.aliases.get(&current).map(|t| t.clone()) {
            current = next;
        }
        current
    }

    /// Every alias resolving to `name`, directly or through other aliases.
    pub fn aliases_of(&self, name: &str) -> Vec<String> {
        let all: Vec<String> = self.aliases.iter().map(|entry| entry.key().clone()).collect();
        let mut found: Vec<String> = all
            .into_iter()
            .filter(|alias| alias != name && self.canonical_name(alias) == name)
            .collect();
        found.sort();
        found
    }

    /// Returns `true` if following aliases from `from` reaches `target`.
    fn resolves_to(&self, from: &str, target: &str) -> bool {
        let mut current = from.to_string();
        while let Some(next) = self.aliases.get(&current).map(|t| t.clone()) {
            if next == target {
                return true;
            }
            current = next;
        }
        false
    }
}
