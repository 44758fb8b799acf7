//! Definition merging: flattening parent/child definitions.
//!
//! A child definition inherits everything it does not set itself from its
//! parent. The result is a [`ResolvedDefinition`]: the effective
//! configuration used for creation, plus the per-definition caches the
//! creation engine fills in (resolved constructor and arguments, predicted
//! class, inferred destroy method).
//!
//! Merges are cached per bean name. Replacing or removing a definition marks
//! the cached merge stale and drops it (and the merges of its children, see
//! `Container::reset_definition`), so the next access merges again.

use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::trace;

use granary_support::rendering::render_chain;

use crate::bean::BeanClass;
use crate::constructor::ConstructorCache;
use crate::container::Container;
use crate::definition::BeanDefinition;
use crate::error::{ContainerError, Result};
use crate::registry::DefinitionRegistry;
use crate::scope::{SINGLETON, Scope};

/// The effective, parent-flattened view of a bean definition.
pub struct ResolvedDefinition {
    definition: BeanDefinition,
    stale: AtomicBool,
    post_processed: Mutex<bool>,
    pub(crate) predicted_class: OnceCell<Option<Arc<BeanClass>>>,
    pub(crate) destroy_method: OnceCell<Option<String>>,
    pub(crate) constructor_cache: Mutex<Option<ConstructorCache>>,
}

impl ResolvedDefinition {
    pub(crate) fn new(definition: BeanDefinition) -> Self {
        Self {
            definition,
            stale: AtomicBool::new(false),
            post_processed: Mutex::new(false),
            predicted_class: OnceCell::new(),
            destroy_method: OnceCell::new(),
            constructor_cache: Mutex::new(None),
        }
    }

    pub fn definition(&self) -> &BeanDefinition {
        &self.definition
    }

    /// The effective scope. Never unset after merging.
    pub fn scope(&self) -> Scope {
        Scope::parse(self.definition.scope_name())
    }

    /// `true` once the source definition (or an ancestor) changed.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    /// Returns `true` if a constructor or factory method has been resolved
    /// and cached for this definition.
    pub fn has_cached_constructor(&self) -> bool {
        self.constructor_cache.lock().is_some()
    }

    pub(crate) fn cached_constructor(&self) -> Option<ConstructorCache> {
        self.constructor_cache.lock().clone()
    }

    pub(crate) fn store_constructor(&self, cache: ConstructorCache) {
        *self.constructor_cache.lock() = Some(cache);
    }

    /// Runs `f` unless it already ran successfully for this definition.
    pub(crate) fn post_process_once(&self, f: impl FnOnce() -> Result<()>) -> Result<()> {
        let mut done = self.post_processed.lock();
        if !*done {
            f()?;
            *done = true;
        }
        Ok(())
    }
}

impl Deref for ResolvedDefinition {
    type Target = BeanDefinition;

    fn deref(&self) -> &BeanDefinition {
        &self.definition
    }
}

impl PartialEq for ResolvedDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl std::fmt::Debug for ResolvedDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDefinition")
            .field("definition", &self.definition)
            .field("stale", &self.is_stale())
            .finish()
    }
}

/// Overlays `child` onto a copy of its parent's merged definition.
fn override_from(target: &mut BeanDefinition, child: &BeanDefinition) {
    if child.class.is_some() {
        target.class = child.class.clone();
    }
    if child.scope.is_some() {
        target.scope = child.scope.clone();
    }
    target.is_abstract = child.is_abstract;
    if child.lazy_init.is_some() {
        target.lazy_init = child.lazy_init;
    }
    target.role = child.role;
    target.synthetic = child.synthetic;
    if child.factory_bean_name.is_some() {
        target.factory_bean_name = child.factory_bean_name.clone();
    }
    if child.factory_method_name.is_some() {
        target.factory_method_name = child.factory_method_name.clone();
    }

    target.autowire_mode = child.autowire_mode;
    target.dependency_check = child.dependency_check;
    if child.depends_on.is_some() {
        target.depends_on = child.depends_on.clone();
    }
    if child.autowire_candidate.is_some() {
        target.autowire_candidate = child.autowire_candidate;
    }
    if child.primary.is_some() {
        target.primary = child.primary;
    }
    for (kind, qualifier) in &child.qualifiers {
        target.qualifiers.insert(kind.clone(), qualifier.clone());
    }
    if child.non_public_access_allowed.is_some() {
        target.non_public_access_allowed = child.non_public_access_allowed;
    }
    if child.lenient_constructor_resolution.is_some() {
        target.lenient_constructor_resolution = child.lenient_constructor_resolution;
    }

    target.constructor_args.merge_from(&child.constructor_args);
    target.property_values.merge_from(&child.property_values);
    target.method_overrides.merge_from(&child.method_overrides);

    if child.init_method.is_some() {
        target.init_method = child.init_method.clone();
    }
    target.enforce_init_method = child.enforce_init_method;
    if child.destroy_method.is_some() {
        target.destroy_method = child.destroy_method.clone();
    }
    target.enforce_destroy_method = child.enforce_destroy_method;

    if child.description.is_some() {
        target.description = child.description.clone();
    }
    if child.resource_description.is_some() {
        target.resource_description = child.resource_description.clone();
    }
}

/// Merges definitions and caches the results per bean name.
#[derive(Debug)]
pub(crate) struct DefinitionMerger {
    cache: DashMap<String, Arc<ResolvedDefinition>>,
    caching: bool,
}

impl DefinitionMerger {
    pub fn new(caching: bool) -> Self {
        Self {
            cache: DashMap::new(),
            caching,
        }
    }

    /// The cached, non-stale merge for `name`.
    pub fn cached(&self, name: &str) -> Option<Arc<ResolvedDefinition>> {
        self.cache
            .get(name)
            .map(|m| m.value().clone())
            .filter(|m| !m.is_stale())
    }

    /// Merges the locally registered definition `name`.
    ///
    /// # Errors
    /// [`ContainerError::NoSuchBean`] if `name` is not registered locally;
    /// [`ContainerError::DefinitionStore`] if its parent chain cannot be
    /// resolved or is circular.
    pub fn merged(
        &self,
        name: &str,
        registry: &DefinitionRegistry,
        parent: Option<&Arc<Container>>,
    ) -> Result<Arc<ResolvedDefinition>> {
        if let Some(cached) = self.cached(name) {
            return Ok(cached);
        }
        let definition = registry
            .get(name)
            .ok_or_else(|| ContainerError::no_such_bean_named(name))?;

        let mut chain = vec![name.to_string()];
        let merged = Arc::new(self.merge(name, &definition, None, registry, parent, &mut chain)?);
        if self.caching {
            self.cache.insert(name.to_string(), Arc::clone(&merged));
        }
        trace!(bean = %name, "Merged bean definition");
        Ok(merged)
    }

    /// Merges an inner definition declared inside `containing`. Never cached.
    pub fn merge_inner(
        &self,
        name: &str,
        definition: &BeanDefinition,
        containing: &ResolvedDefinition,
        registry: &DefinitionRegistry,
        parent: Option<&Arc<Container>>,
    ) -> Result<ResolvedDefinition> {
        let mut chain = vec![name.to_string()];
        self.merge(name, definition, Some(containing), registry, parent, &mut chain)
    }

    fn merge(
        &self,
        name: &str,
        definition: &BeanDefinition,
        containing: Option<&ResolvedDefinition>,
        registry: &DefinitionRegistry,
        parent: Option<&Arc<Container>>,
        chain: &mut Vec<String>,
    ) -> Result<ResolvedDefinition> {
        let mut merged = match definition.parent_name() {
            None => definition.clone(),
            Some(parent_name) => {
                let parent_name = registry.canonical_name(parent_name);
                let mut base = self
                    .parent_definition(name, &parent_name, registry, parent, chain)
                    .map_err(|e| e.with_resource(definition.resource_description()))?;
                override_from(&mut base, definition);
                base
            }
        };

        merged.parent_name = None;
        if merged.scope.is_none() {
            merged.scope = Some(SINGLETON.to_string());
        }
        // An inner bean cannot outlive the bean it belongs to.
        if let Some(containing) = containing {
            if !containing.is_singleton() && merged.is_singleton() {
                merged.scope = containing.scope.clone();
            }
        }
        Ok(ResolvedDefinition::new(merged))
    }

    fn parent_definition(
        &self,
        name: &str,
        parent_name: &str,
        registry: &DefinitionRegistry,
        parent: Option<&Arc<Container>>,
        chain: &mut Vec<String>,
    ) -> Result<BeanDefinition> {
        // A definition naming itself as parent refers to the parent container.
        if parent_name == name {
            return match parent {
                Some(parent) => Ok(parent.merged_definition(parent_name)?.definition().clone()),
                None => Err(ContainerError::definition_store(
                    name,
                    format!("parent name '{parent_name}' is equal to bean name '{name}': cannot be resolved without a parent container"),
                )),
            };
        }

        if chain.iter().any(|n| n == parent_name) {
            let mut cycle = chain.clone();
            cycle.push(parent_name.to_string());
            return Err(ContainerError::definition_store(
                name,
                format!("circular parent relationship: {}", render_chain(&cycle)),
            ));
        }

        if let Some(local) = registry.get(parent_name) {
            if let Some(cached) = self.cached(parent_name) {
                return Ok(cached.definition().clone());
            }
            chain.push(parent_name.to_string());
            let merged = self.merge(parent_name, &local, None, registry, parent, chain);
            chain.pop();
            let merged = Arc::new(merged?);
            if self.caching {
                self.cache.insert(parent_name.to_string(), Arc::clone(&merged));
            }
            return Ok(merged.definition().clone());
        }

        match parent {
            Some(parent) => parent
                .merged_definition(parent_name)
                .map(|m| m.definition().clone())
                .map_err(|e| unresolvable_parent(name, parent_name, &e)),
            None => Err(unresolvable_parent(
                name,
                parent_name,
                &ContainerError::no_such_bean_named(parent_name),
            )),
        }
    }

    /// Drops the cached merge for `name`, marking it stale for holders.
    pub fn clear(&self, name: &str) {
        if let Some((_, merged)) = self.cache.remove(name) {
            merged.mark_stale();
        }
    }

    /// Drops cached merges for which `keep` returns `false`.
    pub fn clear_unless(&self, keep: impl Fn(&str) -> bool) {
        self.cache.retain(|name, merged| {
            let retain = keep(name.as_str());
            if !retain {
                merged.mark_stale();
            }
            retain
        });
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cached(name).is_some()
    }
}

fn unresolvable_parent(name: &str, parent_name: &str, cause: &ContainerError) -> ContainerError {
    ContainerError::definition_store(
        name,
        format!("could not resolve parent bean definition '{parent_name}': {cause}"),
    )
}
