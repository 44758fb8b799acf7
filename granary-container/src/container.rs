//! # The Container: heart of Granary
//!
//! Holds the definition registry, the singleton registry and every
//! pluggable collaborator, and drives bean retrieval.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Arc<Container> ──parent──> Arc<Container>
//!                                    │
//!                               get_bean(name)
//!                                    │
//!            ┌───────────────────────┼────────────────────────┐
//!        singleton               prototype                custom scope
//!   SingletonRegistry        fresh every call          CustomScope::get
//!            └───────────────────────┼────────────────────────┘
//!                                    ▼
//!                           lifecycle (create_bean)
//! ```
//!
//! # Examples
//! ```rust
//! use granary_container::prelude::*;
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! struct Repository;
//!
//! struct Service {
//!     repository: Mutex<Option<Arc<Repository>>>,
//! }
//!
//! let repository = BeanClass::builder::<Repository>()
//!     .default_constructor(|| Repository)
//!     .build();
//! let service = BeanClass::builder::<Service>()
//!     .default_constructor(|| Service { repository: Mutex::new(None) })
//!     .property("repository", ParamType::bean::<Repository>(), |s, v| {
//!         *s.repository.lock() = v.opt_bean::<Repository>()?;
//!         Ok(())
//!     })
//!     .build();
//!
//! let container = Container::builder()
//!     .definition("repository", BeanDefinition::of_class(repository))
//!     .definition(
//!         "service",
//!         BeanDefinition::of_class(service).property_ref("repository", "repository"),
//!     )
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service: Arc<Service> = container.get_bean_of("service").expect("Failed to get bean");
//! assert!(service.repository.lock().is_some());
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Weak};

use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace};

use granary_support::rendering::suggest_similar;

use crate::bean::{Bean, BeanClass};
use crate::candidate::{AutowireCandidateResolver, QualifierCandidateResolver};
use crate::convert::{SimpleTypeConverter, TypeConverter};
use crate::definition::BeanDefinition;
use crate::descriptor::DependencyDescriptor;
use crate::disposal::DisposalAdapter;
use crate::error::{
    BeanNotOfRequiredTypeError, CircularCreationError, ContainerError, NoSuchBeanError, Requested, Result,
};
use crate::graph::DependsOnValidator;
use crate::key::TypeKey;
use crate::merge::{DefinitionMerger, ResolvedDefinition};
use crate::path::CreationPath;
use crate::processor::{BeanPostProcessor, ProcessorChain};
use crate::registry::DefinitionRegistry;
use crate::scope::{CustomScope, PROTOTYPE, SINGLETON, Scope};
use crate::settings::ContainerSettings;
use crate::singleton::SingletonRegistry;
use crate::source::DefinitionSource;
use crate::value::{ParamType, Value};

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`].
///
/// Registration problems (duplicate names, alias cycles, invalid
/// definitions) surface from [`build()`](ContainerBuilder::build), not from
/// the individual builder calls.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .allow_circular_references(false)
///     .definition("dataSource", BeanDefinition::of_class(data_source))
///     .alias("dataSource", "db")
///     .post_processor(Arc::new(AuditProcessor))
///     .build()?;
/// ```
pub struct ContainerBuilder {
    settings: ContainerSettings,
    parent: Option<Arc<Container>>,
    converter: Arc<dyn TypeConverter>,
    candidate_resolver: Arc<dyn AutowireCandidateResolver>,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
    scopes: Vec<(String, Arc<dyn CustomScope>)>,
    definitions: Vec<(String, BeanDefinition)>,
    aliases: Vec<(String, String)>,
    singletons: Vec<(String, Bean)>,
    resolvables: Vec<(TypeKey, Bean)>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            settings: ContainerSettings::default(),
            parent: None,
            converter: Arc::new(SimpleTypeConverter::new()),
            candidate_resolver: Arc::new(QualifierCandidateResolver),
            processors: Vec::new(),
            scopes: Vec::new(),
            definitions: Vec::new(),
            aliases: Vec::new(),
            singletons: Vec::new(),
            resolvables: Vec::new(),
        }
    }

    // ── Settings ──

    /// Replace all settings at once (e.g. deserialized from a config file).
    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn allow_circular_references(mut self, allow: bool) -> Self {
        self.settings.allow_circular_references = allow;
        self
    }

    pub fn allow_raw_injection_despite_wrapping(mut self, allow: bool) -> Self {
        self.settings.allow_raw_injection_despite_wrapping = allow;
        self
    }

    pub fn allow_definition_overriding(mut self, allow: bool) -> Self {
        self.settings.allow_definition_overriding = allow;
        self
    }

    pub fn cache_definition_metadata(mut self, cache: bool) -> Self {
        self.settings.cache_definition_metadata = cache;
        self
    }

    // ── Collaborators ──

    /// Parent container consulted for names and types not found locally.
    pub fn parent(mut self, parent: Arc<Container>) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn candidate_resolver(mut self, resolver: Arc<dyn AutowireCandidateResolver>) -> Self {
        self.candidate_resolver = resolver;
        self
    }

    pub fn post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Registers a custom scope under `name`.
    pub fn scope(mut self, name: impl Into<String>, scope: Arc<dyn CustomScope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    // ── Beans ──

    pub fn definition(mut self, name: impl Into<String>, definition: BeanDefinition) -> Self {
        self.definitions.push((name.into(), definition));
        self
    }

    pub fn alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    /// Copies every definition and alias of `source`.
    pub fn source(mut self, source: &dyn DefinitionSource) -> Self {
        let names = source.definition_names();
        let description = source.description();
        debug!(source = %description, definitions = names.len(), "Loading bean definitions");
        for name in names {
            if let Some(mut definition) = source.get_definition(&name) {
                if definition.resource_description().is_none() {
                    definition = definition.resource(description.clone());
                }
                self.definitions.push((name, definition));
            }
        }
        self.aliases.extend(source.aliases());
        self
    }

    /// Registers a ready-made singleton instance.
    pub fn singleton(mut self, name: impl Into<String>, bean: Bean) -> Self {
        self.singletons.push((name.into(), bean));
        self
    }

    /// Makes `value` injectable wherever `key` is required, without it
    /// being a named bean.
    pub fn resolvable_dependency(mut self, key: TypeKey, value: Bean) -> Self {
        self.resolvables.push((key, value));
        self
    }

    // ── Build ──

    /// Builds the container and validates declared `depends_on` relations.
    ///
    /// No bean is created here; see [`Container::preinstantiate_singletons`].
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Arc<Container>> {
        info!(
            definitions = self.definitions.len(),
            singletons = self.singletons.len(),
            "Building container"
        );

        let settings = self.settings;
        let container = Arc::new_cyclic(|self_ref| Container {
            self_ref: self_ref.clone(),
            parent: self.parent,
            registry: DefinitionRegistry::new(settings.allow_definition_overriding),
            merger: DefinitionMerger::new(settings.cache_definition_metadata),
            singletons: SingletonRegistry::new(),
            processors: RwLock::new(ProcessorChain::new(self.processors)),
            scopes: DashMap::new(),
            resolvables: DashMap::new(),
            converter: self.converter,
            candidate_resolver: self.candidate_resolver,
            already_created: DashSet::new(),
            inner_counter: AtomicUsize::new(0),
            settings,
        });

        for (name, scope) in self.scopes {
            container.register_scope(&name, scope)?;
        }
        for (name, definition) in self.definitions {
            container.registry.register(&name, definition)?;
        }
        for (name, alias) in self.aliases {
            container.register_alias(&name, &alias)?;
        }
        for (name, bean) in self.singletons {
            container.register_singleton(&name, bean)?;
        }
        for (key, value) in self.resolvables {
            container.register_resolvable_dependency(key, value);
        }

        let declared: HashMap<String, Vec<String>> = container
            .registry
            .names()
            .into_iter()
            .filter_map(|name| {
                let definition = container.registry.get(&name)?;
                if definition.depends_on_names().is_empty() {
                    return None;
                }
                let targets = definition
                    .depends_on_names()
                    .iter()
                    .map(|d| container.canonical_name(d))
                    .collect();
                Some((name, targets))
            })
            .collect();
        DependsOnValidator::new(declared).validate()?;

        info!(definitions = container.registry.len(), "Container built successfully ✓");
        Ok(container)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("settings", &self.settings)
            .field("definitions", &self.definitions.len())
            .field("processors", &self.processors.len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Thread-safe bean container.
///
/// Created by [`ContainerBuilder::build()`]; always handled through an
/// `Arc`. Teardown is explicit: call [`destroy_singletons`](Container::destroy_singletons).
pub struct Container {
    pub(crate) self_ref: Weak<Container>,
    pub(crate) parent: Option<Arc<Container>>,
    pub(crate) settings: ContainerSettings,
    pub(crate) registry: DefinitionRegistry,
    pub(crate) merger: DefinitionMerger,
    pub(crate) singletons: SingletonRegistry,
    processors: RwLock<ProcessorChain>,
    pub(crate) scopes: DashMap<String, Arc<dyn CustomScope>>,
    pub(crate) resolvables: DashMap<TypeKey, Bean>,
    pub(crate) converter: Arc<dyn TypeConverter>,
    pub(crate) candidate_resolver: Arc<dyn AutowireCandidateResolver>,
    /// Names for which creation was attempted at least once.
    pub(crate) already_created: DashSet<String>,
    pub(crate) inner_counter: AtomicUsize,
}

impl Container {
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    // ── Retrieval ──

    /// Returns the bean registered under `name` (or an alias of it),
    /// creating it if its scope requires.
    ///
    /// # Errors
    /// - [`ContainerError::NoSuchBean`] if neither this container nor a
    ///   parent knows `name`
    /// - any creation error, with the full causal chain
    pub fn get_bean(&self, name: &str) -> Result<Bean> {
        self.do_get_bean(name, None, None, CreationPath::root())
    }

    /// Like [`get_bean`](Self::get_bean), viewed as `T`.
    ///
    /// ```rust,ignore
    /// let repository: Arc<dyn Repository> = container.get_bean_of("repository")?;
    /// ```
    pub fn get_bean_of<T: ?Sized + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let bean = self.do_get_bean(name, Some(&key), None, CreationPath::root())?;
        view_as::<T>(name, &bean)
    }

    /// Returns the unique bean assignable to `T`, applying the primary and
    /// name tie-breaks.
    pub fn get_bean_by_type<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let bean = self.get_bean_by_key(&key)?;
        view_as::<T>(key.type_name(), &bean)
    }

    /// Type-erased variant of [`get_bean_by_type`](Self::get_bean_by_type).
    pub fn get_bean_by_key(&self, key: &TypeKey) -> Result<Bean> {
        let descriptor = DependencyDescriptor::new(ParamType::Bean(key.clone()));
        let resolved = self.resolve_dependency(&descriptor, None)?;
        match resolved.value {
            Value::Bean(bean) => Ok(bean),
            other => Err(ContainerError::type_mismatch(
                key.type_name(),
                key.type_name(),
                other.type_description(),
            )),
        }
    }

    /// Creates `name` with explicit constructor or factory-method arguments.
    ///
    /// Only meaningful for beans that are actually created by this call:
    /// prototypes, or a singleton not created yet.
    pub fn get_bean_with_args(&self, name: &str, args: Vec<Value>) -> Result<Bean> {
        self.do_get_bean(name, None, Some(&args), CreationPath::root())
    }

    /// The retrieval state machine shared by every entry point.
    pub(crate) fn do_get_bean(
        &self,
        name: &str,
        required: Option<&TypeKey>,
        args: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        let name = self.canonical_name(name);

        if args.is_none() {
            if let Some(shared) = self.singletons.get_singleton(&name, true)? {
                trace!(bean = %name, "Returning cached instance of singleton bean");
                return check_required_type(&name, shared, required);
            }
        }

        if path.contains_scoped(&name) {
            return Err(ContainerError::CircularCreation(CircularCreationError {
                chain: path.cycle_to(&name),
                bean: name,
            }));
        }

        if !self.registry.contains(&name) {
            return match self.parent {
                Some(ref parent) => parent.do_get_bean(&name, required, args, CreationPath::root()),
                None => Err(self.no_such_bean(&name)),
            };
        }

        self.already_created.insert(name.clone());
        let merged = self.merged_definition(&name)?;
        if merged.is_abstract() {
            return Err(ContainerError::definition_store(
                &name,
                "bean definition is abstract and can only serve as a parent",
            )
            .with_resource(merged.resource_description()));
        }

        self.initialize_depends_on(&name, &merged, path)?;

        let bean = match merged.scope() {
            Scope::Singleton => {
                let created = self.singletons.get_or_create(&name, path, || {
                    let frame = path.frame(&name, false);
                    self.create_bean(&name, &merged, args, frame.path())
                });
                match created {
                    Ok(bean) => bean,
                    Err(e) => {
                        let in_progress = match e {
                            ContainerError::CircularCreation(ref c) => c.bean == name,
                            ContainerError::CreationNotAllowed(_) => true,
                            _ => false,
                        };
                        if !in_progress {
                            self.singletons.destroy_singleton(&name);
                        }
                        return Err(e);
                    }
                }
            }
            Scope::Prototype => {
                let frame = path.frame(&name, true);
                self.create_bean(&name, &merged, args, frame.path())?
            }
            Scope::Custom(scope_name) => {
                let scope = self.custom_scope(&name, &scope_name)?;
                scope.get(&name, &mut || {
                    let frame = path.frame(&name, true);
                    self.create_bean(&name, &merged, args, frame.path())
                })?
            }
        };

        check_required_type(&name, bean, required)
    }

    fn initialize_depends_on(&self, name: &str, merged: &ResolvedDefinition, path: CreationPath<'_>) -> Result<()> {
        let graph = self.singletons.graph();
        for dependency in merged.depends_on_names() {
            let dependency = self.canonical_name(dependency);
            if graph.is_dependent(name, &dependency) {
                return Err(ContainerError::creation(
                    name,
                    format!("Circular depends-on relationship between '{name}' and '{dependency}'"),
                )
                .with_resource(merged.resource_description()));
            }
            graph.register_dependent(&dependency, name);
            trace!(bean = %name, depends_on = %dependency, "Initializing depends-on bean");
            if let Err(e) = self.do_get_bean(&dependency, None, None, path) {
                return Err(match e {
                    ContainerError::NoSuchBean(_) => ContainerError::creation_caused_by(
                        name,
                        format!("'{name}' depends on missing bean '{dependency}'"),
                        e,
                    )
                    .with_resource(merged.resource_description()),
                    other => other,
                });
            }
        }
        Ok(())
    }

    fn custom_scope(&self, name: &str, scope_name: &str) -> Result<Arc<dyn CustomScope>> {
        self.scopes
            .get(scope_name)
            .map(|s| s.value().clone())
            .ok_or_else(|| ContainerError::UnknownScope {
                bean: name.to_string(),
                scope: scope_name.to_string(),
            })
    }

    fn no_such_bean(&self, name: &str) -> ContainerError {
        let mut known = self.registry.names();
        known.extend(self.singletons.singleton_names());
        known.sort();
        known.dedup();
        let available: Vec<&str> = known.iter().map(String::as_str).collect();
        ContainerError::NoSuchBean(NoSuchBeanError {
            requested: Requested::Name(name.to_string()),
            message: None,
            suggestions: suggest_similar(name, &available, 3),
        })
    }

    // ── Queries ──

    /// Returns `true` if a bean or definition named `name` exists here or in
    /// a parent.
    pub fn contains_bean(&self, name: &str) -> bool {
        self.contains_local_bean(name) || self.parent.as_ref().is_some_and(|p| p.contains_bean(name))
    }

    /// Like [`contains_bean`](Self::contains_bean), ignoring parents.
    pub fn contains_local_bean(&self, name: &str) -> bool {
        let name = self.canonical_name(name);
        self.singletons.contains_singleton(&name) || self.registry.contains(&name)
    }

    pub fn contains_bean_definition(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// # Errors
    /// [`ContainerError::NoSuchBean`] if `name` is unknown.
    pub fn is_singleton(&self, name: &str) -> Result<bool> {
        let name = self.canonical_name(name);
        if self.singletons.contains_singleton(&name) {
            return Ok(true);
        }
        if self.registry.contains(&name) {
            return Ok(self.merged_definition(&name)?.is_singleton());
        }
        match self.parent {
            Some(ref parent) => parent.is_singleton(&name),
            None => Err(self.no_such_bean(&name)),
        }
    }

    /// # Errors
    /// [`ContainerError::NoSuchBean`] if `name` is unknown.
    pub fn is_prototype(&self, name: &str) -> Result<bool> {
        let name = self.canonical_name(name);
        if self.registry.contains(&name) {
            return Ok(self.merged_definition(&name)?.is_prototype());
        }
        if self.singletons.contains_singleton(&name) {
            return Ok(false);
        }
        match self.parent {
            Some(ref parent) => parent.is_prototype(&name),
            None => Err(self.no_such_bean(&name)),
        }
    }

    /// The class of the bean named `name`, without creating it.
    ///
    /// `Ok(None)` if the type cannot be determined up front (for instance a
    /// factory method without a declared return class).
    pub fn get_type(&self, name: &str) -> Result<Option<Arc<BeanClass>>> {
        let name = self.canonical_name(name);
        if let Some(bean) = self.singletons.get_singleton(&name, false)? {
            return Ok(Some(Arc::clone(bean.class())));
        }
        if self.registry.contains(&name) {
            let merged = self.merged_definition(&name)?;
            return Ok(self.predict_bean_type(&name, &merged));
        }
        match self.parent {
            Some(ref parent) => parent.get_type(&name),
            None => Err(self.no_such_bean(&name)),
        }
    }

    // ── Singletons ──

    /// Registers an already created object as a singleton.
    ///
    /// # Errors
    /// [`ContainerError::DefinitionStore`] if a singleton of that name exists.
    pub fn register_singleton(&self, name: &str, bean: Bean) -> Result<()> {
        self.singletons.register_singleton(name, bean)
    }

    /// Eagerly creates every non-abstract, non-lazy singleton, in
    /// registration order.
    #[instrument(skip(self))]
    pub fn preinstantiate_singletons(&self) -> Result<()> {
        let names = self.registry.names();
        debug!(definitions = names.len(), "Pre-instantiating singletons");
        for name in names {
            let merged = self.merged_definition(&name)?;
            if !merged.is_abstract() && merged.is_singleton() && !merged.is_lazy_init() {
                self.get_bean(&name)?;
            }
        }
        Ok(())
    }

    /// Destroys all singletons, dependents before their dependencies.
    /// Failures are logged, never propagated.
    pub fn destroy_singletons(&self) {
        self.singletons.destroy_singletons();
    }

    /// Destroys one singleton and, first, everything depending on it.
    pub fn destroy_singleton(&self, name: &str) {
        self.singletons.destroy_singleton(&self.canonical_name(name));
    }

    /// Runs the destruction callbacks of `bean`, an instance of `name` the
    /// caller owns (typically a prototype).
    pub fn destroy_bean(&self, name: &str, bean: Bean) -> Result<()> {
        let name = self.canonical_name(name);
        let merged = self.merged_definition(&name)?;
        let processors = self.processors();
        if !DisposalAdapter::has_destruction(&bean, &merged, &processors) {
            return Ok(());
        }
        DisposalAdapter::new(&name, bean, &merged, &processors)?.destroy()
    }

    /// Removes `name` from its custom scope and destroys the instance, if any.
    ///
    /// # Errors
    /// [`ContainerError::DefinitionStore`] if `name` is a singleton or prototype.
    pub fn destroy_scoped_bean(&self, name: &str) -> Result<()> {
        let name = self.canonical_name(name);
        let merged = self.merged_definition(&name)?;
        let Scope::Custom(scope_name) = merged.scope() else {
            return Err(ContainerError::definition_store(
                &name,
                "cannot destroy a scoped instance of a singleton or prototype bean",
            ));
        };
        let scope = self.custom_scope(&name, &scope_name)?;
        match scope.remove(&name) {
            Some(bean) => {
                debug!(bean = %name, scope = %scope_name, "Destroying scoped bean");
                self.destroy_bean(&name, bean)
            }
            None => Ok(()),
        }
    }

    // ── Definitions ──

    /// Registers (or, if allowed, replaces) a definition at runtime.
    ///
    /// Replacing resets the merged metadata of the name and of every child
    /// definition, and destroys an existing singleton of that name.
    pub fn register_definition(&self, name: &str, definition: BeanDefinition) -> Result<()> {
        let previous = self.registry.register(name, definition)?;
        if previous.is_some() || self.singletons.contains_singleton(name) {
            self.reset_definition(name);
        }
        Ok(())
    }

    pub fn remove_definition(&self, name: &str) -> Result<()> {
        self.registry.remove(name)?;
        self.reset_definition(name);
        Ok(())
    }

    fn reset_definition(&self, name: &str) {
        let mut visited = HashSet::new();
        self.reset_definition_guarded(name, &mut visited);
    }

    fn reset_definition_guarded(&self, name: &str, visited: &mut HashSet<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }
        debug!(bean = %name, "Resetting bean definition");
        self.merger.clear(name);
        self.singletons.destroy_singleton(name);
        for p in self.processors().iter() {
            p.reset_definition(name);
        }
        for other in self.registry.names() {
            let is_child = self
                .registry
                .get(&other)
                .and_then(|d| d.parent_name().map(|p| self.canonical_name(p)))
                .is_some_and(|p| p == name);
            if is_child {
                self.reset_definition_guarded(&other, visited);
            }
        }
    }

    pub fn get_definition(&self, name: &str) -> Option<Arc<BeanDefinition>> {
        self.registry.get(&self.canonical_name(name))
    }

    /// The merged view of `name`, looked up locally first, then in parents.
    pub fn merged_definition(&self, name: &str) -> Result<Arc<ResolvedDefinition>> {
        let name = self.canonical_name(name);
        if !self.registry.contains(&name) {
            if let Some(ref parent) = self.parent {
                return parent.merged_definition(&name);
            }
        }
        self.merger.merged(&name, &self.registry, self.parent.as_ref())
    }

    /// Definition names in registration order.
    pub fn definition_names(&self) -> Vec<String> {
        self.registry.names()
    }

    pub fn definition_count(&self) -> usize {
        self.registry.len()
    }

    /// Drops merged metadata of beans not created yet.
    pub fn clear_metadata_cache(&self) {
        self.merger.clear_unless(|name| self.already_created.contains(name));
    }

    // ── Aliases ──

    pub fn canonical_name(&self, name: &str) -> String {
        self.registry.canonical_name(name)
    }

    pub fn register_alias(&self, name: &str, alias: &str) -> Result<()> {
        self.registry.register_alias(name, alias)
    }

    pub fn remove_alias(&self, alias: &str) -> Result<()> {
        self.registry.remove_alias(alias)
    }

    pub fn get_aliases(&self, name: &str) -> Vec<String> {
        self.registry.aliases_of(&self.canonical_name(name))
    }

    // ── Configuration ──

    pub fn add_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut chain = self.processors.write();
        *chain = chain.with(processor);
    }

    /// Registers a custom scope.
    ///
    /// # Errors
    /// The built-in `singleton` and `prototype` scopes cannot be replaced.
    pub fn register_scope(&self, name: &str, scope: Arc<dyn CustomScope>) -> Result<()> {
        if name == SINGLETON || name == PROTOTYPE || name.is_empty() {
            return Err(ContainerError::custom_msg(format!(
                "cannot replace the built-in '{name}' scope\n  Hint: pick another scope name"
            )));
        }
        if self.scopes.insert(name.to_string(), scope).is_some() {
            debug!(scope = %name, "Replaced custom scope");
        } else {
            debug!(scope = %name, "Registered custom scope");
        }
        Ok(())
    }

    pub fn register_resolvable_dependency(&self, key: TypeKey, value: Bean) {
        trace!(dependency = %key, "Registered resolvable dependency");
        self.resolvables.insert(key, value);
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.settings
    }

    pub fn parent(&self) -> Option<&Arc<Container>> {
        self.parent.as_ref()
    }

    /// A snapshot of the post-processor chain.
    pub(crate) fn processors(&self) -> ProcessorChain {
        self.processors.read().clone()
    }
}

fn check_required_type(name: &str, bean: Bean, required: Option<&TypeKey>) -> Result<Bean> {
    match required {
        Some(key) if !bean.is_assignable_to(key) => {
            Err(ContainerError::BeanNotOfRequiredType(BeanNotOfRequiredTypeError {
                bean: name.to_string(),
                required: key.type_name().to_string(),
                actual: bean.class().name().to_string(),
            }))
        }
        _ => Ok(bean),
    }
}

fn view_as<T: ?Sized + 'static>(name: &str, bean: &Bean) -> Result<Arc<T>> {
    bean.downcast::<T>().ok_or_else(|| {
        ContainerError::BeanNotOfRequiredType(BeanNotOfRequiredTypeError {
            bean: name.to_string(),
            required: std::any::type_name::<T>().to_string(),
            actual: bean.class().name().to_string(),
        })
    })
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("definitions", &self.registry.len())
            .field("singletons", &self.singletons.singleton_count())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::bean::{Bean, BeanClass, ParamSpec};
    pub use crate::definition::{AutowireMode, BeanDefinition, DependencyCheck};
    pub use crate::descriptor::DependencyDescriptor;
    pub use crate::error::{ContainerError, Result};
    pub use crate::intercept::{MethodInterceptor, MethodReplacer};
    pub use crate::key::TypeKey;
    pub use crate::processor::BeanPostProcessor;
    pub use crate::resolver::ObjectProvider;
    pub use crate::scope::{CustomScope, MapScope, Scope};
    pub use crate::settings::ContainerSettings;
    pub use crate::value::{Args, ParamType, Value, ValueSpec};
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
