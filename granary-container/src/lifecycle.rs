//! The bean lifecycle: from a resolved definition to a ready instance.
//!
//! ```text
//! before_instantiation ──Some──────────────────────────────┐
//!        │ None                                             │
//! instantiate → inspect definition → expose early reference │
//!        → populate → aware hooks → before_initialization   │
//!        → after_properties_set / init method               │
//!        → after_initialization ◄───────────────────────────┘
//!        → register for destruction
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tracing::{debug, trace};

use granary_support::rendering::suggest_similar;

use crate::bean::{Bean, BeanClass, PropertySpec};
use crate::constructor::ConstructorResolver;
use crate::container::Container;
use crate::definition::{AutowireMode, BeanDefinition, DependencyCheck, PropertyValues};
use crate::descriptor::DependencyDescriptor;
use crate::disposal::DisposalAdapter;
use crate::error::{ContainerError, RawInjectionConflictError, Result};
use crate::intercept::MethodInterceptor;
use crate::merge::ResolvedDefinition;
use crate::path::CreationPath;
use crate::scope::Scope;
use crate::value::{Value, ValueSpec};

/// Init-method name that refers to the structural after-properties-set hook.
pub const AFTER_PROPERTIES_SET: &str = "after_properties_set";

/// Wraps `e` as a creation error of `name`, unless it already is one.
fn creation_failure(name: &str, message: &str, e: ContainerError) -> ContainerError {
    let own = match e {
        ContainerError::BeanCreation(ref inner) => inner.bean == name,
        ContainerError::UnsatisfiedDependency(ref inner) => inner.bean == name,
        ContainerError::CircularCreation(ref inner) => inner.bean == name,
        ContainerError::DefinitionStore(ref inner) => inner.bean == name,
        _ => false,
    };
    if own { e } else { ContainerError::creation_caused_by(name, message, e) }
}

impl Container {
    /// Creates one instance of `name` from its resolved definition.
    pub(crate) fn create_bean(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        args: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        trace!(bean = %name, "Creating instance of bean");
        let resource = definition.resource_description();
        let class = definition.class().cloned();

        self.prepare_method_overrides(name, definition, class.as_ref())
            .map_err(|e| e.with_resource(resource))?;

        if !definition.is_synthetic() {
            if let Some(ref class) = class {
                let processors = self.processors();
                let short_circuit = processors
                    .before_instantiation(class, name)
                    .map_err(|e| creation_failure(name, "post-processing before instantiation failed", e))?;
                if let Some(bean) = short_circuit {
                    debug!(bean = %name, "Instantiation short-circuited by post-processor");
                    return processors
                        .after_initialization(bean, name)
                        .map_err(|e| creation_failure(name, "post-processing after initialization failed", e));
                }
            }
        }

        self.do_create_bean(name, definition, class.as_ref(), args, path)
            .map_err(|e| e.with_resource(resource))
    }

    fn prepare_method_overrides(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        class: Option<&Arc<BeanClass>>,
    ) -> Result<()> {
        if definition.method_overrides().is_empty() {
            return Ok(());
        }
        let Some(class) = class else {
            return Err(ContainerError::definition_store(name, "method overrides require a bean class"));
        };
        for method_override in definition.method_overrides().iter() {
            let method = method_override.method_name();
            if class.overridable_method(method).is_none() {
                return Err(ContainerError::definition_store(
                    name,
                    format!("invalid method override: no overridable method named '{method}' on class [{}]", class.name()),
                ));
            }
        }
        Ok(())
    }

    fn do_create_bean(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        class: Option<&Arc<BeanClass>>,
        args: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        let bean = self.instantiate_bean(name, definition, class, args, path)?;

        definition
            .post_process_once(|| {
                for p in self.processors().iter() {
                    p.inspect_merged_definition(definition, bean.class(), name)?;
                }
                Ok(())
            })
            .map_err(|e| creation_failure(name, "post-processing of merged bean definition failed", e))?;

        let early_exposure = definition.is_singleton()
            && self.settings.allow_circular_references
            && self.singletons.is_in_creation(name);
        if early_exposure {
            trace!(bean = %name, "Eagerly caching bean to allow for resolving potential circular references");
            let processors = self.processors();
            let raw = bean.clone();
            let early_name = name.to_string();
            self.singletons
                .add_early_factory(name, Box::new(move || processors.early_reference(raw, &early_name)));
        }

        self.populate_bean(name, definition, &bean, path)
            .map_err(|e| creation_failure(name, "populating bean properties failed", e))?;
        let mut exposed = self
            .initialize_bean(name, definition, bean.clone())
            .map_err(|e| creation_failure(name, "initialization of bean failed", e))?;

        if early_exposure {
            if let Some(early) = self.singletons.get_singleton(name, false)? {
                if exposed.same(&bean) {
                    exposed = early;
                } else if !self.settings.allow_raw_injection_despite_wrapping {
                    let dependents: Vec<String> = self
                        .singletons
                        .graph()
                        .dependents_of(name)
                        .into_iter()
                        .filter(|d| self.already_created.contains(d))
                        .collect();
                    if !dependents.is_empty() {
                        return Err(ContainerError::RawInjectionConflict(RawInjectionConflictError {
                            bean: name.to_string(),
                            dependents,
                        }));
                    }
                }
            }
        }

        self.register_disposable_if_necessary(name, definition, &exposed)
            .map_err(|e| creation_failure(name, "invalid destruction signature", e))?;
        Ok(exposed)
    }

    fn instantiate_bean(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        class: Option<&Arc<BeanClass>>,
        args: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        let resolver = ConstructorResolver::new(self);
        let bean = if definition.factory_method_name().is_some() {
            resolver.instantiate_using_factory_method(name, definition, args, path)?
        } else {
            let class = class.ok_or_else(|| {
                ContainerError::definition_store(name, "no bean class specified on bean definition")
            })?;
            resolver.autowire_constructor(name, definition, class, args, path)?
        };

        if !definition.method_overrides().is_empty() {
            let hook = bean.class().interceptor_hook().ok_or_else(|| {
                ContainerError::definition_store(
                    name,
                    format!(
                        "class [{}] declares overridable methods but accepts no method injection",
                        bean.class().name()
                    ),
                )
            })?;
            let interceptor = MethodInterceptor::new(
                self.self_ref.clone(),
                name,
                definition.method_overrides().clone(),
                Arc::clone(bean.class()),
            );
            hook(bean.instance(), interceptor)
                .map_err(|e| creation_failure(name, "method injection failed", e))?;
            trace!(bean = %name, "Installed method interceptor");
        }
        Ok(bean)
    }

    // ── Population ──

    fn populate_bean(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        bean: &Bean,
        path: CreationPath<'_>,
    ) -> Result<()> {
        let processors = self.processors();
        if !definition.is_synthetic() {
            for p in processors.iter() {
                if !p.after_instantiation(bean, name)? {
                    trace!(bean = %name, "Property population skipped by post-processor");
                    return Ok(());
                }
            }
        }

        let mut values = definition.property_values().clone();
        match definition.autowire_mode() {
            AutowireMode::ByName => self.autowire_by_name(name, bean, &mut values, path)?,
            AutowireMode::ByType => self.autowire_by_type(name, bean, &mut values, path)?,
            AutowireMode::No | AutowireMode::Constructor => {}
        }

        for p in processors.iter() {
            match p.filter_property_values(values, bean, name)? {
                Some(filtered) => values = filtered,
                None => {
                    trace!(bean = %name, "Property values discarded by post-processor");
                    return Ok(());
                }
            }
        }

        if definition.dependency_check_mode() != DependencyCheck::None {
            self.check_dependencies(name, definition, bean, &values)?;
        }
        if !values.is_empty() {
            self.apply_property_values(name, definition, bean, values, path)?;
        }
        Ok(())
    }

    /// Writable properties of a bean type that no value covers yet.
    fn unsatisfied_non_simple_properties<'b>(bean: &'b Bean, values: &PropertyValues) -> Vec<&'b PropertySpec> {
        bean.class()
            .properties()
            .filter(|p| !p.is_simple() && !values.contains(p.name()) && !p.is_set(bean.instance()))
            .collect()
    }

    fn autowire_by_name(
        &self,
        name: &str,
        bean: &Bean,
        values: &mut PropertyValues,
        path: CreationPath<'_>,
    ) -> Result<()> {
        for property in Self::unsatisfied_non_simple_properties(bean, values) {
            let target = property.name();
            if !self.contains_bean(target) {
                trace!(bean = %name, property = %target, "Not autowiring property by name: no matching bean found");
                continue;
            }
            let collaborator = self.do_get_bean(target, None, None, path)?;
            values.add(target, ValueSpec::Literal(Value::Bean(collaborator)));
            self.singletons
                .graph()
                .register_dependent(&self.canonical_name(target), name);
            trace!(bean = %name, property = %target, "Autowired by name");
        }
        Ok(())
    }

    fn autowire_by_type(
        &self,
        name: &str,
        bean: &Bean,
        values: &mut PropertyValues,
        path: CreationPath<'_>,
    ) -> Result<()> {
        for property in Self::unsatisfied_non_simple_properties(bean, values) {
            let descriptor = DependencyDescriptor::for_property(property);
            let mut autowired = Vec::new();
            let value = self
                .resolve_dependency_at(&descriptor, Some(name), &mut autowired, path)
                .map_err(|e| {
                    ContainerError::unsatisfied(
                        name,
                        descriptor.injection_point(),
                        format!("no unique value for property of type [{}]", property.ty()),
                        Some(e),
                    )
                })?;
            if !value.is_null() {
                values.add(property.name(), ValueSpec::Literal(value));
            }
            for dependency in &autowired {
                self.singletons.graph().register_dependent(dependency, name);
                trace!(bean = %name, property = %property.name(), dependency = %dependency, "Autowired by type");
            }
        }
        Ok(())
    }

    fn check_dependencies(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        bean: &Bean,
        values: &PropertyValues,
    ) -> Result<()> {
        let mode = definition.dependency_check_mode();
        for property in bean.class().properties() {
            if mode.applies_to(property.is_simple()) && !values.contains(property.name()) {
                return Err(ContainerError::unsatisfied(
                    name,
                    format!("property '{}'", property.name()),
                    "set this property value or disable dependency checking for this bean",
                    None,
                ));
            }
        }
        Ok(())
    }

    fn apply_property_values(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        bean: &Bean,
        values: PropertyValues,
        path: CreationPath<'_>,
    ) -> Result<()> {
        let class = bean.class();
        let mut resolved = Vec::with_capacity(values.len());
        for pv in values {
            let property = class.property(&pv.name).ok_or_else(|| {
                let available: Vec<&str> = class.properties().map(PropertySpec::name).collect();
                let suggestions = suggest_similar(&pv.name, &available, 3);
                let hint = if suggestions.is_empty() {
                    String::new()
                } else {
                    format!(" (did you mean {}?)", suggestions.join(", "))
                };
                ContainerError::creation(
                    name,
                    format!(
                        "invalid property '{}' of bean class [{}]: no such writable property{hint}",
                        pv.name,
                        class.name()
                    ),
                )
            })?;
            let value = self
                .resolve_value(name, definition, &pv.value, path)
                .map_err(|e| creation_failure(name, &format!("cannot resolve value of property '{}'", pv.name), e))?;
            resolved.push((property, value));
        }

        for (property, value) in resolved {
            let context = format!("property '{}'", property.name());
            let value = self
                .converter
                .convert(value, &property.ty(), &context)
                .map_err(|e| ContainerError::creation_caused_by(name, format!("error setting {context}"), e))?;
            property
                .set(bean.instance(), value)
                .map_err(|e| ContainerError::creation_caused_by(name, format!("error setting {context}"), e))?;
        }
        Ok(())
    }

    // ── Value resolution ──

    /// Resolves a definition value on behalf of bean `name`: references
    /// become beans (and dependency edges), inner definitions are created.
    pub(crate) fn resolve_value(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        spec: &ValueSpec,
        path: CreationPath<'_>,
    ) -> Result<Value> {
        match spec {
            ValueSpec::Literal(value) => Ok(value.clone()),
            ValueSpec::Ref(target) => {
                let bean = self.do_get_bean(target, None, None, path)?;
                self.singletons
                    .graph()
                    .register_dependent(&self.canonical_name(target), name);
                Ok(Value::Bean(bean))
            }
            ValueSpec::ParentRef(target) => {
                let parent = self.parent.as_ref().ok_or_else(|| {
                    ContainerError::creation(
                        name,
                        format!("cannot resolve reference to bean '{target}' in parent container: no parent container available"),
                    )
                })?;
                Ok(Value::Bean(parent.get_bean(target)?))
            }
            ValueSpec::Inner { name: inner_name, definition: inner } => {
                self.resolve_inner_bean(name, definition, inner_name.as_deref(), inner, path)
            }
            ValueSpec::List(items) => items
                .iter()
                .map(|item| self.resolve_value(name, definition, item, path))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            ValueSpec::Map(entries) => entries
                .iter()
                .map(|(key, item)| Ok((key.clone(), self.resolve_value(name, definition, item, path)?)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Map),
        }
    }

    fn resolve_inner_bean(
        &self,
        outer: &str,
        outer_definition: &ResolvedDefinition,
        inner_name: Option<&str>,
        inner: &BeanDefinition,
        path: CreationPath<'_>,
    ) -> Result<Value> {
        let actual_name = match inner_name {
            Some(n) => n.to_string(),
            None => format!("(inner bean)#{}", self.inner_counter.fetch_add(1, Ordering::Relaxed)),
        };
        let merged = self
            .merger
            .merge_inner(&actual_name, inner, outer_definition, &self.registry, self.parent.as_ref())
            .map_err(|e| creation_failure(outer, &format!("cannot create inner bean '{actual_name}'"), e))?;

        // Edges are only kept for singleton outers; anything else would
        // leave one entry per created instance behind.
        let track = outer_definition.is_singleton();
        for dependency in merged.depends_on_names() {
            if track {
                self.singletons.graph().register_dependent(dependency, &actual_name);
            }
            self.do_get_bean(dependency, None, None, path)?;
        }

        let frame = path.frame(&actual_name, true);
        let bean = self
            .create_bean(&actual_name, &merged, None, frame.path())
            .map_err(|e| creation_failure(outer, &format!("cannot create inner bean '{actual_name}'"), e))?;
        if track {
            self.singletons.graph().register_contained(&actual_name, outer);
        }
        trace!(bean = %outer, inner = %actual_name, "Created inner bean");
        Ok(Value::Bean(bean))
    }

    // ── Initialization ──

    fn initialize_bean(&self, name: &str, definition: &ResolvedDefinition, bean: Bean) -> Result<Bean> {
        self.invoke_aware_methods(name, &bean)?;

        let processors = self.processors();
        let mut wrapped = bean;
        if !definition.is_synthetic() {
            wrapped = processors.before_initialization(wrapped, name)?;
        }

        self.invoke_init_methods(name, definition, &wrapped)
            .map_err(|e| creation_failure(name, "invocation of init method failed", e))?;

        if !definition.is_synthetic() {
            wrapped = processors.after_initialization(wrapped, name)?;
        }
        Ok(wrapped)
    }

    fn invoke_aware_methods(&self, name: &str, bean: &Bean) -> Result<()> {
        let class = bean.class();
        if let Some(name_aware) = class.name_aware() {
            name_aware(bean.instance(), name)?;
        }
        if let Some(container_aware) = class.container_aware() {
            let container = self.self_ref.upgrade().ok_or_else(|| {
                ContainerError::creation(name, "container is being dropped")
            })?;
            container_aware(bean.instance(), &container)?;
        }
        Ok(())
    }

    fn invoke_init_methods(&self, name: &str, definition: &ResolvedDefinition, bean: &Bean) -> Result<()> {
        let class = bean.class();
        let structural = class.after_properties_set_hook();
        if let Some(hook) = structural {
            trace!(bean = %name, "Invoking after_properties_set");
            hook(bean.instance())?;
        }

        let Some(init) = definition.init_method_name() else {
            return Ok(());
        };
        if structural.is_some() && init == AFTER_PROPERTIES_SET {
            return Ok(());
        }
        match class.method(init) {
            Some(method) => {
                trace!(bean = %name, method = %init, "Invoking init method");
                method(bean.instance())
            }
            None if definition.is_enforce_init_method() => Err(ContainerError::definition_store(
                name,
                format!("could not find an init method named '{init}' on bean with name '{name}'"),
            )),
            None => {
                trace!(bean = %name, method = %init, "No default init method found");
                Ok(())
            }
        }
    }

    // ── Destruction registration ──

    fn register_disposable_if_necessary(&self, name: &str, definition: &ResolvedDefinition, bean: &Bean) -> Result<()> {
        let scope = definition.scope();
        if scope.is_prototype() {
            return Ok(());
        }
        let processors = self.processors();
        if !DisposalAdapter::has_destruction(bean, definition, &processors) {
            return Ok(());
        }
        let adapter = DisposalAdapter::new(name, bean.clone(), definition, &processors)?;
        match scope {
            Scope::Custom(scope_name) => {
                let custom = self.scopes.get(&scope_name).map(|s| s.value().clone()).ok_or_else(|| {
                    ContainerError::UnknownScope {
                        bean: name.to_string(),
                        scope: scope_name.clone(),
                    }
                })?;
                custom.register_destruction_callback(
                    name,
                    Box::new(move || {
                        // Failures were logged by the adapter.
                        let _ = adapter.destroy();
                    }),
                );
            }
            _ => self.singletons.register_disposable(name, Arc::new(adapter)),
        }
        Ok(())
    }

    // ── Type prediction ──

    /// The class a bean of this definition will have, without creating it.
    /// Cached on the resolved definition.
    pub(crate) fn predict_bean_type(&self, name: &str, definition: &ResolvedDefinition) -> Option<Arc<BeanClass>> {
        let mut visiting = HashSet::new();
        self.predict_guarded(name, definition, &mut visiting)
    }

    fn predict_guarded(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        visiting: &mut HashSet<String>,
    ) -> Option<Arc<BeanClass>> {
        if let Some(predicted) = definition.predicted_class.get() {
            return predicted.clone();
        }
        if !visiting.insert(name.to_string()) {
            return None;
        }
        let base = self.determine_target_type(definition, visiting);
        let predicted = self.processors().predict_class(base.as_ref(), name).or(base);
        let _ = definition.predicted_class.set(predicted.clone());
        predicted
    }

    fn determine_target_type(
        &self,
        definition: &ResolvedDefinition,
        visiting: &mut HashSet<String>,
    ) -> Option<Arc<BeanClass>> {
        let Some(method) = definition.factory_method_name() else {
            return definition.class().cloned();
        };
        let factory_class = match definition.factory_bean_name() {
            Some(factory_bean) => {
                let factory_bean = self.canonical_name(factory_bean);
                match self.singletons.get_singleton(&factory_bean, false) {
                    Ok(Some(bean)) => Some(Arc::clone(bean.class())),
                    _ => {
                        let merged = self.merged_definition(&factory_bean).ok()?;
                        self.predict_guarded(&factory_bean, &merged, visiting)
                    }
                }
            }
            None => definition.class().cloned(),
        }?;
        factory_class
            .factory_methods_named(method)
            .iter()
            .find_map(|m| m.returns().cloned())
    }
}
