//! Constructor and factory-method resolution.
//!
//! Picks the executable to instantiate a bean with and builds its argument
//! list from the definition's constructor arguments, explicit `get_bean`
//! arguments and, when autowiring applies, the dependency resolver:
//!
//! 1. candidates are ordered public first, then by descending parameter count
//! 2. for each candidate an argument array is built; candidates that cannot
//!    be satisfied are skipped and their failure kept
//! 3. the candidate with the lowest type-difference weight wins; equal
//!    weights are ambiguous unless the definition is lenient
//! 4. the choice is cached on the resolved definition, with arguments
//!    either fully resolved or prepared for re-resolution
//!
//! Static and instance factory methods go through the same steps.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::bean::{Bean, BeanClass, Executable, ExecutableKind, Instance};
use crate::container::Container;
use crate::convert::{is_assignable, type_difference_weight};
use crate::definition::{ArgValue, AutowireMode};
use crate::descriptor::DependencyDescriptor;
use crate::error::{AmbiguousConstructorError, ContainerError, NoMatchingConstructorError, Result};
use crate::merge::ResolvedDefinition;
use crate::path::CreationPath;
use crate::value::{Args, ParamType, Value, ValueSpec};

/// The executable chosen for a definition, cached for later instances.
#[derive(Clone)]
pub(crate) struct ConstructorCache {
    pub executable: Arc<Executable>,
    pub args: CachedArgs,
}

#[derive(Clone)]
pub(crate) enum CachedArgs {
    /// Every argument is a fixed value.
    Resolved(Vec<Value>),
    /// Some arguments must be resolved again for every instance.
    Prepared(Vec<PreparedArg>),
}

#[derive(Clone)]
pub(crate) enum PreparedArg {
    Resolved(Value),
    /// A definition value referring to other beans.
    Spec(ValueSpec),
    Autowired,
}

/// A definition constructor argument with its value resolved once.
struct ResolvedArg<'d> {
    arg: &'d ArgValue,
    value: Value,
}

#[derive(Default)]
struct ResolvedArgs<'d> {
    indexed: BTreeMap<usize, ResolvedArg<'d>>,
    generic: Vec<ResolvedArg<'d>>,
}

impl ResolvedArgs<'_> {
    fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    fn indexed_for(&self, index: usize, ty: ParamType, name: Option<&str>) -> Option<&ResolvedArg<'_>> {
        self.indexed
            .get(&index)
            .filter(|r| r.arg.ty.is_none_or(|t| t == ty))
            .filter(|r| r.arg.name.is_none() || r.arg.name.as_deref() == name)
    }

    /// Finds an unused generic argument: one pinned to this type or name
    /// first, then an unpinned one whose value fits as-is, then (if `any`)
    /// whatever is left.
    fn generic_for(&self, ty: ParamType, name: Option<&str>, used: &HashSet<usize>, any: bool) -> Option<(usize, &ResolvedArg<'_>)> {
        let unused = || {
            self.generic
                .iter()
                .enumerate()
                .filter(|(i, _)| !used.contains(i))
        };
        unused()
            .find(|(_, r)| {
                (r.arg.ty.is_some() || r.arg.name.is_some())
                    && r.arg.ty.is_none_or(|t| t == ty)
                    && (r.arg.name.is_none() || r.arg.name.as_deref() == name)
            })
            .or_else(|| {
                unused().find(|(_, r)| r.arg.ty.is_none() && r.arg.name.is_none() && is_assignable(&ty, &r.value))
            })
            .or_else(|| if any { unused().next() } else { None })
    }
}

/// Arguments built for one candidate.
struct ArgsHolder {
    raw: Vec<Value>,
    converted: Vec<Value>,
    prepared: Vec<PreparedArg>,
    needs_resolution: bool,
    autowired: Vec<String>,
}

impl ArgsHolder {
    fn explicit(values: Vec<Value>) -> Self {
        Self {
            raw: values.clone(),
            converted: values,
            prepared: Vec::new(),
            needs_resolution: false,
            autowired: Vec::new(),
        }
    }

    /// Lower is better. The raw (unconverted) match wins over an equally
    /// good converted one.
    fn weight(&self, types: &[ParamType]) -> i64 {
        let converted = type_difference_weight(types, &self.converted);
        let raw = type_difference_weight(types, &self.raw) - 1024;
        raw.min(converted)
    }

    fn into_cache(self, executable: Arc<Executable>) -> ConstructorCache {
        let args = if self.needs_resolution {
            CachedArgs::Prepared(self.prepared)
        } else {
            CachedArgs::Resolved(self.converted)
        };
        ConstructorCache { executable, args }
    }
}

pub(crate) struct ConstructorResolver<'c> {
    container: &'c Container,
}

impl<'c> ConstructorResolver<'c> {
    pub fn new(container: &'c Container) -> Self {
        Self { container }
    }

    /// Instantiates `class` through one of its constructors.
    pub fn autowire_constructor(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        class: &Arc<BeanClass>,
        explicit: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        let candidates: Vec<Arc<Executable>> = class
            .constructors()
            .iter()
            .filter(|c| c.is_public() || definition.is_non_public_access_allowed())
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(ContainerError::NoMatchingConstructor(NoMatchingConstructorError {
                bean: name.to_string(),
                class: class.name().to_string(),
                message: "no accessible constructor declared".to_string(),
                causes: Vec::new(),
            }));
        }
        self.instantiate(name, definition, class, candidates, None, explicit, path)
    }

    /// Instantiates through a static factory method of the definition's
    /// class, or an instance factory method of its factory bean.
    pub fn instantiate_using_factory_method(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        explicit: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        let method = definition.factory_method_name().ok_or_else(|| {
            ContainerError::definition_store(name, "no factory method configured")
        })?;

        let (factory_class, target, kind) = match definition.factory_bean_name() {
            Some(factory_bean) => {
                if factory_bean == name {
                    return Err(ContainerError::definition_store(
                        name,
                        "factory-bean reference points back to the same bean definition",
                    )
                    .with_resource(definition.resource_description()));
                }
                let factory = self.container.do_get_bean(factory_bean, None, None, path)?;
                self.container.singletons.graph().register_dependent(factory_bean, name);
                (
                    Arc::clone(factory.class()),
                    Some(factory.instance().clone()),
                    ExecutableKind::InstanceFactory,
                )
            }
            None => {
                let class = definition.class().ok_or_else(|| {
                    ContainerError::definition_store(
                        name,
                        "bean definition declares neither a bean class nor a factory-bean reference",
                    )
                })?;
                (Arc::clone(class), None, ExecutableKind::StaticFactory)
            }
        };

        let candidates: Vec<Arc<Executable>> = factory_class
            .factory_methods_named(method)
            .into_iter()
            .filter(|m| m.kind() == kind)
            .filter(|m| m.is_public() || definition.is_non_public_access_allowed())
            .collect();
        if candidates.is_empty() {
            let which = if kind == ExecutableKind::StaticFactory { "static" } else { "instance" };
            return Err(ContainerError::NoMatchingConstructor(NoMatchingConstructorError {
                bean: name.to_string(),
                class: factory_class.name().to_string(),
                message: format!("no {which} factory method '{method}' declared"),
                causes: Vec::new(),
            }));
        }
        self.instantiate(name, definition, &factory_class, candidates, target.as_ref(), explicit, path)
    }

    #[allow(clippy::too_many_arguments)]
    fn instantiate(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        class: &Arc<BeanClass>,
        mut candidates: Vec<Arc<Executable>>,
        target: Option<&Instance>,
        explicit: Option<&[Value]>,
        path: CreationPath<'_>,
    ) -> Result<Bean> {
        if explicit.is_none() {
            if let Some(cache) = definition.cached_constructor() {
                trace!(bean = %name, executable = %cache.executable.signature(), "Using cached constructor");
                let args = self.resolve_cached(name, definition, &cache, path)?;
                return self.invoke(name, class, &cache.executable, target, args);
            }
        }

        if explicit.is_none() && candidates.len() == 1 && !definition.has_constructor_args() && candidates[0].param_count() == 0 {
            let only = Arc::clone(&candidates[0]);
            definition.store_constructor(ConstructorCache {
                executable: Arc::clone(&only),
                args: CachedArgs::Resolved(Vec::new()),
            });
            return self.invoke(name, class, &only, target, Vec::new());
        }

        // A lone constructor with parameters is autowired.
        let autowiring = definition.autowire_mode() == AutowireMode::Constructor
            || (candidates.len() == 1 && !definition.has_constructor_args());

        let resolved = match explicit {
            Some(_) => ResolvedArgs::default(),
            None => self.resolve_constructor_arguments(name, definition, path)?,
        };
        let min_args = match explicit {
            Some(values) => values.len(),
            None => definition.constructor_args().min_arg_count(),
        };

        candidates.sort_by(|a, b| {
            b.is_public()
                .cmp(&a.is_public())
                .then(b.param_count().cmp(&a.param_count()))
        });

        let mut best: Option<(Arc<Executable>, ArgsHolder)> = None;
        let mut best_weight = i64::MAX;
        let mut ambiguous: Vec<Arc<Executable>> = Vec::new();
        let mut causes: Vec<ContainerError> = Vec::new();

        for candidate in &candidates {
            let count = candidate.param_count();
            if let Some((_, ref holder)) = best {
                if holder.converted.len() > count {
                    // Already found a greedy match that can be satisfied.
                    break;
                }
            }
            if count < min_args {
                continue;
            }

            let attempt = match explicit {
                Some(values) if values.len() != count => continue,
                Some(values) => self.convert_explicit(name, candidate, values),
                None => self.create_argument_array(name, definition, &resolved, candidate, autowiring, path),
            };
            let holder = match attempt {
                Ok(holder) => holder,
                Err(e) => {
                    trace!(bean = %name, candidate = %candidate.signature(), error = %e, "Skipping candidate");
                    causes.push(e);
                    continue;
                }
            };

            let weight = holder.weight(&candidate.param_types());
            if weight < best_weight {
                best = Some((Arc::clone(candidate), holder));
                best_weight = weight;
                ambiguous.clear();
            } else if best.is_some() && weight == best_weight {
                ambiguous.push(Arc::clone(candidate));
            }
        }

        let Some((executable, holder)) = best else {
            return Err(Self::no_match(name, class, causes, explicit));
        };

        if !ambiguous.is_empty() && !definition.is_lenient_constructor_resolution() {
            let mut signatures = vec![executable.signature()];
            signatures.extend(ambiguous.iter().map(|c| c.signature()));
            return Err(ContainerError::AmbiguousConstructor(AmbiguousConstructorError {
                bean: name.to_string(),
                candidates: signatures,
            }));
        }

        for autowired in &holder.autowired {
            self.container.singletons.graph().register_dependent(autowired, name);
            trace!(bean = %name, dependency = %autowired, "Autowired by constructor");
        }
        debug!(bean = %name, executable = %executable.signature(), "Resolved constructor");

        let args = holder.converted.clone();
        if explicit.is_none() {
            definition.store_constructor(holder.into_cache(Arc::clone(&executable)));
        }
        self.invoke(name, class, &executable, target, args)
    }

    fn no_match(name: &str, class: &Arc<BeanClass>, mut causes: Vec<ContainerError>, explicit: Option<&[Value]>) -> ContainerError {
        match causes.pop() {
            Some(mut last) => {
                for earlier in &causes {
                    debug!(bean = %name, error = %earlier, "Constructor candidate failed");
                }
                if let ContainerError::BeanCreation(ref mut e) = last {
                    e.related.extend(causes);
                }
                last
            }
            None => ContainerError::NoMatchingConstructor(NoMatchingConstructorError {
                bean: name.to_string(),
                class: class.name().to_string(),
                message: match explicit {
                    Some(values) => format!("no candidate takes {} explicit arguments", values.len()),
                    None => "check that the constructor arguments match the declared parameters".to_string(),
                },
                causes,
            }),
        }
    }

    fn resolve_constructor_arguments<'d>(
        &self,
        name: &str,
        definition: &'d ResolvedDefinition,
        path: CreationPath<'_>,
    ) -> Result<ResolvedArgs<'d>> {
        let args = definition.constructor_args();
        let mut resolved = ResolvedArgs::default();
        for (index, arg) in args.indexed() {
            let value = self
                .container
                .resolve_value(name, definition, &arg.value, path)
                .map_err(|e| {
                    ContainerError::creation_caused_by(
                        name,
                        format!("cannot resolve constructor argument {index}"),
                        e,
                    )
                })?;
            resolved.indexed.insert(*index, ResolvedArg { arg, value });
        }
        for arg in args.generic() {
            let value = self
                .container
                .resolve_value(name, definition, &arg.value, path)
                .map_err(|e| ContainerError::creation_caused_by(name, "cannot resolve constructor argument", e))?;
            resolved.generic.push(ResolvedArg { arg, value });
        }
        Ok(resolved)
    }

    fn create_argument_array(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        resolved: &ResolvedArgs<'_>,
        executable: &Executable,
        autowiring: bool,
        path: CreationPath<'_>,
    ) -> Result<ArgsHolder> {
        let count = executable.param_count();
        let mut holder = ArgsHolder {
            raw: Vec::with_capacity(count),
            converted: Vec::with_capacity(count),
            prepared: Vec::with_capacity(count),
            needs_resolution: false,
            autowired: Vec::new(),
        };
        let mut used = HashSet::new();
        let take_any = !autowiring || count == resolved.len();

        for (index, param) in executable.params().iter().enumerate() {
            let ty = param.ty();
            let descriptor = DependencyDescriptor::for_param(param, index);

            let matched = resolved.indexed_for(index, ty, param.name()).or_else(|| {
                resolved
                    .generic_for(ty, param.name(), &used, take_any)
                    .map(|(i, r)| {
                        used.insert(i);
                        r
                    })
            });

            match matched {
                Some(found) => {
                    let converted = self
                        .container
                        .converter
                        .convert(found.value.clone(), &ty, descriptor.injection_point())
                        .map_err(|e| {
                            ContainerError::unsatisfied(
                                name,
                                descriptor.injection_point(),
                                format!(
                                    "could not convert argument value of type [{}] to required type [{ty}]",
                                    found.value.type_description()
                                ),
                                Some(e),
                            )
                        })?;
                    if found.arg.value.references_beans() {
                        holder.needs_resolution = true;
                        holder.prepared.push(PreparedArg::Spec(found.arg.value.clone()));
                    } else {
                        holder.prepared.push(PreparedArg::Resolved(converted.clone()));
                    }
                    holder.raw.push(found.value.clone());
                    holder.converted.push(converted);
                }
                None if autowiring => {
                    let value = self
                        .container
                        .resolve_dependency_at(&descriptor, Some(name), &mut holder.autowired, path)
                        .map_err(|e| {
                            ContainerError::unsatisfied(
                                name,
                                descriptor.injection_point(),
                                format!("no value for parameter of type [{ty}]"),
                                Some(e),
                            )
                        })?;
                    holder.needs_resolution = true;
                    holder.prepared.push(PreparedArg::Autowired);
                    holder.raw.push(value.clone());
                    holder.converted.push(value);
                }
                None => {
                    return Err(ContainerError::unsatisfied(
                        name,
                        descriptor.injection_point(),
                        format!(
                            "Ambiguous argument values for parameter of type [{ty}]: did you specify the correct bean references as arguments?"
                        ),
                        None,
                    )
                    .with_resource(definition.resource_description()));
                }
            }
        }
        Ok(holder)
    }

    fn convert_explicit(&self, name: &str, executable: &Executable, values: &[Value]) -> Result<ArgsHolder> {
        let mut converted = Vec::with_capacity(values.len());
        for (index, (param, value)) in executable.params().iter().zip(values).enumerate() {
            let descriptor = DependencyDescriptor::for_param(param, index);
            let value = self
                .container
                .converter
                .convert(value.clone(), &param.ty(), descriptor.injection_point())
                .map_err(|e| {
                    ContainerError::unsatisfied(name, descriptor.injection_point(), "explicit argument does not fit", Some(e))
                })?;
            converted.push(value);
        }
        let mut holder = ArgsHolder::explicit(values.to_vec());
        holder.converted = converted;
        Ok(holder)
    }

    fn resolve_cached(
        &self,
        name: &str,
        definition: &ResolvedDefinition,
        cache: &ConstructorCache,
        path: CreationPath<'_>,
    ) -> Result<Vec<Value>> {
        let prepared = match cache.args {
            CachedArgs::Resolved(ref values) => return Ok(values.clone()),
            CachedArgs::Prepared(ref prepared) => prepared,
        };

        let mut autowired = Vec::new();
        let mut values = Vec::with_capacity(prepared.len());
        for (index, (arg, param)) in prepared.iter().zip(cache.executable.params()).enumerate() {
            let descriptor = DependencyDescriptor::for_param(param, index);
            let value = match arg {
                PreparedArg::Resolved(value) => value.clone(),
                PreparedArg::Spec(spec) => {
                    let value = self.container.resolve_value(name, definition, spec, path)?;
                    self.container
                        .converter
                        .convert(value, &param.ty(), descriptor.injection_point())
                        .map_err(|e| {
                            ContainerError::unsatisfied(name, descriptor.injection_point(), "could not convert argument value", Some(e))
                        })?
                }
                PreparedArg::Autowired => self
                    .container
                    .resolve_dependency_at(&descriptor, Some(name), &mut autowired, path)
                    .map_err(|e| {
                        ContainerError::unsatisfied(
                            name,
                            descriptor.injection_point(),
                            format!("no value for parameter of type [{}]", param.ty()),
                            Some(e),
                        )
                    })?,
            };
            values.push(value);
        }
        for dependency in &autowired {
            self.container.singletons.graph().register_dependent(dependency, name);
        }
        Ok(values)
    }

    fn invoke(
        &self,
        name: &str,
        class: &Arc<BeanClass>,
        executable: &Executable,
        target: Option<&Instance>,
        args: Vec<Value>,
    ) -> Result<Bean> {
        let instance = executable.invoke(target, &Args::new(args)).map_err(|e| {
            let what = match executable.kind() {
                ExecutableKind::Constructor => "constructor",
                _ => "factory method",
            };
            ContainerError::creation_caused_by(
                name,
                format!("instantiation via {what} {} failed", executable.signature()),
                e,
            )
        })?;
        let class = match executable.kind() {
            ExecutableKind::Constructor => Arc::clone(class),
            _ => executable.returns().cloned().unwrap_or_else(|| Arc::clone(class)),
        };
        Ok(Bean::new(instance, class))
    }
}
