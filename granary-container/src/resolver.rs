//! Dependency resolution: turning a [`DependencyDescriptor`] into a value.
//!
//! Order of precedence for one request:
//! 1. a provider type yields a deferred [`ObjectProvider`], nothing is looked up
//! 2. a value suggested by the candidate resolver (defaults)
//! 3. simple types without a suggestion are unsatisfiable
//! 4. collections collect every eligible candidate in registration order
//! 5. a single bean: resolvable dependencies and eligible beans, then the
//!    tie-breaks primary, then name/alias match
//!
//! Bean names that contributed to a result are reported back so the caller
//! can record them as dependencies for destruction ordering.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::bean::{Bean, BeanClass};
use crate::candidate::CandidateInfo;
use crate::container::Container;
use crate::descriptor::DependencyDescriptor;
use crate::error::{ContainerError, NoUniqueBeanError, Result};
use crate::key::TypeKey;
use crate::path::CreationPath;
use crate::value::{ParamType, Value};

/// Result of [`Container::resolve_dependency`].
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
    pub value: Value,
    /// Beans that contributed to `value`.
    pub bean_names: Vec<String>,
}

/// A bean eligible for an injection point.
struct Candidate {
    name: String,
    /// Present if the bean already exists (or is a resolvable value).
    bean: Option<Bean>,
    resolvable: bool,
}

impl Container {
    /// Resolves `descriptor` on behalf of `requesting` (which may be `None`
    /// for callers outside any bean).
    ///
    /// # Errors
    /// [`ContainerError::NoSuchBean`] or [`ContainerError::NoUniqueBean`] if
    /// a required dependency cannot be matched to exactly one bean; any
    /// creation error of the matched bean.
    pub fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
    ) -> Result<ResolvedDependency> {
        let mut bean_names = Vec::new();
        let value = self.resolve_dependency_at(descriptor, requesting, &mut bean_names, CreationPath::root())?;
        Ok(ResolvedDependency { value, bean_names })
    }

    pub(crate) fn resolve_dependency_at(
        &self,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        autowired: &mut Vec<String>,
        path: CreationPath<'_>,
    ) -> Result<Value> {
        let ty = descriptor.required_type();
        trace!(dependency = %descriptor, requesting = ?requesting, "Resolving dependency");

        if let ParamType::Provider(key) = ty {
            return Ok(Value::Provider(ObjectProvider::new(
                self.self_ref.clone(),
                key,
                descriptor.element(),
                requesting,
            )));
        }

        if let Some(suggested) = self.candidate_resolver.suggested_value(descriptor) {
            return self.converter.convert(suggested, &ty, descriptor.injection_point());
        }

        let required = self.candidate_resolver.is_required(descriptor);
        let key = match ty {
            ParamType::Bean(key) | ParamType::List(key) | ParamType::Map(key) | ParamType::Provider(key) => key,
            _ if required => {
                return Err(ContainerError::no_such_bean_of_type(
                    ty.to_string(),
                    Some(format!("no value configured for {}", descriptor.injection_point())),
                ));
            }
            _ => return Ok(Value::Null),
        };

        if ty.is_multiple() {
            return self.resolve_multiple(ty, key, descriptor, requesting, required, autowired, path);
        }

        let mut candidates = self.find_autowire_candidates(requesting, key, descriptor, false)?;
        if candidates.is_empty() {
            if required {
                return Err(self.no_candidate(key, descriptor));
            }
            return Ok(Value::Null);
        }

        let chosen = if candidates.len() > 1 {
            match self.determine_autowire_candidate(&candidates, descriptor)? {
                Some(index) => candidates.swap_remove(index),
                None if descriptor.unique_or_none => return Ok(Value::Null),
                None => {
                    return Err(ContainerError::NoUniqueBean(NoUniqueBeanError {
                        required: key.short_name(),
                        candidates: candidates.into_iter().map(|c| c.name).collect(),
                        message: Some(format!("for {}", descriptor.injection_point())),
                    }));
                }
            }
        } else {
            candidates.swap_remove(0)
        };

        let bean = match chosen.bean {
            Some(bean) => bean,
            None => self.do_get_bean(&chosen.name, Some(&key), None, path)?,
        };
        if !chosen.resolvable {
            autowired.push(chosen.name);
        }
        Ok(Value::Bean(bean))
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_multiple(
        &self,
        ty: ParamType,
        key: TypeKey,
        descriptor: &DependencyDescriptor,
        requesting: Option<&str>,
        required: bool,
        autowired: &mut Vec<String>,
        path: CreationPath<'_>,
    ) -> Result<Value> {
        let element = descriptor.element();
        let candidates = self.find_autowire_candidates(requesting, key, &element, true)?;
        if candidates.is_empty() && required {
            return Err(self.no_candidate(key, descriptor));
        }

        let mut entries = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let bean = match candidate.bean {
                Some(bean) => bean,
                None => self.do_get_bean(&candidate.name, Some(&key), None, path)?,
            };
            if !candidate.resolvable {
                autowired.push(candidate.name.clone());
            }
            entries.push((candidate.name, Value::Bean(bean)));
        }
        debug!(dependency = %descriptor, matched = entries.len(), "Resolved collection dependency");

        Ok(match ty {
            ParamType::Map(_) => Value::Map(entries),
            _ => Value::List(entries.into_iter().map(|(_, v)| v).collect()),
        })
    }

    fn no_candidate(&self, key: TypeKey, descriptor: &DependencyDescriptor) -> ContainerError {
        ContainerError::no_such_bean_of_type(
            key.short_name(),
            Some(format!(
                "expected at least 1 bean which qualifies as autowire candidate for {}",
                descriptor
            )),
        )
    }

    /// Beans eligible for `descriptor`, in registration order.
    ///
    /// Resolvable dependencies come first. Beans referring back to the
    /// requesting bean are only used when nothing else qualifies, and never
    /// for collections.
    fn find_autowire_candidates(
        &self,
        requesting: Option<&str>,
        key: TypeKey,
        descriptor: &DependencyDescriptor,
        multiple: bool,
    ) -> Result<Vec<Candidate>> {
        let mut result = Vec::new();

        if key == TypeKey::of::<Container>() {
            if let Some(container) = self.self_ref.upgrade() {
                result.push(Candidate {
                    name: "(container)".to_string(),
                    bean: Some(Bean::new(container, BeanClass::of::<Container>())),
                    resolvable: true,
                });
            }
        }
        for entry in self.resolvables.iter() {
            if *entry.key() == key || entry.value().is_assignable_to(&key) {
                result.push(Candidate {
                    name: format!("({})", entry.key().short_name()),
                    bean: Some(entry.value().clone()),
                    resolvable: true,
                });
            }
        }

        let names = self.bean_names_for_type_including_ancestors(&key, true, descriptor.is_eager());
        let mut self_references = Vec::new();
        for name in names {
            if requesting.is_some_and(|r| self.is_self_reference(r, &name)) {
                self_references.push(name);
                continue;
            }
            if self.is_autowire_candidate(&name, descriptor) {
                result.push(self.candidate_entry(name, multiple)?);
            }
        }

        if result.is_empty() && !multiple {
            for name in self_references {
                if self.is_autowire_candidate(&name, descriptor) {
                    trace!(bean = %name, "Falling back to self reference");
                    result.push(self.candidate_entry(name, false)?);
                }
            }
        }
        Ok(result)
    }

    fn candidate_entry(&self, name: String, instantiate: bool) -> Result<Candidate> {
        // Collections instantiate every candidate anyway; single lookups
        // only take what already exists and create the winner later. A
        // candidate still in creation is not asked for an early reference
        // here, since it may lose the tie-break.
        let bean = if instantiate {
            None
        } else {
            self.singletons.get_singleton(&name, false)?
        };
        Ok(Candidate {
            name,
            bean,
            resolvable: false,
        })
    }

    fn is_self_reference(&self, requesting: &str, candidate: &str) -> bool {
        if requesting == candidate {
            return true;
        }
        self.registry.contains(candidate)
            && self
                .merged_definition(candidate)
                .is_ok_and(|m| m.factory_bean_name() == Some(requesting))
    }

    /// Asks the candidate resolver, consulting the container that defines
    /// `name` (this one or an ancestor).
    pub(crate) fn is_autowire_candidate(&self, name: &str, descriptor: &DependencyDescriptor) -> bool {
        let canonical = self.canonical_name(name);
        if self.registry.contains(&canonical) {
            let Ok(merged) = self.merged_definition(&canonical) else {
                return false;
            };
            let aliases = self.registry.aliases_of(&canonical);
            let info = CandidateInfo {
                name: &canonical,
                aliases: &aliases,
                definition: Some(merged.definition()),
            };
            return self.candidate_resolver.is_autowire_candidate(&info, descriptor);
        }
        if self.singletons.contains_singleton(&canonical) {
            let info = CandidateInfo {
                name: &canonical,
                aliases: &[],
                definition: None,
            };
            return self.candidate_resolver.is_autowire_candidate(&info, descriptor);
        }
        match self.parent {
            Some(ref parent) => parent.is_autowire_candidate(name, descriptor),
            None => true,
        }
    }

    /// Index of the candidate that wins the tie-breaks, if any.
    fn determine_autowire_candidate(
        &self,
        candidates: &[Candidate],
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<usize>> {
        if let Some(primary) = self.determine_primary_candidate(candidates, descriptor)? {
            return Ok(Some(primary));
        }
        Ok(candidates.iter().position(|c| {
            c.resolvable
                || descriptor
                    .name()
                    .is_some_and(|wanted| self.matches_bean_name(&c.name, wanted))
        }))
    }

    fn determine_primary_candidate(
        &self,
        candidates: &[Candidate],
        descriptor: &DependencyDescriptor,
    ) -> Result<Option<usize>> {
        let mut primary: Option<usize> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.resolvable || !self.is_primary(&candidate.name) {
                continue;
            }
            match primary {
                None => primary = Some(index),
                Some(current) => {
                    let current_name = &candidates[current].name;
                    let candidate_local = self.contains_bean_definition(&candidate.name);
                    let current_local = self.contains_bean_definition(current_name);
                    if candidate_local && current_local {
                        return Err(ContainerError::NoUniqueBean(NoUniqueBeanError {
                            required: descriptor
                                .bean_type()
                                .map_or_else(|| descriptor.required_type().to_string(), |k| k.short_name()),
                            candidates: candidates.iter().map(|c| c.name.clone()).collect(),
                            message: Some(format!(
                                "more than one 'primary' bean found among candidates: '{current_name}' and '{}'",
                                candidate.name
                            )),
                        }));
                    }
                    if candidate_local {
                        primary = Some(index);
                    }
                }
            }
        }
        Ok(primary)
    }

    fn is_primary(&self, name: &str) -> bool {
        let canonical = self.canonical_name(name);
        if self.registry.contains(&canonical) {
            return self.merged_definition(&canonical).is_ok_and(|m| m.is_primary());
        }
        self.parent.as_ref().is_some_and(|p| p.is_primary(name))
    }

    fn matches_bean_name(&self, candidate: &str, wanted: &str) -> bool {
        candidate == wanted || self.registry.aliases_of(candidate).iter().any(|a| a == wanted)
    }

    /// Names of beans assignable to `key` in this container, in registration
    /// order, followed by manually registered singletons.
    ///
    /// With `allow_eager_init` false, definitions whose factory bean does not
    /// exist yet are skipped rather than having their type predicted through
    /// that factory.
    pub fn bean_names_for_type(&self, key: &TypeKey, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String> {
        let mut names = Vec::new();
        for name in self.registry.names() {
            let Ok(merged) = self.merged_definition(&name) else {
                continue;
            };
            if merged.is_abstract() {
                continue;
            }
            if !allow_eager_init
                && merged
                    .factory_bean_name()
                    .is_some_and(|fb| !self.singletons.contains_singleton(&self.canonical_name(fb)))
            {
                continue;
            }
            if !include_non_singletons && !merged.is_singleton() {
                continue;
            }
            let matches = match self.singletons.get_singleton(&name, false) {
                Ok(Some(bean)) => bean.is_assignable_to(key),
                _ => self
                    .predict_bean_type(&name, &merged)
                    .is_some_and(|class| class.is_assignable_to(key)),
            };
            if matches {
                names.push(name);
            }
        }

        for name in self.singletons.singleton_names() {
            if self.registry.contains(&name) || names.contains(&name) {
                continue;
            }
            if let Ok(Some(bean)) = self.singletons.get_singleton(&name, false) {
                if bean.is_assignable_to(key) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// [`bean_names_for_type`](Self::bean_names_for_type) plus matching
    /// beans of ancestor containers not shadowed locally.
    pub(crate) fn bean_names_for_type_including_ancestors(
        &self,
        key: &TypeKey,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        let mut names = self.bean_names_for_type(key, include_non_singletons, allow_eager_init);
        if let Some(ref parent) = self.parent {
            for name in parent.bean_names_for_type_including_ancestors(key, include_non_singletons, allow_eager_init) {
                if !self.contains_local_bean(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Every bean assignable to `T`, keyed by name in registration order.
    /// Includes ancestors; creates beans as needed.
    pub fn get_beans_of_type<T: ?Sized + 'static>(&self) -> Result<Vec<(String, Arc<T>)>> {
        let key = TypeKey::of::<T>();
        let mut beans = Vec::new();
        for name in self.bean_names_for_type_including_ancestors(&key, true, true) {
            let bean = self.do_get_bean(&name, Some(&key), None, CreationPath::root())?;
            let typed = bean.downcast::<T>().ok_or_else(|| {
                ContainerError::type_mismatch(name.as_str(), key.short_name(), bean.type_key().short_name())
            })?;
            beans.push((name, typed));
        }
        Ok(beans)
    }
}

/// Deferred access to the beans matching an injection point.
///
/// Injected for `Provider<T>` parameters and properties. Nothing is looked
/// up until one of the accessors is called, so a provider can break a
/// circular dependency between constructors.
#[derive(Clone)]
pub struct ObjectProvider {
    container: Weak<Container>,
    key: TypeKey,
    descriptor: DependencyDescriptor,
    requesting: Option<String>,
}

impl ObjectProvider {
    pub(crate) fn new(
        container: Weak<Container>,
        key: TypeKey,
        descriptor: DependencyDescriptor,
        requesting: Option<&str>,
    ) -> Self {
        Self {
            container,
            key,
            descriptor,
            requesting: requesting.map(str::to_string),
        }
    }

    pub fn required_type(&self) -> TypeKey {
        self.key
    }

    fn container(&self) -> Result<Arc<Container>> {
        self.container.upgrade().ok_or_else(|| {
            ContainerError::custom_msg(format!(
                "container behind provider for [{}] has been dropped",
                self.key.short_name()
            ))
        })
    }

    fn resolve(&self, descriptor: &DependencyDescriptor) -> Result<Value> {
        let container = self.container()?;
        let resolved = container.resolve_dependency(descriptor, self.requesting.as_deref())?;
        if let Some(ref requesting) = self.requesting {
            for name in &resolved.bean_names {
                container.singletons.graph().register_dependent(name, requesting);
            }
        }
        Ok(resolved.value)
    }

    /// The unique matching bean.
    ///
    /// # Errors
    /// [`ContainerError::NoSuchBean`] or [`ContainerError::NoUniqueBean`].
    pub fn get(&self) -> Result<Bean> {
        match self.resolve(&self.descriptor)? {
            Value::Bean(bean) => Ok(bean),
            Value::Null => Err(ContainerError::no_such_bean_of_type(
                self.key.short_name(),
                Some(format!("provider for {} found no bean", self.descriptor.injection_point())),
            )),
            other => Err(ContainerError::type_mismatch(
                "provider result",
                self.key.short_name(),
                other.type_description(),
            )),
        }
    }

    /// [`get`](Self::get), viewed as `Arc<T>`.
    pub fn get_as<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        let bean = self.get()?;
        bean.downcast::<T>().ok_or_else(|| {
            ContainerError::type_mismatch("provider result", TypeKey::of::<T>().short_name(), bean.type_key().short_name())
        })
    }

    /// The matching bean, or `None` if there is none. Ambiguity is still an error.
    pub fn get_if_available(&self) -> Result<Option<Bean>> {
        let descriptor = self.descriptor.clone().optional();
        Ok(self.resolve(&descriptor)?.as_bean().cloned())
    }

    /// The matching bean, or `None` if there is none or no unique one.
    pub fn get_if_unique(&self) -> Result<Option<Bean>> {
        let descriptor = self.descriptor.clone().optional().unique_or_none();
        Ok(self.resolve(&descriptor)?.as_bean().cloned())
    }

    /// Every matching bean, in registration order.
    pub fn iter(&self) -> Result<Vec<Bean>> {
        let descriptor = self.descriptor.retyped(ParamType::List(self.key)).optional();
        match self.resolve(&descriptor)? {
            Value::List(items) => Ok(items
                .into_iter()
                .filter_map(|v| v.as_bean().cloned())
                .collect()),
            _ => Ok(Vec::new()),
        }
    }
}

impl fmt::Debug for ObjectProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectProvider<{}>", self.key.short_name())
    }
}
