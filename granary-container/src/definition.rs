//! Declarative bean descriptions.
//!
//! A [`BeanDefinition`] says *what* to build: the class, the scope, the
//! constructor arguments and property values, the factory to use, lifecycle
//! method names and autowiring rules. Definitions are plain data; they are
//! registered by name, may inherit from a parent definition, and are merged
//! into a [`ResolvedDefinition`](crate::merge::ResolvedDefinition) the first
//! time they are used.
//!
//! Fields a child may leave unset are `Option`s, so that merging can tell
//! "explicitly set" from "inherit".

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bean::BeanClass;
use crate::error::{ContainerError, Result};
use crate::scope::{PROTOTYPE, SINGLETON};
use crate::value::{ParamType, ValueSpec};

/// Destroy-method name asking the container to pick `close` or `shutdown`.
pub const INFER_METHOD: &str = "(inferred)";

/// Default qualifier kind.
pub const QUALIFIER: &str = "qualifier";

/// How collaborators are found when not configured explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutowireMode {
    #[default]
    No,
    ByName,
    ByType,
    Constructor,
}

/// Which unset properties count as a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyCheck {
    #[default]
    None,
    Objects,
    Simple,
    All,
}

impl DependencyCheck {
    pub(crate) fn applies_to(self, simple: bool) -> bool {
        match self {
            DependencyCheck::None => false,
            DependencyCheck::All => true,
            DependencyCheck::Simple => simple,
            DependencyCheck::Objects => !simple,
        }
    }
}

/// Role hint for tooling; has no effect on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[default]
    Application,
    Support,
    Infrastructure,
}

/// One constructor argument, optionally pinned to a type or parameter name.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgValue {
    pub value: ValueSpec,
    pub ty: Option<ParamType>,
    pub name: Option<String>,
}

impl ArgValue {
    pub fn new(value: ValueSpec) -> Self {
        Self {
            value,
            ty: None,
            name: None,
        }
    }

    pub fn typed(value: ValueSpec, ty: ParamType) -> Self {
        Self {
            ty: Some(ty),
            ..Self::new(value)
        }
    }

    pub fn named(value: ValueSpec, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(value)
        }
    }
}

/// Indexed and generic constructor arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstructorArgs {
    indexed: BTreeMap<usize, ArgValue>,
    generic: Vec<ArgValue>,
}

impl ConstructorArgs {
    pub fn add_indexed(&mut self, index: usize, arg: ArgValue) {
        self.indexed.insert(index, arg);
    }

    /// Adds a generic argument; one with the same name replaces an earlier one.
    pub fn add_generic(&mut self, arg: ArgValue) {
        if let Some(ref name) = arg.name {
            if let Some(existing) = self
                .generic
                .iter_mut()
                .find(|g| g.name.as_deref() == Some(name.as_str()))
            {
                *existing = arg;
                return;
            }
        }
        self.generic.push(arg);
    }

    pub fn indexed(&self) -> &BTreeMap<usize, ArgValue> {
        &self.indexed
    }

    pub fn generic(&self) -> &[ArgValue] {
        &self.generic
    }

    pub fn len(&self) -> usize {
        self.indexed.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexed.is_empty() && self.generic.is_empty()
    }

    /// Minimum parameter count a candidate needs to accept these arguments.
    pub fn min_arg_count(&self) -> usize {
        let highest_index = self.indexed.keys().next_back().map_or(0, |i| i + 1);
        highest_index.max(self.len())
    }

    /// Overlays `other`: same-index entries are replaced, generic entries appended.
    pub fn merge_from(&mut self, other: &ConstructorArgs) {
        for (index, arg) in &other.indexed {
            self.indexed.insert(*index, arg.clone());
        }
        for arg in &other.generic {
            if !self.generic.contains(arg) {
                self.add_generic(arg.clone());
            }
        }
    }
}

/// A named property value.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    pub name: String,
    pub value: ValueSpec,
}

/// Ordered property values; names are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyValues {
    values: Vec<PropertyValue>,
}

impl PropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the value for `name`.
    pub fn add(&mut self, name: impl Into<String>, value: ValueSpec) {
        let name = name.into();
        match self.values.iter_mut().find(|pv| pv.name == name) {
            Some(existing) => existing.value = value,
            None => self.values.push(PropertyValue { name, value }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ValueSpec> {
        self.values.iter().find(|pv| pv.name == name).map(|pv| &pv.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<ValueSpec> {
        let pos = self.values.iter().position(|pv| pv.name == name)?;
        Some(self.values.remove(pos).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PropertyValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn merge_from(&mut self, other: &PropertyValues) {
        for pv in &other.values {
            self.add(pv.name.clone(), pv.value.clone());
        }
    }
}

impl IntoIterator for PropertyValues {
    type Item = PropertyValue;
    type IntoIter = std::vec::IntoIter<PropertyValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

/// A qualifier attached to a definition, matched against injection points.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Qualifier {
    pub kind: String,
    pub value: String,
}

impl Qualifier {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// A method whose implementation the container supplies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOverride {
    /// Returns a bean from the container on every call: the named bean, or
    /// the unique bean of the method's declared return type.
    Lookup { method: String, bean: Option<String> },
    /// Delegates to a [`MethodReplacer`](crate::intercept::MethodReplacer) bean.
    Replace { method: String, replacer: String },
}

impl MethodOverride {
    pub fn method_name(&self) -> &str {
        match self {
            MethodOverride::Lookup { method, .. } | MethodOverride::Replace { method, .. } => method,
        }
    }
}

/// Set of method overrides, one per method name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodOverrides {
    overrides: Vec<MethodOverride>,
}

impl MethodOverrides {
    pub fn add(&mut self, method_override: MethodOverride) {
        self.overrides
            .retain(|o| o.method_name() != method_override.method_name());
        self.overrides.push(method_override);
    }

    pub fn get(&self, method: &str) -> Option<&MethodOverride> {
        self.overrides.iter().find(|o| o.method_name() == method)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodOverride> {
        self.overrides.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn merge_from(&mut self, other: &MethodOverrides) {
        for o in &other.overrides {
            self.add(o.clone());
        }
    }
}

/// Declarative description of one bean.
#[derive(Clone, Default)]
pub struct BeanDefinition {
    pub(crate) parent_name: Option<String>,
    pub(crate) class: Option<Arc<BeanClass>>,
    pub(crate) scope: Option<String>,
    pub(crate) is_abstract: bool,
    pub(crate) lazy_init: Option<bool>,
    pub(crate) autowire_mode: AutowireMode,
    pub(crate) dependency_check: DependencyCheck,
    pub(crate) depends_on: Option<Vec<String>>,
    pub(crate) autowire_candidate: Option<bool>,
    pub(crate) primary: Option<bool>,
    pub(crate) qualifiers: BTreeMap<String, Qualifier>,
    pub(crate) constructor_args: ConstructorArgs,
    pub(crate) property_values: PropertyValues,
    pub(crate) method_overrides: MethodOverrides,
    pub(crate) factory_bean_name: Option<String>,
    pub(crate) factory_method_name: Option<String>,
    pub(crate) init_method: Option<String>,
    pub(crate) destroy_method: Option<String>,
    pub(crate) enforce_init_method: bool,
    pub(crate) enforce_destroy_method: bool,
    pub(crate) non_public_access_allowed: Option<bool>,
    pub(crate) lenient_constructor_resolution: Option<bool>,
    pub(crate) role: Role,
    pub(crate) synthetic: bool,
    pub(crate) description: Option<String>,
    pub(crate) resource_description: Option<String>,
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition instantiating `class`.
    pub fn of_class(class: Arc<BeanClass>) -> Self {
        Self {
            class: Some(class),
            ..Self::default()
        }
    }

    /// A child definition inheriting from the named parent.
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent_name: Some(parent.into()),
            ..Self::default()
        }
    }

    // ── builder-style setters ──

    pub fn with_class(mut self, class: Arc<BeanClass>) -> Self {
        self.class = Some(class);
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        let scope = scope.into();
        self.scope = (!scope.is_empty()).then_some(scope);
        self
    }

    pub fn singleton(self) -> Self {
        self.scope(SINGLETON)
    }

    pub fn prototype(self) -> Self {
        self.scope(PROTOTYPE)
    }

    pub fn set_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn autowire(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    pub fn dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = check;
        self
    }

    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = Some(candidate);
        self
    }

    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }

    /// Adds a default-kind qualifier.
    pub fn qualifier(self, value: impl Into<String>) -> Self {
        self.qualifier_of(QUALIFIER, value)
    }

    pub fn qualifier_of(mut self, kind: impl Into<String>, value: impl Into<String>) -> Self {
        let qualifier = Qualifier::new(kind, value);
        self.qualifiers.insert(qualifier.kind.clone(), qualifier);
        self
    }

    pub fn constructor_arg(mut self, index: usize, value: ValueSpec) -> Self {
        self.constructor_args.add_indexed(index, ArgValue::new(value));
        self
    }

    pub fn typed_constructor_arg(mut self, index: usize, value: ValueSpec, ty: ParamType) -> Self {
        self.constructor_args.add_indexed(index, ArgValue::typed(value, ty));
        self
    }

    pub fn generic_arg(mut self, value: ValueSpec) -> Self {
        self.constructor_args.add_generic(ArgValue::new(value));
        self
    }

    pub fn typed_generic_arg(mut self, value: ValueSpec, ty: ParamType) -> Self {
        self.constructor_args.add_generic(ArgValue::typed(value, ty));
        self
    }

    pub fn named_arg(mut self, name: impl Into<String>, value: ValueSpec) -> Self {
        self.constructor_args.add_generic(ArgValue::named(value, name));
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: ValueSpec) -> Self {
        self.property_values.add(name, value);
        self
    }

    pub fn property_ref(self, name: impl Into<String>, bean: impl Into<String>) -> Self {
        self.property(name, ValueSpec::reference(bean))
    }

    pub fn factory_bean(mut self, name: impl Into<String>) -> Self {
        self.factory_bean_name = Some(name.into());
        self
    }

    pub fn factory_method(mut self, name: impl Into<String>) -> Self {
        self.factory_method_name = Some(name.into());
        self
    }

    pub fn init_method(mut self, name: impl Into<String>) -> Self {
        self.init_method = Some(name.into());
        self
    }

    pub fn destroy_method(mut self, name: impl Into<String>) -> Self {
        self.destroy_method = Some(name.into());
        self
    }

    pub fn enforce_init_method(mut self, enforce: bool) -> Self {
        self.enforce_init_method = enforce;
        self
    }

    pub fn enforce_destroy_method(mut self, enforce: bool) -> Self {
        self.enforce_destroy_method = enforce;
        self
    }

    pub fn lookup_method(mut self, method: impl Into<String>, bean: Option<&str>) -> Self {
        self.method_overrides.add(MethodOverride::Lookup {
            method: method.into(),
            bean: bean.map(str::to_string),
        });
        self
    }

    pub fn replaced_method(mut self, method: impl Into<String>, replacer: impl Into<String>) -> Self {
        self.method_overrides.add(MethodOverride::Replace {
            method: method.into(),
            replacer: replacer.into(),
        });
        self
    }

    pub fn non_public_access(mut self, allowed: bool) -> Self {
        self.non_public_access_allowed = Some(allowed);
        self
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient_constructor_resolution = Some(lenient);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource_description = Some(resource.into());
        self
    }

    // ── accessors ──

    pub fn parent_name(&self) -> Option<&str> {
        self.parent_name.as_deref()
    }

    pub fn class(&self) -> Option<&Arc<BeanClass>> {
        self.class.as_ref()
    }

    /// Scope name, empty when unset.
    pub fn scope_name(&self) -> &str {
        self.scope.as_deref().unwrap_or("")
    }

    /// Unset scope counts as singleton.
    pub fn is_singleton(&self) -> bool {
        matches!(self.scope.as_deref(), None | Some(SINGLETON))
    }

    pub fn is_prototype(&self) -> bool {
        self.scope.as_deref() == Some(PROTOTYPE)
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn autowire_mode(&self) -> AutowireMode {
        self.autowire_mode
    }

    pub fn dependency_check_mode(&self) -> DependencyCheck {
        self.dependency_check
    }

    pub fn depends_on_names(&self) -> &[String] {
        self.depends_on.as_deref().unwrap_or(&[])
    }

    /// Candidates are eligible for autowiring unless explicitly excluded.
    pub fn is_autowire_candidate(&self) -> bool {
        self.autowire_candidate.unwrap_or(true)
    }

    pub fn is_primary(&self) -> bool {
        self.primary.unwrap_or(false)
    }

    pub fn qualifiers(&self) -> impl Iterator<Item = &Qualifier> {
        self.qualifiers.values()
    }

    pub fn has_qualifier_value(&self, value: &str) -> bool {
        self.qualifiers.values().any(|q| q.value == value)
    }

    pub fn constructor_args(&self) -> &ConstructorArgs {
        &self.constructor_args
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    pub fn property_values(&self) -> &PropertyValues {
        &self.property_values
    }

    pub fn method_overrides(&self) -> &MethodOverrides {
        &self.method_overrides
    }

    pub fn factory_bean_name(&self) -> Option<&str> {
        self.factory_bean_name.as_deref()
    }

    pub fn factory_method_name(&self) -> Option<&str> {
        self.factory_method_name.as_deref()
    }

    pub fn init_method_name(&self) -> Option<&str> {
        self.init_method.as_deref()
    }

    pub fn destroy_method_name(&self) -> Option<&str> {
        self.destroy_method.as_deref()
    }

    pub fn is_enforce_init_method(&self) -> bool {
        self.enforce_init_method
    }

    pub fn is_enforce_destroy_method(&self) -> bool {
        self.enforce_destroy_method
    }

    pub fn is_non_public_access_allowed(&self) -> bool {
        self.non_public_access_allowed.unwrap_or(true)
    }

    pub fn is_lenient_constructor_resolution(&self) -> bool {
        self.lenient_constructor_resolution.unwrap_or(true)
    }

    pub fn role_hint(&self) -> Role {
        self.role
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn resource_description(&self) -> Option<&str> {
        self.resource_description.as_deref()
    }

    /// Checks internal consistency before registration.
    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.method_overrides.is_empty() && self.factory_method_name.is_some() {
            return Err(ContainerError::definition_store(
                name,
                "cannot combine factory method with container-generated method overrides: the factory method must create the concrete bean instance",
            )
            .with_resource(self.resource_description()));
        }
        if self.factory_bean_name.is_some() && self.factory_method_name.is_none() {
            return Err(ContainerError::definition_store(
                name,
                "a factory bean is configured but no factory method names what to call on it",
            )
            .with_resource(self.resource_description()));
        }
        if self.parent_name.is_none()
            && self.class.is_none()
            && self.factory_method_name.is_none()
            && !self.is_abstract
        {
            return Err(ContainerError::definition_store(
                name,
                "neither a class, a parent nor a factory method is specified",
            )
            .with_resource(self.resource_description()));
        }
        Ok(())
    }
}

impl PartialEq for BeanDefinition {
    fn eq(&self, other: &Self) -> bool {
        let same_class = match (&self.class, &other.class) {
            (Some(a), Some(b)) => a.key() == b.key(),
            (None, None) => true,
            _ => false,
        };
        same_class
            && self.parent_name == other.parent_name
            && self.scope == other.scope
            && self.is_abstract == other.is_abstract
            && self.lazy_init == other.lazy_init
            && self.autowire_mode == other.autowire_mode
            && self.dependency_check == other.dependency_check
            && self.depends_on == other.depends_on
            && self.autowire_candidate == other.autowire_candidate
            && self.primary == other.primary
            && self.qualifiers == other.qualifiers
            && self.constructor_args == other.constructor_args
            && self.property_values == other.property_values
            && self.method_overrides == other.method_overrides
            && self.factory_bean_name == other.factory_bean_name
            && self.factory_method_name == other.factory_method_name
            && self.init_method == other.init_method
            && self.destroy_method == other.destroy_method
            && self.enforce_init_method == other.enforce_init_method
            && self.enforce_destroy_method == other.enforce_destroy_method
            && self.non_public_access_allowed == other.non_public_access_allowed
            && self.lenient_constructor_resolution == other.lenient_constructor_resolution
            && self.role == other.role
            && self.synthetic == other.synthetic
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("class", &self.class.as_ref().map(|c| c.name()))
            .field("parent", &self.parent_name)
            .field("scope", &self.scope_name())
            .field("abstract", &self.is_abstract)
            .field("lazy", &self.lazy_init)
            .field("autowire", &self.autowire_mode)
            .field("primary", &self.primary)
            .field("factory_bean", &self.factory_bean_name)
            .field("factory_method", &self.factory_method_name)
            .field("init", &self.init_method)
            .field("destroy", &self.destroy_method)
            .field("constructor_args", &self.constructor_args.len())
            .field("properties", &self.property_values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;

    #[test]
    fn defaults() {
        let def = BeanDefinition::of_class(BeanClass::of::<Widget>());
        assert!(def.is_singleton());
        assert!(!def.is_prototype());
        assert_eq!(def.scope_name(), "");
        assert!(def.is_autowire_candidate());
        assert!(!def.is_primary());
        assert!(!def.is_lazy_init());
        assert!(def.is_lenient_constructor_resolution());
    }

    #[test]
    fn empty_scope_means_unset() {
        let def = BeanDefinition::new().scope("");
        assert_eq!(def.scope, None);
        assert!(def.is_singleton());
    }

    #[test]
    fn min_arg_count_uses_highest_index() {
        let def = BeanDefinition::new()
            .constructor_arg(3, ValueSpec::literal("x"))
            .generic_arg(ValueSpec::literal(1i64));
        assert_eq!(def.constructor_args().len(), 2);
        assert_eq!(def.constructor_args().min_arg_count(), 4);
    }

    #[test]
    fn named_generic_args_replace() {
        let mut args = ConstructorArgs::default();
        args.add_generic(ArgValue::named(ValueSpec::literal("a"), "host"));
        args.add_generic(ArgValue::named(ValueSpec::literal("b"), "host"));
        assert_eq!(args.generic().len(), 1);
        assert_eq!(args.generic()[0].value, ValueSpec::literal("b"));
    }

    #[test]
    fn property_values_override_by_name() {
        let mut parent = PropertyValues::new();
        parent.add("host", ValueSpec::literal("localhost"));
        parent.add("port", ValueSpec::literal(80i64));
        let mut child = PropertyValues::new();
        child.add("port", ValueSpec::literal(8080i64));

        parent.merge_from(&child);
        assert_eq!(parent.len(), 2);
        assert_eq!(parent.get("port"), Some(&ValueSpec::literal(8080i64)));
    }

    #[test]
    fn method_overrides_replace_same_method() {
        let def = BeanDefinition::new()
            .lookup_method("create", Some("a"))
            .lookup_method("create", Some("b"));
        assert_eq!(def.method_overrides().iter().count(), 1);
        assert_eq!(
            def.method_overrides().get("create"),
            Some(&MethodOverride::Lookup { method: "create".into(), bean: Some("b".into()) })
        );
    }

    #[test]
    fn validate_rejects_overrides_with_factory_method() {
        let def = BeanDefinition::of_class(BeanClass::of::<Widget>())
            .factory_method("make")
            .lookup_method("next", None);
        assert!(def.validate("w").is_err());
    }

    #[test]
    fn validate_rejects_empty_definition() {
        assert!(BeanDefinition::new().validate("w").is_err());
        assert!(BeanDefinition::child_of("p").validate("w").is_ok());
    }

    #[test]
    fn dependency_check_kinds() {
        assert!(DependencyCheck::All.applies_to(true));
        assert!(DependencyCheck::Objects.applies_to(false));
        assert!(!DependencyCheck::Objects.applies_to(true));
        assert!(!DependencyCheck::None.applies_to(false));
    }
}
