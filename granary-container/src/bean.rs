//! Bean instances and the class metadata that stands in for reflection.
//!
//! Every object the container manages is a [`Bean`]: a type-erased
//! `Arc<dyn Any + Send + Sync>` paired with the [`BeanClass`] describing
//! it. The class says which types the instance can be viewed as, how it is
//! constructed, which properties can be written, and which lifecycle hooks
//! it implements. Classes are built once per type with
//! [`BeanClass::builder`].
//!
//! # Examples
//! ```
//! use std::sync::Arc;
//! use granary_container::bean::{BeanClass, ParamSpec};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English {
//!     name: String,
//! }
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         format!("hello {}", self.name)
//!     }
//! }
//!
//! let class = BeanClass::builder::<English>()
//!     .implements::<dyn Greeter>(|e| e)
//!     .constructor(vec![ParamSpec::string("name")], |args| {
//!         Ok(English { name: args.string(0)? })
//!     })
//!     .build();
//!
//! assert_eq!(class.constructors().len(), 1);
//! assert!(class.is_assignable_to(&granary_container::key::TypeKey::of::<dyn Greeter>()));
//! ```

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::Container;
use crate::error::{ContainerError, Result};
use crate::intercept::MethodInterceptor;
use crate::key::TypeKey;
use crate::value::{Args, ParamType, Value};

/// A type-erased, shareable bean instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

type ViewFn = Arc<dyn Fn(&Instance) -> Option<Box<dyn Any>> + Send + Sync>;
pub(crate) type HookFn = Arc<dyn Fn(&Instance) -> Result<()> + Send + Sync>;
type NameAwareFn = Arc<dyn Fn(&Instance, &str) -> Result<()> + Send + Sync>;
type ContainerAwareFn = Arc<dyn Fn(&Instance, &Arc<Container>) -> Result<()> + Send + Sync>;
type SetterFn = Arc<dyn Fn(&Instance, Value) -> Result<()> + Send + Sync>;
type ProbeFn = Arc<dyn Fn(&Instance) -> bool + Send + Sync>;
type InvokeFn = Arc<dyn Fn(Option<&Instance>, &Args) -> Result<Instance> + Send + Sync>;
type InterceptorHookFn = Arc<dyn Fn(&Instance, MethodInterceptor) -> Result<()> + Send + Sync>;

/// How an instance relates to a type it can be viewed as.
///
/// The relation feeds the type-difference weight used when choosing
/// between constructor candidates: closer relations weigh less.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Exact,
    /// A supertype `depth` levels up.
    Supertype(u32),
    Interface,
}

impl Relation {
    pub fn weight(self) -> u32 {
        match self {
            Relation::Exact => 0,
            Relation::Supertype(depth) => 2 * depth,
            Relation::Interface => 1,
        }
    }
}

#[derive(Clone)]
struct View {
    relation: Relation,
    cast: ViewFn,
}

/// A managed object together with its class metadata.
#[derive(Clone)]
pub struct Bean {
    instance: Instance,
    class: Arc<BeanClass>,
}

impl Bean {
    /// Pairs an instance with its class.
    pub fn new(instance: Instance, class: Arc<BeanClass>) -> Self {
        Self { instance, class }
    }

    /// Wraps a value with a bare class (no constructors, hooks or properties).
    pub fn of<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(Arc::new(value), BeanClass::of::<T>())
    }

    /// Wraps an existing `Arc` with the given class.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>, class: Arc<BeanClass>) -> Self {
        Self::new(value, class)
    }

    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    #[inline]
    pub fn class(&self) -> &Arc<BeanClass> {
        &self.class
    }

    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.class.key()
    }

    /// Views the instance as `Arc<T>`, where `T` is the concrete type or any
    /// type registered on the class via `extends`/`implements`.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        self.class.view::<T>(&self.instance)
    }

    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.class.is_assignable_to(key)
    }

    /// Identity comparison on the underlying allocation.
    pub fn same(&self, other: &Bean) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.instance), Arc::as_ptr(&other.instance))
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bean({} @ {:p})",
            self.class.key().short_name(),
            Arc::as_ptr(&self.instance)
        )
    }
}

/// Declared parameter of a constructor or factory method.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    name: Option<String>,
    ty: ParamType,
    required: bool,
    qualifier: Option<String>,
}

impl ParamSpec {
    pub fn new(ty: ParamType) -> Self {
        Self {
            name: None,
            ty,
            required: true,
            qualifier: None,
        }
    }

    pub fn named(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(ty)
        }
    }

    pub fn bean<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::bean::<T>())
    }

    pub fn list<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::list::<T>())
    }

    pub fn map<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::map::<T>())
    }

    pub fn provider<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::provider::<T>())
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::Str)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::Float)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::named(name, ParamType::Bool)
    }

    /// Marks the parameter as optional: an unresolvable collaborator
    /// becomes `Value::Null` instead of an error.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Restricts autowiring to candidates carrying this qualifier.
    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }
}

/// What kind of code an [`Executable`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Constructor,
    /// Factory function not bound to an instance.
    StaticFactory,
    /// Factory method invoked on a factory bean.
    InstanceFactory,
}

/// A constructor or factory method with its parameter metadata.
pub struct Executable {
    name: String,
    params: Vec<ParamSpec>,
    public: bool,
    kind: ExecutableKind,
    returns: Option<Arc<BeanClass>>,
    invoke: InvokeFn,
}

impl Executable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn param_types(&self) -> Vec<ParamType> {
        self.params.iter().map(ParamSpec::ty).collect()
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn kind(&self) -> ExecutableKind {
        self.kind
    }

    /// The class of produced instances, for factory methods.
    pub fn returns(&self) -> Option<&Arc<BeanClass>> {
        self.returns.as_ref()
    }

    pub(crate) fn invoke(&self, target: Option<&Instance>, args: &Args) -> Result<Instance> {
        (self.invoke)(target, args)
    }

    /// Human-readable signature, e.g. `new(String, Vec<Handler>)`.
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(|p| p.ty.to_string()).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executable")
            .field("signature", &self.signature())
            .field("public", &self.public)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A writable bean property.
#[derive(Clone)]
pub struct PropertySpec {
    name: String,
    ty: ParamType,
    setter: SetterFn,
    probe: Option<ProbeFn>,
}

impl PropertySpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ParamType {
        self.ty
    }

    pub fn is_simple(&self) -> bool {
        self.ty.is_simple()
    }

    pub(crate) fn set(&self, instance: &Instance, value: Value) -> Result<()> {
        (self.setter)(instance, value)
    }

    /// Returns `true` if the instance reports the property as already set.
    /// Properties without a probe are treated as unset.
    pub(crate) fn is_set(&self, instance: &Instance) -> bool {
        self.probe.as_ref().is_some_and(|probe| probe(instance))
    }
}

impl fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertySpec")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Metadata for one bean type.
pub struct BeanClass {
    key: TypeKey,
    views: HashMap<TypeKey, View>,
    constructors: Vec<Arc<Executable>>,
    factory_methods: Vec<Arc<Executable>>,
    properties: BTreeMap<String, PropertySpec>,
    methods: HashMap<String, HookFn>,
    after_properties_set: Option<HookFn>,
    destroy: Option<HookFn>,
    name_aware: Option<NameAwareFn>,
    container_aware: Option<ContainerAwareFn>,
    overridable: BTreeMap<String, Option<TypeKey>>,
    interceptor_hook: Option<InterceptorHookFn>,
}

impl BeanClass {
    /// Starts building the class for `T`.
    pub fn builder<T: Any + Send + Sync>() -> ClassBuilder<T> {
        ClassBuilder::new()
    }

    /// A bare class for `T`: viewable as itself, nothing else.
    pub fn of<T: Any + Send + Sync>() -> Arc<Self> {
        Self::builder::<T>().build()
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.type_name()
    }

    /// How instances of this class relate to `key`, if they can be viewed as it.
    pub fn relation_to(&self, key: &TypeKey) -> Option<Relation> {
        self.views.get(key).map(|v| v.relation)
    }

    pub fn is_assignable_to(&self, key: &TypeKey) -> bool {
        self.views.contains_key(key)
    }

    /// All types instances can be viewed as.
    pub fn assignable_types(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.views.keys().copied().collect();
        keys.sort();
        keys
    }

    pub(crate) fn view<T: ?Sized + 'static>(&self, instance: &Instance) -> Option<Arc<T>> {
        let view = self.views.get(&TypeKey::of::<T>())?;
        let boxed = (view.cast)(instance)?;
        boxed.downcast::<Arc<T>>().ok().map(|b| *b)
    }

    pub fn constructors(&self) -> &[Arc<Executable>] {
        &self.constructors
    }

    /// Factory methods with the given name, in declaration order.
    pub fn factory_methods_named(&self, name: &str) -> Vec<Arc<Executable>> {
        self.factory_methods
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn factory_methods(&self) -> &[Arc<Executable>] {
        &self.factory_methods
    }

    pub fn property(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    /// Properties in name order.
    pub fn properties(&self) -> impl Iterator<Item = &PropertySpec> {
        self.properties.values()
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub(crate) fn method(&self, name: &str) -> Option<&HookFn> {
        self.methods.get(name)
    }

    pub(crate) fn after_properties_set_hook(&self) -> Option<&HookFn> {
        self.after_properties_set.as_ref()
    }

    pub fn has_after_properties_set(&self) -> bool {
        self.after_properties_set.is_some()
    }

    pub(crate) fn destroy_hook(&self) -> Option<&HookFn> {
        self.destroy.as_ref()
    }

    pub fn has_destroy_hook(&self) -> bool {
        self.destroy.is_some()
    }

    pub(crate) fn name_aware(&self) -> Option<&NameAwareFn> {
        self.name_aware.as_ref()
    }

    pub(crate) fn container_aware(&self) -> Option<&ContainerAwareFn> {
        self.container_aware.as_ref()
    }

    /// Declared return type of an overridable method, if the method exists.
    pub fn overridable_method(&self, name: &str) -> Option<Option<TypeKey>> {
        self.overridable.get(name).copied()
    }

    pub(crate) fn interceptor_hook(&self) -> Option<&InterceptorHookFn> {
        self.interceptor_hook.as_ref()
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("type", &self.key.type_name())
            .field("constructors", &self.constructors.len())
            .field("factory_methods", &self.factory_methods.len())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn instance_as<T: Any>(instance: &Instance) -> Result<&T> {
    instance.as_ref().downcast_ref::<T>().ok_or_else(|| {
        ContainerError::type_mismatch(
            "instance",
            std::any::type_name::<T>(),
            "an instance of another type",
        )
    })
}

/// Fluent builder for [`BeanClass`].
pub struct ClassBuilder<T> {
    class: BeanClass,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
    fn new() -> Self {
        let mut views = HashMap::new();
        views.insert(
            TypeKey::of::<T>(),
            View {
                relation: Relation::Exact,
                cast: Arc::new(|instance: &Instance| {
                    instance
                        .clone()
                        .downcast::<T>()
                        .ok()
                        .map(|arc| Box::new(arc) as Box<dyn Any>)
                }),
            },
        );

        Self {
            class: BeanClass {
                key: TypeKey::of::<T>(),
                views,
                constructors: Vec::new(),
                factory_methods: Vec::new(),
                properties: BTreeMap::new(),
                methods: HashMap::new(),
                after_properties_set: None,
                destroy: None,
                name_aware: None,
                container_aware: None,
                overridable: BTreeMap::new(),
                interceptor_hook: None,
            },
            _marker: PhantomData,
        }
    }

    fn add_view<U: ?Sized + 'static>(
        mut self,
        relation: Relation,
        cast: fn(Arc<T>) -> Arc<U>,
    ) -> Self {
        self.class.views.insert(
            TypeKey::of::<U>(),
            View {
                relation,
                cast: Arc::new(move |instance: &Instance| {
                    instance
                        .clone()
                        .downcast::<T>()
                        .ok()
                        .map(|arc| Box::new(cast(arc)) as Box<dyn Any>)
                }),
            },
        );
        self
    }

    /// Declares `U` as a supertype `depth` levels above `T`.
    pub fn extends<U: ?Sized + 'static>(self, depth: u32, cast: fn(Arc<T>) -> Arc<U>) -> Self {
        self.add_view(Relation::Supertype(depth.max(1)), cast)
    }

    /// Declares that `T` can be used as `U` (typically `dyn Trait`).
    pub fn implements<U: ?Sized + 'static>(self, cast: fn(Arc<T>) -> Arc<U>) -> Self {
        self.add_view(Relation::Interface, cast)
    }

    fn push_constructor(
        mut self,
        params: Vec<ParamSpec>,
        public: bool,
        f: impl Fn(&Args) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.class.constructors.push(Arc::new(Executable {
            name: "new".to_string(),
            params,
            public,
            kind: ExecutableKind::Constructor,
            returns: None,
            invoke: Arc::new(move |_, args| Ok(Arc::new(f(args)?) as Instance)),
        }));
        self
    }

    /// Adds a public constructor.
    pub fn constructor(
        self,
        params: Vec<ParamSpec>,
        f: impl Fn(&Args) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.push_constructor(params, true, f)
    }

    /// Adds a non-public constructor, only considered when the definition
    /// allows non-public access.
    pub fn private_constructor(
        self,
        params: Vec<ParamSpec>,
        f: impl Fn(&Args) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.push_constructor(params, false, f)
    }

    /// Adds a public no-argument constructor.
    pub fn default_constructor(self, f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.push_constructor(Vec::new(), true, move |_| Ok(f()))
    }

    /// Adds a factory function producing instances of `returns`.
    pub fn static_factory<R: Any + Send + Sync>(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        returns: Arc<BeanClass>,
        f: impl Fn(&Args) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        self.class.factory_methods.push(Arc::new(Executable {
            name: name.into(),
            params,
            public: true,
            kind: ExecutableKind::StaticFactory,
            returns: Some(returns),
            invoke: Arc::new(move |_, args| Ok(Arc::new(f(args)?) as Instance)),
        }));
        self
    }

    /// Adds a factory method invoked on an instance of `T`.
    pub fn instance_factory<R: Any + Send + Sync>(
        mut self,
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        returns: Arc<BeanClass>,
        f: impl Fn(&T, &Args) -> Result<R> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let method = name.clone();
        self.class.factory_methods.push(Arc::new(Executable {
            name,
            params,
            public: true,
            kind: ExecutableKind::InstanceFactory,
            returns: Some(returns),
            invoke: Arc::new(move |target, args| {
                let target = target.ok_or_else(|| {
                    ContainerError::custom_msg(format!("factory method '{method}' needs a factory instance"))
                })?;
                Ok(Arc::new(f(instance_as::<T>(target)?, args)?) as Instance)
            }),
        }));
        self
    }

    /// Adds a writable property.
    pub fn property(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        setter: impl Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.class.properties.insert(
            name.clone(),
            PropertySpec {
                name,
                ty,
                setter: Arc::new(move |instance, value| setter(instance_as::<T>(instance)?, value)),
                probe: None,
            },
        );
        self
    }

    /// Adds a writable property whose current state can be probed, so that
    /// autowiring skips it once it has been set.
    pub fn probed_property(
        mut self,
        name: impl Into<String>,
        ty: ParamType,
        setter: impl Fn(&T, Value) -> Result<()> + Send + Sync + 'static,
        is_set: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.class.properties.insert(
            name.clone(),
            PropertySpec {
                name,
                ty,
                setter: Arc::new(move |instance, value| setter(instance_as::<T>(instance)?, value)),
                probe: Some(Arc::new(move |instance| {
                    instance.as_ref().downcast_ref::<T>().is_some_and(&is_set)
                })),
            },
        );
        self
    }

    /// Adds a named no-argument method, usable as init or destroy method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&T) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.class
            .methods
            .insert(name.into(), Arc::new(move |instance| f(instance_as::<T>(instance)?)));
        self
    }

    /// Structural hook invoked once all properties have been set.
    pub fn after_properties_set(mut self, f: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.class.after_properties_set = Some(Arc::new(move |instance| f(instance_as::<T>(instance)?)));
        self
    }

    /// Structural hook invoked when the bean is destroyed.
    pub fn on_destroy(mut self, f: impl Fn(&T) -> Result<()> + Send + Sync + 'static) -> Self {
        self.class.destroy = Some(Arc::new(move |instance| f(instance_as::<T>(instance)?)));
        self
    }

    /// Receives the bean's registered name before initialization.
    pub fn name_aware(mut self, f: impl Fn(&T, &str) -> Result<()> + Send + Sync + 'static) -> Self {
        self.class.name_aware = Some(Arc::new(move |instance, name| f(instance_as::<T>(instance)?, name)));
        self
    }

    /// Receives the owning container before initialization.
    pub fn container_aware(
        mut self,
        f: impl Fn(&T, &Arc<Container>) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.class.container_aware = Some(Arc::new(move |instance, container| {
            f(instance_as::<T>(instance)?, container)
        }));
        self
    }

    /// Declares a method the container may override, with its return type
    /// for lookup overrides that name no bean.
    pub fn overridable(mut self, name: impl Into<String>, returns: Option<TypeKey>) -> Self {
        self.class.overridable.insert(name.into(), returns);
        self
    }

    /// Installs the hook through which the container hands the instance its
    /// [`MethodInterceptor`] when the definition carries method overrides.
    pub fn method_injection(
        mut self,
        f: impl Fn(&T, MethodInterceptor) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.class.interceptor_hook = Some(Arc::new(move |instance, interceptor| {
            f(instance_as::<T>(instance)?, interceptor)
        }));
        self
    }

    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    trait Shape: Send + Sync {
        fn area(&self) -> f64;
    }

    struct Square {
        side: Mutex<f64>,
    }

    impl Shape for Square {
        fn area(&self) -> f64 {
            let s = *self.side.lock();
            s * s
        }
    }

    fn square_class() -> Arc<BeanClass> {
        BeanClass::builder::<Square>()
            .implements::<dyn Shape>(|s| s)
            .constructor(vec![ParamSpec::float("side")], |args| {
                Ok(Square { side: Mutex::new(args.float(0)?) })
            })
            .property("side", ParamType::Float, |sq, v| {
                *sq.side.lock() = v.float()?;
                Ok(())
            })
            .method("reset", |sq| {
                *sq.side.lock() = 0.0;
                Ok(())
            })
            .build()
    }

    #[test]
    fn bean_views_as_interface() {
        let class = square_class();
        let bean = Bean::new(Arc::new(Square { side: Mutex::new(2.0) }), class);
        let shape: Arc<dyn Shape> = bean.downcast::<dyn Shape>().unwrap();
        assert_eq!(shape.area(), 4.0);
        assert!(bean.downcast::<Square>().is_some());
        assert!(bean.downcast::<String>().is_none());
    }

    #[test]
    fn relations_and_weights() {
        let class = square_class();
        assert_eq!(class.relation_to(&TypeKey::of::<Square>()), Some(Relation::Exact));
        assert_eq!(class.relation_to(&TypeKey::of::<dyn Shape>()), Some(Relation::Interface));
        assert_eq!(Relation::Supertype(2).weight(), 4);
        assert!(Relation::Exact.weight() < Relation::Interface.weight());
    }

    #[test]
    fn constructor_invocation() {
        let class = square_class();
        let ctor = &class.constructors()[0];
        assert_eq!(ctor.signature(), "new(f64)");
        let instance = ctor.invoke(None, &Args::new(vec![Value::Float(3.0)])).unwrap();
        let bean = Bean::new(instance, class.clone());
        assert_eq!(bean.downcast::<dyn Shape>().unwrap().area(), 9.0);
    }

    #[test]
    fn property_and_method_hooks() {
        let class = square_class();
        let bean = Bean::new(Arc::new(Square { side: Mutex::new(1.0) }), class.clone());
        class.property("side").unwrap().set(bean.instance(), Value::Float(5.0)).unwrap();
        assert_eq!(bean.downcast::<Square>().unwrap().area(), 25.0);
        (class.method("reset").unwrap())(bean.instance()).unwrap();
        assert_eq!(bean.downcast::<Square>().unwrap().area(), 0.0);
    }

    #[test]
    fn setter_rejects_wrong_instance() {
        let class = square_class();
        let foreign: Instance = Arc::new(42i64);
        assert!(class.property("side").unwrap().set(&foreign, Value::Float(1.0)).is_err());
    }

    #[test]
    fn identity() {
        let a = Bean::of(1u8);
        let b = a.clone();
        assert!(a.same(&b));
        assert!(!a.same(&Bean::of(1u8)));
    }
}
