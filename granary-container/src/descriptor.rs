//! Dependency descriptors: what an injection point asks the resolver for.

use std::fmt;

use crate::bean::{ParamSpec, PropertySpec};
use crate::key::TypeKey;
use crate::value::{ParamType, Value};

/// A single resolution request.
///
/// Built from a constructor or factory-method parameter, from a property
/// being autowired, or directly by callers of
/// [`Container::resolve_dependency`](crate::container::Container::resolve_dependency).
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyDescriptor {
    required_type: ParamType,
    required: bool,
    eager: bool,
    name: Option<String>,
    qualifier: Option<String>,
    /// Boxed: a `Value` can hold a provider, which holds a descriptor.
    default_value: Option<Box<Value>>,
    injection_point: String,
    /// Ambiguity yields `Null` rather than an error.
    pub(crate) unique_or_none: bool,
}

impl DependencyDescriptor {
    pub fn new(required_type: ParamType) -> Self {
        Self {
            required_type,
            required: true,
            eager: true,
            name: None,
            qualifier: None,
            default_value: None,
            injection_point: format!("dependency of type [{required_type}]"),
            unique_or_none: false,
        }
    }

    /// A required single-bean dependency on `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::new(ParamType::bean::<T>())
    }

    /// Describes parameter `index` of a constructor or factory method.
    pub fn for_param(param: &ParamSpec, index: usize) -> Self {
        let injection_point = match param.name() {
            Some(name) => format!("constructor parameter {index} ({name})"),
            None => format!("constructor parameter {index}"),
        };
        Self {
            required: param.is_required(),
            name: param.name().map(str::to_string),
            qualifier: param.qualifier().map(str::to_string),
            injection_point,
            ..Self::new(param.ty())
        }
    }

    /// Describes an autowired property. By-type property autowiring is
    /// optional; the property name breaks ties between candidates.
    pub fn for_property(property: &PropertySpec) -> Self {
        Self {
            required: false,
            name: Some(property.name().to_string()),
            injection_point: format!("property '{}'", property.name()),
            ..Self::new(property.ty())
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the name used as the last tie-break among several candidates.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn qualified(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// Lazy descriptors do not force instantiation of factory beans while
    /// matching candidate types.
    pub fn lazy(mut self) -> Self {
        self.eager = false;
        self
    }

    /// A value suggested to the candidate resolver in place of a lookup.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(Box::new(value.into()));
        self
    }

    pub(crate) fn unique_or_none(mut self) -> Self {
        self.unique_or_none = true;
        self
    }

    /// The same request narrowed to a single element of a collection or
    /// provider type.
    pub(crate) fn element(&self) -> Self {
        let ty = match self.required_type.element() {
            Some(key) => ParamType::Bean(key),
            None => self.required_type,
        };
        Self {
            required_type: ty,
            ..self.clone()
        }
    }

    /// The same request for a different type, e.g. all elements instead of one.
    pub(crate) fn retyped(&self, required_type: ParamType) -> Self {
        Self {
            required_type,
            ..self.clone()
        }
    }

    #[inline]
    pub fn required_type(&self) -> ParamType {
        self.required_type
    }

    /// The bean type looked up, if the request is not for a simple value.
    pub fn bean_type(&self) -> Option<TypeKey> {
        self.required_type.element()
    }

    #[inline]
    pub fn is_required(&self) -> bool {
        self.required
    }

    #[inline]
    pub fn is_eager(&self) -> bool {
        self.eager
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default_value.as_deref()
    }

    /// e.g. `constructor parameter 1 (cache)` or `property 'cache'`.
    pub fn injection_point(&self) -> &str {
        &self.injection_point
    }
}

impl fmt::Display for DependencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.injection_point, self.required_type)?;
        if let Some(ref qualifier) = self.qualifier {
            write!(f, " qualified '{qualifier}'")?;
        }
        if !self.required {
            f.write_str(" (optional)")?;
        }
        Ok(())
    }
}
