//! Values flowing through the container.
//!
//! Two layers exist:
//! - [`ValueSpec`] is definition metadata: literals, references by bean name,
//!   nested (inner) definitions and collections of those. It is what a
//!   definition source hands the container.
//! - [`Value`] is the resolved form: references have become [`Bean`]s,
//!   inner definitions have been instantiated. Constructors, factory methods
//!   and property setters only ever see `Value`s.
//!
//! [`ParamType`] describes what an injection point expects.

use std::fmt;
use std::sync::Arc;

use crate::bean::Bean;
use crate::definition::BeanDefinition;
use crate::error::{ContainerError, Result};
use crate::key::TypeKey;
use crate::resolver::ObjectProvider;

/// The declared type of a constructor parameter, factory-method parameter
/// or bean property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    /// A single collaborator assignable to the key.
    Bean(TypeKey),
    /// Every collaborator assignable to the key, in registration order.
    List(TypeKey),
    /// Every collaborator assignable to the key, keyed by bean name.
    Map(TypeKey),
    /// A deferred accessor for collaborators assignable to the key.
    Provider(TypeKey),
}

impl ParamType {
    pub fn bean<T: ?Sized + 'static>() -> Self {
        ParamType::Bean(TypeKey::of::<T>())
    }

    pub fn list<T: ?Sized + 'static>() -> Self {
        ParamType::List(TypeKey::of::<T>())
    }

    pub fn map<T: ?Sized + 'static>() -> Self {
        ParamType::Map(TypeKey::of::<T>())
    }

    pub fn provider<T: ?Sized + 'static>() -> Self {
        ParamType::Provider(TypeKey::of::<T>())
    }

    /// Simple types are filled from literals and never autowired.
    #[inline]
    pub fn is_simple(&self) -> bool {
        matches!(
            self,
            ParamType::Str | ParamType::Int | ParamType::Float | ParamType::Bool
        )
    }

    /// Returns `true` for collection-shaped injection points.
    #[inline]
    pub fn is_multiple(&self) -> bool {
        matches!(self, ParamType::List(_) | ParamType::Map(_))
    }

    /// The bean type this injection point is about, if any.
    pub fn element(&self) -> Option<TypeKey> {
        match self {
            ParamType::Bean(k) | ParamType::List(k) | ParamType::Map(k) | ParamType::Provider(k) => {
                Some(*k)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => f.write_str("String"),
            ParamType::Int => f.write_str("i64"),
            ParamType::Float => f.write_str("f64"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Bean(k) => f.write_str(&k.short_name()),
            ParamType::List(k) => write!(f, "Vec<{}>", k.short_name()),
            ParamType::Map(k) => write!(f, "Map<String, {}>", k.short_name()),
            ParamType::Provider(k) => write!(f, "Provider<{}>", k.short_name()),
        }
    }
}

/// A resolved value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Bean(Bean),
    List(Vec<Value>),
    /// String-keyed entries in insertion order.
    Map(Vec<(String, Value)>),
    Provider(ObjectProvider),
}

impl Value {
    /// Short description of the value's runtime type, for error messages.
    pub fn type_description(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Str(_) => "String".to_string(),
            Value::Int(_) => "i64".to_string(),
            Value::Float(_) => "f64".to_string(),
            Value::Bool(_) => "bool".to_string(),
            Value::Bean(b) => b.type_key().short_name(),
            Value::List(_) => "Vec".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::Provider(p) => format!("Provider<{}>", p.required_type().short_name()),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bean(&self) -> Option<&Bean> {
        match self {
            Value::Bean(b) => Some(b),
            _ => None,
        }
    }

    /// Views a bean value as `Arc<T>`.
    pub fn bean<T: ?Sized + 'static>(&self) -> Result<Arc<T>> {
        match self {
            Value::Bean(b) => b
                .downcast::<T>()
                .ok_or_else(|| ContainerError::type_mismatch("value", TypeKey::of::<T>().short_name(), self.type_description())),
            other => Err(ContainerError::type_mismatch(
                "value",
                TypeKey::of::<T>().short_name(),
                other.type_description(),
            )),
        }
    }

    /// Like [`Value::bean`], mapping `Null` to `None`.
    pub fn opt_bean<T: ?Sized + 'static>(&self) -> Result<Option<Arc<T>>> {
        match self {
            Value::Null => Ok(None),
            other => other.bean::<T>().map(Some),
        }
    }

    pub fn string(&self) -> Result<String> {
        match self {
            Value::Str(s) => Ok(s.clone()),
            other => Err(ContainerError::type_mismatch("value", "String", other.type_description())),
        }
    }

    pub fn int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(ContainerError::type_mismatch("value", "i64", other.type_description())),
        }
    }

    pub fn float(&self) -> Result<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            other => Err(ContainerError::type_mismatch("value", "f64", other.type_description())),
        }
    }

    pub fn bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ContainerError::type_mismatch("value", "bool", other.type_description())),
        }
    }

    /// Views every element of a list value as `Arc<T>`.
    pub fn list<T: ?Sized + 'static>(&self) -> Result<Vec<Arc<T>>> {
        match self {
            Value::List(items) => items.iter().map(Value::bean::<T>).collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(ContainerError::type_mismatch(
                "value",
                format!("Vec<{}>", TypeKey::of::<T>().short_name()),
                other.type_description(),
            )),
        }
    }

    /// Views every entry of a map value as `(name, Arc<T>)`.
    pub fn map<T: ?Sized + 'static>(&self) -> Result<Vec<(String, Arc<T>)>> {
        match self {
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), v.bean::<T>()?)))
                .collect(),
            Value::Null => Ok(Vec::new()),
            other => Err(ContainerError::type_mismatch(
                "value",
                format!("Map<String, {}>", TypeKey::of::<T>().short_name()),
                other.type_description(),
            )),
        }
    }

    pub fn provider(&self) -> Result<ObjectProvider> {
        match self {
            Value::Provider(p) => Ok(p.clone()),
            other => Err(ContainerError::type_mismatch("value", "Provider", other.type_description())),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Bean(b) => write!(f, "{b:?}"),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(entries) => f
                .debug_map()
                .entries(entries.iter().map(|(k, v)| (k, v)))
                .finish(),
            Value::Provider(p) => write!(f, "{p:?}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Bean(a), Value::Bean(b)) => a.same(b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Bean> for Value {
    fn from(b: Bean) -> Self {
        Value::Bean(b)
    }
}

/// A value as declared in a bean definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueSpec {
    /// Used as-is (subject to type conversion at the injection point).
    Literal(Value),
    /// Another bean, looked up by name in this container (or its ancestors).
    Ref(String),
    /// Another bean, looked up by name in the parent container only.
    ParentRef(String),
    /// An anonymous bean created for this injection point alone.
    Inner {
        name: Option<String>,
        definition: Box<BeanDefinition>,
    },
    List(Vec<ValueSpec>),
    Map(Vec<(String, ValueSpec)>),
}

impl ValueSpec {
    pub fn literal(value: impl Into<Value>) -> Self {
        ValueSpec::Literal(value.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        ValueSpec::Ref(name.into())
    }

    pub fn parent_reference(name: impl Into<String>) -> Self {
        ValueSpec::ParentRef(name.into())
    }

    pub fn inner(definition: BeanDefinition) -> Self {
        ValueSpec::Inner {
            name: None,
            definition: Box::new(definition),
        }
    }

    pub fn named_inner(name: impl Into<String>, definition: BeanDefinition) -> Self {
        ValueSpec::Inner {
            name: Some(name.into()),
            definition: Box::new(definition),
        }
    }

    pub fn null() -> Self {
        ValueSpec::Literal(Value::Null)
    }

    /// Returns `true` if resolving this spec touches other beans, meaning a
    /// cached resolution cannot be reused for a new prototype instance.
    pub fn references_beans(&self) -> bool {
        match self {
            ValueSpec::Literal(Value::Bean(_)) => false,
            ValueSpec::Literal(_) => false,
            ValueSpec::Ref(_) | ValueSpec::ParentRef(_) | ValueSpec::Inner { .. } => true,
            ValueSpec::List(items) => items.iter().any(ValueSpec::references_beans),
            ValueSpec::Map(entries) => entries.iter().any(|(_, v)| v.references_beans()),
        }
    }
}

/// Arguments handed to a constructor or factory method.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<Value>,
}

impl Args {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Value> {
        self.values.get(index).ok_or_else(|| {
            ContainerError::type_mismatch(format!("argument #{index}"), "a value", "missing argument")
        })
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub fn bean<T: ?Sized + 'static>(&self, index: usize) -> Result<Arc<T>> {
        self.get(index)?.bean::<T>().map_err(|e| e.at_argument(index))
    }

    pub fn opt_bean<T: ?Sized + 'static>(&self, index: usize) -> Result<Option<Arc<T>>> {
        self.get(index)?.opt_bean::<T>().map_err(|e| e.at_argument(index))
    }

    pub fn string(&self, index: usize) -> Result<String> {
        self.get(index)?.string().map_err(|e| e.at_argument(index))
    }

    pub fn int(&self, index: usize) -> Result<i64> {
        self.get(index)?.int().map_err(|e| e.at_argument(index))
    }

    pub fn float(&self, index: usize) -> Result<f64> {
        self.get(index)?.float().map_err(|e| e.at_argument(index))
    }

    pub fn bool(&self, index: usize) -> Result<bool> {
        self.get(index)?.bool().map_err(|e| e.at_argument(index))
    }

    pub fn list<T: ?Sized + 'static>(&self, index: usize) -> Result<Vec<Arc<T>>> {
        self.get(index)?.list::<T>().map_err(|e| e.at_argument(index))
    }

    pub fn map<T: ?Sized + 'static>(&self, index: usize) -> Result<Vec<(String, Arc<T>)>> {
        self.get(index)?.map::<T>().map_err(|e| e.at_argument(index))
    }

    pub fn provider(&self, index: usize) -> Result<ObjectProvider> {
        self.get(index)?.provider().map_err(|e| e.at_argument(index))
    }
}
