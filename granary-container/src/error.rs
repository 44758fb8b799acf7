//! Error types for container operations.
//!
//! Every failure carries the bean name it concerns and, where it helps,
//! a rendered chain, a candidate list and a `Hint:` line. Errors raised
//! deep inside a creation call chain are wrapped by each layer that adds
//! context (constructor resolution, then the lifecycle engine, then
//! `get_bean`), so [`ContainerError::chain`] shows the full story and
//! [`ContainerError::root_cause`] the original failure.

use std::fmt;

use granary_support::rendering::{render_chain, render_names};

/// Boxed user error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Malformed or unresolvable definition (e.g. unknown parent, alias clash).
    #[error("{}", .0)]
    DefinitionStore(DefinitionStoreError),

    /// Failure anywhere in the creation state machine of one bean.
    #[error("{}", .0)]
    BeanCreation(BeanCreationError),

    /// A bean was requested again while it was still being created.
    #[error("{}", .0)]
    CircularCreation(CircularCreationError),

    /// A required constructor argument, property or dependency could not be satisfied.
    #[error("{}", .0)]
    UnsatisfiedDependency(UnsatisfiedDependencyError),

    /// More than one candidate survived the tie-breaks.
    #[error("{}", .0)]
    NoUniqueBean(NoUniqueBeanError),

    /// No bean with the requested name or type exists.
    #[error("{}", .0)]
    NoSuchBean(NoSuchBeanError),

    /// Several constructors or factory methods matched equally well.
    #[error("{}", .0)]
    AmbiguousConstructor(AmbiguousConstructorError),

    /// No constructor or factory method could be satisfied.
    #[error("{}", .0)]
    NoMatchingConstructor(NoMatchingConstructorError),

    /// A bean or value was not of the type the caller asked for.
    #[error("{}", .0)]
    BeanNotOfRequiredType(BeanNotOfRequiredTypeError),

    /// A raw instance was injected into other beans before being wrapped.
    #[error("{}", .0)]
    RawInjectionConflict(RawInjectionConflictError),

    /// Singleton creation was requested while singletons are being destroyed.
    #[error("Singleton bean creation not allowed while singletons of this container are in destruction (bean '{0}')")]
    CreationNotAllowed(String),

    /// A definition names a scope that was never registered.
    #[error("No scope registered for scope name '{scope}' (bean '{bean}')\n  Hint: register it with ContainerBuilder::scope()")]
    UnknownScope { bean: String, scope: String },

    /// A value could not be converted to the type an injection point needs.
    #[error("Cannot convert value of type [{from}] to required type [{to}]: {reason}")]
    Conversion { from: String, to: String, reason: String },

    /// Error raised by user code (constructors, setters, hooks).
    #[error("{0}")]
    Custom(#[source] BoxError),
}

impl ContainerError {
    pub fn definition_store(bean: impl Into<String>, message: impl Into<String>) -> Self {
        ContainerError::DefinitionStore(DefinitionStoreError {
            bean: bean.into(),
            resource: None,
            message: message.into(),
        })
    }

    pub fn creation(bean: impl Into<String>, message: impl Into<String>) -> Self {
        ContainerError::BeanCreation(BeanCreationError {
            bean: bean.into(),
            resource: None,
            message: message.into(),
            source: None,
            related: Vec::new(),
        })
    }

    /// Wraps `cause` in a creation error for `bean`.
    pub fn creation_caused_by(bean: impl Into<String>, message: impl Into<String>, cause: ContainerError) -> Self {
        ContainerError::BeanCreation(BeanCreationError {
            bean: bean.into(),
            resource: None,
            message: message.into(),
            source: Some(Box::new(cause)),
            related: Vec::new(),
        })
    }

    pub fn unsatisfied(
        bean: impl Into<String>,
        injection_point: impl Into<String>,
        message: impl Into<String>,
        cause: Option<ContainerError>,
    ) -> Self {
        ContainerError::UnsatisfiedDependency(UnsatisfiedDependencyError {
            bean: bean.into(),
            injection_point: injection_point.into(),
            message: message.into(),
            source: cause.map(Box::new),
        })
    }

    pub fn no_such_bean_named(name: impl Into<String>) -> Self {
        ContainerError::NoSuchBean(NoSuchBeanError {
            requested: Requested::Name(name.into()),
            message: None,
            suggestions: Vec::new(),
        })
    }

    pub fn no_such_bean_of_type(type_name: impl Into<String>, message: Option<String>) -> Self {
        ContainerError::NoSuchBean(NoSuchBeanError {
            requested: Requested::Type(type_name.into()),
            message,
            suggestions: Vec::new(),
        })
    }

    pub fn type_mismatch(what: impl Into<String>, required: impl Into<String>, actual: impl Into<String>) -> Self {
        ContainerError::BeanNotOfRequiredType(BeanNotOfRequiredTypeError {
            bean: what.into(),
            required: required.into(),
            actual: actual.into(),
        })
    }

    /// Wraps an arbitrary user error.
    pub fn custom(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        ContainerError::Custom(Box::new(err))
    }

    /// Wraps a plain message as a user error.
    pub fn custom_msg(message: impl Into<String>) -> Self {
        let message: String = message.into();
        ContainerError::Custom(message.into())
    }

    /// Re-labels a type mismatch as concerning a numbered argument.
    pub(crate) fn at_argument(self, index: usize) -> Self {
        match self {
            ContainerError::BeanNotOfRequiredType(mut e) => {
                e.bean = format!("argument #{index}");
                ContainerError::BeanNotOfRequiredType(e)
            }
            other => other,
        }
    }

    /// Attaches a resource description to creation and definition errors.
    pub fn with_resource(self, resource: Option<&str>) -> Self {
        let Some(resource) = resource else {
            return self;
        };
        match self {
            ContainerError::BeanCreation(mut e) => {
                e.resource.get_or_insert_with(|| resource.to_string());
                ContainerError::BeanCreation(e)
            }
            ContainerError::DefinitionStore(mut e) => {
                e.resource.get_or_insert_with(|| resource.to_string());
                ContainerError::DefinitionStore(e)
            }
            other => other,
        }
    }

    /// The wrapped container error, if this error wraps one.
    pub fn cause(&self) -> Option<&ContainerError> {
        match self {
            ContainerError::BeanCreation(e) => e.source.as_deref(),
            ContainerError::UnsatisfiedDependency(e) => e.source.as_deref(),
            _ => None,
        }
    }

    /// This error followed by every wrapped cause, outermost first.
    pub fn chain(&self) -> impl Iterator<Item = &ContainerError> {
        std::iter::successors(Some(self), |e| e.cause())
    }

    /// The innermost wrapped cause.
    pub fn root_cause(&self) -> &ContainerError {
        self.chain().last().unwrap_or(self)
    }

    /// Returns `true` if any error in the chain is a circular-creation error.
    pub fn is_circular(&self) -> bool {
        self.chain()
            .any(|e| matches!(e, ContainerError::CircularCreation(_)))
    }

    /// Returns `true` if any error in the chain satisfies `pred`.
    pub fn any_cause(&self, pred: impl Fn(&ContainerError) -> bool) -> bool {
        self.chain().any(pred)
    }
}

/// Error for malformed or unresolvable definitions.
#[derive(Debug)]
pub struct DefinitionStoreError {
    pub bean: String,
    pub resource: Option<String>,
    pub message: String,
}

impl fmt::Display for DefinitionStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid bean definition '{}'", self.bean)?;
        if let Some(ref resource) = self.resource {
            write!(f, " defined in {resource}")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Error wrapping any failure in the lifecycle of one bean.
#[derive(Debug)]
pub struct BeanCreationError {
    pub bean: String,
    pub resource: Option<String>,
    pub message: String,
    pub source: Option<Box<ContainerError>>,
    /// Failures that were tolerated on the way (e.g. rejected constructor candidates).
    pub related: Vec<ContainerError>,
}

impl fmt::Display for BeanCreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error creating bean with name '{}'", self.bean)?;
        if let Some(ref resource) = self.resource {
            write!(f, " defined in {resource}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(ref source) = self.source {
            write!(f, "; nested: {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BeanCreationError {}

/// Error when a bean is re-entered during its own creation.
#[derive(Debug)]
pub struct CircularCreationError {
    pub bean: String,
    /// Creation chain ending in the re-entered bean, e.g. `["a", "b", "a"]`.
    pub chain: Vec<String>,
}

impl fmt::Display for CircularCreationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Requested bean '{}' is currently in creation: is there an unresolvable circular reference?",
            self.bean
        )?;
        if self.chain.len() > 1 {
            write!(f, "\n  Cycle: {}", render_chain(&self.chain))?;
        }
        write!(
            f,
            "\n  Hint: break the cycle with property injection or a Provider<T> parameter"
        )
    }
}

/// Error when an injection point cannot be satisfied.
#[derive(Debug)]
pub struct UnsatisfiedDependencyError {
    pub bean: String,
    /// e.g. `constructor parameter 0 (repository)` or `property 'cache'`.
    pub injection_point: String,
    pub message: String,
    pub source: Option<Box<ContainerError>>,
}

impl fmt::Display for UnsatisfiedDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error creating bean with name '{}': unsatisfied dependency expressed through {}: {}",
            self.bean, self.injection_point, self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, "; nested: {source}")?;
        }
        Ok(())
    }
}

impl std::error::Error for UnsatisfiedDependencyError {}

/// Error when type-based lookup finds several equally eligible beans.
#[derive(Debug)]
pub struct NoUniqueBeanError {
    pub required: String,
    pub candidates: Vec<String>,
    pub message: Option<String>,
}

impl fmt::Display for NoUniqueBeanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No qualifying bean of type '{}' available: expected single matching bean but found {}: {}",
            self.required,
            self.candidates.len(),
            render_names(&self.candidates)
        )?;
        if let Some(ref message) = self.message {
            write!(f, " ({message})")?;
        }
        write!(
            f,
            "\n  Hint: mark one candidate as primary, or qualify the injection point by name"
        )
    }
}

/// What a failed lookup asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requested {
    Name(String),
    Type(String),
}

/// Error when a requested bean does not exist.
#[derive(Debug)]
pub struct NoSuchBeanError {
    pub requested: Requested,
    pub message: Option<String>,
    /// Similar names that ARE registered.
    pub suggestions: Vec<String>,
}

impl fmt::Display for NoSuchBeanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.requested {
            Requested::Name(ref name) => write!(f, "No bean named '{name}' available")?,
            Requested::Type(ref ty) => write!(f, "No qualifying bean of type '{ty}' available")?,
        }
        if let Some(ref message) = self.message {
            write!(f, ": {message}")?;
        }
        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }
        Ok(())
    }
}

/// Error when constructor candidates tie under strict resolution.
#[derive(Debug)]
pub struct AmbiguousConstructorError {
    pub bean: String,
    pub candidates: Vec<String>,
}

impl fmt::Display for AmbiguousConstructorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ambiguous constructor or factory method matches found on bean '{}': {}",
            self.bean,
            self.candidates.join(" | ")
        )?;
        write!(
            f,
            "\n  Hint: specify index/type/name arguments for simple parameters, or enable lenient constructor resolution"
        )
    }
}

/// Error when no constructor or factory method can be satisfied.
#[derive(Debug)]
pub struct NoMatchingConstructorError {
    pub bean: String,
    pub class: String,
    pub message: String,
    /// Why each rejected candidate failed, in the order they were tried.
    pub causes: Vec<ContainerError>,
}

impl fmt::Display for NoMatchingConstructorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Could not resolve matching constructor on bean class [{}] for bean '{}': {}",
            self.class, self.bean, self.message
        )?;
        if let Some(last) = self.causes.last() {
            write!(f, "\n  Last failure: {last}")?;
        }
        Ok(())
    }
}

/// Error when a value is not of the required type.
#[derive(Debug)]
pub struct BeanNotOfRequiredTypeError {
    /// Bean name, or a description such as `argument #1`.
    pub bean: String,
    pub required: String,
    pub actual: String,
}

impl fmt::Display for BeanNotOfRequiredTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' is expected to be of type '{}' but was actually of type '{}'",
            self.bean, self.required, self.actual
        )
    }
}

/// Error when an early (raw) reference escaped before the bean got wrapped.
#[derive(Debug)]
pub struct RawInjectionConflictError {
    pub bean: String,
    pub dependents: Vec<String>,
}

impl fmt::Display for RawInjectionConflictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bean with name '{}' has been injected into other beans [{}] in its raw version as part of a circular reference, but has eventually been wrapped",
            self.bean,
            render_names(&self.dependents)
        )?;
        write!(
            f,
            "\n  Hint: those beans do not use the final version of the bean; consider a Provider<T> injection point, or enable allow_raw_injection_despite_wrapping"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_error_display() {
        let err = ContainerError::CircularCreation(CircularCreationError {
            bean: "a".into(),
            chain: vec!["a".into(), "b".into(), "a".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("currently in creation"));
        assert!(msg.contains("a → b → a"));
    }

    #[test]
    fn no_unique_display_lists_candidates() {
        let err = ContainerError::NoUniqueBean(NoUniqueBeanError {
            required: "Store".into(),
            candidates: vec!["disk".into(), "memory".into()],
            message: None,
        });
        let msg = err.to_string();
        assert!(msg.contains("found 2"));
        assert!(msg.contains("'disk', 'memory'"));
        assert!(msg.contains("primary"));
    }

    #[test]
    fn chain_walks_nested_causes() {
        let root = ContainerError::CircularCreation(CircularCreationError {
            bean: "a".into(),
            chain: vec![],
        });
        let mid = ContainerError::unsatisfied("b", "property 'a'", "could not resolve", Some(root));
        let top = ContainerError::creation_caused_by("a", "population failed", mid);

        assert_eq!(top.chain().count(), 3);
        assert!(matches!(top.root_cause(), ContainerError::CircularCreation(_)));
        assert!(top.is_circular());
        assert!(top.to_string().contains("nested"));
    }

    #[test]
    fn resource_is_attached_once() {
        let err = ContainerError::creation("x", "boom")
            .with_resource(Some("orders.toml"))
            .with_resource(Some("other.toml"));
        assert!(err.to_string().contains("defined in orders.toml"));
        assert!(!err.to_string().contains("other.toml"));
    }

    #[test]
    fn no_such_bean_suggestions() {
        let err = ContainerError::NoSuchBean(NoSuchBeanError {
            requested: Requested::Name("userServise".into()),
            message: None,
            suggestions: vec!["userService".into()],
        });
        let msg = err.to_string();
        assert!(msg.contains("No bean named 'userServise'"));
        assert!(msg.contains("- userService"));
    }

    #[test]
    fn argument_relabel() {
        let err = ContainerError::type_mismatch("value", "i64", "String").at_argument(2);
        assert!(err.to_string().contains("argument #2"));
    }

    #[test]
    fn custom_message() {
        let err = ContainerError::custom_msg("disk full");
        assert_eq!(err.to_string(), "disk full");
    }
}
