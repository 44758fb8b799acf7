//! Method injection without subclassing.
//!
//! A class that wants some of its methods overridden by the container
//! declares them with `overridable` and installs a `method_injection` hook.
//! When a definition carries lookup or replace overrides, the container
//! hands the freshly created instance a [`MethodInterceptor`]; the
//! instance's own methods check [`MethodInterceptor::is_overridden`] and
//! delegate back into the container.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;

use crate::bean::{Bean, BeanClass};
use crate::container::Container;
use crate::definition::{MethodOverride, MethodOverrides};
use crate::error::{ContainerError, Result};
use crate::key::TypeKey;
use crate::value::Value;

/// Re-implements a method on behalf of another bean.
///
/// Registered as an ordinary bean whose class `implements::<dyn MethodReplacer>`.
pub trait MethodReplacer: Send + Sync {
    fn reimplement(&self, method: &str, args: &[Value]) -> Result<Value>;
}

/// Delegates overridden methods of one bean instance back into the container.
#[derive(Clone)]
pub struct MethodInterceptor {
    container: Weak<Container>,
    bean: String,
    overrides: Arc<MethodOverrides>,
    class: Arc<BeanClass>,
}

impl MethodInterceptor {
    pub(crate) fn new(
        container: Weak<Container>,
        bean: &str,
        overrides: MethodOverrides,
        class: Arc<BeanClass>,
    ) -> Self {
        Self {
            container,
            bean: bean.to_string(),
            overrides: Arc::new(overrides),
            class,
        }
    }

    /// The name of the bean this interceptor belongs to.
    pub fn bean_name(&self) -> &str {
        &self.bean
    }

    pub fn is_overridden(&self, method: &str) -> bool {
        self.overrides.get(method).is_some()
    }

    fn container(&self) -> Result<Arc<Container>> {
        self.container.upgrade().ok_or_else(|| {
            ContainerError::custom_msg(format!(
                "container of bean '{}' has been dropped; method injection unavailable",
                self.bean
            ))
        })
    }

    /// Runs the lookup override for `method`: the named bean, or the unique
    /// bean of the method's declared return type.
    pub fn lookup(&self, method: &str) -> Result<Bean> {
        let target = match self.overrides.get(method) {
            Some(MethodOverride::Lookup { bean, .. }) => bean.clone(),
            _ => {
                return Err(ContainerError::custom_msg(format!(
                    "method '{method}' of bean '{}' has no lookup override",
                    self.bean
                )));
            }
        };
        let container = self.container()?;
        trace!(bean = %self.bean, method, target = ?target, "Lookup method invoked");
        match target {
            Some(name) => container.get_bean(&name),
            None => {
                let key = self.return_type(method)?;
                container.get_bean_by_key(&key)
            }
        }
    }

    /// [`lookup`](Self::lookup), viewed as `Arc<T>`.
    pub fn lookup_as<T: ?Sized + 'static>(&self, method: &str) -> Result<Arc<T>> {
        let bean = self.lookup(method)?;
        bean.downcast::<T>().ok_or_else(|| {
            ContainerError::type_mismatch(
                format!("lookup method '{method}'"),
                TypeKey::of::<T>().short_name(),
                bean.type_key().short_name(),
            )
        })
    }

    /// Runs the replace override for `method`.
    pub fn replace(&self, method: &str, args: &[Value]) -> Result<Value> {
        let replacer = match self.overrides.get(method) {
            Some(MethodOverride::Replace { replacer, .. }) => replacer.clone(),
            _ => {
                return Err(ContainerError::custom_msg(format!(
                    "method '{method}' of bean '{}' has no replace override",
                    self.bean
                )));
            }
        };
        let bean = self.container()?.get_bean(&replacer)?;
        let replacer_impl = bean.downcast::<dyn MethodReplacer>().ok_or_else(|| {
            ContainerError::type_mismatch(replacer.as_str(), "MethodReplacer", bean.type_key().short_name())
        })?;
        trace!(bean = %self.bean, method, replacer = %replacer, "Replaced method invoked");
        replacer_impl.reimplement(method, args)
    }

    fn return_type(&self, method: &str) -> Result<TypeKey> {
        self.class.overridable_method(method).flatten().ok_or_else(|| {
            ContainerError::definition_store(
                self.bean.as_str(),
                format!(
                    "lookup method '{method}' names no bean and class [{}] declares no return type for it",
                    self.class.name()
                ),
            )
        })
    }
}

impl fmt::Debug for MethodInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodInterceptor")
            .field("bean", &self.bean)
            .field("overrides", &self.overrides)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Command;

    fn interceptor() -> MethodInterceptor {
        let mut overrides = MethodOverrides::default();
        overrides.add(MethodOverride::Lookup {
            method: "create_command".to_string(),
            bean: None,
        });
        let class = BeanClass::builder::<Command>()
            .overridable("create_command", None)
            .build();
        MethodInterceptor::new(Weak::new(), "manager", overrides, class)
    }

    #[test]
    fn knows_its_overrides() {
        let interceptor = interceptor();
        assert!(interceptor.is_overridden("create_command"));
        assert!(!interceptor.is_overridden("process"));
        assert_eq!(interceptor.bean_name(), "manager");
    }

    #[test]
    fn dropped_container_is_an_error() {
        match interceptor().lookup("create_command") {
            Err(ContainerError::Custom(e)) => assert!(e.to_string().contains("has been dropped")),
            other => panic!("Expected Custom error, got: {other:?}"),
        }
    }

    #[test]
    fn wrong_override_kind() {
        assert!(interceptor().replace("create_command", &[]).is_err());
        assert!(interceptor().lookup("process").is_err());
    }
}
