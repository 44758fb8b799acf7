//! Disposal adapters: everything needed to destroy one bean.
//!
//! An adapter is created when a bean finishes initialization and turns out
//! to need destruction: its class has a destroy hook, its definition names
//! a destroy method, or a post-processor asked to take part. Singletons
//! register their adapter with the singleton registry; custom-scoped beans
//! hand a callback to their scope; prototypes get one built on demand by
//! `Container::destroy_bean`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace, warn};

use crate::bean::{Bean, BeanClass};
use crate::definition::INFER_METHOD;
use crate::error::{ContainerError, Result};
use crate::merge::ResolvedDefinition;
use crate::processor::{BeanPostProcessor, ProcessorChain};

/// Method name that duplicates the structural destroy hook.
pub const DESTROY: &str = "destroy";

/// Method names tried, in order, for an `(inferred)` destroy method.
const INFERRED_CANDIDATES: [&str; 2] = ["close", "shutdown"];

/// The destroy method configured for `definition`, with `(inferred)` resolved
/// against `class`. Computed once per resolved definition.
fn destroy_method_for(class: &BeanClass, definition: &ResolvedDefinition) -> Option<String> {
    definition
        .destroy_method
        .get_or_init(|| match definition.destroy_method_name() {
            Some(INFER_METHOD) if class.has_destroy_hook() => None,
            Some(INFER_METHOD) => INFERRED_CANDIDATES
                .iter()
                .find(|m| class.has_method(m))
                .map(|m| m.to_string()),
            Some(name) => Some(name.to_string()),
            None => None,
        })
        .clone()
}

pub(crate) struct DisposalAdapter {
    name: String,
    bean: Bean,
    invoke_destroy_hook: bool,
    destroy_method: Option<String>,
    processors: Vec<Arc<dyn BeanPostProcessor>>,
    destroyed: AtomicBool,
}

impl DisposalAdapter {
    /// Returns `true` if destroying `bean` would do anything.
    pub fn has_destruction(bean: &Bean, definition: &ResolvedDefinition, processors: &ProcessorChain) -> bool {
        bean.class().has_destroy_hook()
            || destroy_method_for(bean.class(), definition).is_some()
            || processors.iter().any(|p| p.requires_destruction(bean))
    }

    /// # Errors
    /// [`ContainerError::DefinitionStore`] if the definition enforces a
    /// destroy method the class does not declare.
    pub fn new(
        name: &str,
        bean: Bean,
        definition: &ResolvedDefinition,
        processors: &ProcessorChain,
    ) -> Result<Self> {
        let class = Arc::clone(bean.class());
        let invoke_destroy_hook = class.has_destroy_hook();

        let destroy_method = match destroy_method_for(&class, definition) {
            Some(method) if invoke_destroy_hook && method == DESTROY => None,
            Some(method) if !class.has_method(&method) => {
                if definition.is_enforce_destroy_method() {
                    return Err(ContainerError::definition_store(
                        name,
                        format!("could not find a destroy method named '{method}' on bean with name '{name}'"),
                    )
                    .with_resource(definition.resource_description()));
                }
                trace!(bean = %name, method = %method, "Configured destroy method not found, ignoring");
                None
            }
            other => other,
        };

        Ok(Self {
            name: name.to_string(),
            processors: processors.destruction_aware(&bean),
            bean,
            invoke_destroy_hook,
            destroy_method,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the before-destruction hooks, the structural destroy hook and
    /// the destroy method, in that order. Each failure is logged and the
    /// remaining steps still run; the first failure is returned.
    ///
    /// Only the first call does anything.
    pub fn destroy(&self) -> Result<()> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            trace!(bean = %self.name, "Already destroyed");
            return Ok(());
        }

        let mut first_error: Option<ContainerError> = None;
        let mut record = |step: &str, result: Result<()>| {
            if let Err(e) = result {
                warn!(bean = %self.name, step, error = %e, "Destroy step failed");
                first_error.get_or_insert(e);
            }
        };

        for processor in &self.processors {
            record("before_destruction", processor.before_destruction(&self.bean, &self.name));
        }

        let class = self.bean.class();
        if self.invoke_destroy_hook {
            if let Some(hook) = class.destroy_hook() {
                debug!(bean = %self.name, "Invoking destroy hook");
                record("destroy_hook", hook(self.bean.instance()));
            }
        }

        if let Some(ref method) = self.destroy_method {
            if let Some(f) = class.method(method) {
                debug!(bean = %self.name, method = %method, "Invoking destroy method");
                record("destroy_method", f(self.bean.instance()));
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}

impl std::fmt::Debug for DisposalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposalAdapter")
            .field("name", &self.name)
            .field("destroy_hook", &self.invoke_destroy_hook)
            .field("destroy_method", &self.destroy_method)
            .field("processors", &self.processors.len())
            .finish()
    }
}
