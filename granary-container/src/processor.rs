//! Post-processor hooks around bean creation and destruction.
//!
//! A [`BeanPostProcessor`] implements any subset of the hooks; every method
//! has a pass-through default. Processors run in ascending
//! [`order`](BeanPostProcessor::order), ties in registration order.
//!
//! Short-circuits are expressed through return values rather than errors:
//! `before_instantiation` returning `Some` replaces the whole creation,
//! `after_instantiation` returning `false` skips property population and
//! `filter_property_values` returning `None` skips applying property values.

use std::sync::Arc;

use crate::bean::{Bean, BeanClass};
use crate::definition::PropertyValues;
use crate::error::Result;
use crate::merge::ResolvedDefinition;

pub trait BeanPostProcessor: Send + Sync {
    /// Lower runs first.
    fn order(&self) -> i32 {
        0
    }

    /// Called before the container instantiates a bean. Returning a bean
    /// skips instantiation, population and initialization; only the
    /// after-initialization hooks still run on the returned bean.
    fn before_instantiation(&self, _class: &Arc<BeanClass>, _name: &str) -> Result<Option<Bean>> {
        Ok(None)
    }

    /// Called once per resolved definition, right after the first instance
    /// was created from it.
    fn inspect_merged_definition(
        &self,
        _definition: &ResolvedDefinition,
        _class: &Arc<BeanClass>,
        _name: &str,
    ) -> Result<()> {
        Ok(())
    }

    /// Returning `false` skips property population for this bean.
    fn after_instantiation(&self, _bean: &Bean, _name: &str) -> Result<bool> {
        Ok(true)
    }

    /// May rewrite the property values about to be applied. `None` skips
    /// applying them altogether.
    fn filter_property_values(
        &self,
        values: PropertyValues,
        _bean: &Bean,
        _name: &str,
    ) -> Result<Option<PropertyValues>> {
        Ok(Some(values))
    }

    fn before_initialization(&self, bean: Bean, _name: &str) -> Result<Bean> {
        Ok(bean)
    }

    /// May return a different bean (e.g. a wrapper) to be exposed instead.
    fn after_initialization(&self, bean: Bean, _name: &str) -> Result<Bean> {
        Ok(bean)
    }

    /// The reference handed out for a singleton still in creation, when a
    /// circular reference needs it. Invoked at most once per bean.
    fn early_reference(&self, bean: Bean, _name: &str) -> Result<Bean> {
        Ok(bean)
    }

    /// Predicts the class a bean will have, before it exists.
    fn predict_class(&self, _class: Option<&Arc<BeanClass>>, _name: &str) -> Option<Arc<BeanClass>> {
        None
    }

    /// Called when a definition was replaced or removed.
    fn reset_definition(&self, _name: &str) {}

    /// Whether this processor wants `before_destruction` for `bean`.
    fn requires_destruction(&self, _bean: &Bean) -> bool {
        false
    }

    fn before_destruction(&self, _bean: &Bean, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// The registered processors, kept sorted by order.
#[derive(Clone, Default)]
pub(crate) struct ProcessorChain {
    processors: Arc<Vec<Arc<dyn BeanPostProcessor>>>,
}

impl ProcessorChain {
    pub fn new(mut processors: Vec<Arc<dyn BeanPostProcessor>>) -> Self {
        processors.sort_by_key(|p| p.order());
        Self {
            processors: Arc::new(processors),
        }
    }

    /// A new chain with `processor` added.
    pub fn with(&self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        let mut processors: Vec<_> = self.processors.iter().cloned().collect();
        processors.push(processor);
        Self::new(processors)
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn BeanPostProcessor>> {
        self.processors.iter()
    }

    pub fn before_instantiation(&self, class: &Arc<BeanClass>, name: &str) -> Result<Option<Bean>> {
        for p in self.iter() {
            if let Some(bean) = p.before_instantiation(class, name)? {
                return Ok(Some(bean));
            }
        }
        Ok(None)
    }

    pub fn before_initialization(&self, mut bean: Bean, name: &str) -> Result<Bean> {
        for p in self.iter() {
            bean = p.before_initialization(bean, name)?;
        }
        Ok(bean)
    }

    pub fn after_initialization(&self, mut bean: Bean, name: &str) -> Result<Bean> {
        for p in self.iter() {
            bean = p.after_initialization(bean, name)?;
        }
        Ok(bean)
    }

    pub fn early_reference(&self, mut bean: Bean, name: &str) -> Result<Bean> {
        for p in self.iter() {
            bean = p.early_reference(bean, name)?;
        }
        Ok(bean)
    }

    pub fn predict_class(&self, class: Option<&Arc<BeanClass>>, name: &str) -> Option<Arc<BeanClass>> {
        self.iter().find_map(|p| p.predict_class(class, name))
    }

    /// The processors taking part in destroying `bean`.
    pub fn destruction_aware(&self, bean: &Bean) -> Vec<Arc<dyn BeanPostProcessor>> {
        self.iter()
            .filter(|p| p.requires_destruction(bean))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.processors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Recorder {
        order: i32,
        label: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl BeanPostProcessor for Recorder {
        fn order(&self) -> i32 {
            self.order
        }

        fn before_initialization(&self, bean: Bean, _name: &str) -> Result<Bean> {
            self.log.lock().push(self.label);
            Ok(bean)
        }
    }

    struct Replacer;

    impl BeanPostProcessor for Replacer {
        fn after_initialization(&self, _bean: Bean, _name: &str) -> Result<Bean> {
            Ok(Bean::of("replaced".to_string()))
        }
    }

    #[test]
    fn runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = ProcessorChain::new(vec![
            Arc::new(Recorder { order: 10, label: "late", log: log.clone() }),
            Arc::new(Recorder { order: -5, label: "early", log: log.clone() }),
        ]);
        chain.before_initialization(Bean::of(1u8), "x").unwrap();
        assert_eq!(*log.lock(), vec!["early", "late"]);
    }

    #[test]
    fn after_initialization_may_replace() {
        let chain = ProcessorChain::new(vec![Arc::new(Replacer)]);
        let original = Bean::of(1u8);
        let exposed = chain.after_initialization(original.clone(), "x").unwrap();
        assert!(!exposed.same(&original));
        assert_eq!(*exposed.downcast::<String>().unwrap(), "replaced");
    }

    #[test]
    fn with_adds_without_touching_original() {
        let chain = ProcessorChain::default();
        let extended = chain.with(Arc::new(Replacer));
        assert!(chain.is_empty());
        assert_eq!(extended.len(), 1);
        assert!(extended.destruction_aware(&Bean::of(1u8)).is_empty());
    }
}
