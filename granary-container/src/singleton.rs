//! The singleton registry: a three-tier cache of shared instances.
//!
//! Every singleton name is in at most one of three states:
//! - *fully created*: in the main cache, handed out as is
//! - *early reference*: exposed before population finished, so that a bean
//!   it depends on can refer back to it
//! - *factory pending*: a supplier of the early reference, invoked at most
//!   once when a circular reference first asks for it
//!
//! The three maps, the registration order and the in-creation set live
//! behind one mutex and are always observed together. Creation itself is
//! serialized by a separate re-entrant lock held for the whole supplier
//! call, which gives the at-most-once guarantee: a second thread asking for
//! the same singleton blocks until the first one finished, then finds it
//! in the main cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, info, instrument, trace};

use crate::bean::Bean;
use crate::disposal::DisposalAdapter;
use crate::error::{CircularCreationError, ContainerError, Result};
use crate::graph::DependencyGraph;
use crate::path::CreationPath;

/// Supplier of an early reference.
pub(crate) type EarlyFactory = Box<dyn FnOnce() -> Result<Bean> + Send>;

#[derive(Default)]
struct Caches {
    objects: HashMap<String, Bean>,
    early: HashMap<String, Bean>,
    factories: HashMap<String, EarlyFactory>,
    /// Fully created singletons in registration order.
    registered: Vec<String>,
    in_creation: HashSet<String>,
}

impl Caches {
    fn remove(&mut self, name: &str) {
        self.objects.remove(name);
        self.early.remove(name);
        self.factories.remove(name);
        self.registered.retain(|n| n != name);
    }
}

pub(crate) struct SingletonRegistry {
    caches: Mutex<Caches>,
    creation_lock: ReentrantMutex<()>,
    disposables: Mutex<Vec<(String, Arc<DisposalAdapter>)>>,
    graph: DependencyGraph,
    in_destruction: AtomicBool,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(Caches::default()),
            creation_lock: ReentrantMutex::new(()),
            disposables: Mutex::new(Vec::new()),
            graph: DependencyGraph::new(),
            in_destruction: AtomicBool::new(false),
        }
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Registers an externally created instance as a fully created singleton.
    pub fn register_singleton(&self, name: &str, bean: Bean) -> Result<()> {
        let _creation = self.creation_lock.lock();
        let mut caches = self.caches.lock();
        if let Some(existing) = caches.objects.get(name) {
            return Err(ContainerError::definition_store(
                name,
                format!("could not register object [{bean:?}]: there is already object [{existing:?}] bound"),
            ));
        }
        Self::add(&mut caches, name, bean);
        debug!(bean = %name, "Registered singleton instance");
        Ok(())
    }

    fn add(caches: &mut Caches, name: &str, bean: Bean) {
        caches.objects.insert(name.to_string(), bean);
        caches.early.remove(name);
        caches.factories.remove(name);
        if !caches.registered.iter().any(|n| n == name) {
            caches.registered.push(name.to_string());
        }
    }

    /// Installs the early-reference supplier for a singleton in creation.
    pub fn add_early_factory(&self, name: &str, factory: EarlyFactory) {
        let mut caches = self.caches.lock();
        if !caches.objects.contains_key(name) {
            caches.factories.insert(name.to_string(), factory);
            caches.early.remove(name);
            trace!(bean = %name, "Exposed early reference factory");
        }
    }

    /// Looks `name` up in the main cache, then, for a singleton currently in
    /// creation, in the early-reference cache; with `allow_early` it finally
    /// invokes a pending early-reference factory (once) and caches its result.
    ///
    /// Early references are only handed to the thread that holds the creation
    /// lock, i.e. the call chain building the singleton. Any other thread gets
    /// `None`, falls back to [`get_or_create`](Self::get_or_create) and blocks
    /// there until the fully created instance is available.
    pub fn get_singleton(&self, name: &str, allow_early: bool) -> Result<Option<Bean>> {
        {
            let caches = self.caches.lock();
            if let Some(bean) = caches.objects.get(name) {
                return Ok(Some(bean.clone()));
            }
            if !caches.in_creation.contains(name) {
                return Ok(None);
            }
        }

        let Some(_creation) = self.creation_lock.try_lock() else {
            return Ok(None);
        };
        let factory = {
            let mut caches = self.caches.lock();
            if let Some(bean) = caches.objects.get(name).or_else(|| caches.early.get(name)) {
                trace!(bean = %name, "Returning early reference");
                return Ok(Some(bean.clone()));
            }
            if !allow_early {
                return Ok(None);
            }
            match caches.factories.remove(name) {
                Some(factory) => factory,
                None => return Ok(None),
            }
        };

        trace!(bean = %name, "Invoking early reference factory");
        let early = factory()?;
        let mut caches = self.caches.lock();
        if let Some(bean) = caches.objects.get(name) {
            return Ok(Some(bean.clone()));
        }
        caches.early.insert(name.to_string(), early.clone());
        Ok(Some(early))
    }

    /// Returns the singleton `name`, creating it with `supplier` if needed.
    ///
    /// # Errors
    /// - [`ContainerError::CreationNotAllowed`] during destruction
    /// - [`ContainerError::CircularCreation`] if `name` is already in creation
    ///   on this call chain
    /// - whatever `supplier` returns; partial state (in-creation marker,
    ///   early reference, pending factory) is rolled back first
    pub fn get_or_create(
        &self,
        name: &str,
        path: CreationPath<'_>,
        supplier: impl FnOnce() -> Result<Bean>,
    ) -> Result<Bean> {
        let _creation = self.creation_lock.lock();
        {
            let mut caches = self.caches.lock();
            if let Some(bean) = caches.objects.get(name) {
                return Ok(bean.clone());
            }
            if self.in_destruction.load(Ordering::Acquire) {
                return Err(ContainerError::CreationNotAllowed(name.to_string()));
            }
            if !caches.in_creation.insert(name.to_string()) {
                let chain = path.cycle_to(name);
                tracing::warn!(bean = %name, chain = ?chain, "Singleton requested while in creation");
                return Err(ContainerError::CircularCreation(CircularCreationError {
                    bean: name.to_string(),
                    chain,
                }));
            }
        }
        debug!(bean = %name, "Creating shared instance of singleton bean");

        let result = supplier();

        let mut caches = self.caches.lock();
        caches.in_creation.remove(name);
        match result {
            Ok(bean) => {
                Self::add(&mut caches, name, bean.clone());
                Ok(bean)
            }
            Err(e) => {
                caches.early.remove(name);
                caches.factories.remove(name);
                trace!(bean = %name, "Rolled back failed singleton creation");
                Err(e)
            }
        }
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        self.caches.lock().objects.contains_key(name)
    }

    pub fn is_in_creation(&self, name: &str) -> bool {
        self.caches.lock().in_creation.contains(name)
    }

    /// Fully created singleton names in registration order.
    pub fn singleton_names(&self) -> Vec<String> {
        self.caches.lock().registered.clone()
    }

    pub fn singleton_count(&self) -> usize {
        self.caches.lock().registered.len()
    }

    pub fn register_disposable(&self, name: &str, adapter: Arc<DisposalAdapter>) {
        let mut disposables = self.disposables.lock();
        match disposables.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = adapter,
            None => disposables.push((name.to_string(), adapter)),
        }
        trace!(bean = %name, "Registered for destruction");
    }

    pub fn is_in_destruction(&self) -> bool {
        self.in_destruction.load(Ordering::Acquire)
    }

    /// Destroys every singleton: disposables in reverse registration order,
    /// each after the beans depending on it.
    #[instrument(skip(self), name = "destroy_singletons")]
    pub fn destroy_singletons(&self) {
        self.in_destruction.store(true, Ordering::Release);
        let names: Vec<String> = self
            .disposables
            .lock()
            .iter()
            .map(|(n, _)| n.clone())
            .collect();
        info!(disposable = names.len(), "Destroying singletons");

        for name in names.iter().rev() {
            self.destroy_singleton(name);
        }

        self.graph.clear();
        {
            let mut caches = self.caches.lock();
            caches.objects.clear();
            caches.early.clear();
            caches.factories.clear();
            caches.registered.clear();
        }
        self.in_destruction.store(false, Ordering::Release);
    }

    /// Removes the singleton `name` and destroys it together with its
    /// dependents and contained beans.
    pub fn destroy_singleton(&self, name: &str) {
        self.caches.lock().remove(name);
        let adapter = {
            let mut disposables = self.disposables.lock();
            disposables
                .iter()
                .position(|(n, _)| n == name)
                .map(|pos| disposables.remove(pos).1)
        };
        self.destroy_bean(name, adapter);
    }

    fn destroy_bean(&self, name: &str, adapter: Option<Arc<DisposalAdapter>>) {
        let dependents = self.graph.take_dependents(name);
        if !dependents.is_empty() {
            trace!(bean = %name, dependents = ?dependents, "Destroying dependents first");
        }
        for dependent in &dependents {
            self.destroy_singleton(dependent);
        }

        if let Some(adapter) = adapter {
            debug!(bean = %name, "Destroying singleton");
            // Failures were logged by the adapter; teardown continues.
            let _ = adapter.destroy();
        }

        for inner in self.graph.take_contained(name) {
            self.destroy_singleton(&inner);
        }

        self.graph.forget(name);
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.lock();
        f.debug_struct("SingletonRegistry")
            .field("singletons", &caches.registered)
            .field("early", &caches.early.keys().collect::<Vec<_>>())
            .field("in_creation", &caches.in_creation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean::BeanClass;
    use crate::definition::BeanDefinition;
    use crate::merge::ResolvedDefinition;
    use crate::processor::ProcessorChain;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn creates_once_and_caches() {
        let registry = SingletonRegistry::new();
        let calls = AtomicUsize::new(0);
        let create = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bean::of(5i64))
        };
        let a = registry.get_or_create("x", CreationPath::root(), create).unwrap();
        let b = registry
            .get_or_create("x", CreationPath::root(), || panic!("must not be called"))
            .unwrap();
        assert!(a.same(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.singleton_names(), vec!["x".to_string()]);
    }

    #[test]
    fn failure_rolls_back() {
        let registry = SingletonRegistry::new();
        let result = registry.get_or_create("x", CreationPath::root(), || {
            registry.add_early_factory("x", Box::new(|| Ok(Bean::of(1i64))));
            Err(ContainerError::custom_msg("boom"))
        });
        assert!(result.is_err());
        assert!(!registry.is_in_creation("x"));
        assert!(registry.get_singleton("x", true).unwrap().is_none());

        let retried = registry.get_or_create("x", CreationPath::root(), || Ok(Bean::of(2i64)));
        assert!(retried.is_ok());
    }

    #[test]
    fn reentrant_creation_is_circular() {
        let registry = SingletonRegistry::new();
        let result = registry.get_or_create("a", CreationPath::root(), || {
            registry.get_or_create("a", CreationPath::root(), || Ok(Bean::of(1i64)))
        });
        match result {
            Err(ContainerError::CircularCreation(e)) => assert_eq!(e.bean, "a"),
            other => panic!("Expected CircularCreation, got: {other:?}"),
        }
    }

    #[test]
    fn early_factory_invoked_once() {
        let registry = SingletonRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let raw = Bean::of(10i64);

        let created = registry
            .get_or_create("a", CreationPath::root(), || {
                let counter = Arc::clone(&calls);
                let early = raw.clone();
                registry.add_early_factory(
                    "a",
                    Box::new(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(early)
                    }),
                );
                let first = registry.get_singleton("a", true)?.expect("early reference");
                let second = registry.get_singleton("a", true)?.expect("early reference");
                assert!(first.same(&second));
                assert!(registry.get_singleton("a", false)?.is_some());
                Ok(raw.clone())
            })
            .unwrap();

        assert!(created.same(&raw));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn not_in_creation_means_no_early_lookup() {
        let registry = SingletonRegistry::new();
        registry.add_early_factory("a", Box::new(|| Ok(Bean::of(1i64))));
        assert!(registry.get_singleton("a", true).unwrap().is_none());
    }

    #[test]
    fn concurrent_creation_happens_once() {
        let registry = Arc::new(SingletonRegistry::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    registry
                        .get_or_create("x", CreationPath::root(), || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(10));
                            Ok(Bean::of(1i64))
                        })
                        .unwrap()
                })
            })
            .collect();

        let beans: Vec<Bean> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(beans.windows(2).all(|w| w[0].same(&w[1])));
    }

    struct Tracked {
        name: &'static str,
        log: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    }

    fn disposable(registry: &SingletonRegistry, name: &'static str, log: &Arc<parking_lot::Mutex<Vec<&'static str>>>) {
        let class = BeanClass::builder::<Tracked>()
            .on_destroy(|t| {
                t.log.lock().push(t.name);
                Ok(())
            })
            .build();
        let bean = Bean::new(Arc::new(Tracked { name, log: Arc::clone(log) }), class.clone());
        registry.register_singleton(name, bean.clone()).unwrap();
        let def = ResolvedDefinition::new(BeanDefinition::of_class(class));
        let adapter = DisposalAdapter::new(name, bean, &def, &ProcessorChain::default()).unwrap();
        registry.register_disposable(name, Arc::new(adapter));
    }

    #[test]
    fn dependents_destroyed_first() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        // a depends on b, b depends on c
        disposable(&registry, "a", &log);
        disposable(&registry, "b", &log);
        disposable(&registry, "c", &log);
        registry.graph().register_dependent("b", "a");
        registry.graph().register_dependent("c", "b");

        registry.destroy_singletons();
        assert_eq!(*log.lock(), vec!["a", "b", "c"]);
        assert_eq!(registry.singleton_count(), 0);
        assert!(!registry.is_in_destruction());
    }

    #[test]
    fn contained_destroyed_after_outer() {
        let registry = SingletonRegistry::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        disposable(&registry, "outer", &log);
        disposable(&registry, "inner", &log);
        registry.graph().register_contained("inner", "outer");

        registry.destroy_singletons();
        assert_eq!(*log.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = SingletonRegistry::new();
        registry.register_singleton("x", Bean::of(1i64)).unwrap();
        assert!(registry.register_singleton("x", Bean::of(2i64)).is_err());
    }
}
