//! Initialization, post-processing and teardown.

use std::sync::Arc;

use granary::prelude::*;
use parking_lot::Mutex;

type Log = Arc<Mutex<Vec<String>>>;

struct Component {
    label: &'static str,
    link: Mutex<Option<Arc<Component>>>,
}

/// A class whose every lifecycle step is appended to `log` as `step:label`.
fn component_class(label: &'static str, log: &Log) -> Arc<BeanClass> {
    let (ctor_log, init_log, destroy_log, method_log, aware_log) =
        (log.clone(), log.clone(), log.clone(), log.clone(), log.clone());
    BeanClass::builder::<Component>()
        .default_constructor(move || {
            ctor_log.lock().push(format!("new:{label}"));
            Component { label, link: Mutex::new(None) }
        })
        .property("link", ParamType::bean::<Component>(), |c, v| {
            *c.link.lock() = v.opt_bean::<Component>()?;
            Ok(())
        })
        .name_aware(move |c, name| {
            aware_log.lock().push(format!("name:{}={name}", c.label));
            Ok(())
        })
        .after_properties_set(move |c| {
            init_log.lock().push(format!("init:{}", c.label));
            Ok(())
        })
        .method("start", move |c| {
            method_log.lock().push(format!("start:{}", c.label));
            Ok(())
        })
        .on_destroy(move |c| {
            destroy_log.lock().push(format!("destroy:{}", c.label));
            Ok(())
        })
        .build()
}

fn entries(log: &Log, prefix: &str) -> Vec<String> {
    log.lock().iter().filter(|e| e.starts_with(prefix)).cloned().collect()
}

#[test]
fn destruction_follows_dependency_order() {
    // a -> b -> c
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition("a", BeanDefinition::of_class(component_class("a", &log)).property_ref("link", "b"))
        .definition("b", BeanDefinition::of_class(component_class("b", &log)).property_ref("link", "c"))
        .definition("c", BeanDefinition::of_class(component_class("c", &log)))
        .build()
        .unwrap();

    container.preinstantiate_singletons().unwrap();
    container.destroy_singletons();

    assert_eq!(entries(&log, "destroy:"), vec!["destroy:a", "destroy:b", "destroy:c"]);
}

#[test]
fn destroying_one_singleton_destroys_its_dependents_first() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition("a", BeanDefinition::of_class(component_class("a", &log)).property_ref("link", "b"))
        .definition("b", BeanDefinition::of_class(component_class("b", &log)))
        .build()
        .unwrap();

    container.get_bean("a").unwrap();
    container.destroy_singleton("b");

    assert_eq!(entries(&log, "destroy:"), vec!["destroy:a", "destroy:b"]);
}

#[test]
fn init_sequence_runs_in_order() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition(
            "a",
            BeanDefinition::of_class(component_class("a", &log)).init_method("start"),
        )
        .build()
        .unwrap();

    container.get_bean("a").unwrap();
    assert_eq!(*log.lock(), vec!["new:a", "name:a=a", "init:a", "start:a"]);
}

#[test]
fn enforced_missing_init_method_fails() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition(
            "a",
            BeanDefinition::of_class(component_class("a", &log))
                .init_method("warmUp")
                .enforce_init_method(true),
        )
        .build()
        .unwrap();

    let error = container.get_bean("a").unwrap_err();
    assert!(error.to_string().contains("warmUp"), "{error}");
}

#[test]
fn missing_default_init_method_is_ignored() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition("a", BeanDefinition::of_class(component_class("a", &log)).init_method("warmUp"))
        .build()
        .unwrap();

    assert!(container.get_bean("a").is_ok());
}

struct Recording {
    log: Log,
}

impl BeanPostProcessor for Recording {
    fn before_initialization(&self, bean: Bean, name: &str) -> Result<Bean> {
        self.log.lock().push(format!("before:{name}"));
        Ok(bean)
    }

    fn after_initialization(&self, bean: Bean, name: &str) -> Result<Bean> {
        self.log.lock().push(format!("after:{name}"));
        Ok(bean)
    }

    fn requires_destruction(&self, _bean: &Bean) -> bool {
        true
    }

    fn before_destruction(&self, _bean: &Bean, name: &str) -> Result<()> {
        self.log.lock().push(format!("predestroy:{name}"));
        Ok(())
    }
}

#[test]
fn post_processors_wrap_initialization_and_destruction() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .post_processor(Arc::new(Recording { log: log.clone() }))
        .definition("a", BeanDefinition::of_class(component_class("a", &log)))
        .build()
        .unwrap();

    container.get_bean("a").unwrap();
    container.destroy_singletons();

    assert_eq!(
        *log.lock(),
        vec!["new:a", "name:a=a", "before:a", "init:a", "after:a", "predestroy:a", "destroy:a"]
    );
}

struct ShortCircuit;

impl BeanPostProcessor for ShortCircuit {
    fn before_instantiation(&self, class: &Arc<BeanClass>, name: &str) -> Result<Option<Bean>> {
        if name != "a" {
            return Ok(None);
        }
        let replacement = Component { label: "replacement", link: Mutex::new(None) };
        Ok(Some(Bean::new(Arc::new(replacement), Arc::clone(class))))
    }
}

#[test]
fn before_instantiation_short_circuits_creation() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .post_processor(Arc::new(ShortCircuit))
        .definition("a", BeanDefinition::of_class(component_class("a", &log)))
        .build()
        .unwrap();

    let a: Arc<Component> = container.get_bean_of("a").unwrap();
    assert_eq!(a.label, "replacement");
    assert!(log.lock().is_empty());
}

struct SkipPopulation;

impl BeanPostProcessor for SkipPopulation {
    fn after_instantiation(&self, _bean: &Bean, name: &str) -> Result<bool> {
        Ok(name != "a")
    }
}

#[test]
fn after_instantiation_can_skip_population() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .post_processor(Arc::new(SkipPopulation))
        .definition("a", BeanDefinition::of_class(component_class("a", &log)).property_ref("link", "b"))
        .definition("b", BeanDefinition::of_class(component_class("b", &log)))
        .build()
        .unwrap();

    let a: Arc<Component> = container.get_bean_of("a").unwrap();
    assert!(a.link.lock().is_none());
    assert!(entries(&log, "new:b").is_empty());
}

#[test]
fn prototypes_are_destroyed_only_on_request() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition("p", BeanDefinition::of_class(component_class("p", &log)).prototype())
        .build()
        .unwrap();

    let first = container.get_bean("p").unwrap();
    let second = container.get_bean("p").unwrap();
    assert!(!first.same(&second));

    container.destroy_singletons();
    assert!(entries(&log, "destroy:").is_empty());

    container.destroy_bean("p", first).unwrap();
    assert_eq!(entries(&log, "destroy:"), vec!["destroy:p"]);
}

struct Pool {
    closed: Mutex<bool>,
}

#[test]
fn inferred_destroy_method_picks_close() {
    let pool = BeanClass::builder::<Pool>()
        .default_constructor(|| Pool { closed: Mutex::new(false) })
        .method("close", |p| {
            *p.closed.lock() = true;
            Ok(())
        })
        .build();
    let container = Container::builder()
        .definition("pool", BeanDefinition::of_class(pool).destroy_method("(inferred)"))
        .build()
        .unwrap();

    let pool: Arc<Pool> = container.get_bean_of("pool").unwrap();
    container.destroy_singletons();
    assert!(*pool.closed.lock());
}

#[test]
fn failing_destroy_does_not_block_teardown() {
    let log: Log = Arc::default();
    let failing = BeanClass::builder::<Pool>()
        .default_constructor(|| Pool { closed: Mutex::new(false) })
        .on_destroy(|_| Err(ContainerError::custom_msg("disk on fire")))
        .build();
    let container = Container::builder()
        .definition("a", BeanDefinition::of_class(component_class("a", &log)))
        .definition("failing", BeanDefinition::of_class(failing))
        .definition("c", BeanDefinition::of_class(component_class("c", &log)))
        .build()
        .unwrap();

    container.preinstantiate_singletons().unwrap();
    container.destroy_singletons();
    assert_eq!(entries(&log, "destroy:"), vec!["destroy:c", "destroy:a"]);
}

#[test]
fn inner_bean_is_created_and_destroyed_with_outer() {
    let log: Log = Arc::default();
    let container = Container::builder()
        .definition(
            "outer",
            BeanDefinition::of_class(component_class("outer", &log))
                .property("link", ValueSpec::inner(BeanDefinition::of_class(component_class("inner", &log)))),
        )
        .build()
        .unwrap();

    let outer: Arc<Component> = container.get_bean_of("outer").unwrap();
    assert_eq!(outer.link.lock().as_ref().unwrap().label, "inner");
    assert!(entries(&log, "name:inner=(inner bean)#").len() == 1);

    container.destroy_singletons();
    assert_eq!(entries(&log, "destroy:"), vec!["destroy:outer", "destroy:inner"]);
}

struct Settings {
    url: Mutex<Option<String>>,
    pool_size: Mutex<i64>,
}

fn settings_class() -> Arc<BeanClass> {
    BeanClass::builder::<Settings>()
        .default_constructor(|| Settings { url: Mutex::new(None), pool_size: Mutex::new(0) })
        .property("url", ParamType::Str, |s, v| {
            *s.url.lock() = Some(v.string()?);
            Ok(())
        })
        .property("pool_size", ParamType::Int, |s, v| {
            *s.pool_size.lock() = v.int()?;
            Ok(())
        })
        .build()
}

#[test]
fn dependency_check_reports_unset_simple_property() {
    let container = Container::builder()
        .definition(
            "settings",
            BeanDefinition::of_class(settings_class())
                .dependency_check(DependencyCheck::Simple)
                .property("url", ValueSpec::literal("postgres://localhost")),
        )
        .build()
        .unwrap();

    match container.get_bean("settings") {
        Err(ContainerError::UnsatisfiedDependency(e)) => assert_eq!(e.injection_point, "property 'pool_size'"),
        other => panic!("Expected UnsatisfiedDependency, got: {other:?}"),
    }
}

#[test]
fn string_values_are_converted_for_properties() {
    let container = Container::builder()
        .definition(
            "settings",
            BeanDefinition::of_class(settings_class())
                .property("url", ValueSpec::literal("postgres://localhost"))
                .property("pool_size", ValueSpec::literal("16")),
        )
        .build()
        .unwrap();

    let settings: Arc<Settings> = container.get_bean_of("settings").unwrap();
    assert_eq!(*settings.pool_size.lock(), 16);
    assert_eq!(settings.url.lock().as_deref(), Some("postgres://localhost"));
}

#[test]
fn map_scope_close_runs_destruction_callbacks() {
    let log: Log = Arc::default();
    let scope = Arc::new(MapScope::new());
    let container = Container::builder()
        .scope("conversation", scope.clone())
        .definition("a", BeanDefinition::of_class(component_class("a", &log)).scope("conversation"))
        .build()
        .unwrap();

    container.get_bean("a").unwrap();
    container.destroy_singletons();
    assert!(entries(&log, "destroy:").is_empty());

    scope.close();
    assert_eq!(entries(&log, "destroy:"), vec!["destroy:a"]);
}
