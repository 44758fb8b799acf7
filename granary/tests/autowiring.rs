//! Dependency resolution: by type, by name, by constructor, collections,
//! providers, qualifiers and factory methods.

use std::sync::Arc;

use granary::prelude::*;
use parking_lot::Mutex;

trait Store: Send + Sync {
    fn kind(&self) -> &'static str;
}

struct DiskStore;

impl Store for DiskStore {
    fn kind(&self) -> &'static str {
        "disk"
    }
}

struct MemoryStore;

impl Store for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }
}

fn disk() -> Arc<BeanClass> {
    BeanClass::builder::<DiskStore>()
        .implements::<dyn Store>(|s| s)
        .default_constructor(|| DiskStore)
        .build()
}

fn memory() -> Arc<BeanClass> {
    BeanClass::builder::<MemoryStore>()
        .implements::<dyn Store>(|s| s)
        .default_constructor(|| MemoryStore)
        .build()
}

struct Archive {
    store: Mutex<Option<Arc<dyn Store>>>,
}

fn archive() -> Arc<BeanClass> {
    BeanClass::builder::<Archive>()
        .default_constructor(|| Archive { store: Mutex::new(None) })
        .property("store", ParamType::bean::<dyn Store>(), |a, v| {
            *a.store.lock() = v.opt_bean::<dyn Store>()?;
            Ok(())
        })
        .build()
}

fn stored_kind(container: &Container) -> &'static str {
    let archive: Arc<Archive> = container.get_bean_of("archive").unwrap();
    let store = archive.store.lock().clone().unwrap();
    store.kind()
}

#[test]
fn ambiguous_type_without_primary_fails() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByType))
        .build()
        .unwrap();

    let error = container.get_bean("archive").unwrap_err();
    let no_unique = error
        .chain()
        .find_map(|e| match e {
            ContainerError::NoUniqueBean(n) => Some(n),
            _ => None,
        })
        .unwrap_or_else(|| panic!("Expected NoUniqueBean cause, got: {error}"));
    assert_eq!(no_unique.candidates, vec!["disk".to_string(), "memory".to_string()]);
}

#[test]
fn primary_breaks_the_tie() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()).primary(true))
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByType))
        .build()
        .unwrap();

    assert_eq!(stored_kind(&container), "memory");
}

#[test]
fn property_name_breaks_the_tie() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("store", BeanDefinition::of_class(memory()))
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByType))
        .build()
        .unwrap();

    assert_eq!(stored_kind(&container), "memory");
}

#[test]
fn property_name_matches_aliases() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .alias("disk", "store")
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByType))
        .build()
        .unwrap();

    assert_eq!(stored_kind(&container), "disk");
}

#[test]
fn parameter_name_breaks_the_tie() {
    struct Mirror {
        store: Arc<dyn Store>,
    }
    let mirror = BeanClass::builder::<Mirror>()
        .constructor(vec![ParamSpec::bean::<dyn Store>("store")], |args| {
            Ok(Mirror { store: args.bean::<dyn Store>(0)? })
        })
        .build();
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .alias("memory", "store")
        .definition("mirror", BeanDefinition::of_class(mirror))
        .build()
        .unwrap();

    let mirror: Arc<Mirror> = container.get_bean_of("mirror").unwrap();
    assert_eq!(mirror.store.kind(), "memory");
}

#[test]
fn two_primaries_are_ambiguous() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()).primary(true))
        .definition("memory", BeanDefinition::of_class(memory()).primary(true))
        .build()
        .unwrap();

    match container.get_bean_by_type::<dyn Store>() {
        Err(ContainerError::NoUniqueBean(e)) => {
            assert!(e.message.unwrap_or_default().contains("more than one 'primary'"))
        }
        other => panic!("Expected NoUniqueBean, got: {:?}", other.map(|s| s.kind())),
    }
}

#[test]
fn excluded_candidate_is_ignored() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()).autowire_candidate(false))
        .build()
        .unwrap();

    let store = container.get_bean_by_type::<dyn Store>().unwrap();
    assert_eq!(store.kind(), "disk");
}

#[test]
fn autowire_by_name_matches_property() {
    let container = Container::builder()
        .definition("store", BeanDefinition::of_class(disk()))
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByName))
        .build()
        .unwrap();

    assert_eq!(stored_kind(&container), "disk");
}

#[test]
fn autowire_by_type_leaves_unresolvable_property_unset() {
    let container = Container::builder()
        .definition("archive", BeanDefinition::of_class(archive()).autowire(AutowireMode::ByType))
        .build()
        .unwrap();

    let archive: Arc<Archive> = container.get_bean_of("archive").unwrap();
    assert!(archive.store.lock().is_none());
}

struct Catalog {
    stores: Vec<Arc<dyn Store>>,
    named: Vec<(String, Arc<dyn Store>)>,
}

#[test]
fn collections_receive_every_candidate() {
    let catalog = BeanClass::builder::<Catalog>()
        .constructor(
            vec![ParamSpec::list::<dyn Store>("stores"), ParamSpec::map::<dyn Store>("named")],
            |args| {
                Ok(Catalog {
                    stores: args.list::<dyn Store>(0)?,
                    named: args.map::<dyn Store>(1)?,
                })
            },
        )
        .build();
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .definition("catalog", BeanDefinition::of_class(catalog))
        .build()
        .unwrap();

    let catalog: Arc<Catalog> = container.get_bean_of("catalog").unwrap();
    let kinds: Vec<_> = catalog.stores.iter().map(|s| s.kind()).collect();
    assert_eq!(kinds, vec!["disk", "memory"]);
    let names: Vec<_> = catalog.named.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["disk", "memory"]);
}

struct Report {
    store: Arc<dyn Store>,
    title: String,
}

fn report() -> Arc<BeanClass> {
    BeanClass::builder::<Report>()
        .constructor(vec![ParamSpec::bean::<dyn Store>("store")], |args| {
            Ok(Report {
                store: args.bean::<dyn Store>(0)?,
                title: "untitled".to_string(),
            })
        })
        .constructor(
            vec![ParamSpec::bean::<dyn Store>("store"), ParamSpec::string("title")],
            |args| {
                Ok(Report {
                    store: args.bean::<dyn Store>(0)?,
                    title: args.string(1)?,
                })
            },
        )
        .build()
}

#[test]
fn greediest_satisfiable_constructor_wins() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition(
            "report",
            BeanDefinition::of_class(report())
                .autowire(AutowireMode::Constructor)
                .constructor_arg(1, ValueSpec::literal("Quarterly")),
        )
        .build()
        .unwrap();

    let report: Arc<Report> = container.get_bean_of("report").unwrap();
    assert_eq!(report.title, "Quarterly");
    assert_eq!(report.store.kind(), "disk");
}

#[test]
fn unsatisfiable_greedy_constructor_falls_back() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("report", BeanDefinition::of_class(report()).autowire(AutowireMode::Constructor))
        .build()
        .unwrap();

    let report: Arc<Report> = container.get_bean_of("report").unwrap();
    assert_eq!(report.title, "untitled");
}

#[test]
fn explicit_reference_argument() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .definition(
            "report",
            BeanDefinition::of_class(report())
                .constructor_arg(0, ValueSpec::reference("memory"))
                .constructor_arg(1, ValueSpec::literal("Inventory")),
        )
        .build()
        .unwrap();

    let report: Arc<Report> = container.get_bean_of("report").unwrap();
    assert_eq!(report.store.kind(), "memory");
    assert_eq!(report.title, "Inventory");
}

struct Mirror {
    kind: &'static str,
}

fn mirror() -> Arc<BeanClass> {
    BeanClass::builder::<Mirror>()
        .constructor(vec![ParamSpec::bean::<DiskStore>("store")], |args| {
            Ok(Mirror { kind: args.bean::<DiskStore>(0)?.kind() })
        })
        .constructor(vec![ParamSpec::bean::<MemoryStore>("store")], |args| {
            Ok(Mirror { kind: args.bean::<MemoryStore>(0)?.kind() })
        })
        .build()
}

fn mirror_container(lenient: bool) -> Arc<Container> {
    Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()))
        .definition(
            "mirror",
            BeanDefinition::of_class(mirror())
                .autowire(AutowireMode::Constructor)
                .lenient(lenient),
        )
        .build()
        .unwrap()
}

#[test]
fn equally_weighted_constructors_are_ambiguous_when_strict() {
    let container = mirror_container(false);

    let error = container.get_bean("mirror").unwrap_err();
    let ambiguous = error
        .chain()
        .find_map(|e| match e {
            ContainerError::AmbiguousConstructor(a) => Some(a),
            _ => None,
        })
        .unwrap_or_else(|| panic!("Expected AmbiguousConstructor cause, got: {error}"));
    assert_eq!(ambiguous.bean, "mirror");
    assert_eq!(ambiguous.candidates.len(), 2);
}

#[test]
fn lenient_resolution_takes_the_first_of_equal_constructors() {
    let container = mirror_container(true);

    let mirror: Arc<Mirror> = container.get_bean_of("mirror").unwrap();
    assert_eq!(mirror.kind, "disk");
}

struct Dashboard {
    store: Arc<dyn Store>,
}

#[test]
fn qualifier_selects_among_candidates() {
    let dashboard = BeanClass::builder::<Dashboard>()
        .constructor(vec![ParamSpec::bean::<dyn Store>("primaryStore").qualified("fast")], |args| {
            Ok(Dashboard { store: args.bean::<dyn Store>(0)? })
        })
        .build();
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .definition("memory", BeanDefinition::of_class(memory()).qualifier("fast"))
        .definition("dashboard", BeanDefinition::of_class(dashboard))
        .build()
        .unwrap();

    let dashboard: Arc<Dashboard> = container.get_bean_of("dashboard").unwrap();
    assert_eq!(dashboard.store.kind(), "memory");
}

struct Lazy {
    provider: ObjectProvider,
}

#[test]
fn provider_defers_lookup() {
    let lazy = BeanClass::builder::<Lazy>()
        .constructor(vec![ParamSpec::provider::<dyn Store>("stores")], |args| {
            Ok(Lazy { provider: args.provider(0)? })
        })
        .build();
    let container = Container::builder()
        .definition("lazy", BeanDefinition::of_class(lazy))
        .build()
        .unwrap();

    let lazy: Arc<Lazy> = container.get_bean_of("lazy").unwrap();
    assert!(lazy.provider.get_if_available().unwrap().is_none());

    container
        .register_definition("disk", BeanDefinition::of_class(disk()))
        .unwrap();
    let store = lazy.provider.get_as::<dyn Store>().unwrap();
    assert_eq!(store.kind(), "disk");

    container
        .register_definition("memory", BeanDefinition::of_class(memory()))
        .unwrap();
    assert!(lazy.provider.get_if_unique().unwrap().is_none());
    assert_eq!(lazy.provider.iter().unwrap().len(), 2);
}

struct StoreFactory {
    prefix: &'static str,
}

struct Connection {
    url: String,
}

#[test]
fn static_and_instance_factory_methods() {
    let connection = BeanClass::builder::<Connection>().build();
    let factory = BeanClass::builder::<StoreFactory>()
        .default_constructor(|| StoreFactory { prefix: "db://" })
        .static_factory("local", vec![], Arc::clone(&connection), |_| {
            Ok(Connection { url: "db://localhost".to_string() })
        })
        .instance_factory(
            "connect",
            vec![ParamSpec::string("host")],
            Arc::clone(&connection),
            |f: &StoreFactory, args| Ok(Connection { url: format!("{}{}", f.prefix, args.string(0)?) }),
        )
        .build();

    let container = Container::builder()
        .definition("factory", BeanDefinition::of_class(Arc::clone(&factory)))
        .definition("local", BeanDefinition::of_class(factory).factory_method("local"))
        .definition(
            "remote",
            BeanDefinition::new()
                .factory_bean("factory")
                .factory_method("connect")
                .constructor_arg(0, ValueSpec::literal("example.org")),
        )
        .build()
        .unwrap();

    let local: Arc<Connection> = container.get_bean_of("local").unwrap();
    let remote: Arc<Connection> = container.get_bean_of("remote").unwrap();
    assert_eq!(local.url, "db://localhost");
    assert_eq!(remote.url, "db://example.org");

    let predicted = container.get_type("remote").unwrap().unwrap();
    assert!(predicted.key().is::<Connection>());
    let names = container.bean_names_for_type(&TypeKey::of::<Connection>(), true, true);
    assert_eq!(names, vec!["local".to_string(), "remote".to_string()]);
}

#[test]
fn container_and_resolvable_dependencies_are_injectable() {
    struct Clock(&'static str);
    struct Holder {
        container: Arc<Container>,
        clock: Arc<Clock>,
    }
    let holder = BeanClass::builder::<Holder>()
        .constructor(
            vec![ParamSpec::bean::<Container>("container"), ParamSpec::bean::<Clock>("clock")],
            |args| {
                Ok(Holder {
                    container: args.bean::<Container>(0)?,
                    clock: args.bean::<Clock>(1)?,
                })
            },
        )
        .build();
    let container = Container::builder()
        .resolvable_dependency(TypeKey::of::<Clock>(), Bean::of(Clock("utc")))
        .definition("holder", BeanDefinition::of_class(holder))
        .build()
        .unwrap();

    let holder: Arc<Holder> = container.get_bean_of("holder").unwrap();
    assert!(Arc::ptr_eq(&holder.container, &container));
    assert_eq!(holder.clock.0, "utc");
    assert!(container.get_bean_by_type::<Clock>().is_ok());
}

#[test]
fn resolve_dependency_reports_bean_names() {
    let container = Container::builder()
        .definition("disk", BeanDefinition::of_class(disk()))
        .build()
        .unwrap();

    let resolved = container
        .resolve_dependency(&DependencyDescriptor::of::<dyn Store>(), Some("outsider"))
        .unwrap();
    assert_eq!(resolved.bean_names, vec!["disk".to_string()]);
    assert_eq!(resolved.value.bean::<dyn Store>().unwrap().kind(), "disk");
}

#[test]
fn default_value_is_suggested_for_optional_simple_dependency() {
    let container = Container::builder().build().unwrap();

    let descriptor = DependencyDescriptor::new(ParamType::Int).with_default(30i64);
    let resolved = container.resolve_dependency(&descriptor, None).unwrap();
    match resolved.value {
        Value::Int(n) => assert_eq!(n, 30),
        other => panic!("Expected Int, got: {}", other.type_description()),
    }
}

#[test]
fn beans_of_type_in_registration_order() {
    let container = Container::builder()
        .definition("memory", BeanDefinition::of_class(memory()))
        .definition("disk", BeanDefinition::of_class(disk()))
        .build()
        .unwrap();

    let stores = container.get_beans_of_type::<dyn Store>().unwrap();
    let names: Vec<_> = stores.iter().map(|(n, s)| (n.as_str(), s.kind())).collect();
    assert_eq!(names, vec![("memory", "memory"), ("disk", "disk")]);
}
