//! Definition inheritance, definition sources, overriding rules and
//! method injection.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use granary::prelude::*;
use granary::source::StaticDefinitionSource;
use parking_lot::Mutex;

struct Mailer {
    host: Mutex<String>,
    port: Mutex<i64>,
}

fn mailer() -> Arc<BeanClass> {
    BeanClass::builder::<Mailer>()
        .default_constructor(|| Mailer {
            host: Mutex::new(String::new()),
            port: Mutex::new(0),
        })
        .property("host", ParamType::Str, |m, v| {
            *m.host.lock() = v.string()?;
            Ok(())
        })
        .property("port", ParamType::Int, |m, v| {
            *m.port.lock() = v.int()?;
            Ok(())
        })
        .build()
}

#[test]
fn child_inherits_and_overrides_parent_values() {
    let container = Container::builder()
        .definition(
            "base",
            BeanDefinition::of_class(mailer())
                .set_abstract(true)
                .property("host", ValueSpec::literal("smtp.local"))
                .property("port", ValueSpec::literal(25i64)),
        )
        .definition(
            "secure",
            BeanDefinition::child_of("base").property("port", ValueSpec::literal(465i64)),
        )
        .build()
        .unwrap();

    let secure: Arc<Mailer> = container.get_bean_of("secure").unwrap();
    assert_eq!(*secure.host.lock(), "smtp.local");
    assert_eq!(*secure.port.lock(), 465);

    match container.get_bean("base") {
        Err(ContainerError::DefinitionStore(e)) => assert_eq!(e.bean, "base"),
        other => panic!("Expected DefinitionStore error, got: {other:?}"),
    }
}

#[test]
fn merged_definition_is_stable_until_reset() {
    let container = Container::builder()
        .definition("base", BeanDefinition::of_class(mailer()).set_abstract(true).lazy(true))
        .definition("child", BeanDefinition::child_of("base").prototype())
        .build()
        .unwrap();

    let first = container.merged_definition("child").unwrap();
    let second = container.merged_definition("child").unwrap();
    assert_eq!(*first, *second);
    assert!(first.is_prototype());
    assert!(first.is_lazy_init());
    assert!(!first.is_abstract());
    assert!(first.parent_name().is_none());

    container.clear_metadata_cache();
    let third = container.merged_definition("child").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(*first, *third);
}

#[test]
fn definition_overriding_needs_opt_in() {
    let strict = Container::builder()
        .definition("mailer", BeanDefinition::of_class(mailer()))
        .build()
        .unwrap();
    match strict.register_definition("mailer", BeanDefinition::of_class(mailer()).prototype()) {
        Err(ContainerError::DefinitionStore(e)) => assert!(e.message.contains("Hint:")),
        other => panic!("Expected DefinitionStore error, got: {other:?}"),
    }

    let relaxed = Container::builder()
        .allow_definition_overriding(true)
        .definition("mailer", BeanDefinition::of_class(mailer()))
        .build()
        .unwrap();
    relaxed.get_bean("mailer").unwrap();
    relaxed
        .register_definition("mailer", BeanDefinition::of_class(mailer()).prototype())
        .unwrap();
    assert!(relaxed.is_prototype("mailer").unwrap());
}

#[test]
fn definitions_load_from_a_source() {
    let source = StaticDefinitionSource::named("mail.conf")
        .with(
            "mailer",
            BeanDefinition::of_class(mailer()).property("host", ValueSpec::literal("mx.example.org")),
        )
        .with_alias("mailer", "smtp");

    let container = Container::builder().source(&source).build().unwrap();

    assert_eq!(container.definition_names(), vec!["mailer".to_string()]);
    assert_eq!(container.get_aliases("mailer"), vec!["smtp".to_string()]);
    let mailer: Arc<Mailer> = container.get_bean_of("smtp").unwrap();
    assert_eq!(*mailer.host.lock(), "mx.example.org");
    assert_eq!(
        container.get_definition("mailer").unwrap().resource_description(),
        Some("mail.conf")
    );
}

#[test]
fn conversion_failure_names_the_property() {
    let container = Container::builder()
        .definition(
            "mailer",
            BeanDefinition::of_class(mailer()).property("port", ValueSpec::literal("not-a-port")),
        )
        .build()
        .unwrap();

    let error = container.get_bean("mailer").unwrap_err();
    assert!(error.any_cause(|c| matches!(c, ContainerError::Conversion { .. })));
    assert!(error.to_string().contains("mailer"));
}

// ── Method injection ────────────────────────────────────────────

static COMMANDS: AtomicUsize = AtomicUsize::new(0);

struct Command {
    serial: usize,
}

fn command() -> Arc<BeanClass> {
    BeanClass::builder::<Command>()
        .default_constructor(|| Command {
            serial: COMMANDS.fetch_add(1, Ordering::SeqCst),
        })
        .build()
}

struct CommandManager {
    interceptor: Mutex<Option<MethodInterceptor>>,
}

impl CommandManager {
    fn create_command(&self) -> Arc<Command> {
        let interceptor = self.interceptor.lock().clone().unwrap();
        interceptor.lookup_as::<Command>("create_command").unwrap()
    }

    fn describe(&self, what: &str) -> String {
        let interceptor = self.interceptor.lock().clone();
        match interceptor {
            Some(i) if i.is_overridden("describe") => i
                .replace("describe", &[Value::Str(what.to_string())])
                .and_then(|v| v.string())
                .unwrap(),
            _ => format!("manager of {what}"),
        }
    }
}

fn manager() -> Arc<BeanClass> {
    BeanClass::builder::<CommandManager>()
        .default_constructor(|| CommandManager { interceptor: Mutex::new(None) })
        .overridable("create_command", Some(TypeKey::of::<Command>()))
        .overridable("describe", None)
        .method_injection(|m, interceptor| {
            *m.interceptor.lock() = Some(interceptor);
            Ok(())
        })
        .build()
}

struct Shouting;

impl MethodReplacer for Shouting {
    fn reimplement(&self, _method: &str, args: &[Value]) -> granary::Result<Value> {
        let text = args.first().map(|a| a.string()).transpose()?.unwrap_or_default();
        Ok(Value::Str(text.to_uppercase()))
    }
}

#[test]
fn lookup_method_returns_fresh_prototypes() {
    let container = Container::builder()
        .definition("command", BeanDefinition::of_class(command()).prototype())
        .definition(
            "manager",
            BeanDefinition::of_class(manager()).lookup_method("create_command", Some("command")),
        )
        .build()
        .unwrap();

    let manager: Arc<CommandManager> = container.get_bean_of("manager").unwrap();
    let first = manager.create_command();
    let second = manager.create_command();
    assert_ne!(first.serial, second.serial);
    assert_eq!(manager.describe("jobs"), "manager of jobs");
}

#[test]
fn lookup_method_without_bean_name_uses_return_type() {
    let container = Container::builder()
        .definition("command", BeanDefinition::of_class(command()))
        .definition(
            "manager",
            BeanDefinition::of_class(manager()).lookup_method("create_command", None),
        )
        .build()
        .unwrap();

    let manager: Arc<CommandManager> = container.get_bean_of("manager").unwrap();
    let singleton: Arc<Command> = container.get_bean_of("command").unwrap();
    assert!(Arc::ptr_eq(&manager.create_command(), &singleton));
}

#[test]
fn replaced_method_delegates_to_replacer() {
    let shouting = BeanClass::builder::<Shouting>()
        .implements::<dyn MethodReplacer>(|s| s)
        .default_constructor(|| Shouting)
        .build();
    let container = Container::builder()
        .definition("shouting", BeanDefinition::of_class(shouting))
        .definition(
            "manager",
            BeanDefinition::of_class(manager()).replaced_method("describe", "shouting"),
        )
        .build()
        .unwrap();

    let manager: Arc<CommandManager> = container.get_bean_of("manager").unwrap();
    assert_eq!(manager.describe("jobs"), "JOBS");
}

#[test]
fn override_of_unknown_method_is_rejected() {
    let container = Container::builder()
        .definition(
            "manager",
            BeanDefinition::of_class(manager()).lookup_method("no_such_method", Some("command")),
        )
        .build()
        .unwrap();

    let error = container.get_bean("manager").unwrap_err();
    let invalid = error.chain().any(|c| match c {
        ContainerError::DefinitionStore(e) => e.message.contains("no_such_method"),
        _ => false,
    });
    assert!(invalid, "Expected invalid override error, got: {error}");
}
