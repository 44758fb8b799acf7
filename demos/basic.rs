//! Basic example of the Granary container.

use std::sync::Arc;

use granary::logging;
use granary::prelude::*;
use parking_lot::Mutex;

// === Define your traits and types ===

trait Logger: Send + Sync {
    fn log(&self, msg: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, msg: &str) {
        println!("[LOG] {msg}");
    }
}

struct Config {
    database_url: Mutex<String>,
    debug: Mutex<bool>,
}

struct Database {
    url: String,
    logger: Arc<dyn Logger>,
}

impl Database {
    fn query(&self, sql: &str) -> String {
        self.logger.log(&format!("Executing: {sql}"));
        format!("Results from {}", self.url)
    }
}

struct UserRepository {
    db: Arc<Database>,
}

impl UserRepository {
    fn find_user(&self, id: u64) -> String {
        self.db.query(&format!("SELECT * FROM users WHERE id = {id}"))
    }
}

struct UserService {
    repo: Arc<UserRepository>,
    logger: Arc<dyn Logger>,
}

impl UserService {
    fn get_user(&self, id: u64) -> String {
        self.logger.log(&format!("Getting user {id}"));
        self.repo.find_user(id)
    }
}

// === Describe how each type is built ===

fn config_class() -> Arc<BeanClass> {
    BeanClass::builder::<Config>()
        .default_constructor(|| Config {
            database_url: Mutex::new(String::new()),
            debug: Mutex::new(false),
        })
        .property("database_url", ParamType::Str, |c, v| {
            *c.database_url.lock() = v.string()?;
            Ok(())
        })
        .property("debug", ParamType::Bool, |c, v| {
            *c.debug.lock() = v.bool()?;
            Ok(())
        })
        .build()
}

fn logger_class() -> Arc<BeanClass> {
    BeanClass::builder::<ConsoleLogger>()
        .implements::<dyn Logger>(|l| l)
        .default_constructor(|| ConsoleLogger)
        .build()
}

fn database_class() -> Arc<BeanClass> {
    BeanClass::builder::<Database>()
        .constructor(
            vec![ParamSpec::bean::<Config>("config"), ParamSpec::bean::<dyn Logger>("logger")],
            |args| {
                let config = args.bean::<Config>(0)?;
                let url = config.database_url.lock().clone();
                Ok(Database { url, logger: args.bean::<dyn Logger>(1)? })
            },
        )
        .on_destroy(|db| {
            db.logger.log(&format!("Closing connection to {}", db.url));
            Ok(())
        })
        .build()
}

fn repository_class() -> Arc<BeanClass> {
    BeanClass::builder::<UserRepository>()
        .constructor(vec![ParamSpec::bean::<Database>("db")], |args| {
            Ok(UserRepository { db: args.bean::<Database>(0)? })
        })
        .build()
}

fn service_class() -> Arc<BeanClass> {
    BeanClass::builder::<UserService>()
        .constructor(
            vec![
                ParamSpec::bean::<UserRepository>("repo"),
                ParamSpec::bean::<dyn Logger>("logger"),
            ],
            |args| {
                Ok(UserService {
                    repo: args.bean::<UserRepository>(0)?,
                    logger: args.bean::<dyn Logger>(1)?,
                })
            },
        )
        .build()
}

fn main() -> granary::Result<()> {
    logging::init("granary_container=debug");

    let request = Arc::new(MapScope::new());

    // Build the container
    let container = Container::builder()
        .scope("request", Arc::clone(&request) as Arc<dyn CustomScope>)
        // Config: plain literal properties
        .definition(
            "config",
            BeanDefinition::of_class(config_class())
                .property("database_url", ValueSpec::literal("postgres://localhost/myapp"))
                .property("debug", ValueSpec::literal("true")),
        )
        // Logger: singleton
        .definition("logger", BeanDefinition::of_class(logger_class()))
        // Database: singleton (depends on Config + Logger)
        .definition("database", BeanDefinition::of_class(database_class()))
        // UserRepository: one per request
        .definition("userRepository", BeanDefinition::of_class(repository_class()).scope("request"))
        // UserService: new each time
        .definition("userService", BeanDefinition::of_class(service_class()).prototype())
        .build()?;

    println!("✅ Container built successfully!");
    println!("{container:?}");

    container.preinstantiate_singletons()?;

    let config: Arc<Config> = container.get_bean_of("config")?;
    println!(
        "📋 Config: database_url={}, debug={}",
        config.database_url.lock(),
        config.debug.lock()
    );

    // === Serve a "request" ===
    {
        let service: Arc<UserService> = container.get_bean_of("userService")?;
        println!("👤 {}", service.get_user(42));

        // Same request: the repository is reused
        let service2: Arc<UserService> = container.get_bean_of("userService")?;
        println!("👤 {}", service2.get_user(7));
        println!("♻️  Repository shared: {}", Arc::ptr_eq(&service.repo, &service2.repo));
    }
    // request over: scoped instances cleaned up
    request.close();

    container.destroy_singletons();
    println!("\n🎉 Everything works!");
    Ok(())
}
