//! Bean scopes.
//!
//! A scope decides how long an instance lives:
//! - `singleton`: one instance per container, cached until shutdown
//! - `prototype`: a new instance on every request, never cached
//! - any other name: delegated to a [`CustomScope`] registered under that name
//!
//! # Examples
//! ```
//! use granary_container::scope::Scope;
//!
//! assert_eq!(Scope::parse(""), Scope::Singleton);
//! assert_eq!(Scope::parse("prototype"), Scope::Prototype);
//! assert_eq!(Scope::parse("request").name(), "request");
//! ```

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::bean::Bean;
use crate::error::Result;

pub const SINGLETON: &str = "singleton";
pub const PROTOTYPE: &str = "prototype";

/// The lifetime policy named by a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One shared instance, created once and destroyed at shutdown.
    Singleton,
    /// A fresh instance per request. The container never destroys these on
    /// its own; owners call `destroy_bean`.
    Prototype,
    /// Delegated to the custom scope registered under this name.
    Custom(String),
}

impl Scope {
    /// Parses a scope name. The empty string means "unset" and defaults to singleton.
    pub fn parse(name: &str) -> Self {
        match name {
            "" | SINGLETON => Scope::Singleton,
            PROTOTYPE => Scope::Prototype,
            other => Scope::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Scope::Singleton => SINGLETON,
            Scope::Prototype => PROTOTYPE,
            Scope::Custom(name) => name,
        }
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(self, Scope::Singleton)
    }

    #[inline]
    pub fn is_prototype(&self) -> bool {
        matches!(self, Scope::Prototype)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Callback run when a scoped bean's scope ends.
pub type DestructionCallback = Box<dyn FnOnce() + Send>;

/// A named scope with its own instance storage.
///
/// `get` must return the existing instance for `name` if there is one and
/// otherwise call `create` and keep the result. The container invokes
/// `create` with the full lifecycle (population, init hooks); the scope only
/// stores.
pub trait CustomScope: Send + Sync {
    fn get(&self, name: &str, create: &mut dyn FnMut() -> Result<Bean>) -> Result<Bean>;

    /// Removes and returns the instance for `name`, dropping any destruction
    /// callback registered for it.
    fn remove(&self, name: &str) -> Option<Bean>;

    /// Registers a callback to run when the instance for `name` goes out of scope.
    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback);

    /// Identifier of the current scope instance, if the scope has one.
    fn conversation_id(&self) -> Option<String> {
        None
    }
}

/// A [`CustomScope`] backed by a plain map.
///
/// Instances live until [`MapScope::close`] (which also runs the registered
/// destruction callbacks) or until removed.
#[derive(Default)]
pub struct MapScope {
    objects: Mutex<HashMap<String, Bean>>,
    callbacks: Mutex<Vec<(String, DestructionCallback)>>,
}

impl MapScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.objects.lock().contains_key(name)
    }

    /// Ends the scope: runs destruction callbacks in reverse registration
    /// order and forgets every instance.
    pub fn close(&self) {
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        self.objects.lock().clear();
        debug!(callbacks = callbacks.len(), "Closing map scope");
        for (name, callback) in callbacks.into_iter().rev() {
            trace!(bean = %name, "Running scoped destruction callback");
            callback();
        }
    }
}

impl CustomScope for MapScope {
    fn get(&self, name: &str, create: &mut dyn FnMut() -> Result<Bean>) -> Result<Bean> {
        if let Some(existing) = self.objects.lock().get(name) {
            return Ok(existing.clone());
        }
        // Lock released while creating: creation may resolve other beans of
        // this scope.
        let created = create()?;
        let mut objects = self.objects.lock();
        Ok(objects.entry(name.to_string()).or_insert(created).clone())
    }

    fn remove(&self, name: &str) -> Option<Bean> {
        self.callbacks.lock().retain(|(n, _)| n != name);
        self.objects.lock().remove(name)
    }

    fn register_destruction_callback(&self, name: &str, callback: DestructionCallback) {
        self.callbacks.lock().push((name.to_string(), callback));
    }
}

impl fmt::Debug for MapScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapScope")
            .field("objects", &self.objects.lock().keys().collect::<Vec<_>>())
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}
