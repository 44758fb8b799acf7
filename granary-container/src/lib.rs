//! Core container implementation for Granary.
//!
//! Beans are described by [`BeanDefinition`]s, registered under names, and
//! created on demand by a [`Container`]: constructor or factory-method
//! resolution, property population, autowiring, initialization hooks and
//! post-processing, then caching according to scope. Singletons are torn
//! down in reverse dependency order.

pub mod bean;
pub mod candidate;
mod constructor;
pub mod container;
pub mod convert;
pub mod definition;
pub mod descriptor;
pub mod disposal;
pub mod error;
mod graph;
pub mod intercept;
pub mod key;
mod lifecycle;
pub mod merge;
mod path;
pub mod processor;
mod registry;
pub mod resolver;
pub mod scope;
pub mod settings;
mod singleton;
pub mod source;
pub mod value;

pub use bean::{Bean, BeanClass, ParamSpec};
pub use container::{Container, ContainerBuilder, prelude};
pub use definition::BeanDefinition;
pub use error::{ContainerError, Result};
pub use key::TypeKey;
pub use lifecycle::AFTER_PROPERTIES_SET;
pub use scope::Scope;
pub use settings::ContainerSettings;
pub use value::{ParamType, Value, ValueSpec};
