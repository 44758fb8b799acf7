//! # Granary: a bean container for Rust
//!
//! Named bean definitions, scopes, autowiring, circular-reference
//! resolution and ordered teardown, in the spirit of classic IoC bean
//! factories.
//!
//! ```rust
//! use granary::prelude::*;
//!
//! struct Clock;
//!
//! let container = Container::builder()
//!     .definition(
//!         "clock",
//!         BeanDefinition::of_class(BeanClass::builder::<Clock>().default_constructor(|| Clock).build()),
//!     )
//!     .build()
//!     .expect("Failed to build container");
//!
//! let clock = container.get_bean("clock").expect("Failed to get bean");
//! assert!(clock.downcast::<Clock>().is_some());
//! ```

pub use granary_container::*;
pub use granary_support::*;
