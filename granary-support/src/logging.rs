//! `tracing-subscriber` bootstrap.
//!
//! The container crates only emit `tracing` events; binaries and tests
//! decide where they go. These helpers install a `fmt` subscriber filtered
//! by an [`EnvFilter`] directive, with `RUST_LOG` taking precedence.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*};

/// Default directive used when neither `RUST_LOG` nor an explicit filter is set.
pub const DEFAULT_FILTER: &str = "granary_container=info";

fn filter_for(directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Installs a global subscriber, failing if one is already set.
pub fn try_init(directive: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(filter_for(directive))
        .with(fmt::layer().with_target(true))
        .try_init()
}

/// Installs a global subscriber, ignoring an already-installed one.
///
/// Tests call this from many places; only the first call wins.
pub fn init(directive: &str) {
    let _ = try_init(directive);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        init("granary_container=debug");
        init(DEFAULT_FILTER);
        assert!(try_init(DEFAULT_FILTER).is_err());
    }
}
