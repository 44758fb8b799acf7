//! Container-wide switches.

use serde::{Deserialize, Serialize};

/// Behavior switches for one container.
///
/// Deserializable, so applications can keep them next to the rest of their
/// configuration:
///
/// ```
/// use granary_container::settings::ContainerSettings;
///
/// let settings = ContainerSettings::default();
/// assert!(settings.allow_circular_references);
/// assert!(!settings.allow_raw_injection_despite_wrapping);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Expose early references of singletons in creation so that property
    /// cycles resolve. When off, any cycle is a `CircularCreation` error.
    pub allow_circular_references: bool,

    /// Tolerate a bean that was handed out raw during a cycle and wrapped
    /// afterwards. Off by default: such a configuration fails fast.
    pub allow_raw_injection_despite_wrapping: bool,

    /// Allow registering a definition under a name that is already taken.
    pub allow_definition_overriding: bool,

    /// Keep merged definitions (and the constructor resolution cached on
    /// them) between requests. When off, every access re-merges.
    pub cache_definition_metadata: bool,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            allow_definition_overriding: false,
            cache_definition_metadata: true,
        }
    }
}
