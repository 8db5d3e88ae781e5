//! # World Configuration
//!
//! Loaded once at startup, either from defaults or from a TOML file.

use crate::error::{EntityError, EntityResult};
use serde::Deserialize;

/// Configuration for a [`crate::World`].
///
/// # Example
///
/// ```rust,ignore
/// let config = WorldConfig::from_toml_str(r#"entity_capacity = 4096"#)?;
/// let world = World::with_config(config);
/// ```
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Maximum number of live entities. Fixed for the world's lifetime.
    pub entity_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: Self::DEFAULT_ENTITY_CAPACITY,
        }
    }
}

impl WorldConfig {
    /// Default entity pool capacity.
    pub const DEFAULT_ENTITY_CAPACITY: usize = 10_000;

    /// Parses a configuration from TOML text.
    ///
    /// Missing keys fall back to their defaults.
    pub fn from_toml_str(text: &str) -> EntityResult<Self> {
        toml::from_str(text).map_err(|e| EntityError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.entity_capacity, 10_000);
    }

    #[test]
    fn test_from_toml() {
        let config = WorldConfig::from_toml_str("entity_capacity = 64").unwrap();
        assert_eq!(config.entity_capacity, 64);

        // Empty document keeps defaults
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config.entity_capacity, 10_000);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            WorldConfig::from_toml_str("entity_capacity = \"lots\""),
            Err(EntityError::InvalidConfig(_))
        ));
    }
}
