//! Engine configuration model.

use serde::{Deserialize, Serialize};

/// Tunables for the composition engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum contained-object nesting depth before construction and
    /// parameter resolution fail fast.
    pub max_depth: usize,
    /// Whether delayed objects receive a non-owning back-reference to
    /// their creator. When disabled, `container()` returns `None`
    /// unconditionally.
    pub attach_back_references: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: crate::constants::DEFAULT_MAX_DEPTH,
            attach_back_references: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_attaches_back_references() {
        let config = EngineConfig::default();
        assert!(config.attach_back_references);
        assert_eq!(config.max_depth, crate::constants::DEFAULT_MAX_DEPTH);
    }
}
