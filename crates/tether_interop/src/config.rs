//! Interop settings

use serde::{Deserialize, Serialize};

/// Settings for an [`InteropRuntime`](crate::InteropRuntime).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteropConfig {
    /// Register the bundled clock/transform/screen/math bindings on first dispatch.
    pub install_hot_bindings: bool,
    /// Warn when a blittable struct declares more fields than fit in a vector slot.
    pub warn_on_lossy_structs: bool,
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            install_hot_bindings: true,
            warn_on_lossy_structs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let config: InteropConfig =
            serde_json::from_str(r#"{ "install_hot_bindings": false }"#).unwrap();
        assert!(!config.install_hot_bindings);
        assert!(config.warn_on_lossy_structs);
    }
}
