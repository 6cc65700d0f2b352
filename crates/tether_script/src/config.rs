//! Script runtime configuration

use serde::{Deserialize, Serialize};

/// Limits for one script context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Callback table capacity.
    pub max_callbacks: usize,
    /// Pending jobs drained per tick; `None` drains until idle.
    pub max_jobs_per_tick: Option<usize>,
    /// Engine heap limit in bytes.
    pub memory_limit: Option<usize>,
    /// Formatted exceptions are cut to this many bytes.
    pub exception_message_limit: usize,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            max_callbacks: 4096,
            max_jobs_per_tick: None,
            memory_limit: None,
            exception_message_limit: 2048,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ScriptConfig = serde_json::from_str(r#"{"max_callbacks": 16}"#).unwrap();
        assert_eq!(config.max_callbacks, 16);
        assert_eq!(config.exception_message_limit, 2048);
        assert_eq!(config.max_jobs_per_tick, None);
    }
}
