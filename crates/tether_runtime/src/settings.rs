//! Settings management

use serde::{Deserialize, Serialize};
use std::path::Path;
use tether_core::screen::Screen;
use tether_interop::InteropConfig;
use tether_script::ScriptConfig;
use thiserror::Error;

/// Environment variable naming a settings file.
pub const SETTINGS_ENV: &str = "TETHER_SETTINGS";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub interop: InteropConfig,
    pub script: ScriptConfig,
    pub screen: Screen,
    /// Frames to run before exiting.
    pub frames: u64,
    /// Unscaled seconds per frame.
    pub delta_time: f32,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interop: InteropConfig::default(),
            script: ScriptConfig::default(),
            screen: Screen::default(),
            frames: 60,
            delta_time: tether_core::time::TICK_DURATION.as_secs_f32(),
            seed: 0x5EED,
        }
    }
}

impl Settings {
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_default() {
        let settings = Settings::from_json(r#"{"frames": 3, "script": {"max_callbacks": 8}}"#).unwrap();
        assert_eq!(settings.frames, 3);
        assert_eq!(settings.script.max_callbacks, 8);
        assert_eq!(settings.script.exception_message_limit, 2048);
        assert!(settings.interop.install_hot_bindings);
        assert_eq!(settings.screen, Screen::default());
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(matches!(
            Settings::from_json("{frames: 3}"),
            Err(SettingsError::Json(_))
        ));
    }
}
