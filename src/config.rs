//! User preferences, stored as JSON under the platform config directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::portgroup::GatherOptions;
use crate::session::snapshot::DEFAULT_PROGRAM_NAME;

const APP_DIR: &str = "portgroups";
const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Program name used when a snapshot does not carry one.
    #[serde(default = "Preferences::default_program_name")]
    pub program_name: String,

    /// Gather options used when the command line does not override them.
    #[serde(default)]
    pub gather: GatherOptions,

    /// Print JSON instead of the text listing.
    #[serde(default = "Preferences::default_json_output")]
    pub json_output: bool,
}

impl Preferences {
    fn default_program_name() -> String {
        DEFAULT_PROGRAM_NAME.to_string()
    }
    fn default_json_output() -> bool {
        false
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            program_name: Self::default_program_name(),
            gather: GatherOptions::default(),
            json_output: Self::default_json_output(),
        }
    }
}

pub fn config_path(filename: &str) -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join(filename)
}

pub fn preferences_path() -> PathBuf {
    config_path(PREFERENCES_FILE)
}

pub fn load_preferences() -> Preferences {
    load_preferences_from(&preferences_path())
}

/// Missing files give the defaults; unreadable ones are logged and give the
/// defaults too.
pub fn load_preferences_from(path: &Path) -> Preferences {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => return Preferences::default(),
    };
    match serde_json::from_str(&text) {
        Ok(prefs) => prefs,
        Err(e) => {
            log::warn!("Ignoring invalid preferences in {:?}: {}", path, e);
            Preferences::default()
        }
    }
}

pub fn save_preferences(prefs: &Preferences) {
    save_preferences_to(&preferences_path(), prefs);
}

pub fn save_preferences_to(path: &Path, prefs: &Preferences) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let json = match serde_json::to_string_pretty(prefs) {
        Ok(json) => json,
        Err(e) => {
            log::error!("Failed to serialize preferences: {}", e);
            return;
        }
    };
    if let Err(e) = std::fs::write(path, &json) {
        log::error!("Failed to save preferences to {:?}: {}", path, e);
    } else {
        log::debug!("save_preferences: written to {:?}", path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::DataType;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("portgroups-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{ "json_output": true }"#).unwrap();
        assert_eq!(prefs.program_name, DEFAULT_PROGRAM_NAME);
        assert_eq!(prefs.gather, GatherOptions::default());
        assert!(prefs.json_output);
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch("roundtrip/preferences.json");
        let prefs = Preferences {
            program_name: "Mixbus".to_string(),
            gather: GatherOptions::inputs().with_type(DataType::Midi),
            json_output: false,
        };
        save_preferences_to(&path, &prefs);
        assert_eq!(load_preferences_from(&path), prefs);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_or_invalid_file_gives_defaults() {
        assert_eq!(
            load_preferences_from(&scratch("does-not-exist.json")),
            Preferences::default()
        );

        let path = scratch("invalid/preferences.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert_eq!(load_preferences_from(&path), Preferences::default());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_path_layout() {
        let path = config_path("x.json");
        assert!(path.ends_with("portgroups/x.json"));
    }
}
