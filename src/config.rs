//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/ciconf/ciconf.toml`
//! 3. Local config: `<dir>/.ciconf.toml`
//! 4. Environment variables: `CICONF_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{ConfigDefaults, DEFAULT_LABEL_TEMPLATE};

/// Raw settings for intermediate parsing (`None` means "not specified").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub default_label_template: Option<String>,
    pub local_save_dir: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

/// Unified configuration for ciconf.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Label template applied by `set_default_label_template`
    pub default_label_template: String,
    /// Where `config-before.xml` / `config-after.xml` are written
    pub local_save_dir: PathBuf,
    /// Configuration document backing the file store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_label_template: DEFAULT_LABEL_TEMPLATE.to_string(),
            local_save_dir: PathBuf::from("."),
            config_file: None,
        }
    }
}

/// Get the XDG config directory for ciconf.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ciconf").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("ciconf.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(".ciconf.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

fn expand(value: &str) -> String {
    shellexpand::full(value)
        .map(|v| v.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

impl Settings {
    /// Values the domain facade needs.
    pub fn defaults(&self) -> ConfigDefaults {
        ConfigDefaults {
            label_template: self.default_label_template.clone(),
        }
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.local_save_dir = PathBuf::from(expand(&self.local_save_dir.to_string_lossy()));
        self.config_file = self
            .config_file
            .as_ref()
            .map(|p| PathBuf::from(expand(&p.to_string_lossy())));
    }

    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            default_label_template: overlay
                .default_label_template
                .clone()
                .unwrap_or_else(|| self.default_label_template.clone()),
            local_save_dir: overlay
                .local_save_dir
                .clone()
                .unwrap_or_else(|| self.local_save_dir.clone()),
            config_file: overlay.config_file.clone().or_else(|| self.config_file.clone()),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local_dir` - Optional directory holding a `.ciconf.toml`
    pub fn load(local_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("load: global={}", global_path.display());
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(dir) = local_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("load: local={}", local_path.display());
                current = current.merge_with(&load_raw_settings(&local_path)?);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply CICONF_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("CICONF").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("default_label_template") {
            settings.default_label_template = val;
        }
        if let Ok(val) = config.get_string("local_save_dir") {
            settings.local_save_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("config_file") {
            settings.config_file = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# ciconf configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/ciconf/ciconf.toml
#   Local:  <dir>/.ciconf.toml
#   Env:    CICONF_* environment variables

# Label template used by set_default_label_template
# default_label_template = "0.${COUNT}"

# Directory receiving config-before.xml and config-after.xml
# local_save_dir = "."

# Configuration document edited through the file store
# config_file = "~/ci/cruise-config.xml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_default_settings_when_created_then_label_template_is_count_based() {
        let settings = Settings::default();

        assert_eq!(settings.default_label_template, "0.${COUNT}");
        assert_eq!(settings.local_save_dir, PathBuf::from("."));
        assert_eq!(settings.defaults().label_template, "0.${COUNT}");
    }

    #[test]
    fn given_tilde_in_paths_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            local_save_dir: PathBuf::from("~/ci-snapshots"),
            config_file: Some(PathBuf::from("$HOME/cruise-config.xml")),
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        assert!(settings.local_save_dir.to_string_lossy().starts_with(&home));
        assert!(settings
            .config_file
            .unwrap()
            .to_string_lossy()
            .starts_with(&home));
    }

    #[test]
    fn given_overlay_when_merged_then_only_specified_fields_change() {
        let base = Settings::default();
        let overlay = RawSettings {
            default_label_template: Some("1.${COUNT}".to_string()),
            ..RawSettings::default()
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.default_label_template, "1.${COUNT}");
        assert_eq!(merged.local_save_dir, base.local_save_dir);
        assert_eq!(merged.config_file, None);
    }

    #[test]
    fn given_settings_when_serialized_then_omits_unset_config_file() {
        let toml = Settings::default().to_toml().unwrap();

        assert!(toml.contains("default_label_template"));
        assert!(!toml.contains("config_file"));
    }
}
