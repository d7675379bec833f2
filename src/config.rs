//! TOML configuration. The file is called `config.toml` and is looked up in the working
//! directory, `./config` and `$HOME/.config/pomo`, first hit wins. Every field has a default, so
//! a missing file is not an error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::utils::dir::user_config_dir;

const CONFIG_FILE_NAME: &str = "config.toml";

/// Labels written into the daily timeline.
///
/// Two defaults exist on purpose: completed focus sessions are always folded in as `focus`,
/// while a blank answer in the label menu resolves to `adhoc_default`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_focus_label")]
    pub focus: String,
    #[serde(default = "default_adhoc_label")]
    pub adhoc_default: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            focus: default_focus_label(),
            adhoc_default: default_adhoc_label(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    /// SQLite database path. Defaults to `pomolog.db` in the application directory.
    #[serde(default)]
    pub database: Option<PathBuf>,
    /// Selected task cache path. Defaults to `selected_task.json` in the application directory.
    #[serde(default)]
    pub cache: Option<PathBuf>,
    /// ClickUp API token.
    #[serde(default)]
    pub auth_key: Option<String>,
    /// ClickUp team (workspace) id.
    #[serde(default)]
    pub team_id: Option<String>,
    /// Focus session length in minutes.
    #[serde(default = "default_pomodoro_time")]
    pub pomodoro_time: u32,
    /// Sessions shorter than this many seconds are discarded.
    #[serde(default = "default_stop_in_first")]
    pub stop_in_first: u32,
    /// Break length in minutes.
    #[serde(default = "default_break_time")]
    pub break_time: u32,
    #[serde(default)]
    pub labels: LabelConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            database: None,
            cache: None,
            auth_key: None,
            team_id: None,
            pomodoro_time: default_pomodoro_time(),
            stop_in_first: default_stop_in_first(),
            break_time: default_break_time(),
            labels: LabelConfig::default(),
        }
    }
}

fn default_focus_label() -> String {
    "study".into()
}

fn default_adhoc_label() -> String {
    "play".into()
}

fn default_pomodoro_time() -> u32 {
    25
}

fn default_stop_in_first() -> u32 {
    30
}

fn default_break_time() -> u32 {
    5
}

impl Configuration {
    /// Loads configuration from `explicit` when given, otherwise from the first file found in the
    /// search path.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match search_paths()
            .into_iter()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|path| path.is_file())
        {
            Some(path) => Self::from_file(&path),
            None => {
                info!("No {CONFIG_FILE_NAME} found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {path:?}");
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn database_path(&self, app_dir: &Path) -> PathBuf {
        self.database
            .clone()
            .unwrap_or_else(|| app_dir.join("pomolog.db"))
    }

    pub fn cache_path(&self, app_dir: &Path) -> PathBuf {
        self.cache
            .clone()
            .unwrap_or_else(|| app_dir.join("selected_task.json"))
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("."), PathBuf::from("./config")];
    paths.extend(user_config_dir());
    paths
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use anyhow::Result;
    use tempfile::NamedTempFile;

    use super::{Configuration, LabelConfig};

    #[test]
    fn empty_file_uses_defaults() -> Result<()> {
        let config = Configuration::parse("")?;
        assert_eq!(config, Configuration::default());
        assert_eq!(config.labels.focus, "study");
        assert_eq!(config.labels.adhoc_default, "play");
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let config = Configuration::parse(
            r#"
            auth_key = "pk_123"
            team_id = "42"
            pomodoro_time = 50

            [labels]
            adhoc_default = "rest"
            "#,
        )?;
        assert_eq!(config.auth_key.as_deref(), Some("pk_123"));
        assert_eq!(config.team_id.as_deref(), Some("42"));
        assert_eq!(config.pomodoro_time, 50);
        assert_eq!(config.break_time, 5);
        assert_eq!(
            config.labels,
            LabelConfig {
                focus: "study".into(),
                adhoc_default: "rest".into()
            }
        );
        Ok(())
    }

    #[test]
    fn malformed_file_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "pomodoro_time = \"long\"")?;
        assert!(Configuration::from_file(file.path()).is_err());
        Ok(())
    }
}
