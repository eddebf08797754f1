use choreboard_shared::domain::ChoreTemplate;
use serde::Deserialize;
use std::{env, fs, io::ErrorKind, path::Path, path::PathBuf};

pub const DEFAULT_PHOTO_DIR: &str = "chore_photos";
/// Request body cap for completion uploads. Base64 inflates a photo by a
/// third, so this admits phone photos of roughly 15 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Family members to make sure exist at startup.
    pub people: Vec<String>,
    /// Chores to make sure exist at startup.
    pub chores: Vec<ChoreTemplate>,
    pub photo_dir: Option<PathBuf>,
    pub dev_cors_origin: Option<String>,
    pub listen_port: Option<u16>,
    /// Largest accepted completion request body, in bytes.
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Yaml(e) => write!(f, "YAML error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(value: serde_yaml::Error) -> Self {
        ConfigError::Yaml(value)
    }
}

impl AppConfig {
    /// Loads `CONFIG_PATH` (default `config.yaml`). A missing file yields the
    /// default config; an unreadable or malformed one is an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
        match Self::load_from_path(&path) {
            Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path, "no config file, using defaults");
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(&path)?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// `PHOTO_DIR` env overrides `photo_dir`, which overrides the default.
    pub fn photo_dir(&self) -> PathBuf {
        env::var("PHOTO_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| self.photo_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PHOTO_DIR))
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use choreboard_shared::domain::Frequency;

    #[test]
    fn parses_seed_lists() {
        let cfg = AppConfig::from_yaml(
            r#"
people: [Alice, Bob]
chores:
  - room: Kitchen
    task: Sweep
    frequency: Daily
    estimated_time: 10
  - room: Yard
    task: Mow
    frequency: Summer-weekly
    estimated_time: 45
listen_port: 8080
"#,
        )
        .unwrap();
        assert_eq!(cfg.people, ["Alice", "Bob"]);
        assert_eq!(cfg.chores.len(), 2);
        assert_eq!(cfg.chores[1].frequency, Frequency::SummerWeekly);
        assert_eq!(cfg.listen_port, Some(8080));
        assert!(cfg.dev_cors_origin.is_none());
        assert_eq!(cfg.max_upload_bytes(), DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn upload_limit_is_configurable() {
        let cfg = AppConfig::from_yaml("max_upload_bytes: 1048576\n").unwrap();
        assert_eq!(cfg.max_upload_bytes(), 1024 * 1024);
    }

    #[test]
    fn empty_document_is_default() {
        let cfg = AppConfig::from_yaml("").unwrap();
        assert!(cfg.people.is_empty());
        assert!(cfg.chores.is_empty());
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        let err = AppConfig::from_yaml(
            "chores:\n  - {room: A, task: B, frequency: Hourly, estimated_time: 1}\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }
}
