use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

/// How an editor treats a stored value that changes after it was loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExternalValue {
    #[default]
    IgnoreAfterMount,
    ReimportOnChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shown while the post is empty.
    pub placeholder: String,
    /// Open posts read-only.
    pub disabled: bool,
    pub external_value: ExternalValue,
    /// Where uploaded images are copied to.
    pub uploads_path: PathBuf,
    /// Prefix for the URLs of uploaded images; file URLs when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url_prefix: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let uploads_path = PathBuf::from("~/.local/share/richpost/uploads");
        Self {
            placeholder: "Write something...".to_string(),
            disabled: false,
            external_value: ExternalValue::default(),
            uploads_path: Self::expand_path(&uploads_path).unwrap_or(uploads_path),
            public_url_prefix: None,
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the uploads path
        config.uploads_path =
            Self::expand_path(&config.uploads_path).unwrap_or(config.uploads_path);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_dir() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/richpost");
        PathBuf::from(config_dir.as_ref())
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Public URL for an uploaded file stored as `file_name`.
    pub fn upload_url(&self, file_name: &str) -> String {
        match &self.public_url_prefix {
            Some(prefix) => format!("{}/{file_name}", prefix.trim_end_matches('/')),
            None => format!("file://{}", self.uploads_path.join(file_name).display()),
        }
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
