use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::pipeline::{CSRF_COOKIE, CSRF_HEADER};
use crate::api::RequestPipeline;
use crate::error::{GatewayError, Result};

const CONFIG_DIR_NAME: &str = ".gateway-client";
const CONFIG_FILE_NAME: &str = "config.yaml";
const ENV_PREFIX: &str = "GATEWAY";
const ENV_SEPARATOR: &str = "__";

pub const DEFAULT_CATALOG: &str = "airavata";
pub const SESSION_COOKIE: &str = "sessionid";

/// Keys accepted by [`Config::set`] and [`Config::get`].
pub const KEYS: &[&str] = &[
    "server.base_url",
    "server.catalog",
    "server.session_id",
    "client.user_agent",
    "client.csrf_cookie",
    "client.csrf_header",
    "client.show_spinner",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Portal root, e.g. `https://gateway.example.org/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Built-in catalog name or path to a catalog file
    pub catalog: String,

    /// Value of the portal's session cookie
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            catalog: DEFAULT_CATALOG.to_string(),
            session_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub csrf_cookie: String,
    pub csrf_header: String,
    pub show_spinner: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            csrf_cookie: CSRF_COOKIE.to_string(),
            csrf_header: CSRF_HEADER.to_string(),
            show_spinner: true,
        }
    }
}

impl Config {
    /// Get the configuration directory
    pub fn config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| GatewayError::Config("Could not determine home directory".to_string()))?;

        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Get the configuration file full path
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_path()?.join(CONFIG_FILE_NAME))
    }

    /// Create the default configuration file if it does not exist yet.
    pub fn initialize() -> Result<()> {
        Self::initialize_at(&Self::config_file_path()?)
    }

    pub fn initialize_at(path: &Path) -> Result<()> {
        if !path.exists() {
            Self::default().save_to(path)?;
        }
        Ok(())
    }

    /// Load the user's configuration, creating it on first use.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::initialize_at(&path)?;
        Self::load_from(&path)
    }

    /// Load `path` (optional) overlaid with `GATEWAY__SECTION__KEY`
    /// environment variables.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(false),
            )
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| GatewayError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to the user's file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            if !dir.exists() {
                fs::create_dir_all(dir)
                    .map_err(|e| GatewayError::Config(format!("Failed to create config directory: {}", e)))?;
                set_mode(dir, 0o700)?;
            }
        }

        let yaml = serde_yaml::to_string(self)
            .map_err(|e| GatewayError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, yaml).map_err(|e| GatewayError::Config(format!("Failed to write config file: {}", e)))?;
        set_mode(path, 0o600)
    }

    /// Set a configuration value by key path. The caller saves.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |value: &str| (!value.is_empty()).then(|| value.to_string());
        match key {
            "server.base_url" => {
                if !value.is_empty() {
                    url::Url::parse(value)?;
                }
                self.server.base_url = optional(value);
            }
            "server.catalog" => self.server.catalog = value.to_string(),
            "server.session_id" => self.server.session_id = optional(value),
            "client.user_agent" => self.client.user_agent = optional(value),
            "client.csrf_cookie" => self.client.csrf_cookie = value.to_string(),
            "client.csrf_header" => self.client.csrf_header = value.to_string(),
            "client.show_spinner" => {
                self.client.show_spinner = value
                    .parse()
                    .map_err(|_| GatewayError::InvalidInput(format!("{key} must be true or false, got '{value}'")))?;
            }
            _ => {
                return Err(GatewayError::Config(format!("Unknown configuration key: {}", key)));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "server.base_url" => self.server.base_url.clone(),
            "server.catalog" => Some(self.server.catalog.clone()),
            "server.session_id" => self.server.session_id.clone(),
            "client.user_agent" => self.client.user_agent.clone(),
            "client.csrf_cookie" => Some(self.client.csrf_cookie.clone()),
            "client.csrf_header" => Some(self.client.csrf_header.clone()),
            "client.show_spinner" => Some(self.client.show_spinner.to_string()),
            _ => None,
        }
    }

    /// Build a request pipeline for the configured portal. `base_url`
    /// overrides `server.base_url`.
    pub fn pipeline(&self, base_url: Option<&str>) -> Result<RequestPipeline> {
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| self.server.base_url.clone())
            .ok_or_else(|| {
                GatewayError::Config(
                    "No portal URL configured. Run: gateway config set server.base_url URL".to_string(),
                )
            })?;

        let mut builder = RequestPipeline::builder(base_url).csrf(&self.client.csrf_cookie, &self.client.csrf_header);
        if let Some(user_agent) = &self.client.user_agent {
            builder = builder.user_agent(user_agent);
        }
        if let Some(session) = &self.server.session_id {
            builder = builder.cookie(format!("{SESSION_COOKIE}={session}"));
        }
        builder.build()
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| GatewayError::Config(format!("Failed to set permissions on {}: {}", path.display(), e)))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.catalog, "airavata");
        assert!(config.client.show_spinner);
    }

    #[test]
    #[serial]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.set("server.base_url", "https://portal.example.org/").unwrap();
        config.set("server.session_id", "abc").unwrap();
        config.set("client.show_spinner", "false").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get("server.session_id"), Some("abc".to_string()));
        assert_eq!(loaded.get("client.show_spinner"), Some("false".to_string()));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn test_file_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg").join("config.yaml");
        Config::initialize_at(&path).unwrap();

        let file_mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = fs::metadata(path.parent().unwrap()).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();
        config.set("server.base_url", "https://file.example.org/").unwrap();
        config.save_to(&path).unwrap();

        std::env::set_var("GATEWAY__SERVER__BASE_URL", "https://env.example.org/");
        let loaded = Config::load_from(&path);
        std::env::remove_var("GATEWAY__SERVER__BASE_URL");

        assert_eq!(
            loaded.unwrap().server.base_url.as_deref(),
            Some("https://env.example.org/")
        );
    }

    #[test]
    fn test_unknown_and_invalid_keys() {
        let mut config = Config::default();
        assert!(matches!(config.set("server.nope", "x"), Err(GatewayError::Config(_))));
        assert!(config.set("client.show_spinner", "sometimes").is_err());
        assert!(config.set("server.base_url", "not a url").is_err());
        assert_eq!(config.get("server.nope"), None);
        for key in KEYS {
            config.get(key);
        }
    }

    #[test]
    fn test_pipeline_requires_base_url() {
        let config = Config::default();
        assert!(matches!(config.pipeline(None), Err(GatewayError::Config(_))));
        let pipeline = config.pipeline(Some("https://portal.example.org/")).unwrap();
        assert_eq!(pipeline.base_url().as_str(), "https://portal.example.org/");
    }
}
