//! Configuration file support

use raksha_stream::Assistant;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for raksha
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Edge functions base URL, e.g. https://<project>.supabase.co/functions/v1
    pub functions_url: Option<String>,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Default assistant (first-aid, raksha)
    pub assistant: Option<Assistant>,
    /// Assistant message shown when a conversation starts
    pub greeting: Option<String>,
    /// Keep unparseable stream lines queued until the next read instead of skipping them
    pub requeue_on_desync: Option<bool>,
    /// Connection timeout in seconds
    pub connect_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("raksha")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("RAKSHA_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location, then apply environment overrides
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path());
        config.apply_env_with(|key| std::env::var(key).ok());
        config
    }

    /// Load config from a file; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Environment variables win over the file
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("RAKSHA_FUNCTIONS_URL") {
            self.functions_url = Some(url);
        }
        if let Some(token) = lookup("RAKSHA_API_TOKEN") {
            self.token = Some(token);
        }
    }

    /// Save config to file
    pub fn save(&self) -> std::io::Result<()> {
        let path = Self::config_path();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        let default_config = Config {
            functions_url: None,
            token: None,
            assistant: Some(Assistant::FirstAid),
            greeting: None,
            requeue_on_desync: Some(false),
            connect_timeout_secs: Some(10),
        };

        default_config.save()?;
        Ok(path)
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# raksha configuration file
# Place at ~/.config/raksha/config.toml (Linux) or set RAKSHA_CONFIG_PATH

# Edge functions base URL (or RAKSHA_FUNCTIONS_URL)
functions_url = "https://your-project.supabase.co/functions/v1"

# Bearer token: the anon key or a user access token (or RAKSHA_API_TOKEN)
# token = "eyJ..."

# Default assistant (first-aid, raksha)
assistant = "first-aid"

# Message shown at the top of every new conversation (optional)
# greeting = "Hello! Describe the emergency and I'll guide you."

# Hold back unparseable stream lines until the next read (compatibility mode)
requeue_on_desync = false

# Seconds allowed for establishing a connection
connect_timeout_secs = 10
"#
}
