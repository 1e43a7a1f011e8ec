use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Backend {
    pub url: String,
    pub anon_key: String,
    /// Public URL of the web app, used for auth redirect links.
    pub site_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionConfig {
    pub path: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ShellConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_cache_name")]
    pub cache_name: String,
    #[serde(default = "default_assets")]
    pub assets: Vec<String>,
    #[serde(default = "default_entry_page")]
    pub entry_page: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            origin: default_origin(),
            cache_name: default_cache_name(),
            assets: default_assets(),
            entry_page: default_entry_page(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub backend: Backend,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub shell: ShellConfig,
}

impl Settings {
    /// Reads `path`, then applies `SAVEPIXIE__SECTION__KEY` environment
    /// overrides. A `.env` file, if present, is loaded first.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("SAVEPIXIE")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("shell.assets")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Where the signed-in session is persisted between runs.
    pub fn session_path(&self) -> PathBuf {
        if let Some(path) = &self.session.path {
            return PathBuf::from(path);
        }

        match ProjectDirs::from("app", "savepixie", "savepixie") {
            Some(dirs) => dirs.data_dir().join("session.json"),
            None => PathBuf::from(".savepixie-session.json"),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_listen() -> String {
    "127.0.0.1:4173".to_string()
}

fn default_origin() -> String {
    "http://127.0.0.1:5173".to_string()
}

fn default_cache_name() -> String {
    "savepixie-shell-v1".to_string()
}

fn default_assets() -> Vec<String> {
    vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/manifest.webmanifest".to_string(),
    ]
}

fn default_entry_page() -> String {
    "/index.html".to_string()
}
