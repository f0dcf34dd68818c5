use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const APP_DIR_NAME: &str = "popbox";
const CONFIG_FILE_NAME: &str = "config.toml";

pub const DEFAULT_LOOKUP_URL: &str = "https://ordbok.uib.no/perl/ordbok.cgi?OPP={word}&ant_bokmaal=5&ant_nynorsk=5&bokmaal=+&ordbok=bokmaal";
pub const DEFAULT_INFLECTION_URL: &str =
    "https://ordbok.uib.no/perl/bob_hente_paradigme.cgi?lid={lid}";
pub const DEFAULT_SUGGEST_URL: &str =
    "https://ordbok.uib.no/perl/lage_ordliste_liten_nr2000.cgi?spr=bokmaal&query={prefix}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write config '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid toml in '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode config: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub candidates_path: PathBuf,
    pub max_ticket_len: usize,
    pub max_results: u16,
    pub cache_dir: PathBuf,
    pub lookup_url_template: String,
    pub inflection_url_template: String,
    pub suggest_url_template: String,
    pub quiet_period_ms: u64,
    pub guard_host: String,
    pub guard_port: u16,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let base = stable_app_data_dir();
        Self {
            candidates_path: base.join("rt.candidates.tsv"),
            max_ticket_len: 6,
            max_results: 20,
            cache_dir: base.join("cache"),
            lookup_url_template: DEFAULT_LOOKUP_URL.to_string(),
            inflection_url_template: DEFAULT_INFLECTION_URL.to_string(),
            suggest_url_template: DEFAULT_SUGGEST_URL.to_string(),
            quiet_period_ms: 300,
            guard_host: "127.0.0.1".to_string(),
            guard_port: 47_813,
            config_path: base.join(CONFIG_FILE_NAME),
        }
    }
}

impl Config {
    pub fn quiet_period(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.quiet_period_ms)
    }
}

/// Per-user data directory shared by the config file, the response cache and
/// the logs.
pub fn stable_app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

pub fn default_config_path() -> PathBuf {
    stable_app_data_dir().join(CONFIG_FILE_NAME)
}

/// Loads the config at `path` (or the default location). A missing file yields
/// the defaults with `config_path` pointing at where it would live.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);

    let mut config = match std::fs::read_to_string(&config_path) {
        Ok(raw) => toml::from_str::<Config>(&raw).map_err(|source| ConfigError::Parse {
            path: config_path.clone(),
            source,
        })?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(source) => {
            return Err(ConfigError::Read {
                path: config_path,
                source,
            })
        }
    };
    config.config_path = config_path;

    validate(&config).map_err(ConfigError::Invalid)?;
    Ok(config)
}

pub fn save(config: &Config) -> Result<(), ConfigError> {
    let encoded = toml::to_string_pretty(config)?;
    if let Some(parent) = config.config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: config.config_path.clone(),
            source,
        })?;
    }
    std::fs::write(&config.config_path, encoded).map_err(|source| ConfigError::Write {
        path: config.config_path.clone(),
        source,
    })
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    if cfg.max_results < 1 || cfg.max_results > 500 {
        return Err("max_results out of range".into());
    }

    if cfg.max_ticket_len == 0 {
        return Err("max_ticket_len must be positive".into());
    }

    if cfg.cache_dir.as_os_str().is_empty() {
        return Err("cache_dir is required".into());
    }

    if !cfg.lookup_url_template.contains("{word}") {
        return Err("lookup_url_template must contain {word}".into());
    }

    if !cfg.inflection_url_template.contains("{lid}") {
        return Err("inflection_url_template must contain {lid}".into());
    }

    if !cfg.suggest_url_template.contains("{prefix}") {
        return Err("suggest_url_template must contain {prefix}".into());
    }

    if cfg.guard_host.trim().is_empty() {
        return Err("guard_host is required".into());
    }

    Ok(())
}
