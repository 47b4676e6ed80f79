use duration_string::DurationString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};
use thiserror::Error;

use crate::consts::{
    DEFAULT_BIND_ADDRESS, DEFAULT_HEALTH_TIMEOUT_SECS, DEFAULT_MODEL,
    DEFAULT_MODELS_TIMEOUT_SECS, DEFAULT_OLLAMA_ENDPOINT, DEFAULT_SYSTEM_PROMPT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Configuration {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default)]
    pub ollama: OllamaConfig,
    pub static_dir: Option<PathBuf>,
    pub tracing: Option<Tracing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listener {
    pub address: String,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    pub system_prompt: Option<String>,
    pub health_timeout: Option<DurationString>,
    pub models_timeout: Option<DurationString>,
}

fn default_endpoint() -> String {
    DEFAULT_OLLAMA_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            default_model: default_model(),
            system_prompt: None,
            health_timeout: None,
            models_timeout: None,
        }
    }
}

impl OllamaConfig {
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    pub fn health_timeout(&self) -> Duration {
        self.health_timeout
            .clone()
            .map(Duration::from)
            .unwrap_or(Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS))
    }

    pub fn models_timeout(&self) -> Duration {
        self.models_timeout
            .clone()
            .map(Duration::from)
            .unwrap_or(Duration::from_secs(DEFAULT_MODELS_TIMEOUT_SECS))
    }

    /// Endpoint without a trailing slash, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Tracing {
    pub random_sampling: Option<u32>,
    pub opentracing_grpc_endpoint: Option<String>,
}

impl Configuration {
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reads the YAML file at `path`. `Ok(None)` when there is no such file,
    /// leaving the caller to decide on defaults and to report it.
    pub fn read(path: &Path) -> Result<Option<Self>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_yaml(&contents).map(Some),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Applies `BIND_ADDRESS`, `OLLAMA_URL`, `OLLAMA_MODEL` and `STATIC_DIR`
    /// as resolved by `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(address) = lookup("BIND_ADDRESS") {
            self.listener.address = address;
        }
        if let Some(endpoint) = lookup("OLLAMA_URL") {
            self.ollama.endpoint = endpoint;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.ollama.default_model = model;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.static_dir = Some(PathBuf::from(dir));
        }
    }
}
