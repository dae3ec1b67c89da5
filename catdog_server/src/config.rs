use crate::metrics_store::DEFAULT_CAPACITY;
use catdog_model::config::ModelConfig;
use serde::Deserialize;
use std::{path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body; uploads are held in memory whole.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_program")]
    pub program: String,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            program: default_pipeline_program(),
            working_dir: default_working_dir(),
        }
    }
}

fn default_pipeline_program() -> String {
    "dvc".to_string()
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    pub artifact_path: PathBuf,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported {kind} `{value}`, expected one of: {expected}")]
pub struct UnsupportedValue {
    kind: &'static str,
    value: String,
    expected: &'static str,
}

/// Selects the optional `configuration/<name>.yaml` overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn file_name(self) -> &'static str {
        match self {
            Environment::Local => "local.yaml",
            Environment::Production => "production.yaml",
        }
    }
}

impl FromStr for Environment {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            Ok(Environment::Local)
        } else if s.eq_ignore_ascii_case("production") {
            Ok(Environment::Production)
        } else {
            Err(UnsupportedValue {
                kind: "APP_ENVIRONMENT",
                value: s.to_string(),
                expected: "local, production",
            })
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "String")]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl FromStr for LogLevel {
    type Err = UnsupportedValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogLevel::Debug, LogLevel::Info]
            .into_iter()
            .find(|level| s.eq_ignore_ascii_case(level.as_str()))
            .ok_or_else(|| UnsupportedValue {
                kind: "log level",
                value: s.to_string(),
                expected: "debug, info",
            })
    }
}

impl TryFrom<String> for LogLevel {
    type Error = UnsupportedValue;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| {
        config::ConfigError::Message(format!(
            "Failed to determine the current directory: {}",
            e
        ))
    })?;
    let configuration_directory = base_path.join("configuration");

    let environment = match std::env::var("APP_ENVIRONMENT") {
        Ok(name) => name
            .parse::<Environment>()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?,
        Err(_) => Environment::Local,
    };

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment.file_name()))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("CATDOG")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    config.try_deserialize::<Config>()
}
