//! Harness configuration.
//!
//! Configuration merges three layers, later layers winning:
//! an optional TOML file, environment variables with the `INDEX_SOAK__`
//! prefix, and CLI arguments.

use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use index_soak_client::{ClientConfig, LoginPolicy};
use index_soak_harness::RunOptions;

/// Command-line interface for the harness binary.
#[derive(Debug, Parser)]
#[command(
    name = "index-soak",
    about = "Drives mutation load at a store cluster while watching a background index build",
    version
)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(long)]
    pub config: Option<String>,

    /// Comma-separated endpoint URLs, one per cluster member.
    #[arg(long, value_delimiter = ',')]
    pub endpoints: Vec<String>,

    /// Identity to authenticate as.
    #[arg(long)]
    pub identity: Option<String>,

    /// Secret for the identity.
    #[arg(long)]
    pub secret: Option<String>,

    /// Attribute whose index build is being validated.
    #[arg(long)]
    pub attribute: Option<String>,

    /// Readiness flag to watch on the attribute.
    #[arg(long)]
    pub flag: Option<String>,

    /// Total mutation budget for the workload.
    #[arg(long)]
    pub mutations: Option<u64>,

    /// Number of concurrent mutation workers.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Seconds between progress lines.
    #[arg(long)]
    pub stats_interval_secs: Option<u64>,

    /// Seconds between readiness polls.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Deadline in seconds for observing the index build.
    #[arg(long)]
    pub readiness_timeout_secs: Option<u64>,

    /// Log output format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format (development).
    Text,
    /// JSON structured logging (production / log aggregation).
    Json,
    /// JSON for non-TTY stdout, text otherwise.
    #[default]
    Auto,
}

/// Harness configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Endpoint URLs, one per cluster member.
    #[serde(default = "default_endpoints")]
    pub endpoints: Vec<String>,

    /// Identity to authenticate as.
    #[serde(default = "default_identity")]
    pub identity: String,

    /// Secret for the identity.
    #[serde(default = "default_secret")]
    pub secret: String,

    /// Attribute whose index build is being validated.
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Readiness flag to watch on the attribute.
    #[serde(default = "default_flag")]
    pub flag: String,

    /// Total mutation budget for the workload.
    #[serde(default = "default_mutations")]
    pub mutations: u64,

    /// Number of concurrent mutation workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Seconds between progress lines.
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,

    /// Seconds between readiness polls.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Deadline in seconds for observing the index build.
    #[serde(default = "default_readiness_timeout_secs")]
    pub readiness_timeout_secs: u64,

    /// Fixed backoff in seconds between login attempts.
    #[serde(default = "default_login_backoff_secs")]
    pub login_backoff_secs: u64,

    /// Maximum login attempts. Unset retries indefinitely.
    #[serde(default)]
    pub login_max_attempts: Option<u32>,

    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_endpoints() -> Vec<String> {
    // Default local test cluster layout: six members.
    [9180, 9182, 9183, 9184, 9185, 9187]
        .into_iter()
        .map(|port| format!("http://localhost:{port}"))
        .collect()
}

fn default_identity() -> String {
    "groot".to_owned()
}

fn default_secret() -> String {
    "password".to_owned()
}

fn default_attribute() -> String {
    "name".to_owned()
}

fn default_flag() -> String {
    "indexed".to_owned()
}

fn default_mutations() -> u64 {
    10_000
}

fn default_workers() -> usize {
    4
}

fn default_stats_interval_secs() -> u64 {
    2
}

fn default_poll_interval_secs() -> u64 {
    2
}

fn default_readiness_timeout_secs() -> u64 {
    600
}

fn default_login_backoff_secs() -> u64 {
    1
}

impl Config {
    /// Loads configuration from file and environment, then applies CLI
    /// overrides.
    ///
    /// Environment variables use the `INDEX_SOAK__` prefix with `__` as the
    /// nesting separator (e.g., `INDEX_SOAK__MUTATIONS=50000`). The
    /// endpoints list may be given comma-separated.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let builder = config::Config::builder();

        let builder = if let Some(ref path) = cli.config {
            builder.add_source(config::File::with_name(path))
        } else {
            builder.add_source(config::File::with_name("index-soak").required(false))
        };

        let builder = builder.add_source(
            config::Environment::with_prefix("INDEX_SOAK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("endpoints"),
        );

        let config: Self = builder
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?
            .try_deserialize()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config.merged_with(cli))
    }

    /// Applies CLI overrides on top of file/env values.
    fn merged_with(mut self, cli: &Cli) -> Self {
        if !cli.endpoints.is_empty() {
            self.endpoints = cli.endpoints.clone();
        }
        if let Some(ref identity) = cli.identity {
            self.identity = identity.clone();
        }
        if let Some(ref secret) = cli.secret {
            self.secret = secret.clone();
        }
        if let Some(ref attribute) = cli.attribute {
            self.attribute = attribute.clone();
        }
        if let Some(ref flag) = cli.flag {
            self.flag = flag.clone();
        }
        if let Some(mutations) = cli.mutations {
            self.mutations = mutations;
        }
        if let Some(workers) = cli.workers {
            self.workers = workers;
        }
        if let Some(secs) = cli.stats_interval_secs {
            self.stats_interval_secs = secs;
        }
        if let Some(secs) = cli.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(secs) = cli.readiness_timeout_secs {
            self.readiness_timeout_secs = secs;
        }
        if let Some(format) = cli.log_format {
            self.log_format = format;
        }
        self
    }

    /// Builds the client configuration for the connector.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut login_policy =
            LoginPolicy::default().with_backoff(Duration::from_secs(self.login_backoff_secs));
        if let Some(max) = self.login_max_attempts {
            login_policy = login_policy.with_max_attempts(max);
        }

        ClientConfig::builder()
            .with_endpoints(self.endpoints.iter().cloned())
            .with_credentials(self.identity.clone(), self.secret.clone())
            .with_login_policy(login_policy)
            .build()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Builds the run options for the orchestrator.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            attribute: self.attribute.clone(),
            flag: self.flag.clone(),
            mutations: self.mutations,
            workers: self.workers,
            stats_interval: Duration::from_secs(self.stats_interval_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            readiness_timeout: Duration::from_secs(self.readiness_timeout_secs),
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to load configuration.
    Load(String),
    /// Failed to parse configuration.
    Parse(String),
    /// Configuration values failed validation.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "failed to load config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
