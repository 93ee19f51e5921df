//! Runtime configuration for the assistant panel.
//!
//! Values come from the process environment (after `.env` / bundled config
//! loading in `main`). Every key is optional; missing keys keep the reference
//! panel's behavior.

use crate::assistant::{CommandTable, MatchPolicy};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Defaults shipped with the binary for builds without a `.env` (mobile, web).
const BUNDLED_ENV: &str = include_str!("../assets/config.env");

pub const INSIGHT_INTERVAL_KEY: &str = "NEXUS_INSIGHT_INTERVAL_SECS";
pub const RESPONSE_DELAY_KEY: &str = "NEXUS_RESPONSE_DELAY_MS";
pub const INSIGHT_CAP_KEY: &str = "NEXUS_INSIGHT_CAP";
pub const MATCH_POLICY_KEY: &str = "NEXUS_MATCH_POLICY";
pub const COMMANDS_FILE_KEY: &str = "NEXUS_COMMANDS_FILE";

const DEFAULT_INSIGHT_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_RESPONSE_DELAY: Duration = Duration::from_millis(800);
const DEFAULT_INSIGHT_CAP: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("unknown match policy '{0}' (expected 'first' or 'longest')")]
    UnknownMatchPolicy(String),

    #[error("failed to read command file {path}: {source}")]
    CommandFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid command table: {0}")]
    CommandJson(#[from] serde_json::Error),

    #[error("command triggers must not be empty")]
    EmptyTrigger,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssistantConfig {
    pub insight_interval: Duration,
    pub response_delay: Duration,
    /// Ticks stop appending once the transcript holds this many messages.
    pub insight_cap: usize,
    pub match_policy: MatchPolicy,
    /// JSON command table replacing the built-in one.
    pub commands_file: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            insight_interval: DEFAULT_INSIGHT_INTERVAL,
            response_delay: DEFAULT_RESPONSE_DELAY,
            insight_cap: DEFAULT_INSIGHT_CAP,
            match_policy: MatchPolicy::default(),
            commands_file: None,
        }
    }
}

impl AssistantConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(raw) = get(INSIGHT_INTERVAL_KEY) {
            let secs = parse_positive(INSIGHT_INTERVAL_KEY, &raw)?;
            config.insight_interval = Duration::from_secs(secs);
        }
        if let Some(raw) = get(RESPONSE_DELAY_KEY) {
            let millis = parse_positive(RESPONSE_DELAY_KEY, &raw)?;
            config.response_delay = Duration::from_millis(millis);
        }
        if let Some(raw) = get(INSIGHT_CAP_KEY) {
            let cap = parse_positive(INSIGHT_CAP_KEY, &raw)?;
            config.insight_cap = usize::try_from(cap).unwrap_or(usize::MAX);
        }
        if let Some(raw) = get(MATCH_POLICY_KEY) {
            config.match_policy = raw.parse()?;
        }
        config.commands_file = get(COMMANDS_FILE_KEY).map(PathBuf::from);

        Ok(config)
    }

    /// Command table for this config: the file if one is set, the built-in
    /// table otherwise, with the configured match policy applied.
    pub fn command_table(&self) -> Result<CommandTable, ConfigError> {
        let table = match &self.commands_file {
            Some(path) => CommandTable::from_file(path)?,
            None => crate::assistant::presets::command_table(),
        };
        Ok(table.with_policy(self.match_policy))
    }
}

/// Where [`load_env`] found its variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvSource {
    DotEnv,
    Bundled,
    ProcessOnly,
}

/// Load `.env` from the working directory, or the bundled defaults when there
/// is none. Variables already set in the process always win.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_env() -> EnvSource {
    if dotenvy::dotenv().is_ok() {
        return EnvSource::DotEnv;
    }
    load_bundled_env()
}

#[cfg(target_arch = "wasm32")]
pub fn load_env() -> EnvSource {
    load_bundled_env()
}

fn load_bundled_env() -> EnvSource {
    match dotenvy::from_read(BUNDLED_ENV.as_bytes()) {
        Ok(()) => EnvSource::Bundled,
        Err(err) => {
            warn!(%err, "bundled config is unreadable");
            EnvSource::ProcessOnly
        }
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let value = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            key,
            value: raw.to_string(),
        })?;
    if value == 0 {
        return Err(ConfigError::Zero(key));
    }
    Ok(value)
}
