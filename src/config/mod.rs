//! Configuration module - environment variable parsing

mod movement;

pub use movement::{Capabilities, MovementConfig, Variant};

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::net::schema::SchemaVersion;
use crate::util::time::{DEFAULT_SERIALIZATION_RATE, DEFAULT_SIMULATION_TPS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format: human readable text or one JSON object per line
    pub log_format: LogFormat,

    /// Simulation ticks per second
    pub simulation_tps: u32,
    /// Snapshots per second pushed onto the transport
    pub serialization_rate: u32,
    /// Snapshot wire layout version
    pub schema_version: SchemaVersion,

    /// How long the hosted session runs before shutting down
    pub session_seconds: u64,
    /// One peer is started per role (e.g. "police,thief")
    pub player_roles: Vec<String>,
    /// Seed for spawn point selection and bot input
    pub spawn_seed: u64,

    /// Movement tunables shared by every spawned entity
    pub movement: MovementConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let movement = match env::var("MOVEMENT_CONFIG") {
            Ok(path) => MovementConfig::from_file(PathBuf::from(path))?,
            Err(_) => MovementConfig::default(),
        };
        movement.validate()?;

        let schema_version = parse_or("SCHEMA_VERSION", 1u8)?;

        Ok(Self {
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or("LOG_FORMAT", LogFormat::Text)?,

            simulation_tps: parse_positive("SIMULATION_TPS", DEFAULT_SIMULATION_TPS)?,
            serialization_rate: parse_positive("SERIALIZATION_RATE", DEFAULT_SERIALIZATION_RATE)?,
            schema_version: SchemaVersion::try_from(schema_version)
                .map_err(|_| ConfigError::Invalid("SCHEMA_VERSION"))?,

            session_seconds: parse_or("SESSION_SECONDS", 10u64)?,
            player_roles: env::var("PLAYER_ROLES")
                .unwrap_or_else(|_| "police,thief".to_string())
                .split(',')
                .map(|role| role.trim().to_string())
                .filter(|role| !role.is_empty())
                .collect(),
            spawn_seed: parse_or("SPAWN_SEED", 7u64)?,

            movement,
        })
    }
}

/// Output format of the tracing subscriber
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn parse_positive(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match parse_or(key, default)? {
        0 => Err(ConfigError::Invalid(key)),
        value => Ok(value),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Failed to read movement config {}: {source}", path.display())]
    MovementFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed movement config: {0}")]
    MovementParse(#[from] serde_json::Error),

    #[error("Invalid movement config: {0}")]
    InvalidMovement(&'static str),
}
