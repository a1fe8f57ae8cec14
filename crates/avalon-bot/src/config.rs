use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;

const DEFAULT_VALUE_BOUND: f64 = 1e9;

/// Knobs shared by every solve made through one [`crate::solver::Solver`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Softmax inverse temperature; `inf` selects a pure best response.
    pub beta: f64,
    /// Weight of continuation values relative to immediate rewards.
    pub discount: f64,
    /// Probability mass spread uniformly over moves after the softmax.
    pub tremble: f64,
    /// Steps searched before the leaf evaluator takes over; `None` searches to
    /// the end of the game.
    pub horizon: Option<u32>,
    /// Largest magnitude a value may reach before it is treated as corrupt.
    pub value_bound: f64,
    pub memoize: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            beta: 1.0,
            discount: 1.0,
            tremble: 0.0,
            horizon: None,
            value_bound: DEFAULT_VALUE_BOUND,
            memoize: true,
        }
    }
}

impl SolverConfig {
    /// Defaults overridden by `AVK_*` environment variables, then validated.
    pub fn from_env() -> Result<Self, ValidationError> {
        let cfg = Self::default().with_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parses a YAML document, applies `AVK_*` overrides on top and validates
    /// the result.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let parsed: Self = serde_yaml::from_reader(reader)?;
        let cfg = parsed.with_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Applies `AVK_*` overrides without validating.
    pub fn with_env_overrides(self) -> Self {
        Self {
            beta: parse_env_f64("AVK_BETA", self.beta),
            discount: parse_env_f64("AVK_DISCOUNT", self.discount),
            tremble: parse_env_f64("AVK_TREMBLE", self.tremble),
            horizon: parse_env_horizon("AVK_HORIZON", self.horizon),
            value_bound: self.value_bound,
            memoize: parse_env_flag("AVK_MEMOIZE", self.memoize),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.beta.is_nan() || self.beta < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "solver.beta".to_string(),
                message: "beta must be non-negative".to_string(),
            });
        }
        if !self.discount.is_finite() || self.discount < 0.0 {
            return Err(ValidationError::InvalidField {
                field: "solver.discount".to_string(),
                message: "discount must be a finite non-negative number".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.tremble) {
            return Err(ValidationError::InvalidField {
                field: "solver.tremble".to_string(),
                message: "tremble must lie in [0, 1]".to_string(),
            });
        }
        if self.horizon == Some(0) {
            return Err(ValidationError::InvalidField {
                field: "solver.horizon".to_string(),
                message: "horizon must be at least one step".to_string(),
            });
        }
        if !self.value_bound.is_finite() || self.value_bound <= 0.0 {
            return Err(ValidationError::InvalidField {
                field: "solver.value_bound".to_string(),
                message: "value bound must be a finite positive number".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_env_f64(key: &str, fallback: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| !value.is_nan())
        .unwrap_or(fallback)
}

fn parse_env_horizon(key: &str, fallback: Option<u32>) -> Option<u32> {
    let Ok(raw) = env::var(key) else {
        return fallback;
    };
    match raw.trim() {
        "" | "none" | "full" => None,
        value => value.parse::<u32>().ok().or(fallback),
    }
}

fn parse_env_flag(key: &str, fallback: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|raw| match raw.trim() {
            "1" | "true" | "TRUE" | "on" | "ON" => Some(true),
            "0" | "false" | "FALSE" | "off" | "OFF" => Some(false),
            _ => None,
        })
        .unwrap_or(fallback)
}

/// Root configuration for a solver run loaded from YAML.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RunConfig {
    /// Load configuration from a YAML file on disk. `AVK_*` overrides are
    /// applied to the solver section before validation.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: RunConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.solver = cfg.solver.with_env_overrides();
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        self.solver.validate()?;
        self.logging.normalize();
        if self.logging.level().is_none() {
            return Err(ValidationError::InvalidField {
                field: "logging.tracing_level".to_string(),
                message: format!("unknown tracing level '{}'", self.logging.tracing_level),
            });
        }
        Ok(())
    }
}

/// Logging configuration defaults to disabled structured logs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
    /// JSON lines destination; stderr when absent.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
            file: None,
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.trim().to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. }
            | ConfigError::Parse { path, .. }
            | ConfigError::Invalid { path, .. } => path.as_path(),
        }
    }
}

/// Errors from [`SolverConfig::from_reader`].
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse solver config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid solver config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Validation failures captured with contextual metadata.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
