//! Layered registry configuration.
//!
//! # Responsibility
//! - Merge built-in defaults, an optional TOML file and `REGISTRY_*`
//!   environment variables into one `RegistryConfig`.
//! - Reject settings the store and composer cannot honor.
//!
//! Later layers override earlier ones. Environment keys are the field names
//! upper-cased, e.g. `REGISTRY_DATABASE_PATH`, `REGISTRY_MAX_LIMIT`.

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::logging::default_log_level;
use crate::repo::equipment_repo::Atomicity;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "REGISTRY_";
pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug)]
pub enum ConfigError {
    /// A layer could not be read or did not match the schema.
    Load(Box<figment::Error>),
    /// A merged value is out of range.
    Invalid { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(err) => write!(f, "failed to load configuration: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Load(err) => Some(err.as_ref()),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        Self::Load(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// SQLite file path, or `:memory:`.
    pub database_path: PathBuf,
    pub log_level: String,
    /// Rolling log directory; file logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
    /// Upper clamp on `limit` for filtered finds.
    pub max_limit: Option<u32>,
    /// Commit batch creates as one unit.
    pub atomic_batches: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("registry.sqlite3"),
            log_level: default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT.as_millis() as u64,
            max_limit: None,
            atomic_batches: false,
        }
    }
}

impl RegistryConfig {
    /// Loads defaults, then `file` when given, then the environment.
    ///
    /// A missing file is treated as an empty layer.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(file).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Provider stack used by `load`, exposed for callers adding layers.
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_limit == Some(0) {
            return Err(ConfigError::Invalid {
                field: "max_limit",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "database_path",
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn atomicity(&self) -> Atomicity {
        if self.atomic_batches {
            Atomicity::Atomic
        } else {
            Atomicity::Independent
        }
    }
}
