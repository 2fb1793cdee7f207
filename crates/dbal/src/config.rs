//! Adapter configuration.
//!
//! Options can be built in code, parsed from string key/value pairs, or read
//! from `DBAL_*` environment variables:
//!
//! | Key | Environment | Values |
//! |---|---|---|
//! | `case_folding` | `DBAL_CASE_FOLDING` | `natural`, `upper`, `lower` |
//! | `fetch_mode` | `DBAL_FETCH_MODE` | `assoc`, `num`, `both`, `obj`, `bound`, `column` |
//! | `profiler` | `DBAL_PROFILER` | `true`/`false`, `1`/`0`, `on`/`off` |
//! | `profiler.filter_elapsed_secs` | `DBAL_PROFILER_FILTER_ELAPSED_SECS` | seconds, fractional allowed |
//! | `profiler.filter_types` | `DBAL_PROFILER_FILTER_TYPES` | e.g. `select|insert` |

use std::env;
use std::time::Duration;

use dbal_core::{CaseFolding, ConfigError, Result};

use crate::fetch::FetchMode;
use crate::profiler::{Profiler, QueryTypeSet};

const KEYS: [&str; 5] = [
    "case_folding",
    "fetch_mode",
    "profiler",
    "profiler.filter_elapsed_secs",
    "profiler.filter_types",
];

/// Profiler settings applied when an adapter connects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilerOptions {
    pub enabled: bool,
    /// Minimum elapsed time for a profile to be kept
    pub filter_elapsed: Option<Duration>,
    /// Query types to keep
    pub filter_types: Option<QueryTypeSet>,
}

impl ProfilerOptions {
    /// A profiler configured with these settings.
    pub fn build(&self) -> Profiler {
        let mut profiler = Profiler::new();
        profiler.set_enabled(self.enabled);
        profiler.set_filter_elapsed(self.filter_elapsed);
        profiler.set_filter_types(self.filter_types);
        profiler
    }
}

/// Options for an [`Adapter`](crate::Adapter).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdapterOptions {
    /// Case policy for result column names
    pub case_folding: CaseFolding,
    /// Default fetch mode for new statements
    pub fetch_mode: FetchMode,
    pub profiler: ProfilerOptions,
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case_folding(mut self, folding: CaseFolding) -> Self {
        self.case_folding = folding;
        self
    }

    pub fn fetch_mode(mut self, mode: FetchMode) -> Self {
        self.fetch_mode = mode;
        self
    }

    pub fn profiler(mut self, enabled: bool) -> Self {
        self.profiler.enabled = enabled;
        self
    }

    pub fn profiler_filter_elapsed(mut self, min: Duration) -> Self {
        self.profiler.filter_elapsed = Some(min);
        self
    }

    pub fn profiler_filter_types(mut self, types: impl Into<QueryTypeSet>) -> Self {
        self.profiler.filter_types = Some(types.into());
        self
    }

    /// Parse options from string settings. Unknown keys are rejected.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.apply(key.as_ref(), value.as_ref())?;
        }
        Ok(options)
    }

    /// Read options from `DBAL_*` environment variables. Unset variables
    /// keep their defaults.
    pub fn from_env() -> Result<Self> {
        let pairs = KEYS.iter().filter_map(|key| {
            env::var(env_name(key))
                .ok()
                .map(|value| (*key, value))
        });
        Self::from_pairs(pairs)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "case_folding" => {
                self.case_folding = CaseFolding::parse(value)
                    .ok_or_else(|| invalid(key, value, "expected natural, upper or lower"))?;
            }
            "fetch_mode" => {
                self.fetch_mode =
                    FetchMode::parse(value).map_err(|_| invalid(key, value, "unknown fetch mode"))?;
            }
            "profiler" => {
                self.profiler.enabled =
                    parse_bool(value).ok_or_else(|| invalid(key, value, "expected a boolean"))?;
            }
            "profiler.filter_elapsed_secs" => {
                let elapsed = value
                    .parse::<f64>()
                    .ok()
                    .and_then(|s| Duration::try_from_secs_f64(s).ok())
                    .ok_or_else(|| invalid(key, value, "expected a non-negative number of seconds"))?;
                self.profiler.filter_elapsed = Some(elapsed);
            }
            "profiler.filter_types" => {
                let types = QueryTypeSet::parse(value)
                    .ok_or_else(|| invalid(key, value, "expected query types separated by '|'"))?;
                self.profiler.filter_types = Some(types);
            }
            _ => {
                return Err(ConfigError {
                    key: key.to_string(),
                    message: "unknown option".to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

fn env_name(key: &str) -> String {
    format!("DBAL_{}", key.replace('.', "_").to_ascii_uppercase())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn invalid(key: &str, value: &str, expected: &str) -> ConfigError {
    ConfigError {
        key: key.to_string(),
        message: format!("invalid value '{}': {}", value, expected),
    }
}
