//! Run configuration.
//!
//! Only engine-relevant knobs live here; locating and reading config files is left to the caller, which hands
//! the JSON text to [`RunConfig::from_json`].

use std::time::Duration;

use serde::Deserialize;

/// Errors while building a [`RunConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_WORKERS: usize = 4;

pub const ENV_TIMEOUT: &str = "R2TEST_TIMEOUT";
pub const ENV_VERBOSE: &str = "R2TEST_VERBOSE";
pub const ENV_BAIL: &str = "R2TEST_BAIL";
pub const ENV_TAGS: &str = "R2TEST_TAGS";

/// Settings consumed by the [`Runner`](crate::runner::Runner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Timeout for tests without their own override
    pub default_timeout: Duration,
    /// Stop scheduling tests after the first failure or timeout
    pub bail: bool,
    /// Run only tests carrying at least one of these tags (empty = no filtering)
    pub filter_tags: Vec<String>,
    /// Reporter verbosity; the engine ignores it
    pub verbose: bool,
    /// Upper bound for a future parallel scheduler; tests currently run sequentially
    pub max_workers: usize,
    /// Re-runs offered by caller-level wrappers around `run`
    pub retries: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            bail: false,
            filter_tags: Vec::new(),
            verbose: false,
            max_workers: DEFAULT_MAX_WORKERS,
            retries: 0,
        }
    }
}

/// On-disk shape. Unknown keys (coverage, patterns, reporters...) belong to other tools and are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    /// Milliseconds.
    timeout: Option<i64>,
    bail: Option<bool>,
    tags: Option<Vec<String>>,
    verbose: Option<bool>,
    max_workers: Option<i64>,
    retries: Option<u32>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_bail(mut self, bail: bool) -> Self {
        self.bail = bail;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Parse a JSON config. Missing keys keep their defaults; the result is validated.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;
        let mut config = Self::default();
        if let Some(ms) = raw.timeout {
            config.default_timeout = Duration::from_millis(ms.max(0) as u64);
        }
        if let Some(bail) = raw.bail {
            config.bail = bail;
        }
        if let Some(tags) = raw.tags {
            config.filter_tags = tags;
        }
        if let Some(verbose) = raw.verbose {
            config.verbose = verbose;
        }
        if let Some(workers) = raw.max_workers {
            config.max_workers = workers.max(0) as usize;
        }
        if let Some(retries) = raw.retries {
            config.retries = retries;
        }
        Ok(config.validate())
    }

    /// Apply `R2TEST_*` variables from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides_from(|var| std::env::var(var).ok())
    }

    /// Apply `R2TEST_*` overrides using `lookup` as the environment.
    pub fn apply_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_TIMEOUT) {
            self.default_timeout = parse_duration(&value).ok_or(ConfigError::InvalidEnv {
                var: ENV_TIMEOUT,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_VERBOSE) {
            self.verbose = parse_flag(ENV_VERBOSE, value)?;
        }
        if let Some(value) = lookup(ENV_BAIL) {
            self.bail = parse_flag(ENV_BAIL, value)?;
        }
        if let Some(value) = lookup(ENV_TAGS) {
            self.filter_tags = value
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        Ok(self.validate())
    }

    /// Replace out-of-range values with defaults.
    pub fn validate(mut self) -> Self {
        if self.default_timeout.is_zero() {
            tracing::debug!("non-positive timeout, using default");
            self.default_timeout = DEFAULT_TIMEOUT;
        }
        if self.max_workers == 0 {
            self.max_workers = DEFAULT_MAX_WORKERS;
        }
        self
    }
}

/// `250ms`, `2s` or bare milliseconds.
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Some(ms) = value.strip_suffix("ms") {
        return ms.trim().parse().ok().map(Duration::from_millis);
    }
    if let Some(secs) = value.strip_suffix('s') {
        return secs
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|s| Duration::try_from_secs_f64(s).ok());
    }
    value.parse().ok().map(Duration::from_millis)
}

fn parse_flag(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}
