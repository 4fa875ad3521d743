//! Lineage configuration.
//!
//! Loaded from a TOML file and then overridden from the environment.
//!
//! # Example
//!
//! ```toml
//! image_origin = "https://images.yinyang.computerpho.be"
//! fetch_timeout_ms = 5000
//! max_concurrent_fetches = 16
//! chain_policy = "maximal"
//! signal = "distinct-count"
//! ```
//!
//! Environment overrides: `YINYANG_IMAGE_ORIGIN`, `YINYANG_FETCH_TIMEOUT_MS`,
//! `YINYANG_MAX_CONCURRENT_FETCHES`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::{Origin, Url};

/// Where generated images are hosted. Only URLs on this origin can name a
/// parent record.
pub const DEFAULT_IMAGE_ORIGIN: &str = "https://images.yinyang.computerpho.be";

const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 16;

const ENV_IMAGE_ORIGIN: &str = "YINYANG_IMAGE_ORIGIN";
const ENV_FETCH_TIMEOUT_MS: &str = "YINYANG_FETCH_TIMEOUT_MS";
const ENV_MAX_CONCURRENT_FETCHES: &str = "YINYANG_MAX_CONCURRENT_FETCHES";

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {message}")]
    Read { path: String, message: String },

    #[error("could not parse '{path}': {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Which chains the assembler keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChainPolicy {
    /// Only chains that are not a prefix of another chain in the result.
    #[default]
    Maximal,
    /// One chain per record, ending at that record.
    Raw,
}

/// What the chain cache compares to decide whether the record set changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalMode {
    /// Number of distinct request ids. Cheap; misses a delete followed by an
    /// insert that leaves the count unchanged.
    #[default]
    DistinctCount,
    /// SHA-256 over the full input-URL index. Catches same-count churn at
    /// the price of listing the index on every read.
    ContentDigest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineageConfig {
    pub image_origin: Url,
    pub fetch_timeout_ms: u64,
    pub max_concurrent_fetches: usize,
    pub chain_policy: ChainPolicy,
    pub signal: SignalMode,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            image_origin: Url::parse(DEFAULT_IMAGE_ORIGIN)
                .expect("default image origin is a valid URL"),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            chain_policy: ChainPolicy::default(),
            signal: SignalMode::default(),
        }
    }
}

impl LineageConfig {
    /// Read a TOML config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `YINYANG_*` overrides from the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(ENV_IMAGE_ORIGIN) {
            self.image_origin = Url::parse(raw.trim()).map_err(|e| ConfigError::Invalid {
                key: ENV_IMAGE_ORIGIN.to_string(),
                message: e.to_string(),
            })?;
        }
        if let Some(raw) = get(ENV_FETCH_TIMEOUT_MS) {
            self.fetch_timeout_ms = parse_number(ENV_FETCH_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = get(ENV_MAX_CONCURRENT_FETCHES) {
            self.max_concurrent_fetches = parse_number(ENV_MAX_CONCURRENT_FETCHES, &raw)?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check the values that deserialization alone cannot reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.image_origin.origin(), Origin::Tuple(..)) {
            return Err(ConfigError::Invalid {
                key: "image_origin".to_string(),
                message: format!("'{}' has no host origin", self.image_origin),
            });
        }
        // Image URLs are `<origin>/<bucket id>`; the resolver only links a
        // single-segment path.
        let url = &self.image_origin;
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(ConfigError::Invalid {
                key: "image_origin".to_string(),
                message: format!("'{}' must be a bare origin without a path", url),
            });
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "fetch_timeout_ms".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid {
                key: "max_concurrent_fetches".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Public URL of an object in the image bucket.
    pub fn hosted_image_url(&self, image_bucket_id: &str) -> String {
        format!(
            "{}/{}",
            self.image_origin.as_str().trim_end_matches('/'),
            image_bucket_id
        )
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        message: format!("'{}': {}", raw, e),
    })
}
