//! Configuration for hosts embedding a ballast cache manager.
//!
//! Settings are read from TOML:
//!
//! ```toml
//! [logging]
//! level = "info"
//! json = false
//!
//! [manager]
//! keep_free_mem_percent = 25
//! keep_free_mem_bytes = "6GiB"
//! monitoring_interval_ms = 15000
//! min_resize_interval_ms = 600000
//! min_resize_threshold = "200MiB"
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use ballast_memory::{ManagerOptions, GB, MB};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod validation;

static TRACING_INIT: Once = Once::new();

/// A byte size which supports both raw byte counts and human-friendly suffixes.
///
/// This is used for config values where TOML integer literals would be unwieldy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteSize(pub u64);

impl Serialize for ByteSize {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

struct ByteSizeVisitor;

impl serde::de::Visitor<'_> for ByteSizeVisitor {
    type Value = ByteSize;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("a byte count or a size such as \"512MiB\"")
    }

    fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<ByteSize, E> {
        Ok(ByteSize(value))
    }

    fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<ByteSize, E> {
        u64::try_from(value)
            .map(ByteSize)
            .map_err(|_| E::invalid_value(serde::de::Unexpected::Signed(value), &self))
    }

    fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<ByteSize, E> {
        ballast_memory::parse_byte_size(value)
            .map(ByteSize)
            .map_err(E::custom)
    }
}

/// Settings for the cache manager (`ballast-memory`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManagerConfig {
    /// Share of total memory withheld from all caches (0-100).
    #[serde(default = "ManagerConfig::default_keep_free_mem_percent")]
    pub keep_free_mem_percent: u8,

    /// Memory withheld from all caches regardless of the total.
    #[serde(default = "ManagerConfig::default_keep_free_mem_bytes")]
    pub keep_free_mem_bytes: ByteSize,

    #[serde(default = "ManagerConfig::default_monitoring_interval_ms")]
    pub monitoring_interval_ms: u64,

    /// Cooldown between two resize passes.
    #[serde(default = "ManagerConfig::default_min_resize_interval_ms")]
    pub min_resize_interval_ms: u64,

    /// Smallest change of the cache budget that triggers a resize pass.
    #[serde(default = "ManagerConfig::default_min_resize_threshold")]
    pub min_resize_threshold: ByteSize,
}

impl ManagerConfig {
    fn default_keep_free_mem_percent() -> u8 {
        25
    }

    fn default_keep_free_mem_bytes() -> ByteSize {
        ByteSize(6 * GB)
    }

    fn default_monitoring_interval_ms() -> u64 {
        15_000
    }

    fn default_min_resize_interval_ms() -> u64 {
        10 * 60 * 1_000
    }

    fn default_min_resize_threshold() -> ByteSize {
        ByteSize(200 * MB)
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms)
    }

    pub fn min_resize_interval(&self) -> Duration {
        Duration::from_millis(self.min_resize_interval_ms)
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            keep_free_mem_percent: self.keep_free_mem_percent,
            keep_free_mem_bytes: self.keep_free_mem_bytes.0,
            monitoring_interval: self.monitoring_interval(),
            min_resize_interval: self.min_resize_interval(),
            min_resize_threshold: self.min_resize_threshold.0,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            keep_free_mem_percent: Self::default_keep_free_mem_percent(),
            keep_free_mem_bytes: Self::default_keep_free_mem_bytes(),
            monitoring_interval_ms: Self::default_monitoring_interval_ms(),
            min_resize_interval_ms: Self::default_min_resize_interval_ms(),
            min_resize_threshold: Self::default_min_resize_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Level for the ballast crates, or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs in JSON format.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr. When disabled, [`init_tracing`] installs only
    /// the filter.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        DEFAULT_LEVEL.to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    /// Filter directives for `level`.
    ///
    /// A bare level (`debug`, `WARNING`, ...) applies to the ballast targets
    /// only; every other target stays at `warn` or quieter. Anything else is
    /// taken as an `EnvFilter` directive string and used as is.
    pub fn directives(&self) -> String {
        let level = self.level.trim();
        if level.is_empty() {
            return scoped_directives(DEFAULT_LEVEL);
        }
        match bare_level(level) {
            Some(level) => scoped_directives(level),
            None => level.to_owned(),
        }
    }

    /// Build the `EnvFilter` for [`init_tracing`].
    ///
    /// `RUST_LOG` is appended to the configured directives, so it can raise
    /// or lower individual targets. An unparsable combination falls back to
    /// the configured directives, then to `info` for the ballast targets.
    pub fn env_filter(&self) -> EnvFilter {
        let directives = self.directives();
        let from_env = std::env::var("RUST_LOG")
            .ok()
            .filter(|value| !value.trim().is_empty());

        from_env
            .and_then(|env| EnvFilter::try_new(format!("{directives},{}", env.trim())).ok())
            .or_else(|| EnvFilter::try_new(&directives).ok())
            .unwrap_or_else(|| EnvFilter::new(scoped_directives(DEFAULT_LEVEL)))
    }
}

const DEFAULT_LEVEL: &str = "info";
const TARGETS: [&str; 3] = ["ballast.cache", "ballast.memory", "ballast.config"];

fn bare_level(input: &str) -> Option<&'static str> {
    let level = match input.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        "off" => "off",
        _ => return None,
    };
    Some(level)
}

fn scoped_directives(level: &str) -> String {
    let others = match level {
        "error" | "off" => level,
        _ => "warn",
    };
    let mut directives = others.to_owned();
    for target in TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BallastConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub manager: ManagerConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` quotes a snippet of the input; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl BallastConfig {
    /// Load and validate a config file.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::load_from_str(&text)?;
        tracing::debug!(target: "ballast.config", path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Parse and validate a config from a TOML string.
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let config: BallastConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber described by `config`.
///
/// Only the first call has an effect; returns whether this call installed
/// the subscriber.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let mut installed = false;
    TRACING_INIT.call_once(|| {
        let filter = config.env_filter();

        // `cargo test` output capture only works for the stdlib's `print!/eprint!`
        // macros. Using `TestWriter` in debug builds keeps unit tests quiet.
        let make_writer = if cfg!(debug_assertions) {
            BoxMakeWriter::new(tracing_subscriber::fmt::writer::TestWriter::with_stderr)
        } else {
            BoxMakeWriter::new(std::io::stderr)
        };

        let fmt_layer: Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>> =
            match (config.stderr, config.json) {
                (false, _) => None,
                (true, true) => Some(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(make_writer)
                        .with_ansi(false)
                        .boxed(),
                ),
                (true, false) => Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(make_writer)
                        .with_ansi(false)
                        .boxed(),
                ),
            };

        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        installed = tracing::subscriber::set_global_default(subscriber).is_ok();
        if installed {
            tracing::debug!(target: "ballast.config", level = %config.level, json = config.json, "tracing initialized");
        }
    });
    installed
}
