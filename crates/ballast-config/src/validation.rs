use crate::{BallastConfig, ConfigError, LoggingConfig};

impl BallastConfig {
    /// Reject settings the cache manager cannot work with.
    ///
    /// An unparsable logging level is only reported with a warning; the
    /// subscriber falls back to the default level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_logging(&self.logging);

        let manager = &self.manager;
        if manager.keep_free_mem_percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "manager.keep_free_mem_percent must be between 0 and 100, got {}",
                manager.keep_free_mem_percent
            )));
        }
        if manager.monitoring_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "manager.monitoring_interval_ms must be >= 1".to_owned(),
            ));
        }
        Ok(())
    }
}

fn validate_logging(logging: &LoggingConfig) {
    if tracing_subscriber::EnvFilter::try_new(logging.directives()).is_err() {
        tracing::warn!(
            target: "ballast.config",
            value = %logging.level,
            "logging.level is not a valid filter; falling back to the default level"
        );
    }
}
