//! Configuration validation.

use super::Config;
use crate::core::matcher::validate_selector;
use crate::core::paths::validate_extra_label;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.source.addr.trim().is_empty() {
        return Err(MigrateError::Config("source.addr is required".into()));
    }
    if config.destination.addr.trim().is_empty() {
        return Err(MigrateError::Config("destination.addr is required".into()));
    }
    for label in &config.destination.extra_labels {
        validate_extra_label(label)?;
    }

    if config.filter.time_start.trim().is_empty() {
        return Err(MigrateError::Config("filter.time_start is required".into()));
    }
    validate_selector(&config.filter.match_expr)?;
    // Parses both bounds and the chunk spec, and checks their order.
    config.time_ranges()?;

    if config.migration.concurrency == 0 {
        return Err(MigrateError::Config(
            "migration.concurrency must be at least 1".into(),
        ));
    }

    let retry = &config.retry;
    if retry.max_attempts == 0 {
        return Err(MigrateError::Config(
            "retry.max_attempts must be at least 1".into(),
        ));
    }
    if retry.factor.is_nan() || retry.factor < 1.0 {
        return Err(MigrateError::Config(format!(
            "retry.factor must be at least 1.0, got {}",
            retry.factor
        )));
    }
    if retry.min_delay_ms > retry.max_delay_ms {
        return Err(MigrateError::Config(format!(
            "retry.min_delay_ms ({}) cannot exceed retry.max_delay_ms ({})",
            retry.min_delay_ms, retry.max_delay_ms
        )));
    }
    if !(0.0..=1.0).contains(&retry.jitter) {
        return Err(MigrateError::Config(format!(
            "retry.jitter must be between 0 and 1, got {}",
            retry.jitter
        )));
    }

    Ok(())
}
