//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, quality in 1..=100)
//! - Validate addresses parse before the listener is bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.fetch.timeout_secs == 0 {
        errors.push(ValidationError::new("fetch.timeout_secs", "must be greater than 0"));
    }

    if config.fetch.timeout_secs > config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "fetch.timeout_secs",
            "must not exceed timeouts.request_secs",
        ));
    }

    if config.fetch.user_agent.trim().is_empty() {
        errors.push(ValidationError::new("fetch.user_agent", "must not be empty"));
    }

    let compression = &config.compression;
    if !(1..=100).contains(&compression.default_quality) {
        errors.push(ValidationError::new(
            "compression.default_quality",
            "must be between 1 and 100",
        ));
    }

    if compression.max_pixels == 0 {
        errors.push(ValidationError::new("compression.max_pixels", "must be greater than 0"));
    }

    if compression.safety_max_dimension == 0 {
        errors.push(ValidationError::new(
            "compression.safety_max_dimension",
            "must be greater than 0",
        ));
    }

    if compression.quality_step == 0 || compression.quality_step >= 100 {
        errors.push(ValidationError::new(
            "compression.quality_step",
            "must be between 1 and 99",
        ));
    }

    if compression.max_concurrent_jobs == 0 {
        errors.push(ValidationError::new(
            "compression.max_concurrent_jobs",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
