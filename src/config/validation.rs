//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, StoreBackend};
use std::path::Path;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("upstream.host is required")]
    MissingUpstreamHost,
    #[error("upstream.port must be non-zero")]
    InvalidUpstreamPort,
    #[error("upstream.resource is required")]
    MissingResource,
    #[error("upstream.{0} must be at least one second")]
    ZeroTimeout(&'static str),
    #[error("push.timeout_secs must be at least one second")]
    ZeroPushTimeout,
    #[error("store.path parent directory does not exist: {0}")]
    StorePathInvalid(String),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.upstream.host.trim().is_empty() {
        errors.push(ValidationError::MissingUpstreamHost);
    }
    if config.upstream.port == 0 {
        errors.push(ValidationError::InvalidUpstreamPort);
    }
    if config.upstream.resource.trim().is_empty() {
        errors.push(ValidationError::MissingResource);
    }
    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_secs"));
    }
    if config.upstream.handshake_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("handshake_timeout_secs"));
    }
    if config.push.timeout_secs == 0 {
        errors.push(ValidationError::ZeroPushTimeout);
    }

    if config.store.backend == StoreBackend::Redb {
        if let Some(parent) = Path::new(&config.store.path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                errors.push(ValidationError::StorePathInvalid(
                    parent.display().to_string(),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = Config::default();
        config.upstream.port = 0;
        config.upstream.handshake_timeout_secs = 0;
        config.push.timeout_secs = 0;
        config.store.path = "/definitely/not/here/jabgate.db".to_string();

        let errors = validate(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::ZeroTimeout("handshake_timeout_secs"))));
    }

    #[test]
    fn test_memory_backend_ignores_path() {
        let mut config = Config::default();
        config.store.backend = StoreBackend::Memory;
        config.store.path = "/definitely/not/here/jabgate.db".to_string();
        assert!(validate(&config).is_ok());
    }
}
