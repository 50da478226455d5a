//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//! - Validate configured header names and values
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue};

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid {field} address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid value for header {0}")]
    InvalidHeaderValue(String),

    #[error("unsupported scheme {0:?}, expected \"http\" or \"https\"")]
    InvalidScheme(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::Zero {
            field: "listener.max_body_bytes",
        });
    }
    if !matches!(config.listener.scheme.as_str(), "http" | "https") {
        errors.push(ValidationError::InvalidScheme(config.listener.scheme.clone()));
    }
    if config.https_redirect.enabled && config.https_redirect.ssl_port == 0 {
        errors.push(ValidationError::Zero {
            field: "https_redirect.ssl_port",
        });
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero {
            field: "timeouts.request_secs",
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    let headers = &config.default_headers;
    if let Some(server) = &headers.server {
        if HeaderValue::from_str(server).is_err() {
            errors.push(ValidationError::InvalidHeaderValue("Server".to_string()));
        }
    }
    for (name, value) in &headers.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeaderName(name.clone()));
        } else if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeaderValue(name.clone()));
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
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "bad".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "also bad".into();
        config
            .default_headers
            .headers
            .insert("bad header".into(), "x".into());
        config
            .default_headers
            .headers
            .insert("X-Ok".into(), "line\nbreak".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::InvalidHeaderName("bad header".into())));
        assert!(errors.contains(&ValidationError::InvalidHeaderValue("X-Ok".into())));
    }

    #[test]
    fn test_https_redirect_settings_checked() {
        let mut config = ServerConfig::default();
        config.listener.scheme = "ftp".into();
        config.https_redirect.enabled = true;
        config.https_redirect.ssl_port = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::InvalidScheme("ftp".into())));
        assert!(errors.contains(&ValidationError::Zero {
            field: "https_redirect.ssl_port"
        }));
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.observability.metrics_address = "bad".into();
        assert!(validate_config(&config).is_ok());
    }
}
