//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineSettings;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Execution settings applied to every pipeline.
    pub pipeline: PipelineSettings,

    /// `DefaultHeaders` feature settings.
    pub default_headers: DefaultHeadersConfig,

    /// Install the `AutoHeadResponse` feature.
    pub auto_head_response: bool,

    /// `HttpsRedirect` feature settings.
    pub https_redirect: HttpsRedirectConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Settings for the `HttpsRedirect` feature.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpsRedirectConfig {
    pub enabled: bool,

    /// HTTPS port to redirect to.
    pub ssl_port: u16,

    /// 301 when true, 302 otherwise.
    pub permanent: bool,

    /// Paths starting with any of these prefixes are never redirected.
    pub exclude_prefixes: Vec<String>,
}

impl Default for HttpsRedirectConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ssl_port: 443,
            permanent: true,
            exclude_prefixes: Vec::new(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum request body size buffered into a call.
    pub max_body_bytes: usize,

    /// Scheme clients use to reach the listener ("http" or "https"), when
    /// no `X-Forwarded-Proto` header says otherwise.
    pub scheme: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 1024 * 1024,
            scheme: "http".to_string(),
        }
    }
}

/// Settings for the `DefaultHeaders` feature.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultHeadersConfig {
    pub enabled: bool,

    /// Value of the `Server` header; derived from the crate version when unset.
    pub server: Option<String>,

    /// Extra headers appended to every response.
    pub headers: BTreeMap<String, String>,
}

impl Default for DefaultHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server: None,
            headers: BTreeMap::new(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for one call, pipelines included.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,

    /// Emit JSON log lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "phased_pipeline=debug,tower_http=debug".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ReturnPolicy;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.pipeline.return_policy, ReturnPolicy::Stop);
        assert!(config.default_headers.enabled);
        assert!(!config.auto_head_response);
        assert!(!config.https_redirect.enabled);
        assert_eq!(config.https_redirect.ssl_port, 443);
        assert_eq!(config.listener.scheme, "http");
        assert_eq!(config.timeouts.request_secs, 30);
    }

    #[test]
    fn test_full_config() {
        let config: ServerConfig = toml::from_str(
            r#"
            auto_head_response = true

            [listener]
            bind_address = "127.0.0.1:9000"

            [pipeline]
            return_policy = "continue"
            trace_interceptors = true

            [default_headers]
            server = "edge/1.0"
            headers = { "X-Frame-Options" = "DENY" }
            "#,
        )
        .unwrap();

        assert!(config.auto_head_response);
        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.pipeline.return_policy, ReturnPolicy::Continue);
        assert!(config.pipeline.trace_interceptors);
        assert_eq!(config.default_headers.server.as_deref(), Some("edge/1.0"));
        assert_eq!(config.default_headers.headers["X-Frame-Options"], "DENY");
    }
}
