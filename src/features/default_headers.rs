//! `Date`, `Server` and configured headers on every response.
//!
//! # Design Decisions
//! - The `Date` text is rendered at most once per second and shared
//! - Header names and values are validated once, at construction

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::header::{DATE, SERVER};
use axum::http::{HeaderName, HeaderValue};
use chrono::{DateTime, Utc};

use crate::config::DefaultHeadersConfig;
use crate::features::{Feature, FeatureScope};
use crate::pipeline::PipelineError;

/// Clock used for the `Date` header; replaceable in tests.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

struct CachedDate {
    second: i64,
    text: HeaderValue,
}

/// Renders the `Date` header, caching the text for one second.
pub struct DateCache {
    clock: Clock,
    cached: ArcSwap<CachedDate>,
}

impl DateCache {
    pub fn new(clock: Clock) -> Self {
        let now = clock();
        Self {
            cached: ArcSwap::from_pointee(render(now)),
            clock,
        }
    }

    /// Current `Date` header value.
    pub fn current(&self) -> HeaderValue {
        let now = (self.clock)();
        let cached = self.cached.load();
        if cached.second == now.timestamp() {
            return cached.text.clone();
        }
        let fresh = render(now);
        let text = fresh.text.clone();
        self.cached.store(Arc::new(fresh));
        text
    }
}

fn render(now: DateTime<Utc>) -> CachedDate {
    let text = now.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    CachedDate {
        second: now.timestamp(),
        // RFC 7231 dates are plain ASCII.
        text: HeaderValue::from_str(&text).unwrap_or_else(|_| HeaderValue::from_static("")),
    }
}

/// Adds standard headers to every response.
pub struct DefaultHeaders {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
    date: Arc<DateCache>,
}

impl DefaultHeaders {
    pub const NAME: &'static str = "DefaultHeaders";

    /// Build from configuration; invalid names or values are rejected.
    pub fn from_config(config: &DefaultHeadersConfig) -> Result<Self, PipelineError> {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    pub fn with_clock(config: &DefaultHeadersConfig, clock: Clock) -> Result<Self, PipelineError> {
        let mut headers = Vec::with_capacity(config.headers.len() + 1);

        // A configured `Server` header replaces the default one.
        let custom_server = config.headers.keys().any(|name| name.eq_ignore_ascii_case("server"));
        if !custom_server {
            let server = config.server.clone().unwrap_or_else(|| {
                format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            });
            headers.push((SERVER, header_value(&server)?));
        }

        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| invalid(format!("invalid header name {name:?}")))?;
            headers.push((name, header_value(value)?));
        }

        Ok(Self {
            headers: Arc::new(headers),
            date: Arc::new(DateCache::new(clock)),
        })
    }
}

fn header_value(value: &str) -> Result<HeaderValue, PipelineError> {
    HeaderValue::from_str(value).map_err(|_| invalid(format!("invalid header value {value:?}")))
}

fn invalid(reason: String) -> PipelineError {
    PipelineError::InvalidFeatureConfig {
        feature: DefaultHeaders::NAME.to_string(),
        reason,
    }
}

impl Feature for DefaultHeaders {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn install(&self, scope: &mut FeatureScope<'_>) -> Result<(), PipelineError> {
        let headers = self.headers.clone();
        let date = self.date.clone();

        scope.on_call(move |ctx| {
            let response = &mut ctx.context_mut().response.headers;
            response.insert(DATE, date.current());
            for (name, value) in headers.iter() {
                response.append(name.clone(), value.clone());
            }
            Box::pin(async move { ctx.proceed().await })
        })
    }
}
