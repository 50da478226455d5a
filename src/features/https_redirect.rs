//! Redirect plain HTTP calls to HTTPS.
//!
//! A redirected call gets a `Location` header and an empty body, then the
//! call pipeline is finished so no handler runs.

use std::sync::Arc;

use axum::http::header::{HOST, LOCATION};
use axum::http::{HeaderValue, StatusCode};

use crate::application::call::{ApplicationCall, CallRequest, OutgoingContent};
use crate::config::HttpsRedirectConfig;
use crate::features::{Feature, FeatureScope};
use crate::pipeline::PipelineError;

const DEFAULT_HTTPS_PORT: u16 = 443;

/// Feature answering `http` calls with a redirect to `https`.
#[derive(Debug, Clone)]
pub struct HttpsRedirect {
    ssl_port: u16,
    permanent: bool,
    exclude_prefixes: Arc<Vec<String>>,
}

impl HttpsRedirect {
    pub const NAME: &'static str = "HttpsRedirect";

    pub fn from_config(config: &HttpsRedirectConfig) -> Self {
        Self {
            ssl_port: config.ssl_port,
            permanent: config.permanent,
            exclude_prefixes: Arc::new(config.exclude_prefixes.clone()),
        }
    }

    fn status(&self) -> StatusCode {
        if self.permanent {
            StatusCode::MOVED_PERMANENTLY
        } else {
            StatusCode::FOUND
        }
    }

    fn is_excluded(&self, request: &CallRequest) -> bool {
        let uri = origin_uri(request);
        self.exclude_prefixes.iter().any(|prefix| uri.starts_with(prefix.as_str()))
    }

    /// Respond with a redirect if `call` needs one; true when it did.
    fn redirect(&self, call: &mut ApplicationCall) -> bool {
        if call.request.scheme != "http" || self.is_excluded(&call.request) {
            return false;
        }

        let location = redirect_url(&call.request, self.ssl_port);
        let Ok(value) = HeaderValue::from_str(&location) else {
            tracing::debug!(location = %location, "Redirect target is not a valid header value");
            return false;
        };

        tracing::debug!(location = %location, status = self.status().as_u16(), "Redirecting to HTTPS");
        call.response.headers.insert(LOCATION, value);
        call.respond(self.status(), OutgoingContent::Empty);
        true
    }
}

impl Feature for HttpsRedirect {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn install(&self, scope: &mut FeatureScope<'_>) -> Result<(), PipelineError> {
        let redirect = self.clone();
        scope.on_call(move |ctx| {
            let redirected = redirect.redirect(ctx.context_mut());
            if redirected {
                ctx.finish();
            }
            Box::pin(async move {
                if redirected {
                    Ok(())
                } else {
                    ctx.proceed().await
                }
            })
        })
    }
}

fn origin_uri(request: &CallRequest) -> String {
    match &request.query {
        Some(query) => format!("{}?{}", request.path, query),
        None => request.path.clone(),
    }
}

/// `https://` URL for the same host, path and query.
fn redirect_url(request: &CallRequest, ssl_port: u16) -> String {
    let host = request
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(strip_port)
        .unwrap_or("localhost");

    let mut url = format!("https://{host}");
    if ssl_port != DEFAULT_HTTPS_PORT {
        url.push_str(&format!(":{ssl_port}"));
    }
    url.push_str(&origin_uri(request));
    url
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{phases, Application};
    use crate::pipeline::PipelineSettings;
    use axum::http::Method;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn app(config: &HttpsRedirectConfig) -> (Application, Arc<AtomicBool>) {
        let mut app = Application::new(PipelineSettings::default()).unwrap();
        app.install(&HttpsRedirect::from_config(config)).unwrap();

        let handled = Arc::new(AtomicBool::new(false));
        let flag = handled.clone();
        app.call_pipeline_mut()
            .intercept(&phases::call::CALL, move |ctx| {
                flag.store(true, Ordering::SeqCst);
                ctx.context_mut().respond(StatusCode::OK, OutgoingContent::text("served"));
                Box::pin(async move { ctx.proceed().await })
            })
            .unwrap();
        (app, handled)
    }

    fn request(path: &str, query: Option<&str>) -> CallRequest {
        let mut request = CallRequest::new(Method::GET, path);
        request.query = query.map(str::to_string);
        request
            .headers
            .insert(HOST, HeaderValue::from_static("example.com:8080"));
        request
    }

    #[tokio::test]
    async fn test_http_call_redirected_before_handlers() {
        let (app, handled) = app(&HttpsRedirectConfig::default());

        let call = app
            .handle(app.new_call(request("/login", Some("next=/home"))))
            .await
            .unwrap();

        assert_eq!(call.response.status, Some(StatusCode::MOVED_PERMANENTLY));
        assert_eq!(
            call.response.headers[LOCATION],
            "https://example.com/login?next=/home"
        );
        assert_eq!(call.response.content, Some(OutgoingContent::Empty));
        assert!(!handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_https_call_passes_through() {
        let (app, handled) = app(&HttpsRedirectConfig::default());
        let mut request = request("/login", None);
        request.scheme = "https".to_string();

        let call = app.handle(app.new_call(request)).await.unwrap();
        assert_eq!(call.response.status, Some(StatusCode::OK));
        assert!(!call.response.headers.contains_key(LOCATION));
        assert!(handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_excluded_prefix_not_redirected() {
        let config = HttpsRedirectConfig {
            exclude_prefixes: vec!["/.well-known/".to_string()],
            ..HttpsRedirectConfig::default()
        };
        let (app, handled) = app(&config);

        let call = app
            .handle(app.new_call(request("/.well-known/acme-challenge/token", None)))
            .await
            .unwrap();
        assert_eq!(call.response.status, Some(StatusCode::OK));
        assert!(handled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_temporary_redirect_to_custom_port() {
        let config = HttpsRedirectConfig {
            ssl_port: 8443,
            permanent: false,
            ..HttpsRedirectConfig::default()
        };
        let (app, _) = app(&config);

        let call = app.handle(app.new_call(request("/", None))).await.unwrap();
        assert_eq!(call.response.status, Some(StatusCode::FOUND));
        assert_eq!(call.response.headers[LOCATION], "https://example.com:8443/");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("example.com:8080"), "example.com");
        assert_eq!(strip_port("example.com"), "example.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }
}
