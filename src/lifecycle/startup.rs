//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the application pipelines from configuration
//! - Install the configured features in a fixed order
//! - Register the built-in handlers last
//!
//! # Design Decisions
//! - Fail fast: any installation error is fatal

use axum::http::{header, Method, StatusCode};

use crate::application::{phases, Application, OutgoingContent};
use crate::config::ServerConfig;
use crate::features::{AutoHeadResponse, DefaultHeaders, HttpsRedirect};
use crate::pipeline::PipelineError;

/// Build the application described by `config`.
pub fn build_application(config: &ServerConfig) -> Result<Application, PipelineError> {
    let mut app = Application::new(config.pipeline)?;

    if config.default_headers.enabled {
        app.install(&DefaultHeaders::from_config(&config.default_headers)?)?;
    }
    if config.https_redirect.enabled {
        app.install(&HttpsRedirect::from_config(&config.https_redirect))?;
    }
    if config.auto_head_response {
        app.install(&AutoHeadResponse)?;
    }

    install_builtin_handlers(&mut app)?;

    tracing::info!(
        features = ?app.installed_features().collect::<Vec<_>>(),
        call_interceptors = app.call_pipeline().interceptor_count(),
        "Application built"
    );
    Ok(app)
}

/// `GET /`, `GET /health` and `POST /echo`.
fn install_builtin_handlers(app: &mut Application) -> Result<(), PipelineError> {
    let mut features: Vec<String> = app.installed_features().map(str::to_string).collect();
    features.sort();
    let health = serde_json::json!({ "status": "ok", "features": features }).to_string();

    app.call_pipeline_mut().intercept(&phases::call::CALL, move |ctx| {
        let call = ctx.context_mut();
        if !call.has_responded() {
            let method = call.request.method.clone();
            let path = call.request.path.clone();
            match path.as_str() {
                "/" if method == Method::GET => {
                    call.respond(StatusCode::OK, OutgoingContent::text(env!("CARGO_PKG_NAME")));
                }
                "/health" if method == Method::GET => call.respond(
                    StatusCode::OK,
                    OutgoingContent::Text {
                        text: health.clone(),
                        content_type: "application/json".to_string(),
                    },
                ),
                "/echo" if method == Method::POST => {
                    let content_type = call
                        .request
                        .headers
                        .get(header::CONTENT_TYPE)
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    let bytes = call.request.body.clone();
                    call.respond(StatusCode::OK, OutgoingContent::Bytes { bytes, content_type });
                }
                _ => {}
            }
        }
        Box::pin(async move { ctx.proceed().await })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::CallRequest;

    #[tokio::test]
    async fn test_builtin_health() {
        let app = build_application(&ServerConfig::default()).unwrap();
        assert!(app.is_installed(DefaultHeaders::NAME));
        assert!(!app.is_installed(AutoHeadResponse::NAME));

        let call = app
            .handle(app.new_call(CallRequest::new(Method::GET, "/health")))
            .await
            .unwrap();
        let text = call.response.content.as_ref().and_then(|c| c.as_text()).unwrap();
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["features"][0], "DefaultHeaders");
    }

    #[test]
    fn test_features_follow_config() {
        let mut config = ServerConfig::default();
        config.default_headers.enabled = false;
        config.auto_head_response = true;

        let app = build_application(&config).unwrap();
        let installed: Vec<_> = app.installed_features().collect();
        assert_eq!(installed, vec![AutoHeadResponse::NAME]);
    }

    #[test]
    fn test_https_redirect_installed_when_enabled() {
        let mut config = ServerConfig::default();
        config.https_redirect.enabled = true;

        let app = build_application(&config).unwrap();
        assert!(app.is_installed(HttpsRedirect::NAME));
        assert!(!build_application(&ServerConfig::default())
            .unwrap()
            .is_installed(HttpsRedirect::NAME));
    }
}
