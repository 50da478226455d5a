//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router dispatching every path to the application
//! - Wire up middleware (tracing, timeout, request ID)
//! - Convert between HTTP messages and application calls
//! - Bind server to listener with graceful shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::application::{Application, ApplicationCall, CallRequest, OutgoingContent};
use crate::config::ServerConfig;
use crate::http::request::{
    forwarded_proto, propagate_request_id_layer, request_id, set_request_id_layer,
};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub application: Arc<Application>,
    pub max_body_bytes: usize,
    /// Scheme assumed when no `X-Forwarded-Proto` header is present.
    pub scheme: String,
}

/// HTTP engine serving an [`Application`].
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a new HTTP server for `application`.
    pub fn new(config: ServerConfig, application: Application) -> Self {
        let state = AppState {
            application: Arc::new(application),
            max_body_bytes: config.listener.max_body_bytes,
            scheme: config.listener.scheme.clone(),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(call_handler))
            .route("/", any(call_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Router with all layers, for serving or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Runs every request through the application pipelines.
async fn call_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let (parts, body) = request.into_parts();
    let method = parts.method.to_string();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, limit = state.max_body_bytes, "Request body rejected");
            metrics::record_call(&method, StatusCode::PAYLOAD_TOO_LARGE.as_u16());
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
    };

    let mut call_request = CallRequest::new(parts.method, parts.uri.path());
    call_request.query = parts.uri.query().map(str::to_string);
    call_request.request_id = request_id(&parts.headers);
    call_request.scheme = forwarded_proto(&parts.headers).unwrap_or_else(|| state.scheme.clone());
    call_request.headers = parts.headers;
    call_request.body = body;

    let call = state.application.new_call(call_request);
    let response = match state.application.handle(call).await {
        Ok(call) => into_response(call),
        Err(e) => {
            tracing::error!(error = %e, "Call pipeline failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    };

    metrics::record_call(&method, response.status().as_u16());
    tracing::debug!(
        status = response.status().as_u16(),
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Call answered"
    );
    response
}

fn into_response(call: ApplicationCall) -> Response {
    let status = call.response.status.unwrap_or(StatusCode::OK);
    let content = call.response.content.unwrap_or(OutgoingContent::Empty);

    let mut headers = call.response.headers;
    if let Some(content_type) = content.content_type() {
        if let Ok(value) = HeaderValue::from_str(content_type) {
            headers.insert(header::CONTENT_TYPE, value);
        }
    }
    if let OutgoingContent::NoContent { content_length: Some(length), .. } = &content {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(*length));
    }

    let mut response = Response::new(Body::from(content.into_body()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::phases;
    use crate::pipeline::PipelineSettings;
    use tower::ServiceExt;

    fn server(max_body_bytes: usize) -> HttpServer {
        let mut app = Application::new(PipelineSettings::default()).unwrap();
        app.call_pipeline_mut()
            .intercept(&phases::call::CALL, |ctx| {
                Box::pin(async move {
                    let call = ctx.context_mut();
                    if call.request.path == "/echo" {
                        let body = call.request.body.clone();
                        call.respond(
                            StatusCode::CREATED,
                            OutgoingContent::Bytes { bytes: body, content_type: None },
                        );
                    }
                    ctx.proceed().await
                })
            })
            .unwrap();

        let mut config = ServerConfig::default();
        config.listener.max_body_bytes = max_body_bytes;
        HttpServer::new(config, app)
    }

    #[tokio::test]
    async fn test_call_handler_echo() {
        let request = Request::post("/echo").body(Body::from("ping")).unwrap();
        let response = server(1024).router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(response.headers().contains_key("x-request-id"));
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"ping");
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let request = Request::get("/nothing/here").body(Body::empty()).unwrap();
        let response = server(1024).router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let request = Request::post("/echo").body(Body::from(vec![b'x'; 64])).unwrap();
        let response = server(16).router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_no_content_keeps_length() {
        let app = Application::new(PipelineSettings::default()).unwrap();
        let mut call = app.new_call(CallRequest::new(axum::http::Method::HEAD, "/"));
        call.respond(
            StatusCode::OK,
            OutgoingContent::NoContent {
                content_length: Some(12),
                content_type: Some("application/json".to_string()),
            },
        );

        let response = into_response(call);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "12");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}
