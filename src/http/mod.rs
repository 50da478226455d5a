//! HTTP engine bridging axum to the application pipelines.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout, request ID, tracing layers)
//!     → request.rs (request ID lookup)
//!     → CallRequest → Application::handle (receive → call → send)
//!     → server.rs (OutgoingContent → HTTP response)
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{forwarded_proto, request_id, UuidRequestId, X_FORWARDED_PROTO, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
