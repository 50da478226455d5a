//! Phased asynchronous interceptor pipelines.
//!
//! # Architecture Overview
//!
//! ```text
//!   pipeline        phases, interceptors, snapshots, execution contexts
//!       │
//!       ▼
//!   application     call / receive / send pipelines, ApplicationCall
//!       │
//!       ├── features      plugins installed into the pipelines
//!       ▼
//!   http            axum engine bridging HTTP requests to calls
//!
//!   cross-cutting:  config, observability, lifecycle
//! ```

pub mod application;
pub mod config;
pub mod features;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;

pub use application::{Application, ApplicationCall};
pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{
    Interceptor, Phase, Pipeline, PipelineContext, PipelineError, PipelineSettings, ReturnPolicy,
};
