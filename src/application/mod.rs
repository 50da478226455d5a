//! Application model built on the pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request
//!     → call.rs ApplicationCall (request, response, per-call send pipeline)
//!     → app.rs handle(): receive pipeline (body)
//!     → call pipeline (Setup → Monitoring → Plugins → Call → Fallback)
//!     → send pipeline (Before → Transform → Render → ContentEncoding
//!                      → TransferEncoding → After → Engine)
//!     → HTTP response
//! ```

pub mod app;
pub mod call;
pub mod phases;

pub use app::{Application, FeatureUsage};
pub use call::{
    ApplicationCall, CallContext, CallPipeline, CallRequest, CallResponse, OutgoingContent,
    ReceiveContext, ReceivePipeline, SendContext, SendPipeline,
};
