//! Interceptor pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Setup (plugins, features):
//!     phase_list.rs (add / insert before / insert after)
//!     → registry.rs (interceptors per phase)
//!     → engine.rs (Pipeline owns both, merge)
//!
//! Per execution:
//!     engine.rs snapshot() → flattened interceptor sequence (cached, frozen)
//!     → snapshot.rs execute(context, subject)
//!     → context.rs proceed() / proceed_with() / finish()
//!     → final subject, or error / cancellation
//! ```
//!
//! # Design Decisions
//! - Phase order is fixed when an execution captures its snapshot
//! - Interceptors continue the chain explicitly through `proceed()`
//! - Errors travel back through the nested `proceed()` calls, so enclosing
//!   interceptors can recover with ordinary `match`
//! - Cancellation is cooperative: dropping the execution future, or the
//!   cancellation token, drops the suspended interceptor

pub mod context;
pub mod engine;
pub mod error;
pub mod interceptor;
pub mod phase;
pub mod phase_list;
pub mod registry;
pub mod settings;
pub mod snapshot;

pub use context::{ExecutionState, PipelineContext};
pub use engine::Pipeline;
pub use error::{BoxError, PipelineError};
pub use interceptor::{FnInterceptor, Interceptor, SharedInterceptor};
pub use phase::{Phase, PhaseRelation};
pub use phase_list::PhaseList;
pub use registry::InterceptorRegistry;
pub use settings::{PipelineSettings, ReturnPolicy};
pub use snapshot::PipelineSnapshot;
