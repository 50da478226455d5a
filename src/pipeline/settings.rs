//! Execution settings shared by every pipeline built from one configuration.

use serde::{Deserialize, Serialize};

/// What happens when an interceptor returns without calling `proceed()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReturnPolicy {
    /// The chain ends; downstream interceptors are skipped.
    #[default]
    Stop,
    /// The next interceptor runs; only `finish()` short-circuits.
    Continue,
}

/// Pipeline execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Behaviour for interceptors that return without proceeding.
    pub return_policy: ReturnPolicy,

    /// Run every interceptor inside its own tracing span.
    pub trace_interceptors: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            return_policy: ReturnPolicy::Stop,
            trace_interceptors: false,
        }
    }
}
