//! Pipeline error taxonomy.
//!
//! # Design Decisions
//! - Configuration errors (`PhaseNotFound`, `DuplicatePhase`, `IncompatibleMerge`)
//!   surface at registration time and are never retried
//! - Interceptor errors are boxed once and then travel unmodified through
//!   every enclosing `proceed()`
//! - Cancellation is its own variant so generic error handlers can skip it

use std::error::Error as StdError;

use crate::pipeline::phase::Phase;

/// Boxed error raised by interceptor code.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by pipeline registration and execution.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A referenced phase is not registered in the pipeline.
    #[error("phase {phase} was not registered for this pipeline")]
    PhaseNotFound { phase: Phase },

    /// The phase is already registered in the pipeline.
    #[error("phase {phase} is already registered for this pipeline")]
    DuplicatePhase { phase: Phase },

    /// `proceed()` was called after `finish()`.
    #[error("pipeline execution has already finished")]
    PipelineFinished,

    /// Two pipelines order a shared phase pair differently.
    #[error("cannot merge pipelines: phases {first} and {second} are ordered differently")]
    IncompatibleMerge { first: Phase, second: Phase },

    /// A feature with the same name is already installed.
    #[error("feature {0} is already installed")]
    FeatureAlreadyInstalled(String),

    /// A relative placement referenced a feature that is not installed.
    #[error("feature {0} is not installed")]
    FeatureNotInstalled(String),

    /// A feature was built from settings it cannot use.
    #[error("invalid configuration for feature {feature}: {reason}")]
    InvalidFeatureConfig { feature: String, reason: String },

    /// Error raised by an interceptor.
    #[error("interceptor failed: {0}")]
    Interceptor(#[source] BoxError),

    /// The enclosing operation was cancelled.
    #[error("pipeline execution was cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Wrap an error raised by interceptor code.
    pub fn interceptor(err: impl Into<BoxError>) -> Self {
        PipelineError::Interceptor(err.into())
    }

    /// True if the error was raised by an interceptor rather than the pipeline.
    pub fn is_interceptor(&self) -> bool {
        matches!(self, PipelineError::Interceptor(_))
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// True for setup-time misconfiguration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PipelineError::PhaseNotFound { .. }
                | PipelineError::DuplicatePhase { .. }
                | PipelineError::IncompatibleMerge { .. }
                | PipelineError::FeatureAlreadyInstalled(_)
                | PipelineError::FeatureNotInstalled(_)
                | PipelineError::InvalidFeatureConfig { .. }
        )
    }

    /// Borrow the interceptor error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            PipelineError::Interceptor(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    #[test]
    fn test_interceptor_errors_are_distinguishable() {
        let err = PipelineError::interceptor(Boom);
        assert!(err.is_interceptor());
        assert!(!err.is_configuration());
        assert!(err.downcast_ref::<Boom>().is_some());
        assert_eq!(err.to_string(), "interceptor failed: boom");

        let err = PipelineError::PipelineFinished;
        assert!(!err.is_interceptor());
        assert!(err.downcast_ref::<Boom>().is_none());
    }

    #[test]
    fn test_configuration_errors() {
        let phase = Phase::new("Render");
        assert!(PipelineError::PhaseNotFound { phase: phase.clone() }.is_configuration());
        assert!(PipelineError::DuplicatePhase { phase }.is_configuration());
        let invalid = PipelineError::InvalidFeatureConfig {
            feature: "DefaultHeaders".into(),
            reason: "bad header".into(),
        };
        assert!(invalid.is_configuration());
        assert!(!invalid.is_interceptor());
        assert!(!PipelineError::Cancelled.is_configuration());
        assert!(PipelineError::Cancelled.is_cancellation());
    }

    #[test]
    fn test_string_errors_box() {
        let err = PipelineError::interceptor("plain message");
        assert_eq!(err.to_string(), "interceptor failed: plain message");
    }
}
