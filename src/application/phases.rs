//! Well-known phases of the application pipelines.
//!
//! Phases are process-wide so independently written features can refer to
//! the same stage.

use std::sync::LazyLock;

use crate::pipeline::Phase;

/// Phases of the call pipeline.
pub mod call {
    use super::*;

    /// Prepare the call and its attributes.
    pub static SETUP: LazyLock<Phase> = LazyLock::new(|| Phase::new("Setup"));
    /// Tracing, metrics, error handling wrapping the rest.
    pub static MONITORING: LazyLock<Phase> = LazyLock::new(|| Phase::new("Monitoring"));
    /// Default phase for installed features.
    pub static PLUGINS: LazyLock<Phase> = LazyLock::new(|| Phase::new("Plugins"));
    /// Handlers that respond to the call.
    pub static CALL: LazyLock<Phase> = LazyLock::new(|| Phase::new("Call"));
    /// Runs when nothing responded.
    pub static FALLBACK: LazyLock<Phase> = LazyLock::new(|| Phase::new("Fallback"));

    pub fn all() -> [Phase; 5] {
        [
            SETUP.clone(),
            MONITORING.clone(),
            PLUGINS.clone(),
            CALL.clone(),
            FALLBACK.clone(),
        ]
    }
}

/// Phases of the receive pipeline (request body).
pub mod receive {
    use super::*;

    pub static BEFORE: LazyLock<Phase> = LazyLock::new(|| Phase::new("Before"));
    pub static TRANSFORM: LazyLock<Phase> = LazyLock::new(|| Phase::new("Transform"));
    pub static AFTER: LazyLock<Phase> = LazyLock::new(|| Phase::new("After"));

    pub fn all() -> [Phase; 3] {
        [BEFORE.clone(), TRANSFORM.clone(), AFTER.clone()]
    }
}

/// Phases of the send pipeline (response content).
pub mod send {
    use super::*;

    pub static BEFORE: LazyLock<Phase> = LazyLock::new(|| Phase::new("Before"));
    pub static TRANSFORM: LazyLock<Phase> = LazyLock::new(|| Phase::new("Transform"));
    pub static RENDER: LazyLock<Phase> = LazyLock::new(|| Phase::new("Render"));
    pub static CONTENT_ENCODING: LazyLock<Phase> = LazyLock::new(|| Phase::new("ContentEncoding"));
    pub static TRANSFER_ENCODING: LazyLock<Phase> = LazyLock::new(|| Phase::new("TransferEncoding"));
    pub static AFTER: LazyLock<Phase> = LazyLock::new(|| Phase::new("After"));
    /// Last stop before the engine writes the response.
    pub static ENGINE: LazyLock<Phase> = LazyLock::new(|| Phase::new("Engine"));

    pub fn all() -> [Phase; 7] {
        [
            BEFORE.clone(),
            TRANSFORM.clone(),
            RENDER.clone(),
            CONTENT_ENCODING.clone(),
            TRANSFER_ENCODING.clone(),
            AFTER.clone(),
            ENGINE.clone(),
        ]
    }
}
