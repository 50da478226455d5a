//! Per-execution cursor.
//!
//! # Responsibilities
//! - Track the position in the flattened interceptor sequence
//! - Own the subject and the call context for one execution
//! - Drive interceptors through `proceed()` / `proceed_with()` / `finish()`
//!
//! # State Machine
//! ```text
//! Ready ──proceed()──▶ Running ──end of chain──▶ Completed
//!                         │
//!                         ├──finish()──────────▶ Finished
//!                         └──error/cancel──────▶ Failed
//! ```
//!
//! # Design Decisions
//! - The cursor advances *before* an interceptor runs, so a nested
//!   `proceed()` continues with the next one
//! - Nested `proceed()` calls form the call stack; an error at interceptor N
//!   returns through the `proceed()` of every interceptor before it
//! - A failure exhausts the cursor: enclosing interceptors may recover, but
//!   nothing after the failed interceptor runs
//! - One context per execution; never shared between executions

use std::sync::Arc;

use futures_util::future::{self, BoxFuture};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::pipeline::error::PipelineError;
use crate::pipeline::interceptor::SharedInterceptor;
use crate::pipeline::phase::Phase;
use crate::pipeline::settings::{PipelineSettings, ReturnPolicy};

/// Flattened interceptor sequence captured by one execution.
pub type Flattened<S, C> = Arc<Vec<(Phase, SharedInterceptor<S, C>)>>;

/// Lifecycle of a single execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Ready,
    Running,
    /// Every interceptor ran (or the chain was ended by a return without proceed).
    Completed,
    /// An interceptor called `finish()`.
    Finished,
    /// An interceptor error or cancellation passed through the context.
    Failed,
}

/// Execution context handed to every interceptor.
pub struct PipelineContext<S, C> {
    subject: S,
    context: C,
    interceptors: Flattened<S, C>,
    index: usize,
    state: ExecutionState,
    settings: PipelineSettings,
    cancellation: CancellationToken,
}

impl<S, C> PipelineContext<S, C>
where
    S: Send + 'static,
    C: Send + 'static,
{
    pub(crate) fn new(
        interceptors: Flattened<S, C>,
        settings: PipelineSettings,
        context: C,
        subject: S,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            subject,
            context,
            interceptors,
            index: 0,
            state: ExecutionState::Ready,
            settings,
            cancellation,
        }
    }

    /// Current subject.
    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn subject_mut(&mut self) -> &mut S {
        &mut self.subject
    }

    /// Replace the subject without continuing the chain.
    pub fn set_subject(&mut self, subject: S) {
        self.subject = subject;
    }

    /// Call context this execution was started with.
    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == ExecutionState::Finished
    }

    /// Token cancelled when the enclosing execution is cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Phase of the interceptor currently running, if any.
    pub fn current_phase(&self) -> Option<&Phase> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.interceptors.get(i))
            .map(|(phase, _)| phase)
    }

    /// Stop the execution; remaining interceptors are skipped.
    pub fn finish(&mut self) {
        if self.state != ExecutionState::Finished {
            tracing::debug!(index = self.index, "Pipeline finished early");
        }
        self.state = ExecutionState::Finished;
    }

    /// Replace the subject, then continue with the next interceptor.
    pub fn proceed_with(&mut self, subject: S) -> BoxFuture<'_, Result<(), PipelineError>> {
        if self.state == ExecutionState::Finished {
            return Box::pin(future::ready(Err(PipelineError::PipelineFinished)));
        }
        self.subject = subject;
        self.proceed()
    }

    /// Run the rest of the chain.
    pub fn proceed(&mut self) -> BoxFuture<'_, Result<(), PipelineError>> {
        Box::pin(async move {
            if self.state == ExecutionState::Finished {
                return Err(PipelineError::PipelineFinished);
            }
            self.state = ExecutionState::Running;

            loop {
                if self.cancellation.is_cancelled() {
                    self.index = self.interceptors.len();
                    self.state = ExecutionState::Failed;
                    return Err(PipelineError::Cancelled);
                }

                let position = self.index;
                let Some((phase, interceptor)) = self.interceptors.get(position).cloned() else {
                    self.state = ExecutionState::Completed;
                    return Ok(());
                };
                self.index = position + 1;

                let result = if self.settings.trace_interceptors {
                    let span = tracing::debug_span!("interceptor", index = position, phase = %phase);
                    interceptor.intercept(self).instrument(span).await
                } else {
                    interceptor.intercept(self).await
                };

                if let Err(err) = result {
                    // Nothing after a failed interceptor runs, even if an
                    // enclosing interceptor recovers.
                    self.index = self.interceptors.len();
                    self.state = ExecutionState::Failed;
                    return Err(err);
                }

                if self.state == ExecutionState::Finished {
                    return Ok(());
                }

                if self.index == position + 1 && self.settings.return_policy == ReturnPolicy::Stop {
                    let skipped = self.interceptors.len() - self.index;
                    if skipped > 0 {
                        tracing::debug!(
                            index = position,
                            phase = %phase,
                            skipped,
                            "Interceptor returned without proceeding, chain stopped"
                        );
                    }
                    self.index = self.interceptors.len();
                    self.state = ExecutionState::Completed;
                    return Ok(());
                }
            }
        })
    }

    pub(crate) fn into_parts(self) -> (S, C) {
        (self.subject, self.context)
    }
}
