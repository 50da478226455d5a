//! Frozen view of a pipeline used to run executions.

use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::observability::metrics;
use crate::pipeline::context::{ExecutionState, Flattened, PipelineContext};
use crate::pipeline::error::PipelineError;
use crate::pipeline::settings::PipelineSettings;

/// Flattened interceptor sequence captured at one point in time.
///
/// Registration on the originating [`Pipeline`](crate::pipeline::Pipeline)
/// after the snapshot was taken does not affect it.
pub struct PipelineSnapshot<S, C> {
    interceptors: Flattened<S, C>,
    settings: PipelineSettings,
}

impl<S, C> Clone for PipelineSnapshot<S, C> {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
            settings: self.settings,
        }
    }
}

impl<S, C> PipelineSnapshot<S, C>
where
    S: Send + 'static,
    C: Send + 'static,
{
    pub(crate) fn new(interceptors: Flattened<S, C>, settings: PipelineSettings) -> Self {
        Self {
            interceptors,
            settings,
        }
    }

    /// Number of interceptors in the captured sequence.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn interceptors_arc(&self) -> Flattened<S, C> {
        self.interceptors.clone()
    }

    /// Run every interceptor over `subject` and return the final subject.
    pub async fn execute(&self, context: C, subject: S) -> Result<S, PipelineError> {
        let (subject, _) = self.run(context, subject, CancellationToken::new()).await?;
        Ok(subject)
    }

    /// Like [`execute`](Self::execute), also handing the call context back.
    pub async fn execute_with_context(&self, context: C, subject: S) -> Result<(S, C), PipelineError> {
        self.run(context, subject, CancellationToken::new()).await
    }

    /// Like [`execute`](Self::execute), aborting when `token` is cancelled.
    ///
    /// Cancellation drops the suspended interceptor and discards the subject.
    pub async fn execute_cancellable(
        &self,
        context: C,
        subject: S,
        token: CancellationToken,
    ) -> Result<S, PipelineError> {
        let (subject, _) = self.run(context, subject, token).await?;
        Ok(subject)
    }

    async fn run(
        &self,
        context: C,
        subject: S,
        token: CancellationToken,
    ) -> Result<(S, C), PipelineError> {
        let start_time = Instant::now();
        let mut ctx = PipelineContext::new(
            self.interceptors.clone(),
            self.settings,
            context,
            subject,
            token.clone(),
        );

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(PipelineError::Cancelled),
            result = ctx.proceed() => result,
        };

        // An interceptor may swallow the error it saw; cancellation still wins.
        let result = match result {
            Ok(()) if token.is_cancelled() => Err(PipelineError::Cancelled),
            other => other,
        };

        match result {
            Ok(()) => {
                let outcome = match ctx.state() {
                    ExecutionState::Finished => "finished",
                    _ => "completed",
                };
                metrics::record_execution(outcome, start_time);
                Ok(ctx.into_parts())
            }
            Err(err) => {
                let outcome = if err.is_cancellation() { "cancelled" } else { "failed" };
                tracing::warn!(
                    error = %err,
                    interceptors = self.interceptors.len(),
                    "Pipeline execution failed"
                );
                metrics::record_execution(outcome, start_time);
                Err(err)
            }
        }
    }
}
