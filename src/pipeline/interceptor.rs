//! Interceptor abstraction.
//!
//! An interceptor receives the execution context, may inspect or replace the
//! subject, and decides whether the chain continues by calling
//! [`PipelineContext::proceed`].

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::pipeline::context::PipelineContext;
use crate::pipeline::error::PipelineError;

/// A callback registered for a phase.
#[async_trait]
pub trait Interceptor<S, C>: Send + Sync {
    async fn intercept(&self, ctx: &mut PipelineContext<S, C>) -> Result<(), PipelineError>;
}

/// Shared interceptor handle stored by the registry.
pub type SharedInterceptor<S, C> = Arc<dyn Interceptor<S, C>>;

/// Adapts a closure returning a boxed future into an [`Interceptor`].
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> FnInterceptor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<S, C, F> Interceptor<S, C> for FnInterceptor<F>
where
    S: Send + 'static,
    C: Send + 'static,
    F: for<'a> Fn(&'a mut PipelineContext<S, C>) -> BoxFuture<'a, Result<(), PipelineError>>
        + Send
        + Sync
        + 'static,
{
    async fn intercept(&self, ctx: &mut PipelineContext<S, C>) -> Result<(), PipelineError> {
        (self.f)(ctx).await
    }
}
