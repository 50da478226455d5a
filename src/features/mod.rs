//! Feature (plugin) installation.
//!
//! # Data Flow
//! ```text
//! Application::install(feature)
//!     → Feature::install(&mut FeatureScope)
//!     → on_call / on_receive / on_send (default phases)
//!     → before_feature / after_feature (fresh phase next to another feature)
//!     → interceptors registered, phases recorded per feature
//! ```
//!
//! # Design Decisions
//! - Configuration lives in the feature value itself; nothing global
//! - Relative placement allocates a fresh phase per interception, named
//!   `"{feature}Phase{random}"`, so features never share a phase by accident
//! - A feature that has not intercepted the pipeline yet is anchored at
//!   that pipeline's default phase

pub mod auto_head;
pub mod default_headers;
pub mod https_redirect;

pub use auto_head::AutoHeadResponse;
pub use default_headers::DefaultHeaders;
pub use https_redirect::HttpsRedirect;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::application::app::{Application, FeatureUsage};
use crate::application::call::{
    ApplicationCall, CallContext, OutgoingContent, ReceiveContext, SendContext,
};
use crate::application::phases;
use crate::pipeline::{Phase, Pipeline, PipelineError};

/// A plugin that extends the application pipelines.
pub trait Feature: Send + Sync {
    /// Unique feature name.
    fn name(&self) -> &str;

    /// Register phases and interceptors.
    fn install(&self, scope: &mut FeatureScope<'_>) -> Result<(), PipelineError>;
}

/// Which pipeline an interception targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Call,
    Receive,
    Send,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    Before,
    After,
}

/// Installation handle given to [`Feature::install`].
pub struct FeatureScope<'a> {
    app: &'a mut Application,
    name: String,
}

impl<'a> FeatureScope<'a> {
    pub(crate) fn new(app: &'a mut Application, name: String) -> Self {
        Self { app, name }
    }

    /// Name of the feature being installed.
    pub fn feature_name(&self) -> &str {
        &self.name
    }

    pub fn application(&self) -> &Application {
        &*self.app
    }

    /// Intercept the call pipeline in the `Plugins` phase.
    pub fn on_call<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut CallContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.call_at(phases::call::PLUGINS.clone(), f)
    }

    /// Intercept the call pipeline in the `Monitoring` phase.
    pub fn monitoring<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut CallContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.call_at(phases::call::MONITORING.clone(), f)
    }

    /// Intercept the call pipeline in the `Fallback` phase.
    pub fn fallback<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut CallContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.call_at(phases::call::FALLBACK.clone(), f)
    }

    /// Intercept the receive pipeline in the `Before` phase.
    pub fn before_receive<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut ReceiveContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.receive_at(phases::receive::BEFORE.clone(), f)
    }

    /// Intercept the receive pipeline in the `Transform` phase.
    pub fn on_receive<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut ReceiveContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.receive_at(phases::receive::TRANSFORM.clone(), f)
    }

    /// Intercept the send pipeline in the `Before` phase.
    pub fn before_send<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut SendContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.send_at(phases::send::BEFORE.clone(), f)
    }

    /// Intercept the send pipeline in the `Transform` phase.
    pub fn on_send<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut SendContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.send_at(phases::send::TRANSFORM.clone(), f)
    }

    /// Intercept the send pipeline in the `After` phase.
    pub fn after_send<F>(&mut self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut SendContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.send_at(phases::send::AFTER.clone(), f)
    }

    /// Run the next interception before everything `feature` intercepted.
    pub fn before_feature<'s>(&'s mut self, feature: &str) -> Result<RelativeScope<'s, 'a>, PipelineError> {
        self.relative(feature, Placement::Before)
    }

    /// Run the next interception after everything `feature` intercepted.
    pub fn after_feature<'s>(&'s mut self, feature: &str) -> Result<RelativeScope<'s, 'a>, PipelineError> {
        self.relative(feature, Placement::After)
    }

    fn relative<'s>(
        &'s mut self,
        feature: &str,
        placement: Placement,
    ) -> Result<RelativeScope<'s, 'a>, PipelineError> {
        if !self.app.is_installed(feature) {
            return Err(PipelineError::FeatureNotInstalled(feature.to_string()));
        }
        Ok(RelativeScope {
            scope: self,
            target: feature.to_string(),
            placement,
        })
    }

    fn call_at<F>(&mut self, phase: Phase, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut CallContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.app.call_pipeline.intercept(&phase, f)?;
        self.record(Target::Call, phase);
        Ok(())
    }

    fn receive_at<F>(&mut self, phase: Phase, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut ReceiveContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.app.receive_pipeline.intercept(&phase, f)?;
        self.record(Target::Receive, phase);
        Ok(())
    }

    fn send_at<F>(&mut self, phase: Phase, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut SendContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        self.app.send_pipeline_mut().intercept(&phase, f)?;
        self.record(Target::Send, phase);
        Ok(())
    }

    fn record(&mut self, target: Target, phase: Phase) {
        let usage = self.app.features.entry(self.name.clone()).or_default();
        let phases = usage_for(usage, target);
        if !phases.contains(&phase) {
            phases.push(phase);
        }
    }

    fn fresh_phase(&self) -> Phase {
        Phase::new(format!("{}Phase{}", self.name, fastrand::u32(..)))
    }
}

fn usage_for(usage: &mut FeatureUsage, target: Target) -> &mut Vec<Phase> {
    match target {
        Target::Call => &mut usage.call,
        Target::Receive => &mut usage.receive,
        Target::Send => &mut usage.send,
    }
}

/// Insert `phase` before the first / after the last of `used`, or next to
/// `default` when `used` is empty.
fn place_relative<S, C>(
    pipeline: &mut Pipeline<S, C>,
    used: &[Phase],
    default: &Phase,
    placement: Placement,
    phase: Phase,
) -> Result<(), PipelineError>
where
    S: Send + 'static,
    C: Send + 'static,
{
    let mut ordered: Vec<&Phase> = used.iter().filter(|p| pipeline.has_phase(p)).collect();
    ordered.sort_by_key(|p| pipeline.phases().position(|q| q == *p));

    match placement {
        Placement::Before => {
            let reference = ordered.first().copied().unwrap_or(default);
            pipeline.insert_phase_before(reference, phase)
        }
        Placement::After => {
            let reference = ordered.last().copied().unwrap_or(default);
            pipeline.insert_phase_after(reference, phase)
        }
    }
}

/// Interceptions placed relative to another feature.
pub struct RelativeScope<'s, 'a> {
    scope: &'s mut FeatureScope<'a>,
    target: String,
    placement: Placement,
}

impl RelativeScope<'_, '_> {
    pub fn on_call<F>(self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut CallContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        let phase = self.scope.fresh_phase();
        let used = self.used(Target::Call);
        place_relative(
            &mut self.scope.app.call_pipeline,
            &used,
            &phases::call::PLUGINS,
            self.placement,
            phase.clone(),
        )?;
        self.scope.call_at(phase, f)
    }

    pub fn on_receive<F>(self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut ReceiveContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        let phase = self.scope.fresh_phase();
        let used = self.used(Target::Receive);
        place_relative(
            &mut self.scope.app.receive_pipeline,
            &used,
            &phases::receive::TRANSFORM,
            self.placement,
            phase.clone(),
        )?;
        self.scope.receive_at(phase, f)
    }

    pub fn on_send<F>(self, f: F) -> Result<(), PipelineError>
    where
        F: for<'c> Fn(&'c mut SendContext) -> BoxFuture<'c, Result<(), PipelineError>>
            + Send
            + Sync
            + 'static,
    {
        let phase = self.scope.fresh_phase();
        let used = self.used(Target::Send);
        place_relative(
            self.scope.app.send_pipeline_mut(),
            &used,
            &phases::send::TRANSFORM,
            self.placement,
            phase.clone(),
        )?;
        self.scope.send_at(phase, f)
    }

    fn used(&self, target: Target) -> Vec<Phase> {
        self.scope
            .app
            .features
            .get(&self.target)
            .map(|usage| match target {
                Target::Call => usage.call.clone(),
                Target::Receive => usage.receive.clone(),
                Target::Send => usage.send.clone(),
            })
            .unwrap_or_default()
    }
}

/// Feature built from a closure, for small one-off extensions.
pub struct FnFeature<F> {
    name: String,
    install: F,
}

impl<F> FnFeature<F>
where
    F: Fn(&mut FeatureScope<'_>) -> Result<(), PipelineError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, install: F) -> Self {
        Self {
            name: name.into(),
            install,
        }
    }
}

impl<F> Feature for FnFeature<F>
where
    F: Fn(&mut FeatureScope<'_>) -> Result<(), PipelineError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn install(&self, scope: &mut FeatureScope<'_>) -> Result<(), PipelineError> {
        (self.install)(scope)
    }
}

/// Replace the outgoing content with a string when `render` produces one.
///
/// Content for which `render` returns `None` passes through untouched.
pub fn serialize_to_string<R>(scope: &mut FeatureScope<'_>, render: R) -> Result<(), PipelineError>
where
    R: Fn(&OutgoingContent, &ApplicationCall) -> Option<String> + Send + Sync + 'static,
{
    scope.on_send(move |ctx| {
        let rendered = render(ctx.subject(), ctx.context());
        Box::pin(async move {
            match rendered {
                Some(text) => ctx.proceed_with(OutgoingContent::text(text)).await,
                None => ctx.proceed().await,
            }
        })
    })
}

/// Replace the outgoing content with bytes when `render` produces them.
///
/// The content type of the replaced content is kept.
pub fn serialize_to_bytes<R>(scope: &mut FeatureScope<'_>, render: R) -> Result<(), PipelineError>
where
    R: Fn(&OutgoingContent, &ApplicationCall) -> Option<Bytes> + Send + Sync + 'static,
{
    scope.on_send(move |ctx| {
        let rendered = render(ctx.subject(), ctx.context()).map(|bytes| OutgoingContent::Bytes {
            bytes,
            content_type: ctx.subject().content_type().map(str::to_string),
        });
        Box::pin(async move {
            match rendered {
                Some(content) => ctx.proceed_with(content).await,
                None => ctx.proceed().await,
            }
        })
    })
}

/// Replace the incoming body when `transform` produces a new one.
pub fn transform_body<T>(scope: &mut FeatureScope<'_>, transform: T) -> Result<(), PipelineError>
where
    T: Fn(&Bytes, &ApplicationCall) -> Option<Bytes> + Send + Sync + 'static,
{
    scope.on_receive(move |ctx| {
        let transformed = transform(ctx.subject(), ctx.context());
        Box::pin(async move {
            match transformed {
                Some(body) => ctx.proceed_with(body).await,
                None => ctx.proceed().await,
            }
        })
    })
}
