//! Application: the three standard pipelines plus installed features.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::StatusCode;
use bytes::Bytes;
use tracing::Instrument;

use crate::application::call::{
    ApplicationCall, CallPipeline, CallRequest, OutgoingContent, ReceivePipeline, SendPipeline,
};
use crate::application::phases;
use crate::features::{Feature, FeatureScope};
use crate::pipeline::{Phase, PipelineError, PipelineSettings};

/// Phases a feature intercepted, per pipeline.
#[derive(Debug, Clone, Default)]
pub struct FeatureUsage {
    pub call: Vec<Phase>,
    pub receive: Vec<Phase>,
    pub send: Vec<Phase>,
}

/// Owner of the call, receive and send pipelines.
pub struct Application {
    pub(crate) call_pipeline: CallPipeline,
    pub(crate) receive_pipeline: ReceivePipeline,
    pub(crate) send_pipeline: Arc<SendPipeline>,
    pub(crate) features: HashMap<String, FeatureUsage>,
    settings: PipelineSettings,
}

impl Application {
    /// Create an application with the standard phases and the fallback handler.
    pub fn new(settings: PipelineSettings) -> Result<Self, PipelineError> {
        let mut call_pipeline = CallPipeline::with_phases(settings, phases::call::all())?;
        call_pipeline.intercept(&phases::call::FALLBACK, |ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                if !call.has_responded() {
                    tracing::debug!(path = %call.request.path, "No handler responded");
                    call.respond(StatusCode::NOT_FOUND, OutgoingContent::text("Not Found"));
                }
                ctx.proceed().await
            })
        })?;

        Ok(Self {
            call_pipeline,
            receive_pipeline: ReceivePipeline::with_phases(settings, phases::receive::all())?,
            send_pipeline: Arc::new(SendPipeline::with_phases(settings, phases::send::all())?),
            features: HashMap::new(),
            settings,
        })
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    pub fn call_pipeline(&self) -> &CallPipeline {
        &self.call_pipeline
    }

    pub fn call_pipeline_mut(&mut self) -> &mut CallPipeline {
        &mut self.call_pipeline
    }

    pub fn receive_pipeline(&self) -> &ReceivePipeline {
        &self.receive_pipeline
    }

    pub fn receive_pipeline_mut(&mut self) -> &mut ReceivePipeline {
        &mut self.receive_pipeline
    }

    pub fn send_pipeline(&self) -> &SendPipeline {
        &self.send_pipeline
    }

    pub fn send_pipeline_mut(&mut self) -> &mut SendPipeline {
        Arc::make_mut(&mut self.send_pipeline)
    }

    /// Install a feature. Pipelines are left untouched if installation fails.
    pub fn install(&mut self, feature: &dyn Feature) -> Result<(), PipelineError> {
        let name = feature.name().to_string();
        if self.features.contains_key(&name) {
            return Err(PipelineError::FeatureAlreadyInstalled(name));
        }

        let backup = (
            self.call_pipeline.clone(),
            self.receive_pipeline.clone(),
            SendPipeline::clone(&self.send_pipeline),
        );

        self.features.insert(name.clone(), FeatureUsage::default());
        let result = feature.install(&mut FeatureScope::new(self, name.clone()));

        match result {
            Ok(()) => {
                tracing::info!(feature = %name, "Feature installed");
                Ok(())
            }
            Err(e) => {
                tracing::error!(feature = %name, error = %e, "Feature installation failed");
                self.features.remove(&name);
                self.call_pipeline = backup.0;
                self.receive_pipeline = backup.1;
                self.send_pipeline = Arc::new(backup.2);
                Err(e)
            }
        }
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.features.contains_key(name)
    }

    /// Names of the installed features.
    pub fn installed_features(&self) -> impl Iterator<Item = &str> + '_ {
        self.features.keys().map(String::as_str)
    }

    /// Create a call bound to this application's send pipeline.
    pub fn new_call(&self, request: CallRequest) -> ApplicationCall {
        ApplicationCall::new(request, self.send_pipeline.clone())
    }

    /// Run a call through receive → call → send and return it with its
    /// final content.
    pub async fn handle(&self, call: ApplicationCall) -> Result<ApplicationCall, PipelineError> {
        let span = tracing::info_span!(
            "call",
            request_id = %call.request.request_id,
            method = %call.request.method,
            path = %call.request.path,
        );

        async move {
            let mut call = call;
            let body = std::mem::take(&mut call.request.body);
            let (body, mut call) = self.receive_pipeline.execute_with_context(call, body).await?;
            call.request.body = body;

            let ((), mut call) = self.call_pipeline.execute_with_context(call, ()).await?;

            let content = call.response.content.take().unwrap_or(OutgoingContent::Empty);
            let snapshot = call.send_snapshot();
            let (content, mut call) = snapshot.execute_with_context(call, content).await?;
            call.response.content = Some(content);

            tracing::debug!(
                status = call.response.status.unwrap_or(StatusCode::OK).as_u16(),
                "Call handled"
            );
            Ok(call)
        }
        .instrument(span)
        .await
    }

    /// Run only the receive pipeline over `body`.
    pub async fn receive(
        &self,
        call: ApplicationCall,
        body: Bytes,
    ) -> Result<(Bytes, ApplicationCall), PipelineError> {
        self.receive_pipeline.execute_with_context(call, body).await
    }
}
