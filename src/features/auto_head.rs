//! Answer HEAD requests with the GET response minus its body.
//!
//! The call is handled as a GET; a per-call `HEAD` phase inserted before
//! `TransferEncoding` swaps the content for `NoContent` with the same length
//! and content type.

use std::sync::LazyLock;

use axum::http::Method;

use crate::application::call::OutgoingContent;
use crate::application::phases;
use crate::features::{Feature, FeatureScope};
use crate::pipeline::{Phase, PipelineError};

static HEAD_PHASE: LazyLock<Phase> = LazyLock::new(|| Phase::new("HEAD"));

/// Feature answering HEAD requests automatically.
#[derive(Debug, Default)]
pub struct AutoHeadResponse;

impl AutoHeadResponse {
    pub const NAME: &'static str = "AutoHeadResponse";
}

impl Feature for AutoHeadResponse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn install(&self, scope: &mut FeatureScope<'_>) -> Result<(), PipelineError> {
        scope.on_call(|ctx| {
            Box::pin(async move {
                let call = ctx.context_mut();
                if call.request.method == Method::HEAD {
                    let pipeline = call.response_pipeline_mut();
                    if !pipeline.has_phase(&HEAD_PHASE) {
                        pipeline.insert_phase_before(&phases::send::TRANSFER_ENCODING, HEAD_PHASE.clone())?;
                        pipeline.intercept(&HEAD_PHASE, |ctx| {
                            Box::pin(async move {
                                let withheld = match ctx.subject() {
                                    OutgoingContent::NoContent { .. } | OutgoingContent::Empty => None,
                                    content => Some(OutgoingContent::NoContent {
                                        content_length: content.content_length(),
                                        content_type: content.content_type().map(str::to_string),
                                    }),
                                };
                                match withheld {
                                    Some(content) => ctx.proceed_with(content).await,
                                    None => ctx.proceed().await,
                                }
                            })
                        })?;
                    }
                    // Handle as GET so ordinary handlers respond.
                    call.request.method = Method::GET;
                }
                ctx.proceed().await
            })
        })
    }
}
