//! Call representation threaded through the application pipelines.
//!
//! # Design Decisions
//! - The call is the pipeline *context*; subjects are `()` (call pipeline),
//!   the request body (receive) and the outgoing content (send)
//! - Responding only records the content; the send pipeline runs once the
//!   call pipeline is done
//! - The send pipeline is shared until a feature extends it for one call,
//!   then copied into the call (copy-on-write)

use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;

use crate::pipeline::{Pipeline, PipelineContext, PipelineSnapshot};

pub type CallPipeline = Pipeline<(), ApplicationCall>;
pub type ReceivePipeline = Pipeline<Bytes, ApplicationCall>;
pub type SendPipeline = Pipeline<OutgoingContent, ApplicationCall>;

pub type CallContext = PipelineContext<(), ApplicationCall>;
pub type ReceiveContext = PipelineContext<Bytes, ApplicationCall>;
pub type SendContext = PipelineContext<OutgoingContent, ApplicationCall>;

/// Response content travelling through the send pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingContent {
    /// No body.
    Empty,
    /// Text body with its content type.
    Text { text: String, content_type: String },
    /// Binary body.
    Bytes {
        bytes: Bytes,
        content_type: Option<String>,
    },
    /// Body withheld; its length and type are still announced (HEAD responses).
    NoContent {
        content_length: Option<u64>,
        content_type: Option<String>,
    },
}

impl OutgoingContent {
    /// Plain text content.
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingContent::Text {
            text: text.into(),
            content_type: "text/plain; charset=utf-8".to_string(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutgoingContent::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Length of the body this content stands for.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            OutgoingContent::Empty => Some(0),
            OutgoingContent::Text { text, .. } => Some(text.len() as u64),
            OutgoingContent::Bytes { bytes, .. } => Some(bytes.len() as u64),
            OutgoingContent::NoContent { content_length, .. } => *content_length,
        }
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            OutgoingContent::Text { content_type, .. } => Some(content_type),
            OutgoingContent::Bytes { content_type, .. }
            | OutgoingContent::NoContent { content_type, .. } => content_type.as_deref(),
            OutgoingContent::Empty => None,
        }
    }

    /// Body bytes to write; empty for `Empty` and `NoContent`.
    pub fn into_body(self) -> Bytes {
        match self {
            OutgoingContent::Text { text, .. } => Bytes::from(text),
            OutgoingContent::Bytes { bytes, .. } => bytes,
            OutgoingContent::Empty | OutgoingContent::NoContent { .. } => Bytes::new(),
        }
    }
}

/// Incoming request data.
#[derive(Debug, Clone)]
pub struct CallRequest {
    pub method: Method,
    /// Scheme the client used ("http" or "https").
    pub scheme: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_id: String,
}

impl CallRequest {
    /// Request with no headers or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            scheme: "http".to_string(),
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            request_id: "unknown".to_string(),
        }
    }
}

/// Response being built for a call.
#[derive(Debug, Clone, Default)]
pub struct CallResponse {
    /// Status; `200 OK` when unset.
    pub status: Option<StatusCode>,
    pub headers: HeaderMap,
    /// Content recorded by `respond`, replaced by the send pipeline result.
    pub content: Option<OutgoingContent>,
}

/// A single request/response exchange.
pub struct ApplicationCall {
    pub request: CallRequest,
    pub response: CallResponse,
    /// Method the client actually used, before any feature rewrote it.
    pub origin_method: Method,
    shared_send: Arc<SendPipeline>,
    own_send: Option<Box<SendPipeline>>,
}

impl ApplicationCall {
    pub(crate) fn new(request: CallRequest, send_pipeline: Arc<SendPipeline>) -> Self {
        Self {
            origin_method: request.method.clone(),
            request,
            response: CallResponse::default(),
            shared_send: send_pipeline,
            own_send: None,
        }
    }

    /// Record the response content and status.
    pub fn respond(&mut self, status: StatusCode, content: OutgoingContent) {
        self.response.status = Some(status);
        self.response.content = Some(content);
    }

    pub fn has_responded(&self) -> bool {
        self.response.content.is_some()
    }

    /// Send pipeline for this call only; copied from the application's on
    /// first use.
    pub fn response_pipeline_mut(&mut self) -> &mut SendPipeline {
        let shared = &self.shared_send;
        self.own_send
            .get_or_insert_with(|| Box::new(SendPipeline::clone(shared)))
    }

    /// True if a feature extended the send pipeline for this call.
    pub fn has_own_response_pipeline(&self) -> bool {
        self.own_send.is_some()
    }

    pub(crate) fn send_snapshot(&self) -> PipelineSnapshot<OutgoingContent, ApplicationCall> {
        match &self.own_send {
            Some(own) => own.snapshot(),
            None => self.shared_send.snapshot(),
        }
    }
}

impl std::fmt::Debug for ApplicationCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationCall")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("origin_method", &self.origin_method)
            .field("own_response_pipeline", &self.has_own_response_pipeline())
            .finish()
    }
}
