// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request logging stage.
//!
//! Each request gets a `request` span carrying the trace id, method and path,
//! and exactly one completion event with status and latency. Translated errors
//! add their server-side detail to that event.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, DefaultOnRequest, MakeSpan, OnResponse, TraceLayer,
};
use tracing::{error, info, info_span, Level, Span};

use super::context::RequestContext;
use crate::error::ErrorRecord;

pub type RequestTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    LogCompletion,
    DefaultOnBodyChunk,
    DefaultOnEos,
    (),
>;

/// Build the logging layer. Must run inside the context stage.
pub fn layer() -> RequestTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(LogCompletion)
        .on_failure(())
}

#[derive(Debug, Clone, Copy)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let trace_id = request
            .extensions()
            .get::<RequestContext>()
            .map(|ctx| ctx.trace_id().to_string())
            .unwrap_or_default();

        info_span!(
            "request",
            trace_id = %trace_id,
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogCompletion;

impl<B> OnResponse<B> for LogCompletion {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status().as_u16();
        let latency_ms = latency.as_millis() as u64;

        match response.extensions().get::<ErrorRecord>() {
            Some(record) if response.status().is_server_error() => error!(
                status,
                latency_ms,
                kind = record.kind,
                error = %record.detail,
                "request failed"
            ),
            Some(record) => info!(
                status,
                latency_ms,
                kind = record.kind,
                error = %record.detail,
                "request completed"
            ),
            None => info!(status, latency_ms, "request completed"),
        }
    }
}
