// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Panic containment.
//!
//! `tower_http`'s `CatchPanicLayer` catches the unwind; [`recover`] turns the
//! payload into an internal error so it goes through the same translator as
//! every other failure.

use std::any::Any;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use super::metrics::Metrics;
use crate::error::PipelineError;

/// Build the panic handler for `CatchPanicLayer::custom`.
pub fn recover(
    metrics: Arc<Metrics>,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    move |payload| {
        metrics.record_panic();
        PipelineError::Internal(format!("panic: {}", panic_message(payload.as_ref())))
            .into_response()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
