// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Orderly shutdown.
//!
//! A [`ShutdownSignal`] is triggered by SIGINT/SIGTERM, by a transport error
//! that is not an ordinary client disconnect, or by an accept failure showing
//! the listening socket itself is unusable. The server stops accepting on the
//! first trigger and drains in-flight requests within the configured timeout.

use std::io;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Write failures that only mean the peer went away or became unreachable.
pub fn is_disconnect(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::TimedOut
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::Interrupted
    )
}

/// How the accept loop should react to an error from the listening socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptFailure {
    /// One pending connection failed; accept the next one immediately.
    Connection,
    /// Out of descriptors or buffers; back off, then retry.
    Exhausted,
    /// The listener is unusable.
    Fatal,
}

impl AcceptFailure {
    pub fn classify(err: &io::Error) -> Self {
        if is_disconnect(err.kind()) || err.kind() == io::ErrorKind::WouldBlock {
            return AcceptFailure::Connection;
        }
        if err.kind() == io::ErrorKind::OutOfMemory || is_resource_exhaustion(err) {
            return AcceptFailure::Exhausted;
        }
        AcceptFailure::Fatal
    }
}

#[cfg(unix)]
fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}

#[cfg(not(unix))]
fn is_resource_exhaustion(_err: &io::Error) -> bool {
    false
}

#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self, reason: &str) {
        if !self.token.is_cancelled() {
            info!(reason, "Shutdown requested");
        }
        self.token.cancel();
    }

    /// Classify a transport write error. Returns `true` if it triggered shutdown.
    pub fn escalate(&self, err: &io::Error) -> bool {
        if is_disconnect(err.kind()) {
            debug!(error = %err, "Client disconnected during write");
            return false;
        }

        error!(error = %err, kind = ?err.kind(), "Transport write failed");
        self.trigger("transport error");
        true
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn triggered(&self) {
        self.token.cancelled().await
    }

}

/// Resolve on SIGINT or SIGTERM, returning the signal name.
pub async fn wait_for_os_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
