// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use crate::auth::Authenticator;
use crate::clock::{Clock, SystemClock};
use crate::pipeline::Metrics;
use crate::store::{ReadinessProbe, UserDirectory};

/// Default bound on a readiness check.
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_millis(1000);

/// Shared, read-only application state handed to every stage and handler.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub users: Arc<dyn UserDirectory>,
    pub readiness: Arc<dyn ReadinessProbe>,
    pub metrics: Arc<Metrics>,
    pub clock: Arc<dyn Clock>,
    pub readiness_timeout: Duration,
}

impl AppState {
    /// State with the system clock and a readiness probe that always passes.
    pub fn new(auth: Arc<Authenticator>, users: Arc<dyn UserDirectory>) -> Self {
        Self {
            auth,
            users,
            readiness: Arc::new(AlwaysReady),
            metrics: Arc::new(Metrics::new()),
            clock: Arc::new(SystemClock),
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
        }
    }

    pub fn with_readiness(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.readiness = probe;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_readiness_timeout(mut self, timeout: Duration) -> Self {
        self.readiness_timeout = timeout;
        self
    }
}

struct AlwaysReady;

#[async_trait::async_trait]
impl ReadinessProbe for AlwaysReady {
    async fn check(&self) -> Result<(), String> {
        Ok(())
    }
}
