// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server assembly and lifecycle.

use std::collections::BTreeSet;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

use crate::api;
use crate::auth::{Authenticator, KeyError, KeyStore, Role};
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, SeedAdmin};
use crate::shutdown::{self, AcceptFailure, ShutdownSignal};
use crate::state::AppState;
use crate::store::{DirectoryError, InMemoryUserDirectory, NewUser, UserDirectory};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load signing keys: {0}")]
    Keys(#[from] KeyError),
    #[error("failed to seed admin account: {0}")]
    Seed(#[from] DirectoryError),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] io::Error),
    #[error("server task failed: {0}")]
    Task(String),
}

const ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// TCP listener whose connections report write failures to a [`ShutdownSignal`].
pub struct WatchedListener {
    inner: TcpListener,
    signal: ShutdownSignal,
}

impl WatchedListener {
    pub fn new(inner: TcpListener, signal: ShutdownSignal) -> Self {
        Self { inner, signal }
    }
}

impl axum::serve::Listener for WatchedListener {
    type Io = WatchedStream;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        loop {
            match self.inner.accept().await {
                Ok((stream, addr)) => {
                    return (
                        WatchedStream {
                            inner: stream,
                            signal: self.signal.clone(),
                        },
                        addr,
                    )
                }
                Err(err) => match AcceptFailure::classify(&err) {
                    AcceptFailure::Connection => continue,
                    AcceptFailure::Exhausted => {
                        warn!(error = %err, "Accept failed; backing off");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    AcceptFailure::Fatal => {
                        error!(error = %err, kind = ?err.kind(), "Listener failed");
                        self.signal.trigger("listener failed");
                        // Graceful shutdown stops polling accept once triggered.
                        std::future::pending::<()>().await;
                    }
                },
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Accepted connection. Reads pass through; write errors are classified.
pub struct WatchedStream {
    inner: TcpStream,
    signal: ShutdownSignal,
}

impl WatchedStream {
    fn observe<T>(&self, poll: Poll<io::Result<T>>) -> Poll<io::Result<T>> {
        if let Poll::Ready(Err(err)) = &poll {
            self.signal.escalate(err);
        }
        poll
    }
}

impl AsyncRead for WatchedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for WatchedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        this.observe(poll)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write_vectored(cx, bufs);
        this.observe(poll)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_flush(cx);
        this.observe(poll)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Build the application state from configuration.
pub async fn build_state(config: &Config) -> Result<AppState, StartupError> {
    let keys = KeyStore::load_dir(&config.keys_folder, &config.active_kid)?;
    let auth = Authenticator::new(keys, config.issuer.clone()).with_token_ttl(config.token_ttl);

    let users = Arc::new(InMemoryUserDirectory::new());
    if let Some(seed) = &config.seed_admin {
        seed_admin(users.as_ref(), seed).await?;
    }

    Ok(AppState::new(Arc::new(auth), users.clone())
        .with_readiness(users)
        .with_readiness_timeout(config.readiness_timeout))
}

async fn seed_admin(users: &dyn UserDirectory, seed: &SeedAdmin) -> Result<(), DirectoryError> {
    let admin = NewUser {
        name: "admin".to_string(),
        email: seed.email.clone(),
        password: seed.password.clone(),
        roles: BTreeSet::from([Role::Admin, Role::User]),
    };
    let user = users.register(admin, SystemClock.now()).await?;
    info!(user_id = %user.id, email = %user.email, "Seeded admin account");
    Ok(())
}

/// Run the server until a shutdown trigger, then drain within the timeout.
pub async fn run(config: Config) -> Result<(), StartupError> {
    let state = build_state(&config).await?;
    let app = api::router(state).layer(api::cors(&config.cors_origins));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    let signal = ShutdownSignal::new();
    tokio::spawn({
        let signal = signal.clone();
        async move {
            let name = shutdown::wait_for_os_signal().await;
            signal.trigger(name);
        }
    });

    info!(%addr, "startupers-api listening (docs at /docs)");

    let server = axum::serve(WatchedListener::new(listener, signal.clone()), app)
        .with_graceful_shutdown({
            let signal = signal.clone();
            async move { signal.triggered().await }
        });
    let mut handle = tokio::spawn(async move { server.await });

    tokio::select! {
        result = &mut handle => return finished(result),
        _ = signal.triggered() => {}
    }

    match tokio::time::timeout(config.shutdown_timeout, handle).await {
        Ok(result) => finished(result),
        Err(_) => {
            warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "Graceful shutdown timed out; abandoning in-flight requests"
            );
            Ok(())
        }
    }
}

fn finished(result: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), StartupError> {
    match result {
        Ok(Ok(())) => {
            info!("Server stopped");
            Ok(())
        }
        Ok(Err(err)) => Err(StartupError::Serve(err)),
        Err(err) => Err(StartupError::Task(err.to_string())),
    }
}
