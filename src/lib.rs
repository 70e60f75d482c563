// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Startupers API - Authentication Core and Request Pipeline
//!
//! This crate issues and verifies RS256 bearer tokens, evaluates per-route
//! authorization rules, and runs every HTTP request through an ordered chain
//! of cross-cutting stages (trace id, logging, panic containment, metrics).
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum) and router assembly
//! - `auth` - Key store, token codec, authenticator and rules
//! - `pipeline` - Request context and middleware stages
//! - `store` - User directory and readiness collaborators
//! - `server` - Listener, startup and graceful shutdown

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod shutdown;
pub mod state;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;
