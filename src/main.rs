// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::process::ExitCode;

use startupers_api::config::{Config, LogFormat};
use startupers_api::{logging, server};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing(LogFormat::from_env());
    logging::init_panic_hook();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        keys_folder = %config.keys_folder.display(),
        active_kid = %config.active_kid,
        issuer = %config.issuer,
        "Starting startupers-api"
    );

    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Server failed");
            ExitCode::FAILURE
        }
    }
}
