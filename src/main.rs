// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use slumber_server::{
    api,
    auth::{SigningKeys, TokenAuthority},
    config::{ConfigError, ServerConfig, SESSION_TTL_ENV},
    error::ServerError,
    pipeline::ServerOptions,
    storage::{Database, RedbSessionRepository, SessionSweeper, UserRepository},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;
    telemetry::init(config.log_format);

    // Refuse to start without both halves of the key pair
    let keys = SigningKeys::load(&config.signing_key_path, &config.verifying_key_path)?;
    info!(kid = keys.key_id(), "Signing keys loaded");

    let database = Database::open(&config.data_dir)?;
    info!(data_dir = %config.data_dir.display(), "Database opened");

    let mut admins = config.admin_user_ids.clone();
    if let Some(seed) = &config.admin_seed {
        let users = UserRepository::new(database.new_session());
        let seeded = api::users::seed_admin(&users, seed)?;
        admins.push(seeded.user.id);
    }

    let ttl = chrono::Duration::from_std(config.session_ttl).map_err(|_| {
        ServerError::Config(ConfigError::Invalid {
            name: SESSION_TTL_ENV,
            value: config.session_ttl.as_secs().to_string(),
            reason: "out of range".to_string(),
        })
    })?;
    let sessions = Arc::new(RedbSessionRepository::new(database.new_session()));
    let authority = TokenAuthority::new(Arc::new(keys), sessions.clone()).with_ttl(ttl);

    let shutdown = CancellationToken::new();

    let sweeper = SessionSweeper::new(sessions)
        .with_interval(config.sweep_interval)
        .with_retention(config.session_retention);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown.clone()));

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let options = ServerOptions {
        request_timeout: config.request_timeout,
        ..ServerOptions::default()
    };
    let result = api::server(database, authority, admins, config.indent_json, options)
        .run(config.bind_addr, shutdown.clone())
        .await;

    shutdown.cancel();
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "Session sweeper task failed");
    }
    result
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
