// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Sweeper
//!
//! Background task that purges session rows long past their expiry. Expired
//! sessions are already rejected by token verification, so the sweep only
//! bounds storage growth; a purged session and a revoked session look the
//! same to `verify`.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::repository::SessionRepository;

/// Default interval between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Default time an expired session is kept before it is purged.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Background sweeper over a session repository.
pub struct SessionSweeper {
    sessions: Arc<dyn SessionRepository>,
    interval: Duration,
    retention: Duration,
}

impl SessionSweeper {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions,
            interval: DEFAULT_SWEEP_INTERVAL,
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Run the sweeper loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            retention_secs = self.retention.as_secs(),
            "Session sweeper starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("Session sweeper shutting down");
                return;
            }

            self.sweep_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Session sweeper shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one sweep. Failures are logged and retried on the next tick.
    async fn sweep_step(&self) {
        let sessions = Arc::clone(&self.sessions);
        let retention =
            chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(retention)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        match tokio::task::spawn_blocking(move || sessions.purge_expired(cutoff)).await {
            Ok(Ok(0)) => debug!("Session sweeper: nothing to purge"),
            Ok(Ok(purged)) => info!(purged, "Session sweeper: purged expired sessions"),
            Ok(Err(e)) => warn!(error = %e, "Session sweep failed, will retry"),
            Err(e) => warn!(error = %e, "Session sweep task panicked, will retry"),
        }
    }
}
