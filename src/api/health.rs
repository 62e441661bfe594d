// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Health routes. They are merged next to the pipeline, so no token, policy or
//! renderer is involved.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::storage::Database;

/// Result of one dependency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Unavailable,
}

/// Readiness report.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthReport {
    /// "ok" when every check passed, otherwise "degraded"
    pub status: String,
    /// A write committed and read back from the database
    pub database: CheckStatus,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LiveResponse {
    pub status: String,
}

pub fn router(database: Database) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .with_state(database)
}

async fn ping(database: Database) -> CheckStatus {
    match tokio::task::spawn_blocking(move || database.new_session().ping()).await {
        Ok(Ok(())) => CheckStatus::Ok,
        Ok(Err(e)) => {
            warn!(error = %e, "Database health check failed");
            CheckStatus::Unavailable
        }
        Err(e) => {
            warn!(error = %e, "Database health check task failed");
            CheckStatus::Unavailable
        }
    }
}

/// Readiness: 200 when the database answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Ready to serve", body = HealthReport),
        (status = 503, description = "A dependency is down", body = HealthReport)
    )
)]
pub async fn health(State(database): State<Database>) -> (StatusCode, Json<HealthReport>) {
    let database = ping(database).await;
    let healthy = database == CheckStatus::Ok;

    let report = HealthReport {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        database,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// Liveness: the process is up. Dependencies are not consulted.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses((status = 200, description = "Process is running", body = LiveResponse))
)]
pub async fn liveness() -> Json<LiveResponse> {
    Json(LiveResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    #[tokio::test]
    async fn liveness_needs_nothing() {
        let app = router(Database::in_memory().unwrap());
        let response = app
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_reports_database() {
        let app = router(Database::in_memory().unwrap());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let report: HealthReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.status, "ok");
        assert_eq!(report.database, CheckStatus::Ok);
    }
}
