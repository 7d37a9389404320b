use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppState;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogCheck {
    pub status: &'static str,
    pub entries: usize,
    pub fingerprint: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OracleCheck {
    pub mode: &'static str,
    pub model: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub catalog: CatalogCheck,
    pub oracle: OracleCheck,
    pub checked_at: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = !state.catalog.is_empty();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "pricelens-server runtime initialized".to_string(),
        },
        catalog: CatalogCheck {
            status: if ready { "ready" } else { "empty" },
            entries: state.catalog.len(),
            fingerprint: state.catalog.fingerprint().to_string(),
        },
        oracle: OracleCheck {
            mode: state.oracle_mode(),
            model: state.oracle.as_ref().map(|oracle| oracle.model_name().to_string()),
        },
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
