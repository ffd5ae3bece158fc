use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    commands: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub commands: usize,
    pub checked_at: String,
}

pub fn router(commands: usize) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { commands })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let ready = state.commands > 0;
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        commands: state.commands,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_registered_command_count() {
        let (status, Json(payload)) = health(State(HealthState { commands: 1 })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.commands, 1);
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.checked_at).is_ok());
    }

    #[tokio::test]
    async fn health_is_degraded_without_commands() {
        let (status, Json(payload)) = health(State(HealthState { commands: 0 })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
    }
}
