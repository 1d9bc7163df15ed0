use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::AppState;

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let database = match &state.db {
        Some(pool) => {
            crate::db::health_check(pool).await.map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                AppError::from(e)
            })?;
            "up"
        }
        None => "in-memory",
    };

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": database
        }
    })))
}
