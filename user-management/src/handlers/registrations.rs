//! Registration endpoints used by the console's "new account" page.

use axum::extract::{Json, Path, Query, State};
use service_core::error::AppError;

use crate::dtos::registration::{RegistrationQuery, RegistrationResponse};
#[allow(unused_imports)] // referenced by name in #[utoipa::path] response bodies
use crate::dtos::ErrorResponse;
use crate::models::{Invitation, RegistrationRequest};
use crate::services::ServiceError;
use crate::AppState;

/// Register an invited user.
///
/// POST /rest/registrations?code=...
#[utoipa::path(
    post,
    path = "/rest/registrations",
    params(RegistrationQuery),
    request_body = RegistrationRequest,
    responses(
        (status = 200, description = "Account created", body = RegistrationResponse),
        (status = 400, description = "Missing or invalid code, weak password, or no pending invitation", body = ErrorResponse),
        (status = 409, description = "Account already exists", body = ErrorResponse),
        (status = 502, description = "Upstream rejected the request", body = ErrorResponse),
        (status = 503, description = "Upstream unavailable", body = ErrorResponse)
    ),
    tag = "Registrations"
)]
pub async fn register(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
    Json(req): Json<RegistrationRequest>,
) -> Result<Json<RegistrationResponse>, AppError> {
    let code = query.code.unwrap_or_default();
    state.registrations.register(&code, &req).await?;

    Ok(Json(RegistrationResponse { org: req.org }))
}

/// Invitation details for a security code. Does not consume the code.
///
/// GET /rest/registrations/{code}
#[utoipa::path(
    get,
    path = "/rest/registrations/{code}",
    params(("code" = String, Path, description = "Security code from the invitation link")),
    responses(
        (status = 200, description = "Invitation found", body = Invitation),
        (status = 404, description = "Unknown, expired or used code", body = ErrorResponse)
    ),
    tag = "Registrations"
)]
pub async fn get_invitation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Invitation>, AppError> {
    match state.registrations.invitation_details(&code).await {
        Ok(invitation) => Ok(Json(invitation)),
        Err(ServiceError::InvalidSecurityCode(reason)) => {
            tracing::debug!(reason = %reason, "Invitation lookup with unusable code");
            Err(AppError::NotFound(anyhow::anyhow!("Invitation not found")))
        }
        Err(e) => Err(e.into()),
    }
}
