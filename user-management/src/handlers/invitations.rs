use axum::{
    extract::{Json, State},
    http::{HeaderMap, StatusCode},
};
use service_core::error::AppError;

use crate::dtos::invitation::{InviteRequest, InviteResponse};
#[allow(unused_imports)] // referenced by name in #[utoipa::path] response bodies
use crate::dtos::ErrorResponse;
use crate::AppState;

/// Header naming the inviting user, set by the gateway after authentication.
pub const CURRENT_USER_HEADER: &str = "x-current-user";

/// Invite a user by email, optionally granting org/space roles.
///
/// POST /rest/invitations
#[utoipa::path(
    post,
    path = "/rest/invitations",
    request_body = InviteRequest,
    params(("x-current-user" = String, Header, description = "Inviting user")),
    responses(
        (status = 201, description = "Invitation sent", body = InviteResponse),
        (status = 400, description = "Invalid email address or role grant", body = ErrorResponse),
        (status = 500, description = "Failed to send invitation", body = ErrorResponse)
    ),
    tag = "Invitations"
)]
pub async fn create_invitation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<InviteRequest>,
) -> Result<(StatusCode, Json<InviteResponse>), AppError> {
    let current_user = headers
        .get(CURRENT_USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::BadRequest(anyhow::anyhow!("{} header is required", CURRENT_USER_HEADER))
        })?
        .to_string();

    let (email, grants) = req.into_grants();
    let invitation_link = state
        .invitations
        .invite_user(&email, &current_user, grants, state.links.as_ref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            email,
            invitation_link,
        }),
    ))
}
