pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod store;

use axum::{
    extract::MatchedPath,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, post},
    Json, Router,
};
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::config::UserManagementConfig;
use crate::services::{InvitationLinkGenerator, InvitationsService, RegistrationOrchestrator};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::registrations::register,
        handlers::registrations::get_invitation,
        handlers::invitations::create_invitation,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::registration::RegistrationResponse,
            dtos::invitation::InviteRequest,
            dtos::invitation::InviteResponse,
            models::RegistrationRequest,
            models::Invitation,
            models::Role,
        )
    ),
    tags(
        (name = "Registrations", description = "Account creation for invited users"),
        (name = "Invitations", description = "Inviting users by email"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: UserManagementConfig,
    pub registrations: RegistrationOrchestrator,
    pub invitations: InvitationsService,
    pub links: Arc<dyn InvitationLinkGenerator>,
    /// Present only with the postgres store backend.
    pub db: Option<PgPool>,
}

pub fn build_router(state: AppState) -> Router {
    let allowed_origins = state
        .config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect::<Vec<HeaderValue>>();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .route("/rest/registrations", post(handlers::register))
        .route("/rest/registrations/:code", get(handlers::get_invitation))
        .route("/rest/invitations", post(handlers::create_invitation))
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");
                // Route template only; registration paths carry security codes.
                let route = request
                    .extensions()
                    .get::<MatchedPath>()
                    .map(MatchedPath::as_str)
                    .unwrap_or("unmatched");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    route = %route,
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static(handlers::invitations::CURRENT_USER_HEADER),
                ]),
        )
}
