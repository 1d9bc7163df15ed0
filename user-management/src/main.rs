use service_core::error::AppError;
use service_core::http::RetryConfig;
use service_core::observability::{init_metrics, init_tracing};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use user_management::{
    build_router,
    config::{StoreBackend, UserManagementConfig},
    db,
    services::{
        AccessInvitationsService, BaseUrlLinkGenerator, BlacklistEmailValidator,
        BuiltinTemplates, CloudControllerClient, InvitationsService, MessageService,
        MockMessageService, RegistrationOrchestrator, SecurityCodeService, SmtpMessageService,
        UaaClient, UaaTokenProvider,
    },
    store::{
        AccessInvitationsStore, InMemoryAccessInvitationsStore, InMemorySecurityCodeStore,
        PgAccessInvitationsStore, PgSecurityCodeStore, SecurityCodeStore,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Fail fast on invalid configuration
    let config = UserManagementConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );
    init_metrics().map_err(|e| AppError::InternalError(e.into()))?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        store = ?config.store,
        "Starting user management service"
    );

    let (code_store, invitation_store, pool): (
        Arc<dyn SecurityCodeStore>,
        Arc<dyn AccessInvitationsStore>,
        _,
    ) = match (&config.store, &config.database) {
        (StoreBackend::Postgres, Some(database)) => {
            let pool = db::create_pool(database).await?;
            db::run_migrations(&pool).await?;
            (
                Arc::new(PgSecurityCodeStore::new(pool.clone())),
                Arc::new(PgAccessInvitationsStore::new(pool.clone())),
                Some(pool),
            )
        }
        (StoreBackend::Postgres, None) => {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_URL is required for the postgres store backend"
            )));
        }
        (StoreBackend::Memory, _) => {
            tracing::warn!("Using in-memory stores; codes and invitations are lost on restart");
            (
                Arc::new(InMemorySecurityCodeStore::new()),
                Arc::new(InMemoryAccessInvitationsStore::new()),
                None,
            )
        }
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.upstream.timeout_seconds))
        .build()
        .map_err(|e| AppError::InternalError(e.into()))?;

    let tokens = UaaTokenProvider::new(http.clone(), &config.uaa);
    let identity = Arc::new(UaaClient::new(http.clone(), &config.uaa, tokens.clone()));
    let platform = Arc::new(CloudControllerClient::new(
        http,
        &config.cloud_controller,
        tokens,
        RetryConfig::with_max_retries(config.upstream.max_retries),
    ));

    let messages: Arc<dyn MessageService> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMessageService::new(smtp)?),
        None => {
            tracing::warn!("SMTP_HOST not set; invitation emails are captured, not sent");
            Arc::new(MockMessageService::new())
        }
    };

    let codes = SecurityCodeService::new(
        code_store,
        chrono::Duration::hours(config.registration.security_code_expiry_hours),
    );
    let access_invitations = AccessInvitationsService::new(invitation_store);

    let invitations = InvitationsService::new(
        codes.clone(),
        access_invitations.clone(),
        Arc::new(BlacklistEmailValidator::new(
            &config.registration.forbidden_domains,
        )),
        messages,
        Arc::new(BuiltinTemplates::new()),
        config.registration.platform_name.clone(),
    );
    let registrations = RegistrationOrchestrator::new(
        codes,
        access_invitations,
        identity,
        platform,
        config.registration.password_min_length,
    );

    let state = AppState {
        config: config.clone(),
        registrations,
        invitations,
        links: Arc::new(BaseUrlLinkGenerator::new(
            config.registration.invitation_base_url.clone(),
        )),
        db: pool,
    };
    let app = build_router(state);

    let addr: SocketAddr = config
        .common
        .bind_address()
        .parse()
        .map_err(|e: std::net::AddrParseError| AppError::ConfigError(e.into()))?;

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let grace = Duration::from_secs(config.common.shutdown_grace_seconds);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tokio::spawn(async move {
                tokio::time::sleep(grace).await;
                tracing::warn!("Shutdown grace period elapsed with requests still in flight");
                std::process::exit(1);
            });
        })
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
