use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use common::{
    database::{self, DatabaseConfig},
    error::DatabaseError,
    keepalive,
};
use portal::{
    AppState,
    captcha::RecaptchaVerifier,
    config::PortalConfig,
    jwt::{JwtConfig, JwtService},
    notifications::{EmailSender, LogEmailSender, Notifier, RetryPolicy, SmtpEmailSender},
    rate_limiter::RateLimiter,
    repositories::{PgAccountStore, PgAdvisingStore},
    routes,
    services::{AdvisingService, AuthService, AuthSettings},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal=info,common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting advising portal");

    let config = PortalConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;
    info!("Database migrations applied");

    let scheduler = keepalive::start_keepalive(pool.clone(), &config.keepalive_schedule).await?;

    let sender: Arc<dyn EmailSender> = match &config.smtp_url {
        Some(url) => Arc::new(SmtpEmailSender::from_url(url, &config.mail_from)?),
        None => {
            warn!("PORTAL_SMTP_URL not set, outgoing email will only be logged");
            Arc::new(LogEmailSender)
        }
    };
    let (notifier, _delivery) = Notifier::spawn(sender, RetryPolicy::default());

    let jwt = JwtService::new(JwtConfig {
        secret: config.jwt_secret.clone(),
        token_expiry: config.jwt_ttl_seconds,
    })?;

    let accounts = Arc::new(PgAccountStore::new(pool.clone()));
    let advising = Arc::new(PgAdvisingStore::new(pool.clone()));

    let auth = AuthService::new(
        accounts.clone(),
        Arc::new(RecaptchaVerifier::new(
            config.recaptcha_secret.clone(),
            config.recaptcha_verify_url.clone(),
        )),
        notifier.clone(),
        jwt,
        RateLimiter::default(),
        AuthSettings {
            otp_ttl: chrono::Duration::seconds(config.otp_ttl_seconds),
            min_password_length: config.min_password_length,
            reset_link_base: config.reset_link_base.clone(),
        },
    );
    let advising = AdvisingService::new(accounts, advising, notifier);

    let state = AppState {
        auth,
        advising,
        db_pool: Some(pool),
    };
    let app = routes::create_router(state, &config.cors_origins);

    let address = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Advising portal listening on {}", address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let mut scheduler = scheduler;
    if let Err(e) = scheduler.shutdown().await {
        warn!("Failed to stop keep-alive scheduler: {}", e);
    }

    info!("Advising portal stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
