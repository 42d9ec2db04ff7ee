//! HTTP surface of the portal

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::{AppState, error::PortalError, middleware::require_admin};

pub mod advising;
pub mod user;

/// `?email=` query shared by the read routes
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

impl EmailQuery {
    pub fn required(&self) -> Result<&str, PortalError> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err(PortalError::Validation("Email is required".to_string()));
        }
        Ok(email)
    }
}

/// Create the portal router
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let admin = advising::admin_router().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_admin,
    ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(user::router())
        .merge(advising::router())
        .merge(admin)
        .fallback(not_found)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin {}: {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "status": 200,
        "message": "Course advising portal API is running",
    }))
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match &state.db_pool {
        Some(pool) => match common::database::health_check(pool).await {
            Ok(true) => "connected",
            _ => "unavailable",
        },
        None => "not configured",
    };

    let (status, label) = if database == "unavailable" {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    } else {
        (StatusCode::OK, "ok")
    };

    (
        status,
        Json(json!({
            "status": label,
            "service": "portal",
            "database": database,
        })),
    )
}

async fn not_found() -> impl IntoResponse {
    PortalError::NotFound("Route not found".to_string())
}
