//! Session token checks for administrative routes

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::{AppState, error::PortalError};

/// Require a valid session token whose holder is an administrator
///
/// The validated claims are added to the request extensions.
pub async fn require_admin(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, PortalError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or_else(|| {
        PortalError::Auth("Missing session token.".to_string())
    })?;

    let claims = state.auth.jwt().validate_token(bearer.token())?;

    if !claims.admin {
        warn!("Account {} attempted an administrative action", claims.sub);
        return Err(PortalError::Forbidden(
            "Administrator access required.".to_string(),
        ));
    }

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
