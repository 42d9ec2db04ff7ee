//! Account routes under `/user`

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{ConnectInfo, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
};
use axum_extra::extract::WithRejection;
use serde::Deserialize;
use serde_json::json;

use super::EmailQuery;
use crate::{
    AppState,
    error::PortalError,
    services::{ProfileChanges, Registration},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/user/verify-otp", post(verify_otp))
        .route("/user/forgot", post(forgot_password))
        .route("/user/forgot-password", post(forgot_password))
        .route("/user/reset-password", post(reset_password))
        .route("/user/change-password", put(change_password))
        .route("/user/profile", get(profile))
        .route("/user/update-profile", put(update_profile))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(alias = "recaptchaToken", alias = "g-recaptcha-response")]
    pub recaptcha: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<RegisterRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    state
        .auth
        .register(Registration {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok(Json(json!({ "message": "Registration successful!" })))
}

pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    WithRejection(Json(payload), _): WithRejection<Json<LoginRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let client = connect_info.map(|ConnectInfo(addr)| addr.ip());
    state
        .auth
        .login(
            &payload.email,
            &payload.password,
            payload.recaptcha.as_deref(),
            client,
        )
        .await?;

    Ok(Json(json!({
        "message": "OTP sent to email.",
        "requireOTP": true,
    })))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<VerifyOtpRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let session = state.auth.verify_otp(&payload.email, &payload.otp).await?;

    Ok(Json(json!({
        "message": "OTP verified successfully!",
        "token": session.token,
        "tokenType": "Bearer",
        "expiresIn": session.expires_in,
        "user": {
            "firstName": session.account.first_name,
            "lastName": session.account.last_name,
            "email": session.account.email,
            "isAdmin": session.account.is_admin,
        },
    })))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ForgotPasswordRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    state.auth.request_password_reset(&payload.email).await?;

    Ok(Json(json!({
        "message": "If the email exists, a reset link was sent."
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ResetPasswordRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    state
        .auth
        .reset_password(&payload.token, &payload.new_password)
        .await?;

    Ok(Json(json!({ "message": "Password reset successful." })))
}

pub async fn change_password(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<ChangePasswordRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    state
        .auth
        .change_password(
            &payload.email,
            &payload.current_password,
            &payload.new_password,
        )
        .await?;

    Ok(Json(json!({ "message": "Password updated successfully." })))
}

pub async fn profile(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<EmailQuery>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    let account = state.auth.get_profile(query.required()?).await?;

    Ok(Json(json!({
        "firstName": account.first_name,
        "lastName": account.last_name,
        "email": account.email,
    })))
}

pub async fn update_profile(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<UpdateProfileRequest>, PortalError>,
) -> Result<impl IntoResponse, PortalError> {
    state
        .auth
        .update_profile(
            &payload.email,
            ProfileChanges {
                first_name: payload.first_name,
                last_name: payload.last_name,
                password: payload.password,
            },
        )
        .await?;

    Ok(Json(json!({ "message": "Profile updated successfully." })))
}
