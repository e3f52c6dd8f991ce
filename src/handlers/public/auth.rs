use axum::{extract::State, Json};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users_service::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, Session, SignupRequest,
};

/// POST /auth/signup - Create an account and receive a session token
pub async fn signup(State(state): State<AppState>, Json(body): Json<SignupRequest>) -> ApiResult<Session> {
    let session = state.users().signup(body).await?;
    Ok(ApiResponse::created(session).with_message("Account created"))
}

/// POST /auth/login - Exchange e-mail and password for a session token
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> ApiResult<Session> {
    let session = state.users().login(body).await?;
    Ok(ApiResponse::success(session))
}

/// POST /auth/forgot-password - Mail a reset link. Answers the same for unknown addresses.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> ApiResult<()> {
    state.users().forgot_password(body).await?;
    Ok(ApiResponse::success(()).with_message("If the address has an account, a reset link is on its way"))
}

/// POST /auth/reset-password - Set a new password from a reset link token
pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> ApiResult<()> {
    if body.token.trim().is_empty() {
        return Err(ApiError::bad_request("reset token is missing"));
    }
    state.users().reset_password(body).await?;
    Ok(ApiResponse::success(()).with_message("Password updated"))
}
