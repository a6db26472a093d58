/// Account endpoints backed by the identity provider
///
/// Credentials never touch this service's database: signup and password
/// reset are forwarded to the identity provider, which sends the emails.
///
/// # Endpoints
///
/// - `POST /api/v1/auth/signup` - Register an account (no tenant yet)
/// - `POST /api/v1/auth/forgot-password` - Trigger a password reset email
/// - `POST /api/v1/auth/complete-invite` - Set password and accept terms after an invite

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{PreTermsSession, ValidatedJson},
    routes::MessageResponse,
};
use axum::{extract::State, http::StatusCode, Json};
use saaskit_shared::models::user::User;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

/// Signup request
#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

/// Forgot-password request
#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Invite completion request
#[derive(Debug, Deserialize, Validate)]
pub struct CompleteInviteRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub terms_accepted: bool,
}

/// Register a new account
///
/// The identity provider sends a confirmation email. Onboarding creates the
/// tenant and profile afterwards.
///
/// # Errors
///
/// - `400 Bad Request`: The provider rejected the signup (e.g. email taken)
/// - `422 Unprocessable Entity`: Invalid email or short password
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    state.identity.sign_up(&req.email, &req.password).await?;
    info!(email = %req.email, "Signup requested");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "Signup successful. Please check your email to confirm your account.",
        )),
    ))
}

/// Request a password reset email
///
/// Always answers with the same message so the endpoint can't be used to
/// probe for accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if let Err(e) = state.identity.send_password_reset(&req.email).await {
        warn!(error = %e, "Password reset request failed");
    }

    Ok(Json(MessageResponse::new(
        "If an account with this email exists, a password reset link has been sent.",
    )))
}

/// Complete an invited account
///
/// The caller authenticates with the token from the invite link, which
/// admits them before they have accepted the Terms of Service.
///
/// # Errors
///
/// - `400 Bad Request`: Terms not accepted, or the account is already set up
/// - `404 Not Found`: No profile for the caller
/// - `500 Internal Server Error`: The provider refused the password
pub async fn complete_invite(
    State(state): State<AppState>,
    PreTermsSession(mut session): PreTermsSession,
    ValidatedJson(req): ValidatedJson<CompleteInviteRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if !req.terms_accepted {
        return Err(ApiError::BadRequest(
            "You must accept the Terms and Conditions to complete your account setup.".to_string(),
        ));
    }

    let profile = User::find_by_id(&mut session.tx, session.user.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User profile not found.".to_string()))?;

    if profile.has_accepted_terms() {
        return Err(ApiError::BadRequest("Account has already been set up.".to_string()));
    }

    state
        .identity
        .update_password(profile.id, &req.password)
        .await
        .map_err(|e| {
            warn!(user_id = %profile.id, error = %e, "Could not set password at the identity provider");
            ApiError::InternalError("Could not update user password.".to_string())
        })?;

    User::accept_terms(&mut session.tx, profile.id).await?;
    session.commit().await?;

    info!(user_id = %profile.id, "Invited user completed account setup");

    Ok(Json(MessageResponse::new("Account setup complete. You can now log in.")))
}
