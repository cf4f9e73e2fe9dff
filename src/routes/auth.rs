//! Account and session endpoints.

use crate::auth::{
    hash_password, verify_dummy_password, verify_password, AppState, AuthUser, PasswordError,
};
use crate::error::AppError;
use crate::models::{
    AuthResponse, LoginRequest, LogoutRequest, MeResponse, RefreshRequest, SessionsResponse,
    SignupRequest, StoredUser,
};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use zeroize::Zeroizing;

const LOGIN_FAILED: &str = "Invalid email or password";

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    let email = req.email.trim();
    if email.len() > 254 || !email.contains('@') || email.starts_with('@') || email.ends_with('@')
    {
        return Err(AppError::BadRequest("Invalid email".to_string()));
    }

    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(AppError::BadRequest(
            "Username must be 3-32 characters".to_string(),
        ));
    }
    if !req
        .username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::BadRequest(
            "Username may only contain alphanumeric characters, hyphens, and underscores"
                .to_string(),
        ));
    }

    if req.password.len() < MIN_PASSWORD_LEN || req.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be {}-{} characters",
            MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
        )));
    }

    Ok(())
}

/// Argon2 is deliberately slow; keep it off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, PasswordError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {}", e)))?
        .map_err(AppError::from)
}

/// Mint an access token and a new refresh session for `user`.
async fn open_session(state: &AppState, user: &StoredUser) -> Result<AuthResponse, AppError> {
    let access_token = state
        .sessions
        .issue_access(&user.id, &user.email, &user.username)?;
    let issued = state.sessions.issue_session(&user.id).await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: issued.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.sessions.settings().access_ttl.as_secs(),
        user_id: user.id.clone(),
        email: user.email.clone(),
        username: user.username.clone(),
    })
}

/// POST /api/users: Create an account and log it in
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_signup(&req)?;

    let password = Zeroizing::new(req.password);
    let password_hash = run_blocking(move || hash_password(&password)).await?;

    let user = state
        .users
        .create_user(req.email.trim(), &req.username, &password_hash)
        .await?;

    let response = open_session(&state, &user).await?;
    tracing::info!(action = "signup", user_id = %user.id, "Account created");

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/users/login: Exchange credentials for a token pair
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let password = Zeroizing::new(req.password);
    let user = match state.users.find_by_email(req.email.trim()).await? {
        Some(user) => user,
        None => {
            run_blocking(move || verify_dummy_password(&password)).await?;
            tracing::info!(action = "login_failed", reason = "unknown_email", "Login rejected");
            return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
        }
    };

    let stored_hash = user.password_hash.clone();
    let matches = run_blocking(move || verify_password(&password, &stored_hash)).await?;
    if !matches {
        tracing::info!(action = "login_failed", user_id = %user.id, reason = "bad_password", "Login rejected");
        return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
    }

    let response = open_session(&state, &user).await?;
    tracing::info!(action = "login", user_id = %user.id, "User logged in");

    Ok(Json(response))
}

/// POST /api/users/refresh: Rotate a refresh token
///
/// The presented token is dead afterwards, whether or not the response
/// reaches the client.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let rotated = state.sessions.rotate_session(&req.refresh_token).await?;

    // The fresh session must not outlive a failed user lookup
    let user = match state.users.get_user_by_id(&rotated.user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            state
                .sessions
                .revoke_session(&rotated.user_id, &rotated.session_id)
                .await?;
            tracing::warn!(action = "refresh_unknown_user", user_id = %rotated.user_id, "Refresh for missing user");
            return Err(AppError::Unauthorized(
                crate::error::INVALID_TOKEN_MESSAGE.to_string(),
            ));
        }
        Err(err) => {
            if let Err(revoke) = state
                .sessions
                .revoke_session(&rotated.user_id, &rotated.session_id)
                .await
            {
                tracing::error!(action = "refresh_cleanup_failed", user_id = %rotated.user_id, session_id = %rotated.session_id, error = %revoke, "Failed to revoke session after user lookup error");
            }
            return Err(err.into());
        }
    };

    let access_token = state
        .sessions
        .issue_access(&user.id, &user.email, &user.username)?;

    Ok(Json(AuthResponse {
        access_token,
        refresh_token: rotated.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.sessions.settings().access_ttl.as_secs(),
        user_id: user.id,
        email: user.email,
        username: user.username,
    }))
}

/// POST /api/users/logout: End the session behind a refresh token
pub async fn logout(
    State(state): State<AppState>,
    Json(req): Json<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let claims = state.sessions.validate_session(&req.refresh_token).await?;
    state
        .sessions
        .revoke_session(claims.user_id(), claims.session_id())
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/logout-all: End every session of the caller
///
/// Access tokens already handed out stay valid until they expire.
pub async fn logout_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    state.sessions.revoke_all_sessions(user.user_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/users/me: Identity from the access token
pub async fn me(user: AuthUser) -> impl IntoResponse {
    Json(MeResponse {
        user_id: user.user_id().to_string(),
        email: user.email().to_string(),
        username: user.username().to_string(),
    })
}

/// GET /api/users/sessions: Live refresh sessions of the caller
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let sessions = state.sessions.list_sessions(user.user_id()).await?;
    Ok(Json(SessionsResponse { sessions }))
}
