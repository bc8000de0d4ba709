// Account endpoints backed by the identity provider

use axum::{
    extract::{FromRequest, Request, State},
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use axum_extra::extract::cookie::{CookieJar, SameSite};
use chrono::{DateTime, Utc};
use common::errors::ProviderError;
use common::models::{AuthenticationResult, SignUpRequest, User};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cookies::{self, ID_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::middleware::{CurrentUser, RequireStaff, RequireUser};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub id_token: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

impl From<AuthenticationResult> for TokenResponse {
    fn from(result: AuthenticationResult) -> Self {
        Self {
            id_token: result.id_token,
            access_token: result.access_token,
            refresh_token: result.refresh_token,
            expires_in: result.expires_in,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
}

#[derive(Debug, Serialize)]
pub struct SignupResponse {
    pub message: String,
    pub user_sub: String,
    pub user_confirmed: bool,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendCodeRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub short_name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub cognito_username: Option<String>,
    pub cognito_claims: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined: user.date_joined,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub count: usize,
    pub users: Vec<UserSummary>,
}

// ============================================================================
// Provider error translation
// ============================================================================

fn login_error(err: ProviderError) -> ErrorResponse {
    match err {
        ProviderError::NotAuthorized(_) => {
            ErrorResponse::new("unauthorized", "Incorrect username or password")
        }
        ProviderError::UserNotFound(_) => ErrorResponse::new("not_found", "User not found"),
        ProviderError::UserNotConfirmed(_) => ErrorResponse::new(
            "forbidden",
            "User is not confirmed. Please check your email for confirmation code.",
        ),
        ProviderError::InvalidParameter(msg) => ErrorResponse::new("validation_error", msg),
        other => ErrorResponse::new("internal_error", other.to_string()),
    }
}

fn signup_error(err: ProviderError) -> ErrorResponse {
    match err {
        ProviderError::UsernameExists(_) => {
            ErrorResponse::new("conflict", "Username already exists")
        }
        ProviderError::InvalidPassword(msg) => {
            ErrorResponse::new("validation_error", format!("Invalid password: {}", msg))
        }
        ProviderError::InvalidParameter(msg) => ErrorResponse::new("validation_error", msg),
        other => ErrorResponse::new("internal_error", other.to_string()),
    }
}

fn confirm_error(err: ProviderError) -> ErrorResponse {
    match err {
        ProviderError::CodeMismatch(_) => {
            ErrorResponse::new("validation_error", "Invalid verification code")
        }
        ProviderError::ExpiredCode(_) => {
            ErrorResponse::new("validation_error", "Verification code has expired")
        }
        ProviderError::NotAuthorized(msg) => {
            ErrorResponse::new("unauthorized", format!("User cannot be confirmed: {}", msg))
        }
        ProviderError::UserNotFound(msg) => {
            ErrorResponse::new("not_found", format!("User not found: {}", msg))
        }
        ProviderError::InvalidParameter(msg) => ErrorResponse::new("validation_error", msg),
        other => ErrorResponse::new("internal_error", format!("Confirmation failed: {}", other)),
    }
}

fn resend_error(err: ProviderError) -> ErrorResponse {
    match err {
        ProviderError::UserNotFound(_) => ErrorResponse::new("not_found", "User not found"),
        ProviderError::InvalidParameter(_) => {
            ErrorResponse::new("validation_error", "User is already confirmed")
        }
        other => ErrorResponse::new("internal_error", other.to_string()),
    }
}

fn log_provider_error(operation: &str, username: &str, err: &ProviderError) {
    tracing::warn!(
        operation = %operation,
        username = %username,
        error_type = %err.exception_name(),
        error = %err,
        "Identity provider call failed"
    );
}

async fn authenticate(
    state: &AppState,
    request: &LoginRequest,
) -> Result<AuthenticationResult, ErrorResponse> {
    if request.username.is_empty() || request.password.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Username and password required",
        ));
    }

    state
        .identity
        .initiate_auth(&request.username, &request.password)
        .await
        .map_err(|e| {
            log_provider_error("login", &request.username, &e);
            login_error(e)
        })
}

// ============================================================================
// JSON API
// ============================================================================

/// Username/password login returning the token set
#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn api_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<SuccessResponse<TokenResponse>, ErrorResponse> {
    let result = authenticate(&state, &request).await?;
    tracing::info!(username = %request.username, "User logged in");
    Ok(SuccessResponse::new(result.into()))
}

#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn api_signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<SuccessResponse<SignupResponse>, ErrorResponse> {
    if request.username.is_empty() || request.email.is_empty() || request.password.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Username, email, and password required",
        ));
    }

    let sign_up = SignUpRequest {
        username: request.username.clone(),
        password: request.password,
        email: request.email,
        given_name: Some(request.given_name),
        family_name: Some(request.family_name),
    };

    let result = state.identity.sign_up(&sign_up).await.map_err(|e| {
        log_provider_error("signup", &request.username, &e);
        signup_error(e)
    })?;

    Ok(SuccessResponse::new(SignupResponse {
        message: "User created successfully".to_string(),
        user_sub: result.user_sub,
        user_confirmed: result.user_confirmed,
        username: request.username,
    }))
}

#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn api_confirm(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Result<SuccessResponse<MessageResponse>, ErrorResponse> {
    if request.username.is_empty() || request.code.is_empty() {
        return Err(ErrorResponse::new(
            "validation_error",
            "Username and confirmation code required",
        ));
    }

    state
        .identity
        .confirm_sign_up(&request.username, &request.code)
        .await
        .map_err(|e| {
            log_provider_error("confirm", &request.username, &e);
            confirm_error(e)
        })?;

    Ok(SuccessResponse::new(MessageResponse {
        message: "Account confirmed successfully".to_string(),
    }))
}

#[tracing::instrument(skip(state, request), fields(username = %request.username))]
pub async fn api_resend_code(
    State(state): State<AppState>,
    Json(request): Json<ResendCodeRequest>,
) -> Result<SuccessResponse<MessageResponse>, ErrorResponse> {
    if request.username.is_empty() {
        return Err(ErrorResponse::new("validation_error", "Username required"));
    }

    state
        .identity
        .resend_confirmation_code(&request.username)
        .await
        .map_err(|e| {
            log_provider_error("resend_code", &request.username, &e);
            resend_error(e)
        })?;

    Ok(SuccessResponse::new(MessageResponse {
        message: "Confirmation code resent successfully".to_string(),
    }))
}

/// Profile of the authenticated user with the claims it was resolved from
#[tracing::instrument(skip_all)]
pub async fn current_user(
    RequireUser(user): RequireUser,
    current: CurrentUser,
) -> Result<SuccessResponse<CurrentUserResponse>, ErrorResponse> {
    let claims = current
        .claims
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| ErrorResponse::new("internal_error", e.to_string()))?;

    Ok(SuccessResponse::new(CurrentUserResponse {
        full_name: user.full_name(),
        short_name: user.short_name().to_string(),
        email: user.email,
        first_name: user.first_name,
        last_name: user.last_name,
        is_staff: user.is_staff,
        is_superuser: user.is_superuser,
        cognito_username: current.claims.and_then(|c| c.username),
        cognito_claims: claims,
    }))
}

/// All local users (staff only)
#[tracing::instrument(skip_all, fields(username = %staff.username))]
pub async fn user_list(
    State(state): State<AppState>,
    RequireStaff(staff): RequireStaff,
) -> Result<SuccessResponse<UserListResponse>, ErrorResponse> {
    let users = state.users.list().await?;
    Ok(SuccessResponse::new(UserListResponse {
        count: users.len(),
        users: users.into_iter().map(UserSummary::from).collect(),
    }))
}

// ============================================================================
// Browser login / logout
// ============================================================================

/// Login form post (urlencoded or JSON): sets token cookies and redirects home
#[tracing::instrument(skip_all)]
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
) -> Result<Response, ErrorResponse> {
    let secure = cookies::is_secure_request(&state.config, request.headers());
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    let credentials = if is_json {
        Json::<LoginRequest>::from_request(request, &state)
            .await
            .map(|Json(c)| c)
            .map_err(|e| ErrorResponse::new("validation_error", e.body_text()))?
    } else {
        Form::<LoginRequest>::from_request(request, &state)
            .await
            .map(|Form(c)| c)
            .map_err(|e| ErrorResponse::new("validation_error", e.body_text()))?
    };

    let result = authenticate(&state, &credentials).await?;
    tracing::info!(username = %credentials.username, "User logged in via form");

    let mut jar = jar.add(cookies::token_cookie(
        ID_TOKEN_COOKIE,
        result.id_token,
        state.config.auth.id_token_max_age_seconds,
        secure,
        SameSite::Strict,
    ));
    if let Some(refresh_token) = result.refresh_token {
        jar = jar.add(cookies::token_cookie(
            REFRESH_TOKEN_COOKIE,
            refresh_token,
            state.config.auth.refresh_token_max_age_seconds,
            secure,
            SameSite::Strict,
        ));
    }

    Ok((jar, Redirect::to("/")).into_response())
}

/// Clear both token cookies
#[tracing::instrument(skip_all)]
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(cookies::removal_cookie(ID_TOKEN_COOKIE))
        .remove(cookies::removal_cookie(REFRESH_TOKEN_COOKIE));
    (jar, Redirect::to("/"))
}
