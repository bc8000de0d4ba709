// Mock identity provider and token verifier for local development

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::instrument;

use super::{IdentityProvider, TokenVerifier};
use crate::errors::{AuthError, ProviderError};
use crate::models::{AuthenticationResult, CognitoClaims, SignUpRequest, SignUpResult};

pub const MOCK_ID_TOKEN_PREFIX: &str = "mock-id-";
pub const MOCK_ACCESS_TOKEN_PREFIX: &str = "mock-access-";
pub const MOCK_REFRESH_TOKEN_PREFIX: &str = "mock-refresh-";

pub const MOCK_TOKEN_LIFETIME_SECONDS: i64 = 3600;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// bcrypt cost used for mock passwords; the minimum bcrypt accepts
const MOCK_BCRYPT_COST: u32 = 4;

pub fn is_mock_id_token(token: &str) -> bool {
    token.starts_with(MOCK_ID_TOKEN_PREFIX)
}

fn encode_claims(prefix: &str, claims: &serde_json::Value) -> String {
    format!("{}{}", prefix, STANDARD.encode(claims.to_string()))
}

fn decode_payload(prefix: &str, token: &str) -> Result<CognitoClaims, AuthError> {
    let payload = token
        .strip_prefix(prefix)
        .ok_or_else(|| AuthError::InvalidToken("Invalid mock token format".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| AuthError::InvalidToken(format!("Invalid mock token encoding: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::InvalidToken(format!("Invalid mock token payload: {}", e)))
}

/// Decode the claims of a `mock-id-*` token
pub fn decode_mock_token(token: &str) -> Result<CognitoClaims, AuthError> {
    decode_payload(MOCK_ID_TOKEN_PREFIX, token)
}

/// Mint the token set the mock provider hands out on login
pub fn issue_tokens(
    username: &str,
    email: &str,
    given_name: &str,
    family_name: &str,
) -> AuthenticationResult {
    let now = Utc::now();
    let claims = serde_json::json!({
        "sub": format!("mock-{}-sub", username),
        "cognito:username": username,
        "email": email,
        "email_verified": "true",
        "given_name": given_name,
        "family_name": family_name,
        "iss": "mock",
        "token_use": "id",
        "iat": now.timestamp(),
        "exp": (now + Duration::seconds(MOCK_TOKEN_LIFETIME_SECONDS)).timestamp(),
    });

    AuthenticationResult {
        id_token: encode_claims(MOCK_ID_TOKEN_PREFIX, &claims),
        access_token: encode_claims(MOCK_ACCESS_TOKEN_PREFIX, &claims),
        refresh_token: Some(encode_claims(MOCK_REFRESH_TOKEN_PREFIX, &claims)),
        expires_in: MOCK_TOKEN_LIFETIME_SECONDS,
        token_type: "Bearer".to_string(),
    }
}

/// Accepts `mock-id-{base64(json)}` tokens
#[derive(Debug, Clone, Default)]
pub struct MockTokenVerifier;

impl MockTokenVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TokenVerifier for MockTokenVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<CognitoClaims, AuthError> {
        let claims = decode_mock_token(token)?;
        if let Some(exp) = claims.exp {
            if exp < Utc::now().timestamp() {
                return Err(AuthError::TokenExpired);
            }
        }
        Ok(claims)
    }
}

#[derive(Debug, Clone)]
struct MockUser {
    password_hash: String,
    email: String,
    given_name: String,
    family_name: String,
    confirmed: bool,
}

/// In-memory identity provider mimicking the user pool's behaviour
pub struct MockIdentityProvider {
    users: RwLock<HashMap<String, MockUser>>,
    auto_confirm: bool,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Empty provider that confirms new users immediately
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            auto_confirm: true,
        }
    }

    /// Provider seeded with `testuser` / `TestPass123!`
    pub fn with_test_user() -> Result<Self, ProviderError> {
        let mut users = HashMap::new();
        users.insert(
            "testuser".to_string(),
            MockUser {
                password_hash: hash_password("TestPass123!")?,
                email: "test@example.com".to_string(),
                given_name: "Test".to_string(),
                family_name: "User".to_string(),
                confirmed: true,
            },
        );
        Ok(Self {
            users: RwLock::new(users),
            auto_confirm: true,
        })
    }

    /// New sign-ups stay unconfirmed until `confirm_sign_up`
    pub fn without_auto_confirm(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    pub async fn user_exists(&self, username: &str) -> bool {
        self.users.read().await.contains_key(username)
    }
}

fn hash_password(password: &str) -> Result<String, ProviderError> {
    bcrypt::hash(password, MOCK_BCRYPT_COST).map_err(|e| ProviderError::Service {
        kind: "InternalErrorException".to_string(),
        message: format!("Password hashing failed: {}", e),
    })
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResult, ProviderError> {
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ProviderError::InvalidPassword(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let password_hash = hash_password(&request.password)?;
        let mut users = self.users.write().await;
        if users.contains_key(&request.username) {
            return Err(ProviderError::UsernameExists(
                "User already exists".to_string(),
            ));
        }

        users.insert(
            request.username.clone(),
            MockUser {
                password_hash,
                email: request.email.clone(),
                given_name: request.given_name.clone().unwrap_or_default(),
                family_name: request.family_name.clone().unwrap_or_default(),
                confirmed: self.auto_confirm,
            },
        );

        tracing::info!(username = %request.username, "Mock user signed up");
        Ok(SignUpResult {
            user_sub: format!("mock-{}-sub", request.username),
            user_confirmed: self.auto_confirm,
        })
    }

    #[instrument(skip(self, _code))]
    async fn confirm_sign_up(&self, username: &str, _code: &str) -> Result<(), ProviderError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(username)
            .ok_or_else(|| ProviderError::UserNotFound("User does not exist.".to_string()))?;
        user.confirmed = true;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError> {
        let users = self.users.read().await;
        let user = users
            .get(username)
            .ok_or_else(|| ProviderError::UserNotFound("User does not exist.".to_string()))?;
        if user.confirmed {
            return Err(ProviderError::InvalidParameter(
                "User is already confirmed.".to_string(),
            ));
        }
        tracing::info!(username = %username, "Mock confirmation code resent");
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, ProviderError> {
        let users = self.users.read().await;
        let user = users
            .get(username)
            .ok_or_else(|| ProviderError::UserNotFound("User does not exist.".to_string()))?;

        let valid = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
        if !valid {
            return Err(ProviderError::NotAuthorized(
                "Incorrect username or password.".to_string(),
            ));
        }
        if !user.confirmed {
            return Err(ProviderError::UserNotConfirmed(
                "User is not confirmed.".to_string(),
            ));
        }

        Ok(issue_tokens(
            username,
            &user.email,
            &user.given_name,
            &user.family_name,
        ))
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_tokens(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<AuthenticationResult, ProviderError> {
        let invalid = || ProviderError::NotAuthorized("Invalid Refresh Token".to_string());

        let claims =
            decode_payload(MOCK_REFRESH_TOKEN_PREFIX, refresh_token).map_err(|_| invalid())?;
        let token_user = claims.username.ok_or_else(invalid)?;
        if token_user != username {
            return Err(invalid());
        }

        let users = self.users.read().await;
        let user = users
            .get(username)
            .ok_or_else(|| ProviderError::UserNotFound("User does not exist.".to_string()))?;

        let mut result = issue_tokens(username, &user.email, &user.given_name, &user.family_name);
        // The refresh flow never rotates the refresh token
        result.refresh_token = None;
        Ok(result)
    }
}
