// Per-request authentication: verify, refresh once, resolve the local user

use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{unverified_username, IdentityProvider, TokenVerifier};
use crate::errors::AuthError;
use crate::models::{CognitoClaims, User};
use crate::storage::UserStore;
use crate::telemetry;

/// Credentials found on an incoming request
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenSource<'a> {
    pub bearer: Option<&'a str>,
    pub id_token_cookie: Option<&'a str>,
    pub refresh_token_cookie: Option<&'a str>,
}

impl<'a> TokenSource<'a> {
    /// Bearer header wins over the cookie
    pub fn id_token(&self) -> Option<&'a str> {
        self.bearer
            .or(self.id_token_cookie)
            .filter(|token| !token.is_empty())
    }
}

/// Result of authenticating one request
#[derive(Debug, Clone, Default)]
pub struct Authentication {
    pub user: Option<User>,
    pub claims: Option<CognitoClaims>,
    /// Set when the id token was silently renewed
    pub refreshed_id_token: Option<String>,
}

impl Authentication {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Token verification and user resolution shared by every request
#[derive(Clone)]
pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    provider: Arc<dyn IdentityProvider>,
    users: Arc<dyn UserStore>,
}

impl Authenticator {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        provider: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            verifier,
            provider,
            users,
        }
    }

    /// Authenticate a request; failures leave it anonymous rather than erroring
    #[instrument(skip(self, source))]
    pub async fn authenticate(&self, source: &TokenSource<'_>) -> Authentication {
        let Some(token) = source.id_token() else {
            return Authentication::anonymous();
        };

        let (claims, refreshed_id_token) = match self.verify(token).await {
            Ok(claims) => (claims, None),
            Err(e) => {
                info!(error = %e, "Token verification failed");
                let Some(refresh_token) = source.refresh_token_cookie.filter(|t| !t.is_empty())
                else {
                    return Authentication::anonymous();
                };
                match self.refresh_and_verify(token, refresh_token).await {
                    Some((claims, new_token)) => (claims, Some(new_token)),
                    None => return Authentication::anonymous(),
                }
            }
        };

        // Claims stay attached even when no local user can be resolved
        let user = self.get_or_create_user(&claims).await;

        Authentication {
            user,
            claims: Some(claims),
            refreshed_id_token,
        }
    }

    /// Verify one id token, recording the outcome
    pub async fn verify(&self, token: &str) -> Result<CognitoClaims, AuthError> {
        let result = self.verifier.verify(token).await;
        let outcome = match &result {
            Ok(_) => "valid",
            Err(AuthError::TokenExpired) => "expired",
            Err(_) => "invalid",
        };
        telemetry::record_token_verification(outcome);
        result
    }

    async fn refresh_and_verify(
        &self,
        rejected_id_token: &str,
        refresh_token: &str,
    ) -> Option<(CognitoClaims, String)> {
        let new_token = self.refresh(rejected_id_token, refresh_token).await?;
        match self.verify(&new_token).await {
            Ok(claims) => Some((claims, new_token)),
            Err(e) => {
                warn!(error = %e, "Refreshed token failed verification");
                None
            }
        }
    }

    /// Exchange the refresh token for a new id token
    ///
    /// The username comes from the rejected id token, read without verification.
    #[instrument(skip(self, rejected_id_token, refresh_token))]
    pub async fn refresh(&self, rejected_id_token: &str, refresh_token: &str) -> Option<String> {
        let Some(username) = unverified_username(rejected_id_token) else {
            warn!("No username in id token, cannot refresh");
            telemetry::record_token_refresh(false);
            return None;
        };

        match self.provider.refresh_tokens(&username, refresh_token).await {
            Ok(result) => {
                info!(username = %username, "Token refreshed");
                telemetry::record_token_refresh(true);
                Some(result.id_token)
            }
            Err(e) => {
                info!(username = %username, error = %e, "Token refresh failed");
                telemetry::record_token_refresh(false);
                None
            }
        }
    }

    /// Find the local user for the claims, creating it on first sight
    #[instrument(skip(self, claims))]
    pub async fn get_or_create_user(&self, claims: &CognitoClaims) -> Option<User> {
        let Some(new_user) = claims.to_new_user() else {
            warn!("Token claims lack username or email");
            return None;
        };
        let username = new_user.username.clone();

        match self.users.get_or_create(new_user).await {
            Ok((user, created)) => {
                if created {
                    info!(user_id = %user.id, username = %username, "Created user from token claims");
                }
                Some(user)
            }
            Err(e) => {
                error!(username = %username, error = %e, "Failed to resolve user");
                None
            }
        }
    }
}
