// Cognito id token verification against the user pool's JWKS

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, instrument, warn};

use super::{decode_unverified, TokenVerifier};
use crate::config::{AuthConfig, CognitoConfig};
use crate::errors::AuthError;
use crate::models::CognitoClaims;

/// Verifies RS256 id tokens issued by a Cognito user pool
#[derive(Clone)]
pub struct CognitoJwtVerifier {
    issuer: String,
    jwks_url: String,
    client_id: String,
    cache_ttl_seconds: i64,
    cached_keys: Arc<RwLock<Option<CachedJwks>>>,
    http_client: reqwest::Client,
}

#[derive(Debug, Clone)]
struct CachedJwks {
    keys: JwkSet,
    cached_at: chrono::DateTime<Utc>,
    ttl_seconds: i64,
}

impl CachedJwks {
    fn is_fresh(&self) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age.num_seconds() < self.ttl_seconds
    }
}

impl CognitoJwtVerifier {
    /// Create a verifier for an explicit issuer and JWKS location
    pub fn new(
        issuer: impl Into<String>,
        jwks_url: impl Into<String>,
        client_id: impl Into<String>,
        cache_ttl_seconds: i64,
    ) -> Result<Self, AuthError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AuthError::NotConfigured(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            issuer: issuer.into(),
            jwks_url: jwks_url.into(),
            client_id: client_id.into(),
            cache_ttl_seconds,
            cached_keys: Arc::new(RwLock::new(None)),
            http_client,
        })
    }

    /// Build from configuration; fails when the pool or client id is missing
    pub fn from_config(cognito: &CognitoConfig, auth: &AuthConfig) -> Result<Self, AuthError> {
        if !cognito.is_configured() {
            return Err(AuthError::NotConfigured(
                "Cognito user_pool_id and client_id must be set".to_string(),
            ));
        }
        let issuer = cognito
            .issuer()
            .ok_or_else(|| AuthError::NotConfigured("Cognito issuer unknown".to_string()))?;
        let jwks_url = cognito
            .jwks_url()
            .ok_or_else(|| AuthError::NotConfigured("JWKS URL unknown".to_string()))?;

        Self::new(
            issuer,
            jwks_url,
            cognito.client_id.clone(),
            auth.jwks_cache_ttl_seconds,
        )
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Fetch the key set from the user pool
    #[instrument(skip(self))]
    async fn fetch_jwks(&self) -> Result<JwkSet, AuthError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch JWKS");
                AuthError::JwksUnavailable(format!("Failed to fetch JWKS: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(AuthError::JwksUnavailable(format!(
                "JWKS endpoint returned status: {}",
                response.status()
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse JWKS response");
            AuthError::JwksUnavailable(format!("Failed to parse JWKS: {}", e))
        })?;

        Ok(jwks)
    }

    /// Keys from cache, refetched when stale or when `force_refresh` is set
    ///
    /// An unreachable endpoint falls back to the last cached set, however old.
    #[instrument(skip(self))]
    async fn get_jwks(&self, force_refresh: bool) -> Result<JwkSet, AuthError> {
        if !force_refresh {
            let cache = self.cached_keys.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_fresh() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        match self.fetch_jwks().await {
            Ok(jwks) => {
                let mut cache = self.cached_keys.write().await;
                *cache = Some(CachedJwks {
                    keys: jwks.clone(),
                    cached_at: Utc::now(),
                    ttl_seconds: self.cache_ttl_seconds,
                });
                Ok(jwks)
            }
            Err(e) => {
                let cache = self.cached_keys.read().await;
                match cache.as_ref() {
                    Some(cached) => {
                        warn!(
                            age_seconds = Utc::now()
                                .signed_duration_since(cached.cached_at)
                                .num_seconds(),
                            "JWKS endpoint unavailable, using cached keys"
                        );
                        Ok(cached.keys.clone())
                    }
                    None => Err(e),
                }
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for CognitoJwtVerifier {
    #[instrument(skip(self, token))]
    async fn verify(&self, token: &str) -> Result<CognitoClaims, AuthError> {
        // Reject foreign issuers before touching the network
        let unverified = decode_unverified(token)?;
        if unverified.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(AuthError::InvalidIssuer(
                unverified.iss.unwrap_or_else(|| "<missing>".to_string()),
            ));
        }

        let header = decode_header(token)
            .map_err(|e| AuthError::InvalidToken(format!("Invalid token header: {}", e)))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Token missing kid".to_string()))?;

        let mut jwks = self.get_jwks(false).await?;
        if jwks.find(&kid).is_none() {
            // Keys may have been rotated since the cache was filled
            jwks = self.get_jwks(true).await?;
        }
        let jwk = jwks
            .find(&kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.clone()))?;

        let decoding_key = DecodingKey::from_jwk(jwk)
            .map_err(|e| AuthError::InvalidToken(format!("Invalid JWK: {}", e)))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&self.issuer]);

        let token_data = decode::<CognitoClaims>(token, &decoding_key, &validation)?;
        Ok(token_data.claims)
    }
}
