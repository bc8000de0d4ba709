// Identity provider abstraction and the Cognito user pool client

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{error, instrument};

use super::calculate_secret_hash;
use crate::config::CognitoConfig;
use crate::errors::ProviderError;
use crate::models::{AuthenticationResult, SignUpRequest, SignUpResult};

/// Account operations backed by the user pool
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResult, ProviderError>;

    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError>;

    async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError>;

    /// Username/password login
    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, ProviderError>;

    /// Exchange a refresh token for fresh id and access tokens
    async fn refresh_tokens(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<AuthenticationResult, ProviderError>;
}

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<CognitoAuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CognitoAuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
    token_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    user_confirmed: bool,
    user_sub: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Client for the user pool's public (unsigned) JSON API
#[derive(Clone)]
pub struct CognitoClient {
    endpoint: String,
    client_id: String,
    client_secret: Option<String>,
    http_client: reqwest::Client,
}

impl CognitoClient {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.filter(|s| !s.is_empty()),
            http_client,
        })
    }

    pub fn from_config(config: &CognitoConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.idp_endpoint(),
            config.client_id.clone(),
            config.secret().map(str::to_string),
        )
    }

    fn secret_hash(&self, username: &str) -> Result<Option<String>, ProviderError> {
        self.client_secret
            .as_deref()
            .map(|secret| calculate_secret_hash(username, &self.client_id, secret))
            .transpose()
    }

    /// POST one operation and decode its JSON response
    async fn call<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, operation))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, operation = %operation, "Identity provider request failed");
                ProviderError::from(e)
            })?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let parsed: Option<ErrorBody> = serde_json::from_slice(&bytes).ok();
            let (kind, message) = match parsed {
                Some(ErrorBody { kind, message }) => (
                    kind.unwrap_or_else(|| "UnknownError".to_string()),
                    message.unwrap_or_else(|| status.to_string()),
                ),
                None => ("UnknownError".to_string(), status.to_string()),
            };
            tracing::warn!(
                operation = %operation,
                status = %status,
                error_type = %kind,
                "Identity provider returned an error"
            );
            return Err(ProviderError::from_exception(&kind, message));
        }

        // Operations without output return `{}`
        let body = if bytes.is_empty() { &b"{}"[..] } else { &bytes[..] };
        serde_json::from_slice(body).map_err(|e| {
            ProviderError::Transport(format!("Invalid {} response: {}", operation, e))
        })
    }

    fn into_result(
        operation: &str,
        response: InitiateAuthResponse,
    ) -> Result<AuthenticationResult, ProviderError> {
        match response.authentication_result {
            Some(result) => Ok(AuthenticationResult {
                id_token: result.id_token,
                access_token: result.access_token,
                refresh_token: result.refresh_token,
                expires_in: result.expires_in,
                token_type: result.token_type.unwrap_or_else(|| "Bearer".to_string()),
            }),
            None => match response.challenge_name {
                Some(challenge) => Err(ProviderError::ChallengeRequired(challenge)),
                None => Err(ProviderError::Transport(format!(
                    "{} returned no authentication result",
                    operation
                ))),
            },
        }
    }
}

#[async_trait]
impl IdentityProvider for CognitoClient {
    #[instrument(skip(self, request), fields(username = %request.username))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResult, ProviderError> {
        let mut attributes = vec![json!({"Name": "email", "Value": request.email})];
        if let Some(given_name) = request.given_name.as_deref().filter(|v| !v.is_empty()) {
            attributes.push(json!({"Name": "given_name", "Value": given_name}));
        }
        if let Some(family_name) = request.family_name.as_deref().filter(|v| !v.is_empty()) {
            attributes.push(json!({"Name": "family_name", "Value": family_name}));
        }

        let mut body = json!({
            "ClientId": self.client_id,
            "Username": request.username,
            "Password": request.password,
            "UserAttributes": attributes,
        });
        if let Some(hash) = self.secret_hash(&request.username)? {
            body["SecretHash"] = json!(hash);
        }

        let response: SignUpResponse = self.call("SignUp", body).await?;
        tracing::info!(username = %request.username, confirmed = response.user_confirmed, "User signed up");
        Ok(SignUpResult {
            user_sub: response.user_sub,
            user_confirmed: response.user_confirmed,
        })
    }

    #[instrument(skip(self, code))]
    async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), ProviderError> {
        let mut body = json!({
            "ClientId": self.client_id,
            "Username": username,
            "ConfirmationCode": code,
        });
        if let Some(hash) = self.secret_hash(username)? {
            body["SecretHash"] = json!(hash);
        }

        let _: Value = self.call("ConfirmSignUp", body).await?;
        tracing::info!(username = %username, "User confirmed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn resend_confirmation_code(&self, username: &str) -> Result<(), ProviderError> {
        let mut body = json!({
            "ClientId": self.client_id,
            "Username": username,
        });
        if let Some(hash) = self.secret_hash(username)? {
            body["SecretHash"] = json!(hash);
        }

        let _: Value = self.call("ResendConfirmationCode", body).await?;
        Ok(())
    }

    #[instrument(skip(self, password))]
    async fn initiate_auth(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult, ProviderError> {
        let mut parameters = json!({
            "USERNAME": username,
            "PASSWORD": password,
        });
        if let Some(hash) = self.secret_hash(username)? {
            parameters["SECRET_HASH"] = json!(hash);
        }

        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });

        let response: InitiateAuthResponse = self.call("InitiateAuth", body).await?;
        Self::into_result("InitiateAuth", response)
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_tokens(
        &self,
        username: &str,
        refresh_token: &str,
    ) -> Result<AuthenticationResult, ProviderError> {
        let mut parameters = json!({
            "REFRESH_TOKEN": refresh_token,
        });
        if let Some(hash) = self.secret_hash(username)? {
            parameters["SECRET_HASH"] = json!(hash);
        }

        let body = json!({
            "AuthFlow": "REFRESH_TOKEN_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": parameters,
        });

        let response: InitiateAuthResponse = self.call("InitiateAuth", body).await?;
        Self::into_result("InitiateAuth", response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_secret_is_ignored() {
        let client = CognitoClient::new("http://localhost", "client", Some(String::new())).unwrap();
        assert_eq!(client.secret_hash("alice").unwrap(), None);
    }

    #[test]
    fn test_secret_hash_present_with_secret() {
        let client =
            CognitoClient::new("http://localhost", "client123", Some("s3cr3t".to_string()))
                .unwrap();
        assert_eq!(
            client.secret_hash("alice").unwrap().as_deref(),
            Some("kOPeHzvKtscBvBM4zlIffwOT074cplXWBq9MCfoDa4k=")
        );
    }

    #[test]
    fn test_challenge_without_tokens() {
        let response = InitiateAuthResponse {
            authentication_result: None,
            challenge_name: Some("NEW_PASSWORD_REQUIRED".to_string()),
        };
        let err = CognitoClient::into_result("InitiateAuth", response).unwrap_err();
        assert_eq!(
            err,
            ProviderError::ChallengeRequired("NEW_PASSWORD_REQUIRED".to_string())
        );
    }
}
