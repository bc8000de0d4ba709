// Configuration management with layered configuration (defaults, file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cognito: CognitoConfig,
    pub auth: AuthConfig,
    pub site: SiteConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_run_migrations() -> bool {
    true
}

/// Cognito user pool and app client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Overrides the identity provider endpoint (local stacks, tests)
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Overrides the JWKS location derived from the issuer
    #[serde(default)]
    pub jwks_url: Option<String>,
}

impl CognitoConfig {
    /// Both the pool and the app client must be known to verify tokens
    pub fn is_configured(&self) -> bool {
        !self.user_pool_id.is_empty() && !self.client_id.is_empty()
    }

    /// Expected `iss` claim of tokens issued by the user pool
    pub fn issuer(&self) -> Option<String> {
        if self.user_pool_id.is_empty() {
            return None;
        }
        Some(format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        ))
    }

    pub fn jwks_url(&self) -> Option<String> {
        if let Some(url) = &self.jwks_url {
            return Some(url.clone());
        }
        self.issuer()
            .map(|issuer| format!("{}/.well-known/jwks.json", issuer))
    }

    pub fn idp_endpoint(&self) -> String {
        self.endpoint
            .clone()
            .unwrap_or_else(|| format!("https://cognito-idp.{}.amazonaws.com/", self.region))
    }

    /// Client secret, treating an empty string as unset
    pub fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accept `mock-id-*` tokens and use the in-memory identity provider and stores
    pub use_mock: bool,
    pub id_token_max_age_seconds: i64,
    pub refresh_token_max_age_seconds: i64,
    pub jwks_cache_ttl_seconds: i64,
    /// Mark auth cookies `Secure` even when the request did not arrive over HTTPS
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public origin used to build share URLs, e.g. `https://wiki.example.com`
    pub domain: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with built-in defaults so partial files are accepted
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // APP__COGNITO__CLIENT_ID=... style overrides
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.auth.id_token_max_age_seconds <= 0 {
            return Err("auth.id_token_max_age_seconds must be greater than 0".to_string());
        }
        if self.auth.refresh_token_max_age_seconds <= 0 {
            return Err("auth.refresh_token_max_age_seconds must be greater than 0".to_string());
        }

        // Mock mode runs entirely in memory
        if self.auth.use_mock {
            return Ok(());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        if self.cognito.region.is_empty() {
            return Err("Cognito region cannot be empty".to_string());
        }
        if !self.cognito.is_configured() {
            return Err(
                "Cognito user_pool_id and client_id are required unless auth.use_mock is set"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Settings for local development and tests: mock identity provider, in-memory stores
    pub fn mock() -> Self {
        let mut settings = Self::default();
        settings.auth.use_mock = true;
        settings.auth.secure_cookies = false;
        settings.cognito.client_id = "testclientid".to_string();
        settings.cognito.client_secret = Some("testclientsecret".to_string());
        settings
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/wiki".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
                run_migrations: true,
            },
            cognito: CognitoConfig {
                region: "ap-northeast-1".to_string(),
                user_pool_id: String::new(),
                client_id: String::new(),
                client_secret: None,
                endpoint: None,
                jwks_url: None,
            },
            auth: AuthConfig {
                use_mock: false,
                id_token_max_age_seconds: 3600,
                refresh_token_max_age_seconds: 30 * 24 * 3600,
                jwks_cache_ttl_seconds: 3600,
                secure_cookies: true,
            },
            site: SiteConfig {
                domain: "http://localhost:8080".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_settings_are_valid() {
        let settings = Settings::mock();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_requires_cognito_outside_mock_mode() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.cognito.user_pool_id = "ap-northeast-1_Example".to_string();
        settings.cognito.client_id = "client".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validation_catches_zero_port() {
        let mut settings = Settings::mock();
        settings.server.port = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validation_catches_empty_database_url() {
        let mut settings = Settings::default();
        settings.cognito.user_pool_id = "pool".to_string();
        settings.cognito.client_id = "client".to_string();
        settings.database.url = String::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_cognito_urls() {
        let mut cognito = Settings::default().cognito;
        assert_eq!(cognito.issuer(), None);
        assert_eq!(cognito.jwks_url(), None);

        cognito.region = "us-east-1".to_string();
        cognito.user_pool_id = "us-east-1_ExamplePoolId".to_string();
        assert_eq!(
            cognito.issuer().as_deref(),
            Some("https://cognito-idp.us-east-1.amazonaws.com/us-east-1_ExamplePoolId")
        );
        assert_eq!(
            cognito.jwks_url().as_deref(),
            Some("https://cognito-idp.us-east-1.amazonaws.com/us-east-1_ExamplePoolId/.well-known/jwks.json")
        );
        assert_eq!(
            cognito.idp_endpoint(),
            "https://cognito-idp.us-east-1.amazonaws.com/"
        );
    }

    #[test]
    fn test_empty_client_secret_is_unset() {
        let mut cognito = Settings::default().cognito;
        cognito.client_secret = Some(String::new());
        assert_eq!(cognito.secret(), None);
        cognito.client_secret = Some("s3cret".to_string());
        assert_eq!(cognito.secret(), Some("s3cret"));
    }
}
