// Error handling framework

use thiserror::Error;

/// Token verification and session errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token issuer: {0}")]
    InvalidIssuer(String),

    #[error("Signing key not found for kid: {0}")]
    KeyNotFound(String),

    #[error("JWKS unavailable: {0}")]
    JwksUnavailable(String),

    #[error("Authentication is not configured: {0}")]
    NotConfigured(String),
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer(err.to_string()),
            _ => AuthError::InvalidToken(err.to_string()),
        }
    }
}

/// Errors reported by the identity provider (Cognito or the mock)
///
/// Variants mirror the provider's exception names so the HTTP layer can
/// map each one to a status code.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    UserNotFound(String),

    #[error("{0}")]
    UserNotConfirmed(String),

    #[error("{0}")]
    UsernameExists(String),

    #[error("{0}")]
    InvalidPassword(String),

    #[error("{0}")]
    CodeMismatch(String),

    #[error("{0}")]
    ExpiredCode(String),

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Additional authentication challenge required: {0}")]
    ChallengeRequired(String),

    #[error("{kind}: {message}")]
    Service { kind: String, message: String },

    #[error("Identity provider request failed: {0}")]
    Transport(String),
}

impl ProviderError {
    /// Build from a provider exception name such as `NotAuthorizedException`
    ///
    /// Fully qualified names (`com.amazonaws...#NotAuthorizedException`) are
    /// accepted as well.
    pub fn from_exception(kind: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        let short = kind.rsplit('#').next().unwrap_or(kind);
        match short {
            "NotAuthorizedException" => ProviderError::NotAuthorized(message),
            "UserNotFoundException" => ProviderError::UserNotFound(message),
            "UserNotConfirmedException" => ProviderError::UserNotConfirmed(message),
            "UsernameExistsException" => ProviderError::UsernameExists(message),
            "InvalidPasswordException" => ProviderError::InvalidPassword(message),
            "CodeMismatchException" => ProviderError::CodeMismatch(message),
            "ExpiredCodeException" => ProviderError::ExpiredCode(message),
            "InvalidParameterException" => ProviderError::InvalidParameter(message),
            other => ProviderError::Service {
                kind: other.to_string(),
                message,
            },
        }
    }

    /// Provider exception name, used in logs
    pub fn exception_name(&self) -> &str {
        match self {
            ProviderError::NotAuthorized(_) => "NotAuthorizedException",
            ProviderError::UserNotFound(_) => "UserNotFoundException",
            ProviderError::UserNotConfirmed(_) => "UserNotConfirmedException",
            ProviderError::UsernameExists(_) => "UsernameExistsException",
            ProviderError::InvalidPassword(_) => "InvalidPasswordException",
            ProviderError::CodeMismatch(_) => "CodeMismatchException",
            ProviderError::ExpiredCode(_) => "ExpiredCodeException",
            ProviderError::InvalidParameter(_) => "InvalidParameterException",
            ProviderError::ChallengeRequired(_) => "ChallengeRequired",
            ProviderError::Service { kind, .. } => kind,
            ProviderError::Transport(_) => "Transport",
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Transport(err.to_string())
    }
}

/// Validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Database-specific errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Database health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate key violation: {0}")]
    DuplicateKey(String),

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

// Implement From for common external errors
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                // Check for specific database error codes
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DatabaseError::DuplicateKey(db_err.message().to_string()),
                        "23503" => DatabaseError::ForeignKeyViolation(db_err.message().to_string()),
                        "23514" => DatabaseError::CheckViolation(db_err.message().to_string()),
                        _ => DatabaseError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    DatabaseError::QueryFailed(db_err.message().to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DatabaseError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DatabaseError::MigrationFailed(err.to_string())
    }
}
