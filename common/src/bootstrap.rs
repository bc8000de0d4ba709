// Bootstrap utilities for binary initialization

use crate::auth::{
    CognitoClient, CognitoJwtVerifier, IdentityProvider, MockIdentityProvider, MockTokenVerifier,
    TokenVerifier,
};
use crate::config::Settings;
use crate::db::repositories::{PageRepository, UserRepository};
use crate::db::DbPool;
use crate::storage::{MemoryStore, PageStore, UserStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// Backends selected by configuration
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub pages: Arc<dyn PageStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// Present only when backed by PostgreSQL
    pub db_pool: Option<DbPool>,
}

/// Connect, migrate when configured, and check the database answers
///
/// # Errors
/// Returns error if the database is unreachable or a migration fails
#[tracing::instrument(skip(settings))]
pub async fn init_database_pool(settings: &Settings) -> Result<DbPool> {
    let db_pool = DbPool::new(&settings.database)
        .await
        .context("Failed to initialize database pool")?;

    if settings.database.run_migrations {
        db_pool
            .run_migrations()
            .await
            .context("Failed to run database migrations")?;
    }

    db_pool.ping().await.context("Database is not answering")?;
    Ok(db_pool)
}

/// In-memory stores with the mock identity provider
///
/// # Errors
/// Returns error if the seeded mock user cannot be created
pub fn init_mock_services() -> Result<Services> {
    info!("Using mock identity provider and in-memory storage");

    let store = MemoryStore::new();
    let identity = MockIdentityProvider::with_test_user()
        .context("Failed to seed mock identity provider")?;

    Ok(Services {
        users: Arc::new(store.clone()),
        pages: Arc::new(store),
        identity: Arc::new(identity),
        verifier: Arc::new(MockTokenVerifier::new()),
        db_pool: None,
    })
}

/// PostgreSQL stores with the Cognito user pool
///
/// # Errors
/// Returns error if the database or Cognito clients cannot be initialized
#[tracing::instrument(skip(settings))]
pub async fn init_cognito_services(settings: &Settings) -> Result<Services> {
    let db_pool = init_database_pool(settings).await?;

    let identity = CognitoClient::from_config(&settings.cognito)
        .context("Failed to initialize Cognito client")?;
    let verifier = CognitoJwtVerifier::from_config(&settings.cognito, &settings.auth)
        .context("Failed to initialize Cognito token verifier")?;

    info!(
        region = %settings.cognito.region,
        user_pool_id = %settings.cognito.user_pool_id,
        "Cognito authentication initialized"
    );

    Ok(Services {
        users: Arc::new(UserRepository::new(db_pool.clone())),
        pages: Arc::new(PageRepository::new(db_pool.clone())),
        identity: Arc::new(identity),
        verifier: Arc::new(verifier),
        db_pool: Some(db_pool),
    })
}

/// Pick backends according to `auth.use_mock`
pub async fn init_services(settings: &Settings) -> Result<Services> {
    if settings.auth.use_mock {
        init_mock_services()
    } else {
        init_cognito_services(settings).await
    }
}
