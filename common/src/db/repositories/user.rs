// User repository implementation

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{NewUser, User};
use crate::storage::UserStore;

const USER_COLUMNS: &str = "id, username, email, first_name, last_name, is_active, is_staff, \
                            is_superuser, date_joined, last_login";

/// Repository for user-related database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let user = new_user.into_user();
        let created = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                id, username, email, first_name, last_name,
                is_active, is_staff, is_superuser, date_joined, last_login
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active)
        .bind(user.is_staff)
        .bind(user.is_superuser)
        .bind(user.date_joined)
        .bind(user.last_login)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(user_id = %created.id, username = %created.username, "User created");
        Ok(created)
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), DatabaseError> {
        if let Some(existing) = self.find_by_username(&new_user.username).await? {
            return Ok((existing, false));
        }

        let username = new_user.username.clone();
        match self.create(new_user).await {
            Ok(user) => Ok((user, true)),
            // Lost a race with a concurrent first login
            Err(DatabaseError::DuplicateKey(msg)) => match self.find_by_username(&username).await? {
                Some(user) => Ok((user, false)),
                None => Err(DatabaseError::DuplicateKey(msg)),
            },
            Err(e) => Err(e),
        }
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1",
            USER_COLUMNS
        ))
        .bind(username)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(user)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(users)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))
        .fetch_all(self.pool.pool())
        .await?;

        Ok(users)
    }

    #[instrument(skip(self))]
    async fn count(&self) -> Result<i64, DatabaseError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool.pool())
            .await?;

        Ok(count.0)
    }
}
