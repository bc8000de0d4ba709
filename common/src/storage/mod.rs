// Storage abstractions for users and pages
//
// PostgreSQL repositories live in `crate::db::repositories`; `MemoryStore`
// backs mock mode and tests.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::DatabaseError;
use crate::models::{NewUser, Page, PageInput, User};

pub use memory::MemoryStore;

/// User persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user; `DuplicateKey` when the username or email is taken
    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError>;

    /// Look up by username, inserting `new_user` when absent
    ///
    /// Returns the user and whether it was created.
    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError>;

    /// All users ordered by username
    async fn list(&self) -> Result<Vec<User>, DatabaseError>;

    async fn count(&self) -> Result<i64, DatabaseError>;
}

/// Page persistence
///
/// Stores enforce `(user_id, slug)` and `share_code` uniqueness with
/// `DuplicateKey`; field invariants are checked by the models before saving.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn create(&self, owner: Uuid, input: &PageInput) -> Result<Page, DatabaseError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<Page>, DatabaseError>;

    async fn find_by_owner_and_slug(
        &self,
        owner: Uuid,
        slug: &str,
    ) -> Result<Option<Page>, DatabaseError>;

    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Page>, DatabaseError>;

    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Page>, DatabaseError>;

    /// Public pages plus the viewer's own, most recently updated first
    async fn list_visible(&self, viewer: Option<Uuid>) -> Result<Vec<Page>, DatabaseError>;

    /// Persist every field of an existing page, bumping `last_updated`
    async fn update(&self, page: &Page) -> Result<Page, DatabaseError>;

    /// Persist several pages atomically
    async fn update_many(&self, pages: &[Page]) -> Result<Vec<Page>, DatabaseError>;

    async fn delete(&self, id: i64) -> Result<(), DatabaseError>;
}
