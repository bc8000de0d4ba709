// Page repository implementation

use async_trait::async_trait;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::errors::DatabaseError;
use crate::models::{Page, PageInput};
use crate::storage::PageStore;

const PAGE_COLUMNS: &str = "id, user_id, last_updated, slug, priority, title, public, \
                            edit_permission, share, share_edit_permission, share_code, text";

/// Repository for page-related database operations
#[derive(Clone)]
pub struct PageRepository {
    pool: DbPool,
}

impl PageRepository {
    /// Create a new PageRepository
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn update_sql() -> String {
        format!(
            r#"
            UPDATE pages
            SET slug = $2,
                priority = $3,
                title = $4,
                public = $5,
                edit_permission = $6,
                share = $7,
                share_edit_permission = $8,
                share_code = $9,
                text = $10,
                last_updated = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PAGE_COLUMNS
        )
    }
}

#[async_trait]
impl PageStore for PageRepository {
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    async fn create(&self, owner: Uuid, input: &PageInput) -> Result<Page, DatabaseError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            r#"
            INSERT INTO pages (
                user_id, slug, priority, title, public, edit_permission,
                share, share_edit_permission, share_code, text, last_updated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
            RETURNING {}
            "#,
            PAGE_COLUMNS
        ))
        .bind(owner)
        .bind(&input.slug)
        .bind(input.priority)
        .bind(&input.title)
        .bind(input.public)
        .bind(input.edit_permission)
        .bind(input.share)
        .bind(input.share_edit_permission)
        .bind(&input.share_code)
        .bind(&input.text)
        .fetch_one(self.pool.pool())
        .await?;

        tracing::info!(page_id = page.id, user_id = %owner, slug = %page.slug, "Page created");
        Ok(page)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> Result<Option<Page>, DatabaseError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {} FROM pages WHERE id = $1",
            PAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(page)
    }

    #[instrument(skip(self))]
    async fn find_by_owner_and_slug(
        &self,
        owner: Uuid,
        slug: &str,
    ) -> Result<Option<Page>, DatabaseError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {} FROM pages WHERE user_id = $1 AND slug = $2",
            PAGE_COLUMNS
        ))
        .bind(owner)
        .bind(slug)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(page)
    }

    #[instrument(skip(self, share_code))]
    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Page>, DatabaseError> {
        let page = sqlx::query_as::<_, Page>(&format!(
            "SELECT {} FROM pages WHERE share_code = $1",
            PAGE_COLUMNS
        ))
        .bind(share_code)
        .fetch_optional(self.pool.pool())
        .await?;

        Ok(page)
    }

    #[instrument(skip(self))]
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Page>, DatabaseError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            "SELECT {} FROM pages WHERE user_id = $1 ORDER BY slug",
            PAGE_COLUMNS
        ))
        .bind(owner)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(pages)
    }

    #[instrument(skip(self))]
    async fn list_visible(&self, viewer: Option<Uuid>) -> Result<Vec<Page>, DatabaseError> {
        let pages = sqlx::query_as::<_, Page>(&format!(
            r#"
            SELECT {}
            FROM pages
            WHERE public OR user_id = $1
            ORDER BY last_updated DESC, id DESC
            "#,
            PAGE_COLUMNS
        ))
        .bind(viewer)
        .fetch_all(self.pool.pool())
        .await?;

        Ok(pages)
    }

    #[instrument(skip(self, page), fields(page_id = page.id))]
    async fn update(&self, page: &Page) -> Result<Page, DatabaseError> {
        let updated = sqlx::query_as::<_, Page>(&Self::update_sql())
            .bind(page.id)
            .bind(&page.slug)
            .bind(page.priority)
            .bind(&page.title)
            .bind(page.public)
            .bind(page.edit_permission)
            .bind(page.share)
            .bind(page.share_edit_permission)
            .bind(&page.share_code)
            .bind(&page.text)
            .fetch_optional(self.pool.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Page not found: {}", page.id)))?;

        tracing::info!(page_id = updated.id, slug = %updated.slug, "Page updated");
        Ok(updated)
    }

    #[instrument(skip(self, pages), fields(count = pages.len()))]
    async fn update_many(&self, pages: &[Page]) -> Result<Vec<Page>, DatabaseError> {
        let mut tx = self
            .pool
            .pool()
            .begin()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        // Uniqueness is checked once at commit
        sqlx::query("SET CONSTRAINTS pages_user_slug_unique, pages_share_code_unique DEFERRED")
            .execute(&mut *tx)
            .await?;

        let sql = Self::update_sql();
        let mut updated = Vec::with_capacity(pages.len());
        for page in pages {
            let row = sqlx::query_as::<_, Page>(&sql)
                .bind(page.id)
                .bind(&page.slug)
                .bind(page.priority)
                .bind(&page.title)
                .bind(page.public)
                .bind(page.edit_permission)
                .bind(page.share)
                .bind(page.share_edit_permission)
                .bind(&page.share_code)
                .bind(&page.text)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| DatabaseError::NotFound(format!("Page not found: {}", page.id)))?;
            updated.push(row);
        }

        tx.commit().await?;

        tracing::info!(count = updated.len(), "Pages updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(self.pool.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("Page not found: {}", id)));
        }

        tracing::info!(page_id = id, "Page deleted");
        Ok(())
    }
}
