// In-memory user and page store used in mock mode

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use super::{PageStore, UserStore};
use crate::errors::DatabaseError;
use crate::models::{NewUser, Page, PageInput, User};

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    pages: BTreeMap<i64, Page>,
    next_page_id: i64,
}

impl MemoryState {
    fn user_conflict(&self, new_user: &NewUser) -> Option<DatabaseError> {
        self.users.values().find_map(|existing| {
            if existing.username == new_user.username {
                Some(DatabaseError::DuplicateKey(format!(
                    "username '{}' already exists",
                    new_user.username
                )))
            } else if existing.email == new_user.email {
                Some(DatabaseError::DuplicateKey(format!(
                    "email '{}' already exists",
                    new_user.email
                )))
            } else {
                None
            }
        })
    }

    fn insert_user(&mut self, new_user: NewUser) -> Result<User, DatabaseError> {
        if let Some(conflict) = self.user_conflict(&new_user) {
            return Err(conflict);
        }
        let user = new_user.into_user();
        self.users.insert(user.id, user.clone());
        Ok(user)
    }
}

/// Check slug and share code uniqueness over a full set of pages
fn check_page_uniqueness<'a>(pages: impl Iterator<Item = &'a Page>) -> Result<(), DatabaseError> {
    let mut slugs = HashMap::new();
    let mut share_codes = HashMap::new();
    for page in pages {
        if let Some(other) = slugs.insert((page.user_id, page.slug.as_str()), page.id) {
            return Err(DatabaseError::DuplicateKey(format!(
                "slug '{}' already used by page {}",
                page.slug, other
            )));
        }
        if let Some(code) = page.share_code.as_deref() {
            if let Some(other) = share_codes.insert(code, page.id) {
                return Err(DatabaseError::DuplicateKey(format!(
                    "share code already used by page {}",
                    other
                )));
            }
        }
    }
    Ok(())
}

/// Reject pages the database CHECK constraints would refuse
fn check_page_invariants(page: &Page) -> Result<(), DatabaseError> {
    page.validate().map_err(|e| DatabaseError::CheckViolation(e.to_string()))
}

/// Shared in-memory store; clones see the same data
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn create(&self, new_user: NewUser) -> Result<User, DatabaseError> {
        let mut state = self.state.write().await;
        state.insert_user(new_user)
    }

    #[instrument(skip(self, new_user), fields(username = %new_user.username))]
    async fn get_or_create(&self, new_user: NewUser) -> Result<(User, bool), DatabaseError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .users
            .values()
            .find(|u| u.username == new_user.username)
        {
            return Ok((existing.clone(), false));
        }
        let user = state.insert_user(new_user)?;
        Ok((user, true))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DatabaseError> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>, DatabaseError> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    async fn list(&self) -> Result<Vec<User>, DatabaseError> {
        let mut users: Vec<User> = self.state.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn count(&self) -> Result<i64, DatabaseError> {
        Ok(self.state.read().await.users.len() as i64)
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    #[instrument(skip(self, input), fields(slug = %input.slug))]
    async fn create(&self, owner: Uuid, input: &PageInput) -> Result<Page, DatabaseError> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&owner) {
            return Err(DatabaseError::ForeignKeyViolation(format!(
                "user {} does not exist",
                owner
            )));
        }

        let page = Page {
            id: state.next_page_id + 1,
            user_id: owner,
            last_updated: Utc::now(),
            slug: input.slug.clone(),
            priority: input.priority,
            title: input.title.clone(),
            public: input.public,
            edit_permission: input.edit_permission,
            share: input.share,
            share_edit_permission: input.share_edit_permission,
            share_code: input.share_code.clone(),
            text: input.text.clone(),
        };

        check_page_invariants(&page)?;
        check_page_uniqueness(state.pages.values().chain(std::iter::once(&page)))?;
        state.next_page_id = page.id;
        state.pages.insert(page.id, page.clone());
        Ok(page)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Page>, DatabaseError> {
        Ok(self.state.read().await.pages.get(&id).cloned())
    }

    async fn find_by_owner_and_slug(
        &self,
        owner: Uuid,
        slug: &str,
    ) -> Result<Option<Page>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .pages
            .values()
            .find(|p| p.user_id == owner && p.slug == slug)
            .cloned())
    }

    async fn find_by_share_code(&self, share_code: &str) -> Result<Option<Page>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .pages
            .values()
            .find(|p| p.share_code.as_deref() == Some(share_code))
            .cloned())
    }

    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Page>, DatabaseError> {
        Ok(self
            .state
            .read()
            .await
            .pages
            .values()
            .filter(|p| p.user_id == owner)
            .cloned()
            .collect())
    }

    async fn list_visible(&self, viewer: Option<Uuid>) -> Result<Vec<Page>, DatabaseError> {
        let mut pages: Vec<Page> = self
            .state
            .read()
            .await
            .pages
            .values()
            .filter(|p| p.public || Some(p.user_id) == viewer)
            .cloned()
            .collect();
        pages.sort_by(|a, b| {
            b.last_updated
                .cmp(&a.last_updated)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(pages)
    }

    #[instrument(skip(self, page), fields(page_id = page.id))]
    async fn update(&self, page: &Page) -> Result<Page, DatabaseError> {
        let updated = self.update_many(std::slice::from_ref(page)).await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| DatabaseError::NotFound(format!("Page not found: {}", page.id)))
    }

    #[instrument(skip(self, pages), fields(count = pages.len()))]
    async fn update_many(&self, pages: &[Page]) -> Result<Vec<Page>, DatabaseError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let mut candidate = state.pages.clone();
        let mut updated = Vec::with_capacity(pages.len());
        for page in pages {
            let existing = candidate
                .get_mut(&page.id)
                .ok_or_else(|| DatabaseError::NotFound(format!("Page not found: {}", page.id)))?;
            let mut page = page.clone();
            // Ownership never changes through an update
            page.user_id = existing.user_id;
            page.last_updated = now;
            check_page_invariants(&page)?;
            *existing = page.clone();
            updated.push(page);
        }

        check_page_uniqueness(candidate.values())?;
        state.pages = candidate;
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let mut state = self.state.write().await;
        state
            .pages
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| DatabaseError::NotFound(format!("Page not found: {}", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(slug: &str) -> PageInput {
        PageInput {
            slug: slug.to_string(),
            title: slug.to_string(),
            ..PageInput::default()
        }
    }

    async fn store_with_user(username: &str) -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = UserStore::create(
            &store,
            NewUser::new(username, format!("{}@example.com", username)),
        )
        .await
        .unwrap();
        (store, user)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let store = MemoryStore::new();
        let (first, created) = store
            .get_or_create(NewUser::new("alice", "alice@example.com"))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .get_or_create(NewUser::new("alice", "other@example.com"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.email, "alice@example.com");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected() {
        let (store, _) = store_with_user("alice").await;
        let err = UserStore::create(&store, NewUser::new("bob", "alice@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey(_)));
    }

    #[tokio::test]
    async fn test_slug_unique_per_owner() {
        let (store, alice) = store_with_user("alice").await;
        let bob = UserStore::create(&store, NewUser::new("bob", "bob@example.com"))
            .await
            .unwrap();

        PageStore::create(&store, alice.id, &input("home")).await.unwrap();
        let err = PageStore::create(&store, alice.id, &input("home"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey(_)));

        // Other owners may reuse the slug
        assert!(PageStore::create(&store, bob.id, &input("home")).await.is_ok());
    }

    #[tokio::test]
    async fn test_share_code_globally_unique() {
        let (store, alice) = store_with_user("alice").await;
        let mut first = input("a");
        first.share_code = Some("CODE1".to_string());
        let mut second = input("b");
        second.share_code = Some("CODE1".to_string());

        PageStore::create(&store, alice.id, &first).await.unwrap();
        assert!(PageStore::create(&store, alice.id, &second).await.is_err());

        let found = store.find_by_share_code("CODE1").await.unwrap().unwrap();
        assert_eq!(found.slug, "a");
    }

    #[tokio::test]
    async fn test_update_many_is_all_or_nothing() {
        let (store, alice) = store_with_user("alice").await;
        let a = PageStore::create(&store, alice.id, &input("a")).await.unwrap();
        let b = PageStore::create(&store, alice.id, &input("b")).await.unwrap();

        let mut a2 = a.clone();
        a2.title = "renamed".to_string();
        let mut b2 = b.clone();
        b2.slug = "c".to_string();
        let mut clash = a.clone();
        clash.slug = "c".to_string();

        // Two pages end up with slug "c"
        let err = store.update_many(&[b2.clone(), clash]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateKey(_)));
        assert_eq!(
            PageStore::find_by_id(&store, b.id).await.unwrap().unwrap().slug,
            "b"
        );

        let updated = store.update_many(&[a2, b2]).await.unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(
            PageStore::find_by_id(&store, a.id).await.unwrap().unwrap().title,
            "renamed"
        );
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_permissions() {
        let (store, alice) = store_with_user("alice").await;
        let mut bad = input("locked");
        bad.edit_permission = true;
        bad.share_edit_permission = true;
        let err = PageStore::create(&store, alice.id, &bad).await.unwrap_err();
        assert!(matches!(err, DatabaseError::CheckViolation(_)));

        let mut bad_code = input("coded");
        bad_code.share_code = Some("bad code!".to_string());
        let err = PageStore::create(&store, alice.id, &bad_code).await.unwrap_err();
        assert!(matches!(err, DatabaseError::CheckViolation(_)));

        assert!(store.list_by_owner(alice.id).await.unwrap().is_empty());
        // Rejected creates do not consume ids
        let page = PageStore::create(&store, alice.id, &input("ok")).await.unwrap();
        assert_eq!(page.id, 1);
    }

    #[tokio::test]
    async fn test_update_many_rejects_invalid_page() {
        let (store, alice) = store_with_user("alice").await;
        let a = PageStore::create(&store, alice.id, &input("a")).await.unwrap();
        let b = PageStore::create(&store, alice.id, &input("b")).await.unwrap();

        let mut a2 = a.clone();
        a2.title = "renamed".to_string();
        let mut b2 = b.clone();
        b2.share_edit_permission = true;

        let err = store.update_many(&[a2, b2]).await.unwrap_err();
        assert!(matches!(err, DatabaseError::CheckViolation(_)));
        assert_eq!(
            PageStore::find_by_id(&store, a.id).await.unwrap().unwrap().title,
            "a"
        );

        let mut public_edit = b.clone();
        public_edit.edit_permission = true;
        let err = PageStore::update(&store, &public_edit).await.unwrap_err();
        assert!(matches!(err, DatabaseError::CheckViolation(_)));
    }

    #[tokio::test]
    async fn test_swapping_slugs_in_one_batch() {
        let (store, alice) = store_with_user("alice").await;
        let mut a = PageStore::create(&store, alice.id, &input("a")).await.unwrap();
        let mut b = PageStore::create(&store, alice.id, &input("b")).await.unwrap();
        a.slug = "b".to_string();
        b.slug = "a".to_string();
        assert!(store.update_many(&[a, b]).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_visible_filters_private_pages() {
        let (store, alice) = store_with_user("alice").await;
        let bob = UserStore::create(&store, NewUser::new("bob", "bob@example.com"))
            .await
            .unwrap();

        let mut public = input("public");
        public.public = true;
        PageStore::create(&store, alice.id, &public).await.unwrap();
        PageStore::create(&store, alice.id, &input("private")).await.unwrap();

        assert_eq!(store.list_visible(None).await.unwrap().len(), 1);
        assert_eq!(store.list_visible(Some(bob.id)).await.unwrap().len(), 1);
        assert_eq!(store.list_visible(Some(alice.id)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_page() {
        let store = MemoryStore::new();
        assert!(matches!(
            PageStore::delete(&store, 42).await,
            Err(DatabaseError::NotFound(_))
        ));
    }
}
