// Wiki page handlers

pub mod pages;
pub mod settings;
pub mod share;

use chrono::{DateTime, Utc};
use common::models::{Page, User};
use common::tree::{build_nav_trees, NavTree};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::handlers::ErrorResponse;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Page as returned to clients
#[derive(Debug, Serialize)]
pub struct PageView {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub priority: f64,
    pub public: bool,
    pub edit_permission: bool,
    pub share: bool,
    pub share_edit_permission: bool,
    pub text: Option<String>,
    pub last_updated: DateTime<Utc>,
    /// Only exposed to the owner or to share-link visitors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

impl PageView {
    pub fn new(page: Page, domain: &str, expose_share: bool) -> Self {
        let share_url = match (&page.share_code, page.share && expose_share) {
            (Some(code), true) => Some(share_url(domain, code)),
            _ => None,
        };

        Self {
            id: page.id,
            slug: page.slug,
            title: page.title,
            priority: page.priority,
            public: page.public,
            edit_permission: page.edit_permission,
            share: page.share,
            share_edit_permission: page.share_edit_permission,
            text: page.text,
            last_updated: page.last_updated,
            share_code: page.share_code.filter(|_| expose_share),
            share_url,
        }
    }
}

/// Listing entry of the index
#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub id: i64,
    pub username: String,
    pub slug: String,
    pub title: String,
    pub public: bool,
    pub last_updated: DateTime<Utc>,
}

/// Single page with the viewer's capabilities
#[derive(Debug, Serialize)]
pub struct PageDetail {
    pub username: String,
    pub slug: String,
    pub page: PageView,
    /// Reached through a share link
    pub share: bool,
    pub edit: bool,
    pub is_owner: bool,
    pub nav: Vec<NavTree>,
}

pub fn share_url(domain: &str, share_code: &str) -> String {
    format!(
        "{}/api/wiki/share/{}",
        domain.trim_end_matches('/'),
        share_code
    )
}

pub fn page_not_found() -> ErrorResponse {
    ErrorResponse::new("not_found", "Page not found")
}

/// 404 that tells the owner the slug is free to create
pub fn missing_page(current: &CurrentUser, owner: &User, slug: &str) -> ErrorResponse {
    if current.id() == Some(owner.id) {
        page_not_found().with_details(json!({ "can_create": true, "slug": slug }))
    } else {
        page_not_found()
    }
}

/// Pages the viewer may see together with their owners
pub async fn visible_pages(
    state: &AppState,
    viewer: Option<Uuid>,
) -> Result<(Vec<Page>, Vec<User>), ErrorResponse> {
    let pages = state.pages.list_visible(viewer).await?;
    let owner_ids: Vec<Uuid> = pages
        .iter()
        .map(|p| p.user_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let owners = state.users.find_by_ids(&owner_ids).await?;
    Ok((pages, owners))
}

/// Navigation trees for the viewer
pub async fn nav_trees(state: &AppState, current: &CurrentUser) -> Result<Vec<NavTree>, ErrorResponse> {
    let (pages, owners) = visible_pages(state, current.id()).await?;
    Ok(build_nav_trees(current.user.as_ref(), &owners, &pages))
}

/// Detail payload shared by owner/slug and share-code lookups
pub async fn page_detail(
    state: &AppState,
    current: &CurrentUser,
    owner: User,
    page: Page,
    via_share: bool,
) -> Result<PageDetail, ErrorResponse> {
    let is_owner = current.id() == Some(page.user_id);
    if !via_share && !page.public && !is_owner {
        return Err(page_not_found());
    }

    let authenticated = current.is_authenticated();
    let edit = is_owner
        || (authenticated && page.edit_permission)
        || (via_share && authenticated && page.share_edit_permission);

    let nav = nav_trees(state, current).await?;
    let slug = page.slug.clone();

    Ok(PageDetail {
        username: owner.username,
        slug,
        page: PageView::new(page, &state.config.site.domain, is_owner || via_share),
        share: via_share,
        edit,
        is_owner,
        nav,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::NewUser;

    fn page(share: bool, code: Option<&str>) -> Page {
        Page {
            id: 7,
            user_id: Uuid::new_v4(),
            last_updated: Utc::now(),
            slug: "notes".to_string(),
            priority: 0.0,
            title: "Notes".to_string(),
            public: true,
            edit_permission: false,
            share,
            share_edit_permission: false,
            share_code: code.map(str::to_string),
            text: Some("# Notes".to_string()),
        }
    }

    #[test]
    fn test_share_url_uses_domain() {
        assert_eq!(
            share_url("https://wiki.example.com/", "abc123"),
            "https://wiki.example.com/api/wiki/share/abc123"
        );
    }

    #[test]
    fn test_page_view_hides_share_details_from_others() {
        let view = PageView::new(page(true, Some("abc")), "http://localhost", false);
        assert!(view.share_code.is_none());
        assert!(view.share_url.is_none());

        let view = PageView::new(page(true, Some("abc")), "http://localhost", true);
        assert_eq!(view.share_code.as_deref(), Some("abc"));
        assert_eq!(
            view.share_url.as_deref(),
            Some("http://localhost/api/wiki/share/abc")
        );

        let view = PageView::new(page(false, Some("abc")), "http://localhost", true);
        assert!(view.share_url.is_none());
    }

    #[test]
    fn test_missing_page_offers_creation_to_owner() {
        let owner = NewUser::new("alice", "alice@example.com").into_user();
        let owner_view = CurrentUser {
            user: Some(owner.clone()),
            claims: None,
        };
        let err = missing_page(&owner_view, &owner, "new/page");
        assert_eq!(err.details.unwrap()["can_create"], true);

        let err = missing_page(&CurrentUser::default(), &owner, "new/page");
        assert!(err.details.is_none());
    }
}
