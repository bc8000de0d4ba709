use axum::{
    extract::{Path, Query, State},
    Json,
};
use common::models::{generate_share_code, PageInput};
use common::telemetry;
use common::tree::NavTree;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{missing_page, nav_trees, page_detail, page_not_found, visible_pages, PageDetail, PageSummary, PageView};
use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::middleware::{CurrentUser, RequireUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub pages: Vec<PageSummary>,
    pub nav: Vec<NavTree>,
}

#[derive(Debug, Deserialize)]
pub struct NewPageQuery {
    pub slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub id: i64,
    pub deleted: bool,
}

/// Public pages plus the viewer's own, newest first, with navigation trees
#[tracing::instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<SuccessResponse<IndexResponse>, ErrorResponse> {
    let (pages, owners) = visible_pages(&state, current.id()).await?;
    let usernames: HashMap<_, _> = owners.iter().map(|u| (u.id, u.username.clone())).collect();

    let nav = common::tree::build_nav_trees(current.user.as_ref(), &owners, &pages);
    let summaries = pages
        .into_iter()
        .map(|page| PageSummary {
            id: page.id,
            username: usernames.get(&page.user_id).cloned().unwrap_or_default(),
            slug: page.slug,
            title: page.title,
            public: page.public,
            last_updated: page.last_updated,
        })
        .collect();

    Ok(SuccessResponse::new(IndexResponse {
        pages: summaries,
        nav,
    }))
}

/// Navigation trees only
#[tracing::instrument(skip_all)]
pub async fn tree(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<SuccessResponse<Vec<NavTree>>, ErrorResponse> {
    Ok(SuccessResponse::new(nav_trees(&state, &current).await?))
}

#[tracing::instrument(skip(state, current))]
pub async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((username, slug)): Path<(String, String)>,
) -> Result<SuccessResponse<PageDetail>, ErrorResponse> {
    let owner = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(page_not_found)?;

    let page = state
        .pages
        .find_by_owner_and_slug(owner.id, &slug)
        .await?
        .ok_or_else(|| missing_page(&current, &owner, &slug))?;

    Ok(SuccessResponse::new(
        page_detail(&state, &current, owner, page, false).await?,
    ))
}

/// Blank draft for a new page, optionally with a slug
#[tracing::instrument(skip_all)]
pub async fn new_page(
    RequireUser(_user): RequireUser,
    Query(query): Query<NewPageQuery>,
) -> SuccessResponse<PageInput> {
    SuccessResponse::new(PageInput::draft(query.slug))
}

#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(input): Json<PageInput>,
) -> Result<SuccessResponse<PageView>, ErrorResponse> {
    let mut input = input.normalized();
    if input.share_code.is_none() {
        input.share_code = Some(generate_share_code());
    }
    input.validate()?;

    let page = state.pages.create(user.id, &input).await?;
    telemetry::record_page_write("create");
    tracing::info!(page_id = page.id, slug = %page.slug, "Page created");

    Ok(SuccessResponse::new(PageView::new(
        page,
        &state.config.site.domain,
        true,
    )))
}

/// Owners may change every field; users granted edit permission only the content
#[tracing::instrument(skip(state, user, input), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    current: CurrentUser,
    Path((username, slug)): Path<(String, String)>,
    Json(input): Json<PageInput>,
) -> Result<SuccessResponse<PageView>, ErrorResponse> {
    let owner = state
        .users
        .find_by_username(&username)
        .await?
        .ok_or_else(page_not_found)?;

    let mut page = state
        .pages
        .find_by_owner_and_slug(owner.id, &slug)
        .await?
        .ok_or_else(|| missing_page(&current, &owner, &slug))?;

    let is_owner = page.is_owned_by(user.id);
    if !is_owner && !page.edit_permission {
        tracing::warn!(page_id = page.id, "Edit denied");
        return Err(ErrorResponse::new(
            "forbidden",
            "You do not have permission to edit this page",
        ));
    }

    let input = input.normalized();
    if is_owner {
        page.apply_input(&input);
    } else {
        page.apply_content(&input);
    }
    page.validate()?;

    let page = state.pages.update(&page).await?;
    telemetry::record_page_write("update");
    tracing::info!(page_id = page.id, slug = %page.slug, "Page updated");

    Ok(SuccessResponse::new(PageView::new(
        page,
        &state.config.site.domain,
        is_owner,
    )))
}

#[tracing::instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<i64>,
) -> Result<SuccessResponse<DeleteResponse>, ErrorResponse> {
    let page = state
        .pages
        .find_by_id(id)
        .await?
        .ok_or_else(page_not_found)?;

    if !page.is_owned_by(user.id) && !page.edit_permission {
        tracing::warn!(page_id = id, "Delete denied");
        return Err(ErrorResponse::new(
            "forbidden",
            "You do not have permission to delete this page",
        ));
    }

    state.pages.delete(id).await?;
    telemetry::record_page_write("delete");
    tracing::info!(page_id = id, "Page deleted");

    Ok(SuccessResponse::new(DeleteResponse { id, deleted: true }))
}
