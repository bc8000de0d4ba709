// Pages reached through their share code

use axum::{
    extract::{Path, State},
    Json,
};
use common::models::{Page, PageInput, User};
use common::telemetry;

use super::{page_detail, page_not_found, PageDetail, PageView};
use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::middleware::{CurrentUser, RequireUser};
use crate::state::AppState;

/// Shared page and its owner; pages with sharing turned off are not found
async fn shared_page(state: &AppState, share_code: &str) -> Result<(User, Page), ErrorResponse> {
    let page = state
        .pages
        .find_by_share_code(share_code)
        .await?
        .filter(|page| page.share)
        .ok_or_else(page_not_found)?;

    let owner = state
        .users
        .find_by_id(page.user_id)
        .await?
        .ok_or_else(page_not_found)?;

    Ok((owner, page))
}

#[tracing::instrument(skip(state, current, share_code))]
pub async fn share_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(share_code): Path<String>,
) -> Result<SuccessResponse<PageDetail>, ErrorResponse> {
    let (owner, page) = shared_page(&state, &share_code).await?;
    Ok(SuccessResponse::new(
        page_detail(&state, &current, owner, page, true).await?,
    ))
}

/// Edit through a share link: the owner, or anyone logged in when share editing is on
#[tracing::instrument(skip(state, user, share_code, input), fields(user_id = %user.id))]
pub async fn share_update(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(share_code): Path<String>,
    Json(input): Json<PageInput>,
) -> Result<SuccessResponse<PageView>, ErrorResponse> {
    let (_, mut page) = shared_page(&state, &share_code).await?;

    let is_owner = page.is_owned_by(user.id);
    if !is_owner && !page.share_edit_permission {
        tracing::warn!(page_id = page.id, "Share edit denied");
        return Err(ErrorResponse::new(
            "forbidden",
            "This shared page is read-only",
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
    telemetry::record_page_write("share_update");
    tracing::info!(page_id = page.id, "Shared page updated");

    Ok(SuccessResponse::new(PageView::new(
        page,
        &state.config.site.domain,
        true,
    )))
}
