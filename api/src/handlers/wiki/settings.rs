// Bulk page settings of the current user

use axum::{extract::State, Json};
use common::errors::ValidationError;
use common::models::{Page, PageSettings};
use common::telemetry;
use common::tree::PageTree;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::middleware::RequireUser;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct SettingsPayload {
    pub pages: Vec<PageSettings>,
}

fn ordered_settings(pages: Vec<Page>) -> SettingsPayload {
    SettingsPayload {
        pages: PageTree::ordered(pages).iter().map(PageSettings::from).collect(),
    }
}

/// Own pages in tree order
#[tracing::instrument(skip_all, fields(user_id = %user.id))]
pub async fn page_settings(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<SuccessResponse<SettingsPayload>, ErrorResponse> {
    let pages = state.pages.list_by_owner(user.id).await?;
    Ok(SuccessResponse::new(ordered_settings(pages)))
}

/// Apply settings rows to the owner's pages; nothing is saved unless every row is valid
pub fn apply_settings(
    owned: Vec<Page>,
    rows: &[PageSettings],
) -> Result<Vec<Page>, ErrorResponse> {
    let mut by_id: HashMap<i64, Page> = owned.into_iter().map(|p| (p.id, p)).collect();
    let mut seen = HashSet::new();
    let mut changed = Vec::with_capacity(rows.len());

    for row in rows {
        if !seen.insert(row.id) {
            return Err(ValidationError::invalid("id", format!("page {} listed twice", row.id)).into());
        }
        let mut page = by_id.remove(&row.id).ok_or_else(|| {
            ErrorResponse::new("not_found", format!("Page {} not found", row.id))
        })?;

        let mut row = row.clone();
        row.slug = row.slug.trim().to_string();
        if row.share_code.as_deref().map(str::trim).is_some_and(str::is_empty) {
            row.share_code = None;
        }
        page.apply_settings(&row);

        page.validate().map_err(|e| {
            ErrorResponse::from(e).with_details(json!({ "page_id": row.id }))
        })?;
        changed.push(page);
    }

    Ok(changed)
}

#[tracing::instrument(skip_all, fields(user_id = %user.id, rows = payload.pages.len()))]
pub async fn update_page_settings(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(payload): Json<SettingsPayload>,
) -> Result<SuccessResponse<SettingsPayload>, ErrorResponse> {
    let owned = state.pages.list_by_owner(user.id).await?;
    let changed = apply_settings(owned, &payload.pages)?;

    state.pages.update_many(&changed).await?;
    telemetry::record_page_write("settings");
    tracing::info!(pages = changed.len(), "Page settings saved");

    let pages = state.pages.list_by_owner(user.id).await?;
    Ok(SuccessResponse::new(ordered_settings(pages)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::Utc;
    use uuid::Uuid;

    fn page(id: i64, slug: &str) -> Page {
        Page {
            id,
            user_id: Uuid::nil(),
            last_updated: Utc::now(),
            slug: slug.to_string(),
            priority: 0.0,
            title: slug.to_string(),
            public: false,
            edit_permission: false,
            share: false,
            share_edit_permission: false,
            share_code: None,
            text: Some("body".to_string()),
        }
    }

    #[test]
    fn test_apply_settings_changes_rows_and_keeps_text() {
        let owned = vec![page(1, "a"), page(2, "b")];
        let mut row = PageSettings::from(&owned[0]);
        row.slug = " a/renamed ".to_string();
        row.public = true;
        row.edit_permission = true;
        row.share_code = Some("  ".to_string());

        let changed = apply_settings(owned, &[row]).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].slug, "a/renamed");
        assert!(changed[0].edit_permission);
        assert_eq!(changed[0].share_code, None);
        assert_eq!(changed[0].text.as_deref(), Some("body"));
    }

    #[test]
    fn test_invalid_row_rejects_whole_batch() {
        let owned = vec![page(1, "a"), page(2, "b")];
        let good = PageSettings::from(&owned[0]);
        let mut bad = PageSettings::from(&owned[1]);
        bad.share_edit_permission = true;

        let err = apply_settings(owned, &[good, bad]).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.details.unwrap()["page_id"], 2);
    }

    #[test]
    fn test_foreign_and_duplicate_rows() {
        let owned = vec![page(1, "a")];
        let mut foreign = PageSettings::from(&owned[0]);
        foreign.id = 99;
        let err = apply_settings(owned.clone(), &[foreign]).unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let row = PageSettings::from(&owned[0]);
        let err = apply_settings(owned, &[row.clone(), row]).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
