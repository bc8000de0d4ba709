// Route guards: extractors that require an authenticated (staff, superuser) user

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::ACCEPT, request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use common::models::User;
use serde_json::json;

use super::auth::CurrentUser;
use crate::templates;

const AUTH_REQUIRED_DETAIL: &str =
    "Please provide a valid Cognito JWT token in Authorization header or id_token cookie";

/// Why a guard refused the request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthRejection {
    /// Anonymous request; `json` selects the response format
    LoginRequired { json: bool },
    Forbidden(&'static str),
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::LoginRequired { json: true } => (
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "error": "Authentication required",
                    "detail": AUTH_REQUIRED_DETAIL,
                })),
            )
                .into_response(),
            AuthRejection::LoginRequired { json: false } => {
                let html = templates::render_auth_required().unwrap_or_else(|e| {
                    tracing::error!(error = %e, "Failed to render auth_required template");
                    "Authentication required".to_string()
                });
                (StatusCode::UNAUTHORIZED, Html(html)).into_response()
            }
            AuthRejection::Forbidden(detail) => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Permission denied",
                    "detail": detail,
                })),
            )
                .into_response(),
        }
    }
}

/// API clients get JSON, browsers get the HTML page
fn wants_json(parts: &Parts) -> bool {
    let accepts_json = parts
        .headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"));
    accepts_json || parts.uri.path().starts_with("/api/")
}

fn current_user(parts: &Parts) -> Option<User> {
    parts
        .extensions
        .get::<CurrentUser>()
        .and_then(|current| current.user.clone())
}

/// Any authenticated user
#[derive(Debug, Clone)]
pub struct RequireUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .map(RequireUser)
            .ok_or_else(|| AuthRejection::LoginRequired {
                json: wants_json(parts),
            })
    }
}

/// Authenticated user with `is_staff`
#[derive(Debug, Clone)]
pub struct RequireStaff(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).ok_or(AuthRejection::LoginRequired { json: true })?;
        if !user.is_staff {
            tracing::warn!(username = %user.username, "Staff access denied");
            return Err(AuthRejection::Forbidden("Staff access required"));
        }
        Ok(RequireStaff(user))
    }
}

/// Authenticated user with `is_superuser`
#[derive(Debug, Clone)]
pub struct RequireSuperuser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for RequireSuperuser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts).ok_or(AuthRejection::LoginRequired { json: true })?;
        if !user.has_perm(parts.uri.path()) {
            tracing::warn!(username = %user.username, "Superuser access denied");
            return Err(AuthRejection::Forbidden("Superuser access required"));
        }
        Ok(RequireSuperuser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use common::models::NewUser;

    fn parts(path: &str, accept: Option<&str>, user: Option<User>) -> Parts {
        let mut builder = Request::builder().uri(path);
        if let Some(accept) = accept {
            builder = builder.header(ACCEPT, accept);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        parts.extensions.insert(CurrentUser { user, claims: None });
        parts
    }

    #[tokio::test]
    async fn test_require_user_rejection_format() {
        let mut browser = parts("/wiki/settings", Some("text/html"), None);
        let err = RequireUser::from_request_parts(&mut browser, &()).await.unwrap_err();
        assert_eq!(err, AuthRejection::LoginRequired { json: false });

        let mut api = parts("/api/wiki/settings", None, None);
        let err = RequireUser::from_request_parts(&mut api, &()).await.unwrap_err();
        assert_eq!(err, AuthRejection::LoginRequired { json: true });

        let mut json_client = parts("/wiki/settings", Some("application/json"), None);
        let err = RequireUser::from_request_parts(&mut json_client, &())
            .await
            .unwrap_err();
        assert_eq!(err, AuthRejection::LoginRequired { json: true });
    }

    #[tokio::test]
    async fn test_staff_and_superuser_checks() {
        let regular = NewUser::new("alice", "alice@example.com").into_user();
        let mut staff = NewUser::new("bob", "bob@example.com").into_user();
        staff.is_staff = true;
        let admin = NewUser::superuser("root", "root@example.com").into_user();

        let mut p = parts("/accounts/api/users/", None, Some(regular.clone()));
        let err = RequireStaff::from_request_parts(&mut p, &()).await.unwrap_err();
        assert_eq!(err, AuthRejection::Forbidden("Staff access required"));

        let mut p = parts("/accounts/api/users/", None, Some(staff.clone()));
        assert!(RequireStaff::from_request_parts(&mut p, &()).await.is_ok());

        let mut p = parts("/admin", None, Some(staff));
        let err = RequireSuperuser::from_request_parts(&mut p, &())
            .await
            .unwrap_err();
        assert_eq!(err, AuthRejection::Forbidden("Superuser access required"));

        let mut p = parts("/admin", None, Some(admin.clone()));
        assert!(RequireSuperuser::from_request_parts(&mut p, &()).await.is_ok());

        let mut inactive = admin;
        inactive.is_active = false;
        let mut p = parts("/admin", None, Some(inactive));
        assert!(RequireSuperuser::from_request_parts(&mut p, &()).await.is_ok());

        let mut p = parts("/admin", Some("text/html"), None);
        let err = RequireSuperuser::from_request_parts(&mut p, &())
            .await
            .unwrap_err();
        assert_eq!(err, AuthRejection::LoginRequired { json: true });
    }

    #[test]
    fn test_html_rejection_renders_page() {
        let response = AuthRejection::LoginRequired { json: false }.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/html"));
    }
}
