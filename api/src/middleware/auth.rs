use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{
        header::{AUTHORIZATION, SET_COOKIE},
        request::Parts,
        HeaderMap,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{CookieJar, SameSite};
use common::auth::TokenSource;
use common::models::{CognitoClaims, User};
use std::convert::Infallible;

use crate::cookies::{self, ID_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::state::AppState;

/// Identity attached to every request by `cognito_auth_middleware`
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub user: Option<User>,
    pub claims: Option<CognitoClaims>,
}

impl CurrentUser {
    pub fn id(&self) -> Option<uuid::Uuid> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .unwrap_or_default())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Whether the handler already wrote a `Set-Cookie` for `name`
fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|cookie| {
            cookie
                .split_once('=')
                .is_some_and(|(cookie_name, _)| cookie_name.trim() == name)
        })
}

/// Cognito authentication middleware
///
/// Never rejects: requests without a usable token continue anonymously and
/// route guards decide. When the id token had to be renewed the new one is
/// written back as a cookie.
#[tracing::instrument(skip_all, fields(path = %req.uri().path()))]
pub async fn cognito_auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let bearer = bearer_token(req.headers());
    let source = TokenSource {
        bearer: bearer.as_deref(),
        id_token_cookie: jar.get(ID_TOKEN_COOKIE).map(|c| c.value()),
        refresh_token_cookie: jar.get(REFRESH_TOKEN_COOKIE).map(|c| c.value()),
    };

    let authentication = state.authenticator.authenticate(&source).await;
    let secure = cookies::is_secure_request(&state.config, req.headers());

    if let Some(user) = &authentication.user {
        tracing::debug!(user_id = %user.id, username = %user.username, "Request authenticated");
    }

    req.extensions_mut().insert(CurrentUser {
        user: authentication.user,
        claims: authentication.claims,
    });

    let response = next.run(req).await;

    match authentication.refreshed_id_token {
        // Login and logout write the id token cookie themselves
        Some(_) if sets_cookie(&response, ID_TOKEN_COOKIE) => response,
        Some(token) => {
            let cookie = cookies::token_cookie(
                ID_TOKEN_COOKIE,
                token,
                state.config.auth.id_token_max_age_seconds,
                secure,
                SameSite::Lax,
            );
            (jar.add(cookie), response).into_response()
        }
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn test_sets_cookie_matches_exact_name() {
        let mut response = Response::new(axum::body::Body::empty());
        assert!(!sets_cookie(&response, ID_TOKEN_COOKIE));

        response.headers_mut().append(
            SET_COOKIE,
            HeaderValue::from_static("refresh_token=; Path=/; Max-Age=0"),
        );
        assert!(!sets_cookie(&response, ID_TOKEN_COOKIE));

        response.headers_mut().append(
            SET_COOKIE,
            HeaderValue::from_static("id_token=; Path=/; Max-Age=0"),
        );
        assert!(sets_cookie(&response, ID_TOKEN_COOKIE));
    }
}
