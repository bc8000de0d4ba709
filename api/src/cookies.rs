// Token cookies set on login and silent refresh

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use common::config::Settings;

pub const ID_TOKEN_COOKIE: &str = "id_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// HTTPS behind a proxy, or forced by configuration
pub fn is_secure_request(config: &Settings, headers: &HeaderMap) -> bool {
    config.auth.secure_cookies
        || headers
            .get("X-Forwarded-Proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// HttpOnly cookie scoped to the whole site
pub fn token_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
    same_site: SameSite,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(same_site)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// Cookie matching `name` for `CookieJar::remove`
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}
