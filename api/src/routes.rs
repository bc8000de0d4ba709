use axum::{
    routing::{delete, get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::handlers::wiki::{pages, settings, share};
use crate::middleware::cognito_auth_middleware;
use crate::state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create the main application router with all routes and middleware
#[tracing::instrument(skip(state))]
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let wiki_routes = Router::new()
        .route("/", get(pages::index))
        .route("/api/wiki/pages", get(pages::index).post(pages::create))
        .route("/api/wiki/new", get(pages::new_page))
        .route("/api/wiki/tree", get(pages::tree))
        .route(
            "/api/wiki/pages/:username/*slug",
            get(pages::detail).put(pages::update),
        )
        .route("/api/wiki/page/:id", delete(pages::delete))
        .route(
            "/api/wiki/share/:share_code",
            get(share::share_detail).put(share::share_update),
        )
        .route(
            "/api/wiki/settings",
            get(settings::page_settings).put(settings::update_page_settings),
        );

    let account_routes = Router::new()
        .route(
            "/accounts/login/",
            post(handlers::accounts::login_submit),
        )
        .route(
            "/accounts/logout/",
            get(handlers::accounts::logout).post(handlers::accounts::logout),
        )
        .route("/accounts/api/login/", post(handlers::accounts::api_login))
        .route("/accounts/api/signup/", post(handlers::accounts::api_signup))
        .route("/accounts/api/confirm/", post(handlers::accounts::api_confirm))
        .route(
            "/accounts/api/resend-code/",
            post(handlers::accounts::api_resend_code),
        )
        .route(
            "/accounts/api/current-user/",
            get(handlers::accounts::current_user),
        )
        .route("/accounts/api/users/", get(handlers::accounts::user_list))
        .route("/accounts/health/", get(handlers::health::accounts_health));

    // Every route sees the authenticated identity; guards live in the handlers
    let authenticated_routes = Router::new()
        .merge(wiki_routes)
        .merge(account_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            cognito_auth_middleware,
        ));

    // Probes and metrics (no authentication)
    let ops_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::metrics_handler));

    // Combine all routes
    Router::new()
        .merge(authenticated_routes)
        .merge(ops_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(cors),
        )
        .with_state(state)
}
