pub mod api;
mod middleware;
mod public;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::{application::site::Site, cache::page_cache_layer};

use self::middleware::{authorize, log_responses, resolve_session, set_request_context};

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "X-Auth-Token";

/// Build the complete router for `site`.
///
/// Requests pass through request-id assignment, response logging, session
/// resolution and the access control check before reaching a handler.
/// Rendered pages additionally go through the page cache.
pub fn build_router(site: Site) -> Router {
    let pages = Router::new()
        .fallback(public::render_page)
        .layer(axum_middleware::from_fn_with_state(
            site.cache.clone(),
            page_cache_layer,
        ));

    let assets_route = format!("{}/{{*path}}", site.assets_prefix);

    api::build_api_router()
        .route(&assets_route, get(public::serve_asset))
        .merge(pages)
        .with_state(site.clone())
        .layer(axum_middleware::from_fn_with_state(
            site.acl.clone(),
            authorize,
        ))
        .layer(axum_middleware::from_fn_with_state(
            site.tokens.clone(),
            resolve_session,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
