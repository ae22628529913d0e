//! Response caching for rendered pages.
//!
//! Only anonymous GET requests whose route the policy allows are considered.
//! Successful responses are buffered and stored; later requests for the same
//! route are answered from the cache until the next checkout flushes it.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use crate::domain::{route::normalize_request_path, user::User};

use super::PageCache;

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<Arc<dyn PageCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    let logged_in = request
        .extensions()
        .get::<User>()
        .is_some_and(User::is_logged_in);
    if logged_in {
        return next.run(request).await;
    }

    let route = normalize_request_path(request.uri().path());
    if !cache.is_allowed(&route) {
        return next.run(request).await;
    }

    if let Ok(page) = cache.find(&route) {
        debug!(cache = "pages", outcome = "hit", route = %route, "serving cached page");
        return build_response(page);
    }
    debug!(cache = "pages", outcome = "miss", route = %route, "cache miss, rendering page");

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            cache.set(&route, bytes.clone());
            let mut response = Response::from_parts(parts, Body::from(bytes.clone()));
            set_content_length(&mut response, bytes.len());
            response
        }
        Err(err) => {
            warn!(
                cache = "pages",
                route = %route,
                error = %err,
                "failed to buffer response for caching"
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn build_response(page: Bytes) -> Response {
    let len = page.len();
    let mut response = Response::new(Body::from(page));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    set_content_length(&mut response, len);
    response
}

fn set_content_length(response: &mut Response, len: usize) {
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        response.headers_mut().insert(header::CONTENT_LENGTH, value);
    }
}
