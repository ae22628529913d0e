use std::{sync::Arc, time::Instant};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, error, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::{
    application::error::ErrorReport,
    domain::{route::normalize_request_path, user::User},
    security::{AccessControlList, TokenService},
};

use super::SESSION_COOKIE;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the session cookie into a [`User`]. Missing or invalid tokens yield the anonymous user.
pub async fn resolve_session(
    State(tokens): State<Arc<TokenService>>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let user = match jar.get(SESSION_COOKIE).map(|cookie| cookie.value()) {
        Some(token) if !token.is_empty() => match tokens.token_to_user(token) {
            Ok(user) => user,
            Err(err) => {
                warn!(
                    target = "verso::http::session",
                    path = %request.uri().path(),
                    error = %err,
                    "User token could not be loaded"
                );
                User::anonymous()
            }
        },
        _ => User::anonymous(),
    };

    request.extensions_mut().insert(user.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(user);
    response
}

/// Redirect to the login page when the user lacks a role the path requires.
pub async fn authorize(
    State(acl): State<Arc<AccessControlList>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let route = normalize_request_path(request.uri().path());
    let roles = acl.get_roles(&route);
    let allowed = request
        .extensions()
        .get::<User>()
        .is_some_and(|user| user.has_roles(roles.as_slice()));

    if allowed {
        return next.run(request).await;
    }

    debug!(
        target = "verso::http::acl",
        route = %route,
        required = ?roles,
        "Missing roles, redirecting to login"
    );
    let target: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("redirect", &route)
        .finish();
    Redirect::temporary(&format!("/login?{target}")).into_response()
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let user = response
        .extensions()
        .get::<User>()
        .map(|user| user.name.clone())
        .unwrap_or_default();

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "verso::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user = %user,
                "request failed",
            );
        } else {
            warn!(
                target = "verso::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user = %user,
                "client request error",
            );
        }
    } else {
        debug!(
            target = "verso::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms = elapsed_ms,
            request_id = request_id,
            user = %user,
            "request served",
        );
    }

    response
}
