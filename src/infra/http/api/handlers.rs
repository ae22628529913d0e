use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use bytes::Bytes;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};

use crate::application::site::Site;
use crate::content::RepositoryError;
use crate::domain::content::SearchResult;
use crate::domain::route::normalize_request_path;
use crate::domain::user::{ROLE_ADMIN, ROLE_WRITE, User};
use crate::infra::http::SESSION_COOKIE;

use super::error::{ApiError, codes};
use super::models::*;

const SESSION_MAX_AGE: Duration = Duration::hours(1);

/// -------- Authentication --------
pub async fn login(
    State(site): State<Site>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    info!(
        target = "verso::http::api",
        op = "login",
        username = %payload.username,
        "Login attempt"
    );

    let user = site
        .credentials
        .login(&payload.username, &payload.password)
        .map_err(|err| {
            warn!(
                target = "verso::http::api",
                op = "login",
                result = "rejected",
                username = %payload.username,
                error = %err,
                "Login rejected"
            );
            ApiError::unauthorized()
        })?;

    let token = site.tokens.user_to_token(&user).map_err(|err| {
        ApiError::internal(codes::TOKEN, "Could not issue token", Some(err.to_string()))
    })?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .max_age(SESSION_MAX_AGE)
        .http_only(true);

    info!(
        target = "verso::http::api",
        op = "login",
        result = "ok",
        username = %user.name,
        "User logged in"
    );
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            name: user.name,
            token,
        }),
    ))
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    let expired = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO);
    (jar.add(expired), Redirect::temporary("/login?logout=true"))
}

/// -------- Version control --------
pub async fn checkout(
    State(site): State<Site>,
    Extension(user): Extension<User>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    site.controller.update(&payload.commit).await.map_err(|err| {
        warn!(
            target = "verso::http::api",
            op = "checkout",
            commit = %payload.commit,
            error = %err,
            "Checkout failed"
        );
        ApiError::from(err)
    })?;

    Ok(Json(CheckoutResponse {
        commit: payload.commit,
    }))
}

pub async fn save(
    State(site): State<Site>,
    Extension(user): Extension<User>,
    Json(payload): Json<SaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&user)?;

    site.controller.save(&payload.message).await.map_err(|err| {
        warn!(
            target = "verso::http::api",
            op = "save",
            error = %err,
            "Save failed"
        );
        ApiError::from(err)
    })?;

    Ok(Json(SaveResponse {
        message: payload.message,
    }))
}

/// -------- Pages --------
pub async fn list_pages(State(site): State<Site>) -> Result<impl IntoResponse, ApiError> {
    let pages = site
        .content
        .get_all()
        .into_iter()
        .map(PageSummary::from_result)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| {
            ApiError::internal(codes::CONTENT, "Could not list pages", Some(err.to_string()))
        })?;
    Ok(Json(pages))
}

/// Write a page file below the pages directory. The page is served after the next reload.
pub async fn put_page(
    State(site): State<Site>,
    Extension(user): Extension<User>,
    Path(path): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if !site.mode.is_author() {
        return Err(ApiError::not_found("Page editing is disabled"));
    }
    if !user.has_role(ROLE_WRITE) {
        return Err(ApiError::forbidden());
    }

    let mut model = site
        .content
        .decode(&body)
        .map_err(|err| ApiError::bad_request("Invalid page", Some(err.to_string())))?;
    if model.created_at == OffsetDateTime::UNIX_EPOCH {
        model.created_at = OffsetDateTime::now_utc();
    }

    let content = site.content.clone();
    let route = format!("/{}", path.trim_start_matches('/'));
    let saved = tokio::task::spawn_blocking(move || content.save(&route, model))
        .await
        .map_err(|err| {
            ApiError::internal(codes::CONTENT, "Could not save page", Some(err.to_string()))
        })?
        .map_err(|err| match err {
            RepositoryError::Route(_) => {
                ApiError::bad_request("Invalid page path", Some(err.to_string()))
            }
            other => ApiError::internal(
                codes::CONTENT,
                "Could not save page",
                Some(other.to_string()),
            ),
        })?;

    let summary = PageSummary::from_result(SearchResult {
        path: normalize_request_path(&path),
        model: saved,
    })
    .map_err(|err| {
        ApiError::internal(codes::CONTENT, "Could not save page", Some(err.to_string()))
    })?;

    Ok((StatusCode::OK, Json(summary)))
}

fn require_admin(user: &User) -> Result<(), ApiError> {
    if user.is_logged_in() && user.has_role(ROLE_ADMIN) {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}
