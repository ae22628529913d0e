use axum::{
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use tracing::warn;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        site::Site,
    },
    domain::user::User,
    infra::assets,
    render::RenderError,
};

const SOURCE: &str = "infra::http::public::render_page";

/// Render the page indexed under the request path through its view template.
///
/// Unknown paths render the not-found view with status 404. When that view is
/// missing too, a plain-text body is returned instead.
pub async fn render_page(State(site): State<Site>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let user = request
        .extensions()
        .get::<User>()
        .cloned()
        .unwrap_or_else(User::anonymous);

    let (status, model, missing) = match site.content.find_by_path(&path) {
        Ok(model) => (StatusCode::OK, model, None),
        Err(not_found) => {
            let message = not_found.to_string();
            (StatusCode::NOT_FOUND, not_found.sentinel, Some(message))
        }
    };

    let renderer = site.renderer.clone();
    let render_path = path.clone();
    let rendered =
        tokio::task::spawn_blocking(move || renderer.render(&render_path, &user, &model)).await;

    match rendered {
        Ok(Ok(body)) => {
            let mut response = (status, Html(body)).into_response();
            if let Some(message) = missing {
                ErrorReport::from_message(SOURCE, status, message)
                    .attach(&mut response);
            }
            response
        }
        Ok(Err(RenderError::TemplateNotFound { name })) if missing.is_some() => {
            warn!(
                target = "verso::http::public",
                path = %path,
                template = %name,
                "Not-found view is missing"
            );
            let message = missing.unwrap_or_default();
            let mut response = (status, message.clone()).into_response();
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            ErrorReport::from_message(SOURCE, status, message)
                .attach(&mut response);
            response
        }
        Ok(Err(err)) => HttpError::from(err).into_response(),
        Err(err) => HttpError::from_error(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "Page could not be rendered",
            &err,
        )
        .into_response(),
    }
}

pub async fn serve_asset(State(site): State<Site>, Path(path): Path<String>) -> Response {
    assets::serve(&site.assets, &path).await
}
