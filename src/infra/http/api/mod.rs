pub mod error;
pub mod handlers;
pub mod models;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::application::site::Site;

pub fn build_api_router() -> Router<Site> {
    Router::new()
        .route("/api/v1/authenticate/login", post(handlers::login))
        .route("/api/v1/authenticate/logout", get(handlers::logout))
        .route("/api/v1/checkout", post(handlers::checkout))
        .route("/api/v1/save", post(handlers::save))
        .route("/api/v1/pages", get(handlers::list_pages))
        .route("/api/v1/pages/{*path}", put(handlers::put_page))
}
