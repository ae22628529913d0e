//! Static files served verbatim from the content working copy.

use std::{
    io,
    path::{Component, Path, PathBuf},
};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use mime_guess::Mime;
use thiserror::Error;
use tracing::error;

use crate::application::error::ErrorReport;

const SOURCE: &str = "infra::assets::serve";

#[derive(Debug, Error)]
pub enum AssetError {
    /// Empty paths, directories and anything escaping the root.
    #[error("asset request rejected")]
    Rejected,
    #[error("asset not found")]
    NotFound,
    #[error("failed to read asset: {0}")]
    Io(#[from] io::Error),
}

/// A directory whose files are exposed under the assets prefix.
#[derive(Debug, Clone)]
pub struct AssetDirectory {
    root: PathBuf,
}

impl AssetDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read(&self, path: &str) -> Result<(Bytes, Mime), AssetError> {
        let relative = resolve_asset(path).ok_or(AssetError::Rejected)?;
        let target = self.root.join(&relative);

        let metadata = match tokio::fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(AssetError::NotFound),
            Err(err) => return Err(AssetError::Io(err)),
        };
        if metadata.is_dir() {
            return Err(AssetError::Rejected);
        }

        let bytes = tokio::fs::read(&target).await?;
        let mime = mime_guess::from_path(&relative).first_or_octet_stream();
        Ok((Bytes::from(bytes), mime))
    }
}

/// Serve `path` from `assets`, answering 404 for anything that is not a plain file below the root.
pub async fn serve(assets: &AssetDirectory, path: &str) -> Response {
    match assets.read(path).await {
        Ok((bytes, mime)) => build_response(bytes, mime),
        Err(AssetError::Rejected) => rejected_response(),
        Err(AssetError::NotFound) => not_found_response(),
        Err(AssetError::Io(err)) => {
            error!(target = SOURCE, path = %path, error = %err, "failed to read asset");
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
                .attach(&mut response);
            response
        }
    }
}

fn not_found_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset not found")
        .attach(&mut response);
    response
}

fn rejected_response() -> Response {
    let mut response = StatusCode::NOT_FOUND.into_response();
    ErrorReport::from_message(SOURCE, StatusCode::NOT_FOUND, "Static asset request rejected")
        .attach(&mut response);
    response
}

fn resolve_asset(path: &str) -> Option<PathBuf> {
    let candidate = path.trim_start_matches('/');
    if candidate.is_empty() || candidate.ends_with('/') || candidate.contains('\\') {
        return None;
    }

    let relative = Path::new(candidate);
    relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)))
        .then(|| relative.to_path_buf())
}

fn build_response(bytes: Bytes, mime: Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    response
}
