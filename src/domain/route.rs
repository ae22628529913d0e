//! Route keys: the normalized form under which content is indexed and looked up.
//!
//! A route key always starts with `/`, uses forward slashes, is lower-cased and
//! carries no file extension. Content files map onto keys relative to the pages
//! root (`pages/Blog/First.json` becomes `/blog/first`), and request paths are
//! normalized the same way so lookups never depend on letter case.

use std::path::{Component, Path};

use thiserror::Error;

/// Route served for requests to the site root.
pub const INDEX_ROUTE: &str = "/index";

const CONTENT_EXTENSION: &str = "json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("route `{route}` escapes the content root")]
    Traversal { route: String },
    #[error("route must name a page")]
    Empty,
}

/// Derive the route key for a content file located under `root`.
///
/// Returns `None` for files outside `root` or without the content extension.
pub fn route_for_file(root: &Path, file: &Path) -> Option<String> {
    if file.extension()?.to_str()? != CONTENT_EXTENSION {
        return None;
    }
    let relative = file.strip_prefix(root).ok()?.with_extension("");

    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => segments.push(segment.to_string_lossy().to_lowercase()),
            _ => return None,
        }
    }

    if segments.is_empty() {
        return None;
    }
    Some(format!("/{}", segments.join("/")))
}

/// Normalize a request path into a route key.
///
/// The site root maps onto [`INDEX_ROUTE`]; trailing slashes and duplicate
/// separators are dropped.
pub fn normalize_request_path(path: &str) -> String {
    let segments: Vec<String> = path
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect();

    if segments.is_empty() {
        return INDEX_ROUTE.to_string();
    }
    format!("/{}", segments.join("/"))
}

/// Validate a route that will be written to disk, returning its relative file stem.
pub fn writable_route(route: &str) -> Result<String, RouteError> {
    let normalized = route.replace('\\', "/");
    let mut segments = Vec::new();
    for segment in normalized.split('/').filter(|segment| !segment.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(RouteError::Traversal {
                route: route.to_string(),
            });
        }
        segments.push(segment);
    }

    if segments.is_empty() {
        return Err(RouteError::Empty);
    }
    Ok(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn file_routes_are_lowercased_and_stripped() {
        let root = PathBuf::from("/srv/content/pages");
        let file = root.join("Blog").join("First-Post.json");
        assert_eq!(
            route_for_file(&root, &file).as_deref(),
            Some("/blog/first-post")
        );
    }

    #[test]
    fn non_content_files_are_ignored() {
        let root = PathBuf::from("/srv/content/pages");
        assert_eq!(route_for_file(&root, &root.join("notes.txt")), None);
        assert_eq!(route_for_file(&root, &PathBuf::from("/elsewhere/a.json")), None);
    }

    #[test]
    fn root_request_maps_to_index() {
        assert_eq!(normalize_request_path("/"), INDEX_ROUTE);
        assert_eq!(normalize_request_path(""), INDEX_ROUTE);
    }

    #[test]
    fn request_paths_are_normalized() {
        assert_eq!(normalize_request_path("/About//Team/"), "/about/team");
    }

    #[test]
    fn writable_route_rejects_traversal() {
        assert_eq!(
            writable_route("/pages/../../etc/passwd"),
            Err(RouteError::Traversal {
                route: "/pages/../../etc/passwd".to_string()
            })
        );
        assert_eq!(writable_route("///"), Err(RouteError::Empty));
        assert_eq!(writable_route("/blog/new").as_deref(), Ok("blog/new"));
    }
}
