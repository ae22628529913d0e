//! Path-indexed content loaded from the pages directory.
//!
//! The index is an immutable snapshot behind an `RwLock<Arc<_>>`. Reloads
//! build a complete replacement without holding the lock and swap it in at
//! the end, so readers observe either the old index or the new one.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::Instant,
};

use metrics::histogram;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{
    domain::{
        content::{ContentModel, Payload, SearchResult},
        route::{RouteError, normalize_request_path, route_for_file, writable_route},
    },
    events::{Event, Listener, ListenerError},
    util::lock::{self, rw_read, rw_write},
};

use super::codec::{self, DecodeError, DecodeFn, DecoderRegistry};

const SOURCE: &str = "content::repository";

type ContentIndex = BTreeMap<String, ContentModel>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("content root `{path}` is not readable: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("content root `{path}` is not a directory")]
    NotADirectory { path: PathBuf },
    #[error("failed to walk content root: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Route(#[from] RouteError),
    #[error("failed to encode page: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// No content is indexed under the requested path.
#[derive(Debug, Clone, Error)]
#[error("could not find: {path}")]
pub struct ContentNotFound {
    pub path: String,
    /// Model to render in place of the missing page.
    pub sentinel: ContentModel,
}

/// Outcome of a successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub loaded: usize,
    pub skipped: usize,
}

pub struct ContentRepository {
    root: PathBuf,
    decoders: RwLock<DecoderRegistry>,
    index: RwLock<Arc<ContentIndex>>,
}

impl ContentRepository {
    /// Create an empty repository rooted at `root`. Call [`reload`](Self::reload) to populate it.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            decoders: RwLock::new(DecoderRegistry::default()),
            index: RwLock::new(Arc::new(ContentIndex::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode pages tagged `content_type` into `T`.
    pub fn register_model_type<T>(&self, content_type: impl Into<String>)
    where
        T: DeserializeOwned + Payload,
    {
        rw_write(&self.decoders, SOURCE, "register_model_type").insert_type::<T>(content_type);
    }

    pub fn register_decoder(&self, content_type: impl Into<String>, decoder: DecodeFn) {
        rw_write(&self.decoders, SOURCE, "register_decoder").insert(content_type, decoder);
    }

    /// Decode a page file body with the registered decoders.
    pub fn decode(&self, bytes: &[u8]) -> Result<ContentModel, DecodeError> {
        rw_read(&self.decoders, SOURCE, "decode").decode(bytes)
    }

    /// Rebuild the index from disk and swap it in.
    ///
    /// Files that fail to read or decode are logged and left out. A missing or
    /// unreadable root fails the reload and leaves the current index in place.
    pub fn reload(&self) -> Result<ReloadSummary, RepositoryError> {
        let started_at = Instant::now();

        let metadata = fs::metadata(&self.root).map_err(|source| RepositoryError::Root {
            path: self.root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(RepositoryError::NotADirectory {
                path: self.root.clone(),
            });
        }

        let decoders = rw_read(&self.decoders, SOURCE, "reload").clone();
        let mut next = ContentIndex::new();
        let mut skipped = 0;

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => return Err(RepositoryError::Walk(err)),
                Err(err) => {
                    warn!(
                        target = "verso::content",
                        op = "reload",
                        result = "skipped",
                        error = %err,
                        "Unreadable entry under content root"
                    );
                    skipped += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(route) = route_for_file(&self.root, entry.path()) else {
                continue;
            };

            let model = match fs::read(entry.path()) {
                Ok(bytes) => decoders.decode(&bytes),
                Err(err) => {
                    warn!(
                        target = "verso::content",
                        op = "reload",
                        result = "skipped",
                        file = %entry.path().display(),
                        error = %err,
                        "Failed to read page file"
                    );
                    skipped += 1;
                    continue;
                }
            };

            match model {
                Ok(model) => {
                    if next.insert(route.clone(), model).is_some() {
                        warn!(
                            target = "verso::content",
                            op = "reload",
                            route = %route,
                            file = %entry.path().display(),
                            "Duplicate route; later file replaces earlier one"
                        );
                    }
                }
                Err(err) => {
                    warn!(
                        target = "verso::content",
                        op = "reload",
                        result = "skipped",
                        file = %entry.path().display(),
                        error = %err,
                        "Failed to decode page file"
                    );
                    skipped += 1;
                }
            }
        }

        let summary = ReloadSummary {
            loaded: next.len(),
            skipped,
        };
        lock::swap(&self.index, next, SOURCE, "reload");

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        histogram!("verso_content_reload_ms").record(elapsed_ms as f64);
        info!(
            target = "verso::content",
            op = "reload",
            result = "ok",
            root = %self.root.display(),
            loaded = summary.loaded,
            skipped = summary.skipped,
            elapsed_ms,
            "Content index reloaded"
        );
        Ok(summary)
    }

    fn snapshot(&self) -> Arc<ContentIndex> {
        lock::snapshot(&self.index, SOURCE, "snapshot")
    }

    pub fn find_by_path(&self, path: &str) -> Result<ContentModel, ContentNotFound> {
        let route = normalize_request_path(path);
        match self.snapshot().get(&route) {
            Some(model) => Ok(model.clone()),
            None => {
                debug!(target = "verso::content", route = %route, "Content not found");
                Err(ContentNotFound {
                    path: route,
                    sentinel: ContentModel::not_found(),
                })
            }
        }
    }

    /// Persist `model` at `path` below the content root, assigning an id when it has none.
    ///
    /// The in-memory index is left untouched; the page becomes visible after
    /// the next reload.
    pub fn save(&self, path: &str, mut model: ContentModel) -> Result<ContentModel, RepositoryError> {
        let stem = writable_route(path)?;
        if model.id.is_empty() {
            model.id = Uuid::new_v4().to_string();
        }

        let target = self.root.join(format!("{stem}.json"));
        let bytes = codec::encode(&model)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| RepositoryError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&target, bytes).map_err(|source| RepositoryError::Write {
            path: target.clone(),
            source,
        })?;

        info!(
            target = "verso::content",
            op = "save",
            id = %model.id,
            file = %target.display(),
            "Page saved"
        );
        Ok(model)
    }

    /// Every page whose content type equals `content_type`, ordered by path.
    pub fn search(&self, content_type: &str) -> Vec<SearchResult> {
        self.snapshot()
            .iter()
            .filter(|(_, model)| model.content_type == content_type)
            .map(|(path, model)| SearchResult {
                path: path.clone(),
                model: model.clone(),
            })
            .collect()
    }

    pub fn lookup(&self, id: &str) -> Option<SearchResult> {
        if id.is_empty() {
            return None;
        }
        self.snapshot()
            .iter()
            .find(|(_, model)| model.id == id)
            .map(|(path, model)| SearchResult {
                path: path.clone(),
                model: model.clone(),
            })
    }

    pub fn get_all(&self) -> Vec<SearchResult> {
        self.snapshot()
            .iter()
            .map(|(path, model)| SearchResult {
                path: path.clone(),
                model: model.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

impl Listener for ContentRepository {
    fn name(&self) -> &'static str {
        "content_repository"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::Checkout { .. } = event {
            self.reload()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Article {
        title: String,
    }

    fn write_page(root: &Path, relative: &str, id: &str, view: &str, content_type: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
        let body = serde_json::json!({
            "ID": id,
            "CreatedAt": "2021-01-01T00:00:00Z",
            "View": view,
            "Type": content_type,
            "Content": { "Title": format!("title of {id}") }
        });
        fs::write(path, serde_json::to_vec(&body).expect("json")).expect("write page");
    }

    fn repository(dir: &TempDir) -> ContentRepository {
        let repo = ContentRepository::new(dir.path());
        repo.register_model_type::<Article>("article");
        repo
    }

    #[test]
    fn finds_loaded_page_by_route() {
        let dir = TempDir::new().expect("temp dir");
        write_page(dir.path(), "Blog/First.json", "1", "views/article.html", "article");
        let repo = repository(&dir);

        let summary = repo.reload().expect("reload");
        assert_eq!(summary, ReloadSummary { loaded: 1, skipped: 0 });

        let model = repo.find_by_path("/blog/first").expect("page exists");
        assert_eq!(model.id, "1");
        assert_eq!(
            model.payload::<Article>().map(|a| a.title.as_str()),
            Some("title of 1")
        );
    }

    #[test]
    fn missing_page_yields_sentinel() {
        let dir = TempDir::new().expect("temp dir");
        let repo = repository(&dir);
        repo.reload().expect("reload");

        let err = repo.find_by_path("/nope").expect_err("absent");
        assert_eq!(err.path, "/nope");
        assert_eq!(err.sentinel.view, crate::domain::content::NOT_FOUND_VIEW);
        assert_eq!(err.to_string(), "could not find: /nope");
    }

    #[test]
    fn undecodable_files_are_skipped() {
        let dir = TempDir::new().expect("temp dir");
        write_page(dir.path(), "good.json", "1", "v.html", "article");
        write_page(dir.path(), "unknown.json", "2", "v.html", "gallery");
        fs::write(dir.path().join("broken.json"), b"{ not json").expect("write");
        fs::write(dir.path().join("notes.txt"), b"ignored").expect("write");
        let repo = repository(&dir);

        let summary = repo.reload().expect("reload");
        assert_eq!(summary, ReloadSummary { loaded: 1, skipped: 2 });
        assert!(repo.find_by_path("/good").is_ok());
        assert!(repo.find_by_path("/unknown").is_err());
    }

    #[test]
    fn untyped_pages_load_without_content() {
        let dir = TempDir::new().expect("temp dir");
        let body = serde_json::json!({
            "ID": "plain-1",
            "CreatedAt": "2021-01-01T00:00:00Z",
            "View": "views/plain.html",
            "Type": "",
            "Content": null
        });
        fs::write(dir.path().join("plain.json"), body.to_string()).expect("write");
        let repo = repository(&dir);

        let summary = repo.reload().expect("reload");
        assert_eq!(summary, ReloadSummary { loaded: 1, skipped: 0 });

        let model = repo.find_by_path("/plain").expect("page exists");
        assert_eq!(model.view, "views/plain.html");
        assert!(model.content_type.is_empty());
        assert!(model.content.is_none());
    }

    #[test]
    fn missing_root_fails_and_keeps_previous_index() {
        let dir = TempDir::new().expect("temp dir");
        let root = dir.path().join("pages");
        write_page(&root, "index.json", "1", "v.html", "article");
        let repo = ContentRepository::new(&root);
        repo.register_model_type::<Article>("article");
        repo.reload().expect("initial reload");

        fs::remove_dir_all(&root).expect("remove root");
        let err = repo.reload().expect_err("root missing");
        assert!(matches!(err, RepositoryError::Root { .. }));
        assert!(repo.find_by_path("/index").is_ok());
    }

    #[test]
    fn search_lookup_and_get_all_are_ordered_by_path() {
        let dir = TempDir::new().expect("temp dir");
        write_page(dir.path(), "b.json", "id-b", "v.html", "article");
        write_page(dir.path(), "a.json", "id-a", "v.html", "article");
        write_page(dir.path(), "c.json", "id-c", "v.html", "page");
        let repo = repository(&dir);
        repo.register_model_type::<serde_json::Value>("page");
        repo.reload().expect("reload");

        let articles: Vec<_> = repo
            .search("article")
            .into_iter()
            .map(|result| result.path)
            .collect();
        assert_eq!(articles, vec!["/a", "/b"]);

        let all: Vec<_> = repo.get_all().into_iter().map(|result| result.path).collect();
        assert_eq!(all, vec!["/a", "/b", "/c"]);

        assert_eq!(repo.lookup("id-c").map(|result| result.path).as_deref(), Some("/c"));
        assert!(repo.lookup("missing").is_none());
        assert!(repo.lookup("").is_none());
    }

    #[test]
    fn save_writes_file_with_generated_id_but_does_not_index() {
        let dir = TempDir::new().expect("temp dir");
        let repo = repository(&dir);
        repo.reload().expect("reload");

        let model = ContentModel::new("views/article.html", "article").with_content(Article {
            title: "Fresh".to_string(),
        });
        let saved = repo.save("/news/fresh", model).expect("save");

        assert!(!saved.id.is_empty());
        assert!(dir.path().join("news/fresh.json").is_file());
        assert!(repo.find_by_path("/news/fresh").is_err());

        repo.reload().expect("reload");
        let loaded = repo.find_by_path("/news/fresh").expect("indexed after reload");
        assert_eq!(loaded.id, saved.id);
    }

    #[test]
    fn save_rejects_paths_outside_root() {
        let dir = TempDir::new().expect("temp dir");
        let repo = repository(&dir);
        let err = repo
            .save("../escape", ContentModel::new("v.html", "article"))
            .expect_err("traversal");
        assert!(matches!(err, RepositoryError::Route(RouteError::Traversal { .. })));
    }

    #[test]
    fn decode_uses_registered_types() {
        let dir = TempDir::new().expect("temp dir");
        let repo = repository(&dir);

        let body = br#"{"View":"views/article.html","Type":"article","Content":{"Title":"Hi"}}"#;
        let model = repo.decode(body).expect("decodes");
        assert_eq!(
            model.payload::<Article>().map(|a| a.title.as_str()),
            Some("Hi")
        );

        let unknown = br#"{"View":"v.html","Type":"gallery","Content":{}}"#;
        assert!(repo.decode(unknown).is_err());
    }

    #[test]
    fn checkout_event_reloads_and_push_does_not() {
        let dir = TempDir::new().expect("temp dir");
        let repo = repository(&dir);
        repo.reload().expect("reload");
        write_page(dir.path(), "index.json", "1", "v.html", "article");

        repo.on_event(&Event::Push).expect("push ignored");
        assert!(repo.is_empty());

        repo.on_event(&Event::Checkout {
            commit: "abc123".to_string(),
        })
        .expect("checkout reloads");
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn readers_never_observe_a_partial_reload() {
        let dir = TempDir::new().expect("temp dir");
        for n in 0..20 {
            write_page(dir.path(), &format!("p{n:02}.json"), "gen-a", "views/a.html", "article");
        }
        let repo = Arc::new(repository(&dir));
        repo.reload().expect("reload");

        let done = Arc::new(AtomicBool::new(false));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let repo = Arc::clone(&repo);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let all = repo.get_all();
                        assert_eq!(all.len(), 20);
                        let first = all[0].model.view.clone();
                        assert!(all.iter().all(|result| result.model.view == first));
                    }
                })
            })
            .collect();

        for round in 0..25 {
            let view = if round % 2 == 0 { "views/b.html" } else { "views/a.html" };
            for n in 0..20 {
                write_page(dir.path(), &format!("p{n:02}.json"), "gen", view, "article");
            }
            repo.reload().expect("reload");
        }

        done.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().expect("reader thread");
        }
    }
}
