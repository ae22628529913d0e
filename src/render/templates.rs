//! Template sources, either cached at checkout time or read on every request.

use std::{
    collections::HashMap,
    fs, io,
    path::{Component, Path, PathBuf},
    sync::{Arc, RwLock},
};

use thiserror::Error;
use tracing::info;
use walkdir::WalkDir;

use crate::{
    events::{Event, Listener, ListenerError},
    util::lock::{rw_read, swap},
};

const SOURCE: &str = "render::templates";
const TEMPLATE_EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("template root `{path}` is not readable: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to walk template root: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to read template `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resolves template names such as `views/index.html` to their source text.
pub trait TemplateStore: Send + Sync {
    /// `Ok(None)` when no template has that name.
    fn source(&self, name: &str) -> Result<Option<String>, TemplateLoadError>;
}

/// Every template under the root, read into memory and refreshed on checkout.
pub struct CachedTemplates {
    root: PathBuf,
    templates: RwLock<Arc<HashMap<String, String>>>,
}

impl CachedTemplates {
    pub fn load(root: impl Into<PathBuf>) -> Result<Self, TemplateLoadError> {
        let root = root.into();
        let templates = read_all(&root)?;
        Ok(Self {
            root,
            templates: RwLock::new(Arc::new(templates)),
        })
    }

    pub fn reload(&self) -> Result<usize, TemplateLoadError> {
        let templates = read_all(&self.root)?;
        let count = templates.len();
        swap(&self.templates, templates, SOURCE, "reload");
        info!(
            target = "verso::render",
            op = "templates_reload",
            root = %self.root.display(),
            templates = count,
            "Template cache reloaded"
        );
        Ok(count)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = rw_read(&self.templates, SOURCE, "names")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn read_all(root: &Path) -> Result<HashMap<String, String>, TemplateLoadError> {
    fs::metadata(root).map_err(|source| TemplateLoadError::Root {
        path: root.to_path_buf(),
        source,
    })?;

    let mut templates = HashMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some(TEMPLATE_EXTENSION)
        {
            continue;
        }
        let Some(name) = template_name(root, path) else {
            continue;
        };
        let source = fs::read_to_string(path).map_err(|source| TemplateLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        templates.insert(name, source);
    }
    Ok(templates)
}

fn template_name(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| match component {
            Component::Normal(segment) => segment.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;
    Some(segments.join("/"))
}

impl TemplateStore for CachedTemplates {
    fn source(&self, name: &str) -> Result<Option<String>, TemplateLoadError> {
        Ok(rw_read(&self.templates, SOURCE, "source").get(name).cloned())
    }
}

impl Listener for CachedTemplates {
    fn name(&self) -> &'static str {
        "template_cache"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::Checkout { .. } = event {
            self.reload()?;
        }
        Ok(())
    }
}

/// Reads templates from disk on every lookup so edits show up immediately.
pub struct ImmediateTemplates {
    root: PathBuf,
}

impl ImmediateTemplates {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemplateStore for ImmediateTemplates {
    fn source(&self, name: &str) -> Result<Option<String>, TemplateLoadError> {
        let Some(path) = resolve_within(&self.root, name) else {
            return Ok(None);
        };
        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TemplateLoadError::Read { path, source }),
        }
    }
}

/// Join a slash-separated relative name onto `root`, refusing anything that
/// would leave it.
pub(crate) fn resolve_within(root: &Path, name: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut pushed = false;
    for segment in name.split('/').filter(|segment| !segment.is_empty()) {
        if segment == "." || segment == ".." || segment.contains('\\') {
            return None;
        }
        path.push(segment);
        pushed = true;
    }
    pushed.then_some(path)
}
