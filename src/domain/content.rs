//! Content models as held in memory after decoding.

use std::{any::Any, fmt::Debug, sync::Arc};

use serde::Serialize;
use time::OffsetDateTime;

/// View rendered when a path has no content.
pub const NOT_FOUND_VIEW: &str = "views/errors/404.html";

/// Decoded page payload.
///
/// Payloads are opaque to the repository; templates see them through
/// [`Payload::to_value`] and handlers that know the concrete type can
/// downcast via [`ContentModel::payload`].
pub trait Payload: Any + Debug + Send + Sync {
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error>;
    fn as_any(&self) -> &dyn Any;
}

impl<T> Payload for T
where
    T: Serialize + Any + Debug + Send + Sync,
{
    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A single page of content. Replaced wholesale on reload, never mutated in place.
#[derive(Debug, Clone)]
pub struct ContentModel {
    pub id: String,
    pub created_at: OffsetDateTime,
    pub view: String,
    pub content_type: String,
    pub content: Option<Arc<dyn Payload>>,
}

impl ContentModel {
    pub fn new(view: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            created_at: OffsetDateTime::now_utc(),
            view: view.into(),
            content_type: content_type.into(),
            content: None,
        }
    }

    pub fn with_content<T: Payload>(mut self, content: T) -> Self {
        self.content = Some(Arc::new(content));
        self
    }

    /// Model handed out alongside a not-found error.
    pub fn not_found() -> Self {
        Self {
            id: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            view: NOT_FOUND_VIEW.to_string(),
            content_type: String::new(),
            content: None,
        }
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.content.as_deref()?.as_any().downcast_ref::<T>()
    }
}

/// A route key paired with the model indexed under it.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub path: String,
    pub model: ContentModel,
}
