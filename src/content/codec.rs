//! On-disk page files and the payload decoders keyed by content-type tag.

use std::{collections::HashMap, sync::Arc};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::content::{ContentModel, Payload};

/// Decodes the raw `Content` value of a page file into a payload.
pub type DecodeFn =
    Arc<dyn Fn(serde_json::Value) -> Result<Arc<dyn Payload>, serde_json::Error> + Send + Sync>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed page file: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("no decoder registered for content type `{content_type}`")]
    UnknownType { content_type: String },
    #[error("content of type `{content_type}` could not be decoded: {source}")]
    Payload {
        content_type: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PageFile {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
    #[serde(default)]
    view: String,
    #[serde(rename = "Type", default)]
    content_type: String,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct PageFileRef<'a> {
    #[serde(rename = "ID")]
    id: &'a str,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    view: &'a str,
    #[serde(rename = "Type")]
    content_type: &'a str,
    content: serde_json::Value,
}

/// Content-type tag to decoder table.
#[derive(Clone, Default)]
pub struct DecoderRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl DecoderRegistry {
    pub fn insert(&mut self, content_type: impl Into<String>, decoder: DecodeFn) {
        self.decoders.insert(content_type.into(), decoder);
    }

    /// Register `T` as the payload type for `content_type`.
    pub fn insert_type<T>(&mut self, content_type: impl Into<String>)
    where
        T: DeserializeOwned + Payload,
    {
        let decoder: DecodeFn = Arc::new(|value| {
            let payload: T = serde_json::from_value(value)?;
            Ok(Arc::new(payload) as Arc<dyn Payload>)
        });
        self.insert(content_type, decoder);
    }

    pub fn contains(&self, content_type: &str) -> bool {
        self.decoders.contains_key(content_type)
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<ContentModel, DecodeError> {
        let file: PageFile = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;

        // Untyped pages carry no payload.
        let content = if file.content_type.is_empty() {
            None
        } else {
            let decoder = self.decoders.get(&file.content_type).ok_or_else(|| {
                DecodeError::UnknownType {
                    content_type: file.content_type.clone(),
                }
            })?;
            if file.content.is_null() {
                None
            } else {
                let payload = decoder(file.content).map_err(|source| DecodeError::Payload {
                    content_type: file.content_type.clone(),
                    source,
                })?;
                Some(payload)
            }
        };

        Ok(ContentModel {
            id: file.id,
            created_at: file.created_at.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            view: file.view,
            content_type: file.content_type,
            content,
        })
    }
}

/// Serialize a model in the page file layout.
pub fn encode(model: &ContentModel) -> Result<Vec<u8>, serde_json::Error> {
    let content = match model.content.as_deref() {
        Some(payload) => payload.to_value()?,
        None => serde_json::Value::Null,
    };
    serde_json::to_vec_pretty(&PageFileRef {
        id: &model.id,
        created_at: model.created_at,
        view: &model.view,
        content_type: &model.content_type,
        content,
    })
}
