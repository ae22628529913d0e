//! Page rendering with minijinja.
//!
//! A fresh environment is built per render, with a loader backed by the
//! [`TemplateStore`], so template reloads never leave stale compiled
//! templates behind. Templates see the page, the request path and the user,
//! plus a few helpers:
//!
//! * `search(type)` and `lookup(id)` query the content repository;
//! * `nav_active(uri)` yields `"active"` for the current route;
//! * `include_asset(path)` inlines a file from the content directory;
//! * the `sort_by_created` filter orders search results by creation time.

use std::{fs, path::PathBuf, sync::Arc};

use minijinja::{Environment, ErrorKind, Value, context};
use serde::Serialize;
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::{
    content::ContentRepository,
    domain::{
        content::{ContentModel, SearchResult},
        route::normalize_request_path,
        user::User,
    },
};

use super::templates::{TemplateStore, resolve_within};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template `{name}` not found")]
    TemplateNotFound { name: String },
    #[error("failed to render `{name}`: {source}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("failed to serialize page content: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct PageView {
    id: String,
    created_at: String,
    created_ts: i64,
    view: String,
    #[serde(rename = "type")]
    content_type: String,
    content: serde_json::Value,
}

impl PageView {
    fn from_model(model: &ContentModel) -> Result<Self, serde_json::Error> {
        let content = match model.content.as_deref() {
            Some(payload) => payload.to_value()?,
            None => serde_json::Value::Null,
        };
        Ok(Self {
            id: model.id.clone(),
            created_at: model.created_at.format(&Rfc3339).unwrap_or_default(),
            created_ts: model.created_at.unix_timestamp(),
            view: model.view.clone(),
            content_type: model.content_type.clone(),
            content,
        })
    }
}

#[derive(Debug, Serialize)]
struct UserView<'a> {
    name: &'a str,
    roles: &'a [String],
    logged_in: bool,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            name: &user.name,
            roles: &user.roles,
            logged_in: user.is_logged_in(),
        }
    }
}

pub struct PageRenderer {
    templates: Arc<dyn TemplateStore>,
    content: Arc<ContentRepository>,
    assets_root: PathBuf,
    author: bool,
}

impl PageRenderer {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        content: Arc<ContentRepository>,
        assets_root: impl Into<PathBuf>,
        author: bool,
    ) -> Self {
        Self {
            templates,
            content,
            assets_root: assets_root.into(),
            author,
        }
    }

    /// Render `model` through its view template.
    pub fn render(
        &self,
        path: &str,
        user: &User,
        model: &ContentModel,
    ) -> Result<String, RenderError> {
        let env = self.environment(path);
        let name = model.view.as_str();

        let template = env.get_template(name).map_err(|source| {
            if source.kind() == ErrorKind::TemplateNotFound {
                RenderError::TemplateNotFound {
                    name: name.to_string(),
                }
            } else {
                RenderError::Template {
                    name: name.to_string(),
                    source,
                }
            }
        })?;

        let page = PageView::from_model(model)?;
        template
            .render(context! {
                page => page,
                path => path,
                user => UserView::from(user),
                author => self.author,
                public => !self.author,
            })
            .map_err(|source| RenderError::Template {
                name: name.to_string(),
                source,
            })
    }

    fn environment(&self, path: &str) -> Environment<'static> {
        let mut env = Environment::new();

        let templates = Arc::clone(&self.templates);
        env.set_loader(move |name| {
            templates.source(name).map_err(|err| {
                minijinja::Error::new(ErrorKind::InvalidOperation, "failed to load template")
                    .with_source(err)
            })
        });

        let content = Arc::clone(&self.content);
        env.add_function("search", move |content_type: String| -> Vec<Value> {
            content
                .search(&content_type)
                .iter()
                .filter_map(search_result_value)
                .collect()
        });

        let content = Arc::clone(&self.content);
        env.add_function("lookup", move |id: String| -> Value {
            content
                .lookup(&id)
                .as_ref()
                .and_then(search_result_value)
                .unwrap_or(Value::UNDEFINED)
        });

        let current = normalize_request_path(path);
        env.add_function("nav_active", move |uri: String| -> &'static str {
            if normalize_request_path(&uri) == current {
                "active"
            } else {
                ""
            }
        });

        let assets_root = self.assets_root.clone();
        env.add_function("include_asset", move |asset: String| -> Value {
            let Some(file) = resolve_within(&assets_root, &asset) else {
                warn!(target = "verso::render", asset = %asset, "Rejected asset include");
                return Value::from("");
            };
            match fs::read_to_string(&file) {
                Ok(body) => Value::from_safe_string(body),
                Err(err) => {
                    warn!(
                        target = "verso::render",
                        asset = %asset,
                        error = %err,
                        "Could not include asset"
                    );
                    Value::from("")
                }
            }
        });

        env.add_filter("sort_by_created", sort_by_created);
        env
    }
}

fn search_result_value(result: &SearchResult) -> Option<Value> {
    let page = PageView::from_model(&result.model)
        .map_err(|err| {
            warn!(
                target = "verso::render",
                path = %result.path,
                error = %err,
                "Skipping page with unserializable content"
            );
        })
        .ok()?;
    Some(context! {
        path => result.path,
        page => page,
    })
}

fn sort_by_created(mut items: Vec<Value>, order: Option<String>) -> Vec<Value> {
    if order.as_deref() == Some("asc") {
        items.sort_by_key(created_ts);
    } else {
        items.sort_by_key(|item| std::cmp::Reverse(created_ts(item)));
    }
    items
}

fn created_ts(item: &Value) -> i64 {
    let page = match item.get_attr("page") {
        Ok(page) if !page.is_undefined() => page,
        _ => item.clone(),
    };
    page.get_attr("created_ts")
        .ok()
        .and_then(|value| i64::try_from(value).ok())
        .unwrap_or(i64::MIN)
}
