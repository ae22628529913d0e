//! Template storage and page rendering.

pub mod renderer;
pub mod templates;

pub use renderer::{PageRenderer, RenderError};
pub use templates::{CachedTemplates, ImmediateTemplates, TemplateLoadError, TemplateStore};
