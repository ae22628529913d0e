//! verso: a content server for sites kept under version control.
//!
//! Pages are JSON files in a working copy. They are rendered through
//! templates, guarded by role-based access control, and reloaded whenever
//! the working copy is checked out at a new revision.

pub mod application;
pub mod cache;
pub mod config;
pub mod content;
pub mod domain;
pub mod events;
pub mod infra;
pub mod render;
pub mod security;
pub mod util;
