//! Version-controlled content: the working copy, its controller and the page index.

pub mod codec;
pub mod controller;
pub mod repository;
pub mod vcs;

pub use codec::{DecodeError, DecodeFn, DecoderRegistry};
pub use controller::{ContentController, ControllerError};
pub use repository::{ContentNotFound, ContentRepository, ReloadSummary, RepositoryError};
pub use vcs::{GitCli, VcsError, VersionControl};
