//! Authentication and authorization: role lookup, credentials and session tokens.

pub mod acl;
pub mod credentials;
pub mod error;
pub mod password;
pub mod tokens;

pub use acl::{AccessControlList, AccessEntry};
pub use credentials::{CredentialEntry, CredentialStore};
pub use error::{AuthError, TokenError};
pub use tokens::TokenService;
