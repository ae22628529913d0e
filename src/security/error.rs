use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Raised for unknown users and wrong passwords alike.
    #[error("invalid username or password")]
    InvalidCredentials { username: String },
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to read key `{path}`: {source}")]
    KeyFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid signing key: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),
    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}
