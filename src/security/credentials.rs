//! File-backed username/password verification.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    domain::user::User,
    events::{Event, Listener, ListenerError},
    util::{
        json_file::{LoadError, load_json},
        lock::{rw_read, snapshot, swap},
    },
};

use super::{error::AuthError, password};

const SOURCE: &str = "security::credentials";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CredentialEntry {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CredentialFile {
    users: Vec<CredentialEntry>,
}

/// Users allowed to log in, reloaded whenever the working copy changes.
pub struct CredentialStore {
    path: PathBuf,
    users: RwLock<Arc<Vec<CredentialEntry>>>,
}

impl CredentialStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let users = read_users(&path)?;
        Ok(Self {
            path,
            users: RwLock::new(Arc::new(users)),
        })
    }

    pub fn reload(&self) -> Result<usize, LoadError> {
        let users = read_users(&self.path)?;
        let count = users.len();
        swap(&self.users, users, SOURCE, "reload");
        info!(
            target = "verso::security",
            op = "credentials_reload",
            path = %self.path.display(),
            users = count,
            "Credential store reloaded"
        );
        Ok(count)
    }

    /// Verify a username/password pair.
    ///
    /// The first entry matching both name and password wins. Unknown users and
    /// wrong passwords produce the same error.
    pub fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let users = snapshot(&self.users, SOURCE, "login");

        let matched = users.iter().find(|entry| {
            entry.username == username && password::verify(&entry.password, password)
        });

        match matched {
            Some(entry) => Ok(User::new(entry.username.clone(), entry.roles.clone())),
            None => {
                debug!(target = "verso::security", username, "Login rejected");
                Err(AuthError::InvalidCredentials {
                    username: username.to_string(),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.users, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_users(path: &Path) -> Result<Vec<CredentialEntry>, LoadError> {
    let file: CredentialFile = load_json(path)?;
    Ok(file.users)
}

impl Listener for CredentialStore {
    fn name(&self) -> &'static str {
        "credential_store"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::Checkout { .. } = event {
            self.reload()?;
        }
        Ok(())
    }
}
