//! Prefix-based role requirements.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    events::{Event, Listener, ListenerError},
    util::{
        json_file::{LoadError, load_json},
        lock::{rw_read, snapshot, swap},
    },
};

const SOURCE: &str = "security::acl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccessEntry {
    pub prefix: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct AccessFile {
    access: Vec<AccessEntry>,
}

type AccessTable = HashMap<String, Vec<String>>;

/// Maps request paths onto the roles required to see them.
///
/// The entry with the longest prefix of the requested path wins. When the
/// database lists a prefix twice, the later entry replaces the earlier one.
/// Prefixes are lowercased on load to match normalized request paths.
pub struct AccessControlList {
    path: PathBuf,
    table: RwLock<Arc<AccessTable>>,
}

impl AccessControlList {
    /// Read the database at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let path = path.into();
        let table = read_table(&path)?;
        Ok(Self {
            path,
            table: RwLock::new(Arc::new(table)),
        })
    }

    pub fn reload(&self) -> Result<usize, LoadError> {
        let table = read_table(&self.path)?;
        let entries = table.len();
        swap(&self.table, table, SOURCE, "reload");
        info!(
            target = "verso::security",
            op = "acl_reload",
            path = %self.path.display(),
            entries,
            "Access control list reloaded"
        );
        Ok(entries)
    }

    /// Roles required for `uri`. Empty when no prefix matches.
    pub fn get_roles(&self, uri: &str) -> Vec<String> {
        let table = snapshot(&self.table, SOURCE, "get_roles");

        table
            .iter()
            .filter(|(prefix, _)| uri.starts_with(prefix.as_str()))
            .min_by_key(|(prefix, _)| uri.len() - prefix.len())
            .map(|(_, roles)| roles.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.table, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn read_table(path: &Path) -> Result<AccessTable, LoadError> {
    let file: AccessFile = load_json(path)?;
    Ok(file
        .access
        .into_iter()
        .map(|entry| (entry.prefix.to_lowercase(), entry.roles))
        .collect())
}

impl Listener for AccessControlList {
    fn name(&self) -> &'static str {
        "access_control_list"
    }

    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        if let Event::Checkout { .. } = event {
            self.reload()?;
        }
        Ok(())
    }
}
