use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::util::json_file::{LoadError, load_json};

/// Which request paths may be cached, as path prefixes.
///
/// A path is cacheable when it starts with at least one whitelisted prefix
/// and with no blacklisted prefix. An empty whitelist caches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CachePolicy {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl CachePolicy {
    /// Read the policy at `path`, lowercasing prefixes to match normalized routes.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let policy: Self = load_json(path)?;
        Ok(policy.normalized())
    }

    pub fn normalized(self) -> Self {
        let lower = |prefixes: Vec<String>| {
            prefixes
                .into_iter()
                .map(|prefix| prefix.to_lowercase())
                .collect()
        };
        Self {
            whitelist: lower(self.whitelist),
            blacklist: lower(self.blacklist),
        }
    }

    pub fn is_allowed(&self, path: &str) -> bool {
        let whitelisted = self
            .whitelist
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()));
        whitelisted
            && !self
                .blacklist
                .iter()
                .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(whitelist: &[&str], blacklist: &[&str]) -> CachePolicy {
        CachePolicy {
            whitelist: whitelist.iter().map(|s| s.to_string()).collect(),
            blacklist: blacklist.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn blacklist_overrides_whitelist() {
        let policy = policy(&["/"], &["/admin"]);
        assert!(policy.is_allowed("/blog/post"));
        assert!(!policy.is_allowed("/admin/users"));
    }

    #[test]
    fn empty_whitelist_allows_nothing() {
        assert!(!policy(&[], &[]).is_allowed("/index"));
    }

    #[test]
    fn unlisted_paths_are_not_cached() {
        let policy = policy(&["/blog"], &[]);
        assert!(policy.is_allowed("/blog"));
        assert!(!policy.is_allowed("/about"));
    }

    #[test]
    fn load_lowercases_prefixes() {
        let dir = tempfile::TempDir::new().expect("temp dir");
        let path = dir.path().join("cache.json");
        std::fs::write(&path, br#"{ "Whitelist": ["/Blog"], "Blacklist": ["/Blog/Drafts"] }"#)
            .expect("write");

        let policy = CachePolicy::load(&path).expect("load");
        assert!(policy.is_allowed("/blog/post"));
        assert!(!policy.is_allowed("/blog/drafts/a"));
    }

    #[test]
    fn parses_policy_file_layout() {
        let parsed: CachePolicy =
            serde_json::from_str(r#"{ "Whitelist": ["/"], "Blacklist": ["/login"] }"#)
                .expect("policy json");
        assert_eq!(parsed, policy(&["/"], &["/login"]));
    }
}
