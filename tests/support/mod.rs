#![allow(dead_code)]

use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::level_filters::LevelFilter;
use verso::{
    config::{
        CacheSettings, ContentSettings, LogFormat, LoggingSettings, SecuritySettings,
        ServerSettings, Settings, SiteMode, SiteSettings, VcsSettings,
    },
    content::{VcsError, VersionControl},
    security::password,
};

pub const ADMIN_PASSWORD: &str = "correct horse";
pub const EDITOR_PASSWORD: &str = "battery staple";

/// A content working copy on disk with every database a site needs.
pub struct SiteFixture {
    pub dir: TempDir,
}

impl SiteFixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let fixture = Self { dir };

        fixture.write_page("about.json", "about-1", "About us");
        fixture.write(
            "templates/views/page.html",
            "<h1>{{ page.content.Title }}</h1>",
        );
        fixture.write("templates/views/errors/404.html", "missing {{ path|safe }}");
        fixture.write("assets/css/site.css", "body{}");

        let users = serde_json::json!({
            "Users": [
                {
                    "Username": "admin",
                    "Password": password::hash_sha256(ADMIN_PASSWORD),
                    "Roles": ["Read", "Write", "Admin"]
                },
                {
                    "Username": "editor",
                    "Password": password::encode_base64(EDITOR_PASSWORD),
                    "Roles": ["Read", "Write"]
                }
            ]
        });
        fixture.write("config/users.json", &users.to_string());

        let acl = serde_json::json!({
            "Access": [
                { "Prefix": "/", "Roles": ["Read"] },
                { "Prefix": "/admin", "Roles": ["Admin"] }
            ]
        });
        fixture.write("config/acl.json", &acl.to_string());

        let cache = serde_json::json!({ "Whitelist": ["/"], "Blacklist": ["/api"] });
        fixture.write("config/cache.json", &cache.to_string());

        fixture
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, relative: &str, body: &str) {
        write_file(self.root(), relative, body);
    }

    pub fn write_page(&self, relative: &str, id: &str, title: &str) {
        write_page(self.root(), relative, id, title);
    }

    pub fn settings(&self, mode: SiteMode) -> Settings {
        let root = self.root().to_path_buf();
        Settings {
            server: ServerSettings {
                addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                graceful_shutdown: Duration::from_secs(1),
            },
            logging: LoggingSettings {
                level: LevelFilter::INFO,
                format: LogFormat::Compact,
            },
            site: SiteSettings { mode },
            content: ContentSettings {
                directory: root.clone(),
                pages_dir: root.join("pages"),
                templates_dir: root.join("templates"),
                assets_prefix: "/assets".to_string(),
                generic_types: vec!["page".to_string()],
            },
            security: SecuritySettings {
                public_key_path: key_fixture("public.pem"),
                private_key_path: key_fixture("private.pem"),
                user_db_path: root.join("config/users.json"),
                acl_db_path: root.join("config/acl.json"),
            },
            cache: CacheSettings {
                policy_path: Some(root.join("config/cache.json")),
            },
            vcs: VcsSettings {
                program: PathBuf::from("git"),
                timeout: Duration::from_secs(5),
            },
        }
    }
}

pub fn key_fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/keys")
        .join(name)
}

pub fn write_file(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("parent")).expect("create dirs");
    fs::write(path, body).expect("write file");
}

pub fn write_page(root: &Path, relative: &str, id: &str, title: &str) {
    let body = serde_json::json!({
        "ID": id,
        "CreatedAt": "2021-03-01T10:00:00Z",
        "View": "views/page.html",
        "Type": "page",
        "Content": { "Title": title }
    });
    write_file(root, &format!("pages/{relative}"), &body.to_string());
}

/// Version control double. Checking out a known revision rewrites the working copy.
pub struct ScriptedVcs {
    root: PathBuf,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedVcs {
    pub fn new(root: &Path) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_path_buf(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }
}

#[async_trait]
impl VersionControl for ScriptedVcs {
    async fn pull(&self) -> Result<(), VcsError> {
        self.record("pull".to_string());
        Ok(())
    }

    async fn checkout(&self, revision: &str) -> Result<(), VcsError> {
        self.record(format!("checkout {revision}"));
        match revision {
            "abc123" => {
                write_page(&self.root, "index.json", "index-1", "Welcome");
                write_page(&self.root, "about.json", "about-1", "About us, revised");
                Ok(())
            }
            "broken" => {
                write_file(&self.root, "config/acl.json", "{ not json");
                Ok(())
            }
            _ => Err(VcsError::InvalidRevision {
                revision: revision.to_string(),
            }),
        }
    }

    async fn commit(&self, message: &str) -> Result<(), VcsError> {
        self.record(format!("commit {message}"));
        Ok(())
    }

    async fn push(&self) -> Result<(), VcsError> {
        self.record("push".to_string());
        Ok(())
    }
}
