//! Assembles the content server from settings.
//!
//! Components are loaded eagerly so that a broken database or key file stops
//! the process before it accepts traffic. Reloadable components are
//! subscribed to the bus in a fixed order: content, access control,
//! templates, credentials, page cache. The page cache comes last so it is
//! flushed only after everything it would re-render has been reloaded.

use std::sync::Arc;

use tracing::info;

use crate::{
    cache::{NoCaching, PageCache, PermanentCache},
    config::{Settings, SiteMode},
    content::{ContentController, ContentRepository, GitCli, ReloadSummary, VersionControl},
    events::EventBus,
    infra::assets::AssetDirectory,
    render::{CachedTemplates, ImmediateTemplates, PageRenderer, TemplateStore},
    security::{AccessControlList, CredentialStore, TokenService},
};

use super::error::AppError;

/// Every long-lived component of a running site.
#[derive(Clone)]
pub struct Site {
    pub mode: SiteMode,
    pub assets_prefix: String,
    pub bus: Arc<EventBus>,
    pub content: Arc<ContentRepository>,
    pub renderer: Arc<PageRenderer>,
    pub acl: Arc<AccessControlList>,
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenService>,
    pub cache: Arc<dyn PageCache>,
    pub controller: Arc<ContentController>,
    pub assets: AssetDirectory,
}

/// Counts reported by `verso check`.
#[derive(Debug, Clone, Copy)]
pub struct SiteReport {
    pub pages: ReloadSummary,
    pub users: usize,
    pub access_rules: usize,
    pub listeners: usize,
}

impl Site {
    /// Build a site that drives the working copy with the configured version control program.
    pub fn assemble(settings: &Settings) -> Result<(Self, SiteReport), AppError> {
        let vcs = GitCli::new(
            settings.vcs.program.clone(),
            settings.content.directory.clone(),
            settings.vcs.timeout,
        );
        Self::assemble_with(settings, Arc::new(vcs))
    }

    pub fn assemble_with(
        settings: &Settings,
        vcs: Arc<dyn VersionControl>,
    ) -> Result<(Self, SiteReport), AppError> {
        let mode = settings.site.mode;
        let mut bus = EventBus::new();

        let content = Arc::new(ContentRepository::new(&settings.content.pages_dir));
        for tag in &settings.content.generic_types {
            content.register_model_type::<serde_json::Value>(tag.clone());
        }
        let pages = content.reload()?;
        bus.subscribe(content.clone());

        let acl = Arc::new(AccessControlList::load(&settings.security.acl_db_path)?);
        bus.subscribe(acl.clone());

        let templates: Arc<dyn TemplateStore> = match mode {
            SiteMode::Author => Arc::new(ImmediateTemplates::new(&settings.content.templates_dir)),
            SiteMode::Publish => {
                let cached = Arc::new(CachedTemplates::load(&settings.content.templates_dir)?);
                bus.subscribe(cached.clone());
                cached
            }
        };

        let credentials = Arc::new(CredentialStore::load(&settings.security.user_db_path)?);
        bus.subscribe(credentials.clone());

        let cache: Arc<dyn PageCache> = match mode {
            SiteMode::Author => Arc::new(NoCaching),
            SiteMode::Publish => {
                let permanent = Arc::new(PermanentCache::load(settings.cache.policy_path.clone())?);
                bus.subscribe(permanent.clone());
                permanent
            }
        };

        let tokens = Arc::new(TokenService::from_pem_files(
            &settings.security.private_key_path,
            &settings.security.public_key_path,
        )?);

        let renderer = Arc::new(PageRenderer::new(
            templates,
            content.clone(),
            settings.content.directory.clone(),
            mode.is_author(),
        ));

        let assets = AssetDirectory::new(
            settings
                .content
                .directory
                .join(settings.content.assets_prefix.trim_start_matches('/')),
        );

        let report = SiteReport {
            pages,
            users: credentials.len(),
            access_rules: acl.len(),
            listeners: bus.len(),
        };

        let bus = Arc::new(bus);
        let controller = Arc::new(ContentController::new(vcs, bus.clone()));

        info!(
            target = "verso::site",
            mode = mode.as_str(),
            pages = report.pages.loaded,
            skipped = report.pages.skipped,
            users = report.users,
            access_rules = report.access_rules,
            listeners = ?bus.listener_names(),
            "Site assembled"
        );

        let site = Self {
            mode,
            assets_prefix: settings.content.assets_prefix.clone(),
            bus,
            content,
            renderer,
            acl,
            credentials,
            tokens,
            cache,
            controller,
            assets,
        };
        Ok((site, report))
    }
}
