//! Composition root: builds every shared component once.

use std::sync::Arc;

use crate::ai::{
    build_registry, ActionExecutor, ChatRouter, Language, PendingActions, SafeExecutor, ToolDeps,
    ToolRegistry,
};
use crate::config::{shared, Settings, SharedSettings};
use crate::core::{AiDataCache, ArchiveManager, Clock, SystemClock};
use crate::error::Result;
use crate::providers::{create_provider, ChatProvider};
use crate::storage::{ArchiveStore, SqliteArchiveStore};

pub struct App {
    pub settings: SharedSettings,
    pub store: Arc<dyn ArchiveStore>,
    pub cache: Arc<AiDataCache>,
    pub manager: Arc<ArchiveManager>,
    pub safe: Arc<SafeExecutor>,
    pub actions: Arc<ActionExecutor>,
    pub pending: Arc<PendingActions>,
    pub registry: Arc<ToolRegistry>,
    pub router: Arc<ChatRouter>,
}

impl App {
    /// Open the configured database and wire everything with real backends.
    pub fn build(settings: Settings) -> Result<Self> {
        let db_path = settings.database.resolve_path()?;
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store: Arc<dyn ArchiveStore> = Arc::new(SqliteArchiveStore::open(&db_path)?);
        let provider = create_provider(&settings)?;
        tracing::info!(
            db = %db_path.display(),
            provider = provider.name(),
            "archivebot components ready"
        );
        Self::from_parts(settings, store, provider, Arc::new(SystemClock))
    }

    /// Wire components around an existing store, provider and clock.
    pub fn from_parts(
        settings: Settings,
        store: Arc<dyn ArchiveStore>,
        provider: Arc<dyn ChatProvider>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (model, temperature, capacity, session_ttl) = (
            settings.ai.api.model.clone(),
            settings.ai.api.temperature,
            settings.ai.cache_capacity,
            settings.ai.session_ttl_secs,
        );
        let settings = shared(settings);

        let cache = Arc::new(AiDataCache::with_clock(
            store.clone(),
            settings.clone(),
            capacity,
            clock.clone(),
        ));
        let manager = Arc::new(ArchiveManager::new(store.clone(), cache.clone()));
        let safe = Arc::new(SafeExecutor::new(store.clone(), clock.clone()));
        let actions = Arc::new(ActionExecutor::new(manager.clone()));
        let pending = Arc::new(PendingActions::new(session_ttl, clock));

        let registry = Arc::new(build_registry(&ToolDeps {
            store: store.clone(),
            cache: cache.clone(),
            safe: safe.clone(),
            pending: pending.clone(),
            settings: settings.clone(),
        })?);
        let router = Arc::new(
            ChatRouter::new(provider, registry.clone(), store.clone())
                .with_model(model, temperature),
        );

        Ok(Self {
            settings,
            store,
            cache,
            manager,
            safe,
            actions,
            pending,
            registry,
            router,
        })
    }

    /// Configured interface language.
    pub fn language(&self) -> Language {
        self.settings
            .read()
            .map(|s| Language::from_code(&s.language))
            .unwrap_or_default()
    }
}
