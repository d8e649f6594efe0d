//! Application state - Dependency injection container.

use std::sync::Arc;

use crate::config::Config;
use crate::infra::{
    Cache, Database, LocalMediaStore, Mailer, NoCache, NoteCache, RateLimiter,
};
use crate::services::{
    AccountService, AuthService, Collaborators, NoteService, ServiceContainer, Services,
};

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<dyn AuthService>,
    pub account_service: Arc<dyn AccountService>,
    pub note_service: Arc<dyn NoteService>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Present when running against real infrastructure; used by health checks
    pub cache: Option<Arc<Cache>>,
    pub database: Option<Arc<Database>>,
}

impl AppState {
    /// Wire the production services onto Postgres, Redis and the mailer.
    pub fn from_config(
        database: Arc<Database>,
        cache: Arc<Cache>,
        mailer: Arc<dyn Mailer>,
        config: Config,
    ) -> Self {
        let note_cache: Arc<dyn NoteCache> = if config.cache_enabled {
            cache.clone()
        } else {
            tracing::info!("Note listing cache disabled");
            Arc::new(NoCache)
        };

        let collaborators = Collaborators {
            mailer,
            cache: note_cache,
            media: Arc::new(LocalMediaStore::new(config.media_root.as_str())),
        };
        let container = Services::from_connection(database.get_connection(), collaborators, config);

        Self {
            cache: Some(cache.clone()),
            database: Some(database),
            ..Self::new(&container, cache)
        }
    }

    /// State built from an arbitrary container, without infrastructure handles.
    pub fn new(container: &dyn ServiceContainer, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            auth_service: container.auth(),
            account_service: container.accounts(),
            note_service: container.notes(),
            rate_limiter,
            cache: None,
            database: None,
        }
    }
}
