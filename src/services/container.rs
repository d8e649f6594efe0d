//! Service Container - Centralized service access.
//!
//! Handlers depend on the service traits held here, never on the concrete
//! managers, so tests can assemble the container from fakes.

use std::sync::Arc;

use super::{AccountService, AuthService, NoteService};
use crate::config::Config;
use crate::infra::{MediaStorage, Mailer, NoteCache, Persistence};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Service container trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn accounts(&self) -> Arc<dyn AccountService>;

    fn notes(&self) -> Arc<dyn NoteService>;
}

/// External collaborators the services are built on.
pub struct Collaborators {
    pub mailer: Arc<dyn Mailer>,
    pub cache: Arc<dyn NoteCache>,
    pub media: Arc<dyn MediaStorage>,
}

pub struct Services {
    auth_service: Arc<dyn AuthService>,
    account_service: Arc<dyn AccountService>,
    note_service: Arc<dyn NoteService>,
}

impl Services {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        account_service: Arc<dyn AccountService>,
        note_service: Arc<dyn NoteService>,
    ) -> Self {
        Self {
            auth_service,
            account_service,
            note_service,
        }
    }

    /// Wire every service onto one database connection.
    pub fn from_connection(
        db: sea_orm::DatabaseConnection,
        collaborators: Collaborators,
        config: Config,
    ) -> Self {
        use super::{AccountManager, Authenticator, NoteManager};

        let uow = Arc::new(Persistence::new(db));
        let auth_service = Arc::new(Authenticator::new(uow.clone(), config.clone()));
        let account_service = Arc::new(AccountManager::new(
            uow.clone(),
            collaborators.mailer,
            collaborators.media.clone(),
            config,
        ));
        let note_service = Arc::new(NoteManager::new(
            uow,
            collaborators.cache,
            collaborators.media,
        ));

        Self {
            auth_service,
            account_service,
            note_service,
        }
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn accounts(&self) -> Arc<dyn AccountService> {
        self.account_service.clone()
    }

    fn notes(&self) -> Arc<dyn NoteService> {
        self.note_service.clone()
    }
}
